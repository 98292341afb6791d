//! Entry point tying the API, the chassis and the session together.
//!
//! ```no_run
//! use rust_ixe::app::init_ixe;
//! use rust_ixe::config::ApiType;
//! use rust_ixe::session::ALL_PORTS;
//!
//! # async fn example() -> rust_ixe::error::AppResult<()> {
//! let mut ixe = init_ixe(ApiType::Socket, "192.168.1.10", 4555)?;
//! ixe.connect().await?;
//! ixe.session.reserve_ports(&["1/1/1", "1/1/2"], false, true).await?;
//! ixe.session.start_transmit(true, ALL_PORTS).await?;
//! ixe.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use tracing::{info, warn};

use crate::adapters::{TclTransport, TcpTclAdapterBuilder};
use crate::api::ApiHandle;
use crate::config::{ApiType, IxeConfig};
use crate::error::{AppResult, IxeError};
use crate::hardware::IxeChassis;
use crate::session::IxeSession;

/// Root of the object tree for one Tcl server connection.
pub struct IxeApp {
    /// Shared API handle of the connection.
    pub api: ApiHandle,
    /// The chassis behind the Tcl server.
    pub chassis: IxeChassis,
    /// Login, reserved ports and multi-port operations.
    pub session: IxeSession,
}

/// Build an app talking to the chassis at `host` through the Tcl server on
/// `port`. Only [`ApiType::Socket`] is supported.
pub fn init_ixe(api: ApiType, host: &str, port: u16) -> AppResult<IxeApp> {
    match api {
        ApiType::Socket => {
            let adapter = TcpTclAdapterBuilder::new(host).with_port(port).build();
            Ok(IxeApp::with_transport(Box::new(adapter), host))
        }
        ApiType::Tcl => Err(IxeError::UnsupportedApi(api.to_string())),
    }
}

impl IxeApp {
    /// Build an app over any transport, e.g. the mock adapter.
    pub fn with_transport(transport: Box<dyn TclTransport>, host: &str) -> Self {
        let api = ApiHandle::new(transport);
        Self {
            chassis: IxeChassis::new(host, api.clone()),
            session: IxeSession::new(api.clone()),
            api,
        }
    }

    /// Build an app from the `[chassis]` configuration.
    pub fn from_config(config: &IxeConfig) -> AppResult<Self> {
        match config.chassis.api {
            ApiType::Socket => {
                let adapter = TcpTclAdapterBuilder::new(config.chassis.host.as_str())
                    .with_port(config.chassis.port)
                    .with_connect_timeout(config.chassis.connect_timeout())
                    .build();
                Ok(Self::with_transport(
                    Box::new(adapter),
                    &config.chassis.host,
                ))
            }
            ApiType::Tcl => Err(IxeError::UnsupportedApi(config.chassis.api.to_string())),
        }
    }

    /// Open the Tcl server connection, then connect it to the chassis.
    pub async fn connect(&mut self) -> AppResult<()> {
        self.api.connect().await?;
        self.chassis.connect().await?;
        info!("Connected to {}", self.chassis.host());
        Ok(())
    }

    /// Disconnect from the chassis, then close the Tcl server connection.
    pub async fn disconnect(&mut self) -> AppResult<()> {
        self.chassis.disconnect().await?;
        self.api.disconnect().await?;
        info!("Disconnected from {}", self.chassis.host());
        Ok(())
    }

    /// Release all ports, log out and disconnect.
    ///
    /// Every step runs even when an earlier one fails; the first error is
    /// returned.
    pub async fn close(&mut self) -> AppResult<()> {
        let released = self.session.release_ports().await;
        if let Err(err) = &released {
            warn!("Releasing ports failed: {}", err);
        }
        let logged_out = self.session.logout().await;
        if let Err(err) = &logged_out {
            warn!("Logout failed: {}", err);
        }
        let disconnected = self.disconnect().await;
        released.and(logged_out).and(disconnected)
    }
}
