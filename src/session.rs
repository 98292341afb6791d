//! Session: the root object owning reserved ports.
//!
//! The session reserves ports and runs traffic and capture operations over
//! several of them at once. An empty port selection means every reserved
//! port.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::info;

use crate::api::ApiHandle;
use crate::capture::CapFileFormat;
use crate::error::{AppResult, IxeError};
use crate::hardware::{normalize_uri, IxePort};
use crate::object::{IxeObject, ObjectKind};
use crate::parameter::{quote, MemberType, MemberValue, TclMember};
use crate::traffic;

static SESSION_MEMBERS: [TclMember; 2] = [
    TclMember::new("userName").read_only(),
    TclMember::typed("captureBufferSegmentSize", MemberType::Int),
];

/// IxTclHal `session` object.
pub static SESSION_KIND: ObjectKind = ObjectKind::new("session", &SESSION_MEMBERS);

/// Login state and the ports owned by this client.
pub struct IxeSession {
    obj: IxeObject,
    ports: BTreeMap<String, IxePort>,
}

impl IxeSession {
    /// Session with no reserved ports. Nothing is sent.
    pub fn new(api: ApiHandle) -> Self {
        Self {
            obj: IxeObject::new(&SESSION_KIND, "", api),
            ports: BTreeMap::new(),
        }
    }

    fn api(&self) -> &ApiHandle {
        self.obj.api()
    }

    /// Log in as `user`; owned ports are tagged with this name.
    pub async fn login(&self, user: &str) -> AppResult<()> {
        self.api().call_rc(&format!("ixLogin {}", quote(user))).await?;
        info!("Logged in as {}", user);
        Ok(())
    }

    /// Log out.
    pub async fn logout(&self) -> AppResult<()> {
        self.api().call_rc("ixLogout").await
    }

    /// Read one session attribute or all of them.
    pub async fn get(&mut self, attribute: Option<&str>, force: bool) -> AppResult<()> {
        self.obj.get(attribute, force).await
    }

    /// Read one session attribute.
    pub async fn get_value(&mut self, attribute: &str, force: bool) -> AppResult<MemberValue> {
        self.obj.get_value(attribute, force).await
    }

    /// Set one session attribute.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        self.obj.set(attribute, value).await
    }

    /// Reserve ports and optionally reset them to factory defaults.
    ///
    /// For each port: take ownership (`force` takes it from another user),
    /// then with `clear` run set-default, reset, write and clear-stats in that
    /// order. A failure stops the sequence; earlier steps are not undone.
    /// A port joins the session as soon as it is owned, so a later failure
    /// still leaves it to [`release_ports`](Self::release_ports).
    pub async fn reserve_ports<S: AsRef<str>>(
        &mut self,
        uris: &[S],
        force: bool,
        clear: bool,
    ) -> AppResult<&BTreeMap<String, IxePort>> {
        for uri in uris {
            let port = IxePort::new(uri.as_ref(), self.api().clone());
            port.reserve(force).await?;
            info!("Reserved port {}", port);
            let key = port.uri().to_string();
            self.ports.insert(key.clone(), port);
            if !clear {
                continue;
            }
            if let Some(port) = self.ports.get_mut(&key) {
                port.set_default().await?;
                port.reset().await?;
                port.write().await?;
                port.clear_stats().await?;
            }
        }
        Ok(&self.ports)
    }

    /// Release every reserved port.
    pub async fn release_ports(&mut self) -> AppResult<()> {
        while let Some((_, port)) = self.ports.pop_first() {
            port.release().await?;
            info!("Released port {}", port);
        }
        Ok(())
    }

    /// Reserved ports keyed by Tcl address (`"1 1 1"`).
    pub fn ports(&self) -> &BTreeMap<String, IxePort> {
        &self.ports
    }

    /// Reserved port by `1/1/1` or `1 1 1` address.
    pub fn port(&self, uri: &str) -> Option<&IxePort> {
        self.ports.get(&normalize_uri(uri))
    }

    /// Mutable access to a reserved port.
    pub fn port_mut(&mut self, uri: &str) -> Option<&mut IxePort> {
        self.ports.get_mut(&normalize_uri(uri))
    }

    /// Resolve a port selection to reserved Tcl addresses.
    fn select<S: AsRef<str>>(&self, ports: &[S]) -> AppResult<Vec<String>> {
        if ports.is_empty() {
            if self.ports.is_empty() {
                return Err(IxeError::NoPorts);
            }
            return Ok(self.ports.keys().cloned().collect());
        }
        ports
            .iter()
            .map(|p| {
                let uri = normalize_uri(p.as_ref());
                if self.ports.contains_key(&uri) {
                    Ok(uri)
                } else {
                    Err(IxeError::PortNotReserved(p.as_ref().to_string()))
                }
            })
            .collect()
    }

    /// Start transmit; with `blocking`, return only when traffic ends.
    pub async fn start_transmit<S: AsRef<str>>(&self, blocking: bool, ports: &[S]) -> AppResult<()> {
        let uris = self.select(ports)?;
        traffic::start_transmit(self.api(), &uris, blocking).await
    }

    /// Stop transmit on the selected ports.
    pub async fn stop_transmit<S: AsRef<str>>(&self, ports: &[S]) -> AppResult<()> {
        let uris = self.select(ports)?;
        traffic::stop_transmit(self.api(), &uris).await
    }

    /// Block until transmit is done on the selected ports.
    pub async fn wait_transmit<S: AsRef<str>>(&self, ports: &[S]) -> AppResult<()> {
        let uris = self.select(ports)?;
        traffic::wait_transmit(self.api(), &uris).await
    }

    /// Start capture on the selected ports.
    pub async fn start_capture<S: AsRef<str>>(&self, ports: &[S]) -> AppResult<()> {
        let uris = self.select(ports)?;
        traffic::start_capture(self.api(), &uris).await
    }

    /// Stop capture and export every captured buffer.
    pub async fn stop_capture<S: AsRef<str>>(
        &self,
        prefix: &str,
        format: CapFileFormat,
        ports: &[S],
    ) -> AppResult<BTreeMap<String, PathBuf>> {
        let uris = self.select(ports)?;
        traffic::stop_capture(self.api(), &uris, prefix, format).await
    }
}

/// Empty port selection, for calls addressing every reserved port.
pub const ALL_PORTS: &[&str] = &[];
