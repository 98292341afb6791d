//! Transport adapters for the IxTclHal command protocol.
//!
//! An adapter owns the connection to the Tcl server and turns one command
//! string into one reply string. Everything above this layer (`api`,
//! `object`, `session`) is transport-agnostic.

/// In-memory IxTclHal emulation.
pub mod mock_adapter;
/// IxTclServer socket transport.
pub mod tcp_adapter;

pub use mock_adapter::MockTclAdapter;
pub use tcp_adapter::{TcpTclAdapter, TcpTclAdapterBuilder};

use async_trait::async_trait;

use crate::error::AppResult;

/// Generic async transport for Tcl commands.
///
/// `call` must return the Tcl result of the command on success and
/// [`crate::error::IxeError::Remote`] when the server reports a Tcl error.
#[async_trait]
pub trait TclTransport: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> AppResult<()>;

    async fn disconnect(&mut self) -> AppResult<()>;

    fn is_connected(&self) -> bool;

    /// Send one command and wait for its reply.
    async fn call(&mut self, command: &str) -> AppResult<String>;
}
