//! IxTclHal command API on top of a [`TclTransport`].
//!
//! `IxTclHalApi` adds the two conventions every higher layer relies on:
//!
//! - `call` returns the raw Tcl result, `call_rc` additionally requires the
//!   IxTclHal return code `0`
//! - per-connection bookkeeping: which object is currently loaded into each
//!   keyword's global configuration object, and which batched port lists
//!   already exist as Tcl variables
//!
//! [`ApiHandle`] is the cloneable, shared form held by every addressable
//! object.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::adapters::TclTransport;
use crate::error::{AppResult, IxeError};

/// IxTclHal return code for success.
pub const TCL_OK: &str = "0";

/// IxTclHal command layer over one transport.
pub struct IxTclHalApi {
    transport: Box<dyn TclTransport>,
    loaded: HashMap<String, String>,
    port_lists: HashSet<String>,
}

impl IxTclHalApi {
    /// API with no loaded objects or port lists.
    pub fn new(transport: Box<dyn TclTransport>) -> Self {
        Self {
            transport,
            loaded: HashMap::new(),
            port_lists: HashSet::new(),
        }
    }

    /// Open the transport.
    pub async fn connect(&mut self) -> AppResult<()> {
        debug!("Connecting {} transport", self.transport.name());
        self.transport.connect().await
    }

    /// Close the connection. Tcl-side variables and loaded objects die with
    /// it, so the bookkeeping is reset.
    pub async fn disconnect(&mut self) -> AppResult<()> {
        self.loaded.clear();
        self.port_lists.clear();
        self.transport.disconnect().await
    }

    /// True while the transport is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Run `command` and return its result text.
    pub async fn call(&mut self, command: &str) -> AppResult<String> {
        self.transport.call(command).await
    }

    /// Run `command` and require the return code `0`.
    pub async fn call_rc(&mut self, command: &str) -> AppResult<()> {
        let rc = self.call(command).await?;
        if rc.trim() == TCL_OK {
            Ok(())
        } else {
            Err(IxeError::remote(command, format!("return code {}", rc.trim())))
        }
    }

    /// True when the global object of `keyword` currently holds `uri`.
    pub fn is_loaded(&self, keyword: &str, uri: &str) -> bool {
        self.loaded.get(keyword).is_some_and(|u| u == uri)
    }

    /// Record that the global object of `keyword` now holds `uri`.
    pub fn mark_loaded(&mut self, keyword: &str, uri: &str) {
        self.loaded.insert(keyword.to_string(), uri.to_string());
    }

    /// Forget what the global object of `keyword` holds.
    pub fn invalidate(&mut self, keyword: &str) {
        self.loaded.remove(keyword);
    }

    /// Name of the batched list variable for `uris`, creating it on first use.
    ///
    /// The name depends only on the set of uris, so the same ports in any
    /// order map to the same variable.
    pub async fn port_list(&mut self, uris: &[String]) -> AppResult<String> {
        if uris.is_empty() {
            return Err(IxeError::NoPorts);
        }
        let mut sorted: Vec<&str> = uris.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let name = port_list_name(&sorted);
        if !self.port_lists.contains(&name) {
            let members: String = sorted.iter().map(|u| format!("[list {}] ", u)).collect();
            self.call(&format!("set {} [ list {}]", name, members)).await?;
            self.port_lists.insert(name.clone());
            debug!("Created port list {}", name);
        }
        Ok(name)
    }

    /// True when the list variable `name` exists on the server.
    pub fn has_port_list(&self, name: &str) -> bool {
        self.port_lists.contains(name)
    }
}

fn port_list_name(sorted_uris: &[&str]) -> String {
    format!("pl_{}", sorted_uris.join("_").replace(' ', "_"))
}

/// Shared handle to the API of one Tcl connection.
///
/// Objects of one session hold clones of the same handle; commands are still
/// issued strictly one after the other.
#[derive(Clone)]
pub struct ApiHandle {
    inner: Arc<Mutex<IxTclHalApi>>,
}

impl ApiHandle {
    /// Handle over a fresh API for `transport`.
    pub fn new(transport: Box<dyn TclTransport>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IxTclHalApi::new(transport))),
        }
    }

    /// See [`IxTclHalApi::connect`].
    pub async fn connect(&self) -> AppResult<()> {
        self.inner.lock().await.connect().await
    }

    /// See [`IxTclHalApi::disconnect`].
    pub async fn disconnect(&self) -> AppResult<()> {
        self.inner.lock().await.disconnect().await
    }

    /// True while the transport is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_connected()
    }

    /// See [`IxTclHalApi::call`].
    pub async fn call(&self, command: &str) -> AppResult<String> {
        self.inner.lock().await.call(command).await
    }

    /// See [`IxTclHalApi::call_rc`].
    pub async fn call_rc(&self, command: &str) -> AppResult<()> {
        self.inner.lock().await.call_rc(command).await
    }

    /// See [`IxTclHalApi::is_loaded`].
    pub async fn is_loaded(&self, keyword: &str, uri: &str) -> bool {
        self.inner.lock().await.is_loaded(keyword, uri)
    }

    /// See [`IxTclHalApi::mark_loaded`].
    pub async fn mark_loaded(&self, keyword: &str, uri: &str) {
        self.inner.lock().await.mark_loaded(keyword, uri)
    }

    /// See [`IxTclHalApi::invalidate`].
    pub async fn invalidate(&self, keyword: &str) {
        self.inner.lock().await.invalidate(keyword)
    }

    /// See [`IxTclHalApi::port_list`].
    pub async fn port_list(&self, uris: &[String]) -> AppResult<String> {
        self.inner.lock().await.port_list(uris).await
    }

    /// See [`IxTclHalApi::has_port_list`].
    pub async fn has_port_list(&self, name: &str) -> bool {
        self.inner.lock().await.has_port_list(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTclAdapter;

    async fn handle() -> (ApiHandle, MockTclAdapter) {
        let mock = MockTclAdapter::new();
        let api = ApiHandle::new(Box::new(mock.clone()));
        api.connect().await.unwrap();
        (api, mock)
    }

    #[test]
    fn test_port_list_name() {
        assert_eq!(port_list_name(&["1 1 1", "1 1 2"]), "pl_1_1_1_1_1_2");
    }

    #[tokio::test]
    async fn test_call_rc_rejects_nonzero() {
        let (api, mock) = handle().await;
        mock.reply_on("ixPortTakeOwnership", "1");
        let err = api.call_rc("ixPortTakeOwnership 1 1 1").await.unwrap_err();
        assert!(matches!(err, IxeError::Remote { .. }));
        assert!(api.call_rc("ixPortClearOwnership 1 1 1").await.is_ok());
    }

    #[tokio::test]
    async fn test_port_list_cached_and_order_independent() {
        let (api, mock) = handle().await;
        let a = vec!["1 1 2".to_string(), "1 1 1".to_string()];
        let b = vec!["1 1 1".to_string(), "1 1 2".to_string()];

        let first = api.port_list(&a).await.unwrap();
        let second = api.port_list(&b).await.unwrap();
        assert_eq!(first, "pl_1_1_1_1_1_2");
        assert_eq!(first, second);
        assert_eq!(
            mock.call_log(),
            vec!["set pl_1_1_1_1_1_2 [ list [list 1 1 1] [list 1 1 2] ]"]
        );

        let single = api.port_list(&["1 1 1".to_string()]).await.unwrap();
        assert_eq!(single, "pl_1_1_1");
        assert_eq!(mock.count_calls("set pl_"), 2);
    }

    #[tokio::test]
    async fn test_port_list_requires_ports() {
        let (api, mock) = handle().await;
        assert!(matches!(api.port_list(&[]).await, Err(IxeError::NoPorts)));
        assert!(mock.call_log().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_forgets_port_lists() {
        let (api, _mock) = handle().await;
        let name = api.port_list(&["1 1 1".to_string()]).await.unwrap();
        api.mark_loaded("port", "1 1 1").await;
        api.disconnect().await.unwrap();
        assert!(!api.has_port_list(&name).await);
        assert!(!api.is_loaded("port", "1 1 1").await);
    }
}
