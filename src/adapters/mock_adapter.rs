//! In-memory Tcl server for tests and dry runs.
//!
//! `MockTclAdapter` emulates the parts of IxTclHal the client relies on:
//!
//! - one global configuration object per command keyword, loaded by
//!   `<kw> get|getRx <uri>`, read by `cget`, changed by `config`, stored back
//!   by `<kw> set|setRx <uri>` and cleared by `setDefault`
//! - `port getStreamCount`, `port getFeature` and `capture get` backed by
//!   configurable tables
//! - `set <var> <value>` returning the value
//! - every other command answering `0`
//!
//! Every command is appended to a shared call log. Clones share all state, so
//! a test can keep one clone for inspection after handing another to the API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::TclTransport;
use crate::error::{AppResult, IxeError};

type Members = HashMap<String, String>;

#[derive(Default)]
struct MockState {
    connected: bool,
    call_log: Vec<String>,
    globals: HashMap<String, Members>,
    stored: HashMap<(String, String), Members>,
    stream_counts: HashMap<String, i64>,
    capture_packets: HashMap<String, i64>,
    features: HashMap<String, String>,
    replies: Vec<(String, String)>,
    failures: Vec<(String, String)>,
}

/// Mock Tcl transport
///
/// # Example
///
/// ```
/// use rust_ixe::adapters::MockTclAdapter;
///
/// let adapter = MockTclAdapter::new().with_stream_count("1 1 1", 2);
/// assert!(adapter.call_log().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockTclAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockTclAdapter {
    /// Empty emulated server.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Report `count` streams on the port at `uri`.
    pub fn with_stream_count(self, uri: &str, count: i64) -> Self {
        self.state().stream_counts.insert(uri.to_string(), count);
        self
    }

    /// Report `packets` captured frames on the port at `uri`.
    pub fn with_capture_packets(self, uri: &str, packets: i64) -> Self {
        self.state().capture_packets.insert(uri.to_string(), packets);
        self
    }

    /// Answer `getFeature <feature>` with `reply` for every port.
    pub fn with_feature(self, feature: &str, reply: &str) -> Self {
        self.state()
            .features
            .insert(feature.to_string(), reply.to_string());
        self
    }

    /// Pre-populate the remote value of one attribute.
    pub fn with_value(self, keyword: &str, uri: &str, member: &str, value: &str) -> Self {
        self.state()
            .stored
            .entry((keyword.to_string(), uri.to_string()))
            .or_default()
            .insert(member.to_string(), value.to_string());
        self
    }

    /// Answer every command starting with `prefix` with `reply`.
    pub fn reply_on(&self, prefix: &str, reply: &str) {
        self.state()
            .replies
            .push((prefix.to_string(), reply.to_string()));
    }

    /// Fail every command starting with `prefix` with a Tcl error.
    pub fn fail_on(&self, prefix: &str, message: &str) {
        self.state()
            .failures
            .push((prefix.to_string(), message.to_string()));
    }

    /// Commands received so far, oldest first.
    pub fn call_log(&self) -> Vec<String> {
        self.state().call_log.clone()
    }

    /// Forget the recorded commands.
    pub fn clear_log(&self) {
        self.state().call_log.clear();
    }

    /// Number of logged commands starting with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Remote value of an attribute as stored by the last `set`.
    pub fn stored_value(&self, keyword: &str, uri: &str, member: &str) -> Option<String> {
        self.state()
            .stored
            .get(&(keyword.to_string(), uri.to_string()))
            .and_then(|m| m.get(member).cloned())
    }
}

// IxTclHal zero defaults for attributes never configured.
fn default_value(member: &str) -> &'static str {
    if member.ends_with("Address") || member == "da" || member == "sa" {
        "00 00 00 00 00 00"
    } else {
        "0"
    }
}

// Decode one Tcl word: brace-quoted verbatim, otherwise backslash escapes.
fn tcl_word(word: &str) -> String {
    if let Some(inner) = word.strip_prefix('{').and_then(|w| w.strip_suffix('}')) {
        return inner.to_string();
    }
    let mut value = String::with_capacity(word.len());
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some(other) => value.push(other),
            None => {}
        }
    }
    value
}

impl MockState {
    fn respond(&mut self, command: &str) -> AppResult<String> {
        if let Some((_, message)) = self.failures.iter().find(|(p, _)| command.starts_with(p)) {
            return Err(IxeError::remote(command, message.clone()));
        }
        if let Some((_, reply)) = self.replies.iter().find(|(p, _)| command.starts_with(p)) {
            return Ok(reply.clone());
        }

        let tokens: Vec<&str> = command.split_whitespace().collect();
        let (keyword, verb) = match tokens.as_slice() {
            [] => return Err(IxeError::remote(command, "empty command")),
            [keyword] => (*keyword, ""),
            [keyword, verb, ..] => (*keyword, *verb),
        };
        let uri = tokens.get(2..).map(|t| t.join(" ")).unwrap_or_default();

        if keyword == "set" {
            let value = command
                .split_once(' ')
                .and_then(|(_, rest)| rest.split_once(' '))
                .map(|(_, value)| value)
                .unwrap_or_default();
            return Ok(value.to_string());
        }
        if keyword.starts_with("ix") {
            return Ok("0".to_string());
        }

        match verb {
            "cget" => {
                let member = tokens
                    .get(2)
                    .and_then(|t| t.strip_prefix('-'))
                    .ok_or_else(|| IxeError::remote(command, "wrong # args"))?;
                let value = self
                    .globals
                    .get(keyword)
                    .and_then(|g| g.get(member).cloned())
                    .unwrap_or_else(|| default_value(member).to_string());
                Ok(value)
            }
            "config" => {
                let member = tokens
                    .get(2)
                    .and_then(|t| t.strip_prefix('-'))
                    .ok_or_else(|| IxeError::remote(command, "wrong # args"))?;
                let value = command.splitn(4, ' ').nth(3).unwrap_or_default();
                self.globals
                    .entry(keyword.to_string())
                    .or_default()
                    .insert(member.to_string(), tcl_word(value));
                Ok(String::new())
            }
            "get" | "getRx" => {
                let mut members = self
                    .stored
                    .get(&(keyword.to_string(), uri.clone()))
                    .cloned()
                    .unwrap_or_default();
                if keyword == "capture" {
                    let packets = self.capture_packets.get(&uri).copied().unwrap_or(0);
                    members.insert("nPackets".to_string(), packets.to_string());
                }
                self.globals.insert(keyword.to_string(), members);
                Ok("0".to_string())
            }
            "set" | "setRx" => {
                let members = self.globals.get(keyword).cloned().unwrap_or_default();
                if keyword == "stream" {
                    self.track_stream(&tokens);
                }
                self.stored.insert((keyword.to_string(), uri), members);
                Ok("0".to_string())
            }
            "setDefault" => {
                self.globals.remove(keyword);
                Ok(String::new())
            }
            "getStreamCount" => Ok(self.stream_counts.get(&uri).copied().unwrap_or(0).to_string()),
            "getFeature" => {
                let feature = tokens.last().copied().unwrap_or_default();
                Ok(self.features.get(feature).cloned().unwrap_or_default())
            }
            _ => Ok("0".to_string()),
        }
    }

    // `stream set c ca p id` creates stream `id` when it is past the end.
    fn track_stream(&mut self, tokens: &[&str]) {
        if tokens.len() < 6 {
            return;
        }
        let port_uri = tokens[2..5].join(" ");
        if let Ok(id) = tokens[5].parse::<i64>() {
            let count = self.stream_counts.entry(port_uri).or_insert(0);
            if id > *count {
                *count = id;
            }
        }
    }
}

#[async_trait]
impl TclTransport for MockTclAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> AppResult<()> {
        self.state().connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        self.state().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn call(&mut self, command: &str) -> AppResult<String> {
        let mut state = self.state();
        if !state.connected {
            return Err(IxeError::NotConnected);
        }
        state.call_log.push(command.to_string());
        let reply = state.respond(command);
        debug!("mock tcl {} -> {:?}", command, reply);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected() -> MockTclAdapter {
        let mut adapter = MockTclAdapter::new();
        adapter.connect().await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_mock_requires_connection() {
        let mut adapter = MockTclAdapter::new();
        assert!(!adapter.is_connected());
        assert!(matches!(
            adapter.call("ixLogout").await,
            Err(IxeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_mock_config_set_get_cycle() {
        let mut adapter = connected().await;
        adapter.call("port config -speed 1000").await.unwrap();
        adapter.call("port set 1 1 1").await.unwrap();
        adapter.call("port setDefault").await.unwrap();
        assert_eq!(adapter.call("port cget -speed").await.unwrap(), "0");

        adapter.call("port get 1 1 1").await.unwrap();
        assert_eq!(adapter.call("port cget -speed").await.unwrap(), "1000");
        assert_eq!(
            adapter.stored_value("port", "1 1 1", "speed").as_deref(),
            Some("1000")
        );
    }

    #[tokio::test]
    async fn test_mock_config_keeps_quoted_value() {
        let mut adapter = connected().await;
        adapter.call("port config -owner {  two  spaces }").await.unwrap();
        assert_eq!(adapter.call("port cget -owner").await.unwrap(), "  two  spaces ");
        adapter.call(r"port config -owner a\}\ \{b").await.unwrap();
        assert_eq!(adapter.call("port cget -owner").await.unwrap(), "a} {b");
    }

    #[tokio::test]
    async fn test_mock_stream_tracking() {
        let mut adapter = connected().await.with_stream_count("1 1 1", 1);
        adapter.call("stream set 1 1 1 2").await.unwrap();
        assert_eq!(
            adapter.call("port getStreamCount 1 1 1").await.unwrap(),
            "2"
        );
    }

    #[tokio::test]
    async fn test_mock_failure_and_log() {
        let mut adapter = connected().await;
        let inspector = adapter.clone();
        inspector.fail_on("port write", "port is not owned");

        assert!(adapter.call("port write 1 1 1").await.is_err());
        assert_eq!(
            adapter.call("set pl_1_1_1 [ list [list 1 1 1] ]").await.unwrap(),
            "[ list [list 1 1 1] ]"
        );
        assert_eq!(inspector.call_log().len(), 2);
        assert_eq!(inspector.count_calls("port write"), 1);
        inspector.clear_log();
        assert!(inspector.call_log().is_empty());
    }
}
