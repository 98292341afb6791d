//! TCP adapter for the IxTclServer socket interface.
//!
//! Framing: each command is written followed by `\r\n`. The server answers
//! with a single record terminated by `\r\n` whose first character is the Tcl
//! return code (`0` = `TCL_OK`) and whose remainder is the command result. When
//! the command printed to stdout, the captured output precedes the result and
//! is separated from it by `\r`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::TclTransport;
use crate::error::{AppResult, IxeError};

/// Default IxTclServer port.
pub const DEFAULT_TCL_PORT: u16 = 4555;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Builder for constructing [`TcpTclAdapter`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use rust_ixe::adapters::{TcpTclAdapterBuilder, TclTransport};
///
/// # async fn example() -> rust_ixe::error::AppResult<()> {
/// let mut adapter = TcpTclAdapterBuilder::new("192.168.1.10")
///     .with_port(4555)
///     .with_connect_timeout(Duration::from_secs(2))
///     .build();
/// adapter.connect().await?;
/// let version = adapter.call("version cget -ixTclHALVersion").await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTclAdapterBuilder {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpTclAdapterBuilder {
    /// Builder for `host` with the default Tcl server port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TCL_PORT,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    /// Tcl server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Give up connecting after `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the adapter. Nothing is connected yet.
    pub fn build(self) -> TcpTclAdapter {
        TcpTclAdapter {
            host: self.host,
            port: self.port,
            connect_timeout: self.connect_timeout,
            reader: None,
            writer: None,
        }
    }
}

/// Socket connection to an IxTclServer.
///
/// Replies are awaited without a read timeout: `ixCheckTransmitDone` blocks
/// on the server side until traffic ends.
pub struct TcpTclAdapter {
    host: String,
    port: u16,
    connect_timeout: Duration,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl TcpTclAdapter {
    /// Adapter for `host:port` with the default connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpTclAdapterBuilder::new(host).with_port(port).build()
    }

    async fn read_record(&mut self) -> AppResult<String> {
        let reader = self.reader.as_mut().ok_or(IxeError::NotConnected)?;
        let mut buf = Vec::new();
        loop {
            let n = reader.read_until(b'\n', &mut buf).await?;
            if n == 0 {
                return Err(IxeError::Protocol(
                    "connection closed by Tcl server".to_string(),
                ));
            }
            if buf.ends_with(b"\r\n") {
                break;
            }
        }
        buf.truncate(buf.len() - 2);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Split a raw server record into the command result.
pub fn parse_reply(command: &str, record: &str) -> AppResult<String> {
    let mut chars = record.chars();
    let code = chars
        .next()
        .ok_or_else(|| IxeError::Protocol(format!("empty reply to '{}'", command)))?;
    let body = chars.as_str();
    let result = body.rsplit('\r').next().unwrap_or(body).to_string();
    match code {
        '0' => Ok(result),
        c if c.is_ascii_digit() => Err(IxeError::remote(command, result)),
        _ => Err(IxeError::Protocol(format!(
            "malformed reply to '{}': {:?}",
            command, record
        ))),
    }
}

#[async_trait]
impl TclTransport for TcpTclAdapter {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn connect(&mut self) -> AppResult<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                IxeError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", addr),
                ))
            })??;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        self.reader = Some(BufReader::new(read_half));
        self.writer = Some(write_half);
        info!("Connected to Tcl server at {}", addr);
        Ok(())
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
            debug!("Tcl server connection {}:{} closed", self.host, self.port);
        }
        self.reader = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    async fn call(&mut self, command: &str) -> AppResult<String> {
        let writer = self.writer.as_mut().ok_or(IxeError::NotConnected)?;
        debug!("tcl >> {}", command);
        writer.write_all(format!("{}\r\n", command).as_bytes()).await?;
        writer.flush().await?;

        let record = self.read_record().await?;
        debug!("tcl << {}", record);
        parse_reply(command, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_reply_ok() {
        assert_eq!(parse_reply("port cget -speed", "01000").unwrap(), "1000");
        assert_eq!(parse_reply("ixLogin {me}", "0").unwrap(), "");
        assert_eq!(
            parse_reply("port cget -owner", "0 padded  owner ").unwrap(),
            " padded  owner "
        );
    }

    #[test]
    fn test_parse_reply_strips_captured_output() {
        assert_eq!(
            parse_reply("port get 1 1 1", "0Port 1 1 1 loaded\r0").unwrap(),
            "0"
        );
    }

    #[test]
    fn test_parse_reply_error() {
        let err = parse_reply("port cget -bogus", "1invalid option -bogus").unwrap_err();
        match err {
            IxeError::Remote { command, message } => {
                assert_eq!(command, "port cget -bogus");
                assert_eq!(message, "invalid option -bogus");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_malformed() {
        assert!(matches!(parse_reply("x", ""), Err(IxeError::Protocol(_))));
        assert!(matches!(parse_reply("x", "abc"), Err(IxeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_call_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            let received = String::from_utf8_lossy(&buf[..n]).to_string();
            socket.write_all(b"01000\r\n").await.unwrap();
            received
        });

        let mut adapter = TcpTclAdapter::new("127.0.0.1", port);
        assert!(!adapter.is_connected());
        adapter.connect().await.unwrap();
        let reply = adapter.call("port cget -speed").await.unwrap();
        assert_eq!(reply, "1000");
        adapter.disconnect().await.unwrap();

        assert_eq!(server.await.unwrap(), "port cget -speed\r\n");
    }

    #[tokio::test]
    async fn test_call_when_not_connected() {
        let mut adapter = TcpTclAdapter::new("127.0.0.1", DEFAULT_TCL_PORT);
        assert!(matches!(
            adapter.call("ixLogout").await,
            Err(IxeError::NotConnected)
        ));
    }
}
