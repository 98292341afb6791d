//! Capture buffer export.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};

use crate::api::ApiHandle;
use crate::error::{AppResult, IxeError};
use crate::parameter::quote;

/// File format for exported capture buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapFileFormat {
    /// Binary capture file.
    Cap,
    /// Encoded capture file, readable by IxExplorer.
    #[default]
    Enc,
    /// Decoded text dump.
    Txt,
    /// Keep the capture on the chassis, export nothing.
    Mem,
}

impl CapFileFormat {
    /// File extension, or `None` for [`CapFileFormat::Mem`].
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            CapFileFormat::Cap => Some("cap"),
            CapFileFormat::Enc => Some("enc"),
            CapFileFormat::Txt => Some("txt"),
            CapFileFormat::Mem => None,
        }
    }
}

impl FromStr for CapFileFormat {
    type Err = IxeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cap" => Ok(CapFileFormat::Cap),
            "enc" => Ok(CapFileFormat::Enc),
            "txt" => Ok(CapFileFormat::Txt),
            "mem" => Ok(CapFileFormat::Mem),
            other => Err(IxeError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for CapFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().unwrap_or("mem"))
    }
}

/// Capture file name for the port at `uri`: `<prefix>-<c_ca_p>.<ext>`.
pub fn capture_file_name(prefix: &str, uri: &str, format: CapFileFormat) -> Option<PathBuf> {
    format
        .extension()
        .map(|ext| PathBuf::from(format!("{}-{}.{}", prefix, uri.replace(' ', "_"), ext)))
}

/// Number of frames captured on the port at `uri`.
pub async fn captured_packets(api: &ApiHandle, uri: &str) -> AppResult<i64> {
    api.call_rc(&format!("capture get {}", uri)).await?;
    api.invalidate("capture").await;
    let raw = api.call("capture cget -nPackets").await?;
    raw.trim()
        .parse()
        .map_err(|_| IxeError::Protocol(format!("bad nPackets reply '{}'", raw)))
}

/// Export the capture buffer of one port.
///
/// Returns `None` when nothing was captured or the format keeps the capture
/// in chassis memory.
pub async fn export_capture(
    api: &ApiHandle,
    uri: &str,
    prefix: &str,
    format: CapFileFormat,
) -> AppResult<Option<PathBuf>> {
    let packets = captured_packets(api, uri).await?;
    if packets == 0 {
        warn!("No packets captured on port {}", uri);
        return Ok(None);
    }
    let Some(path) = capture_file_name(prefix, uri, format) else {
        return Ok(None);
    };
    api.call_rc(&format!("captureBuffer get {} 1 {}", uri, packets))
        .await?;
    api.call_rc(&format!(
        "captureBuffer export {}",
        quote(&path.display().to_string())
    ))
        .await?;
    info!("Exported {} packets from {} to {}", packets, uri, path.display());
    Ok(Some(path))
}
