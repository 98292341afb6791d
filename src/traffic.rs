//! Batched traffic and capture control.
//!
//! These operations address several ports at once through a cached port-list
//! variable (see [`crate::api::IxTclHalApi::port_list`]). The session runs
//! them over its selected ports; a port runs them over itself alone.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::api::ApiHandle;
use crate::capture::{export_capture, CapFileFormat};
use crate::error::AppResult;

/// Time the chassis needs to settle after starting or stopping traffic.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Clear time stamps, start packet groups and start transmit.
///
/// With `blocking`, waits until transmission ends. There is no client-side
/// timeout on that wait.
pub async fn start_transmit(api: &ApiHandle, uris: &[String], blocking: bool) -> AppResult<()> {
    let port_list = api.port_list(uris).await?;
    api.call_rc(&format!("ixClearTimeStamp {}", port_list)).await?;
    api.call_rc(&format!("ixStartPacketGroups {}", port_list))
        .await?;
    api.call_rc(&format!("ixStartTransmit {}", port_list)).await?;
    info!("Transmit started on {}", port_list);
    tokio::time::sleep(SETTLE_DELAY).await;
    if blocking {
        wait_transmit(api, uris).await?;
    }
    Ok(())
}

/// Stop transmit on `uris` and wait for the counters to settle.
pub async fn stop_transmit(api: &ApiHandle, uris: &[String]) -> AppResult<()> {
    let port_list = api.port_list(uris).await?;
    api.call_rc(&format!("ixStopTransmit {}", port_list)).await?;
    info!("Transmit stopped on {}", port_list);
    tokio::time::sleep(SETTLE_DELAY).await;
    Ok(())
}

/// Block until the chassis reports transmission done on all ports.
pub async fn wait_transmit(api: &ApiHandle, uris: &[String]) -> AppResult<()> {
    let port_list = api.port_list(uris).await?;
    api.call_rc(&format!("ixCheckTransmitDone {}", port_list))
        .await
}

/// Start capture on `uris`.
pub async fn start_capture(api: &ApiHandle, uris: &[String]) -> AppResult<()> {
    let port_list = api.port_list(uris).await?;
    api.call_rc(&format!("ixStartCapture {}", port_list)).await
}

/// Stop capture and export each port's buffer.
///
/// Returns the exported file per port uri; ports without captured frames
/// are absent.
pub async fn stop_capture(
    api: &ApiHandle,
    uris: &[String],
    prefix: &str,
    format: CapFileFormat,
) -> AppResult<BTreeMap<String, PathBuf>> {
    let port_list = api.port_list(uris).await?;
    api.call_rc(&format!("ixStopCapture {}", port_list)).await?;

    let mut files = BTreeMap::new();
    for uri in uris {
        if let Some(path) = export_capture(api, uri, prefix, format).await? {
            files.insert(uri.clone(), path);
        }
    }
    Ok(files)
}

/// Clear per-port statistics, packet group and per-stream counters.
pub async fn clear_stats(api: &ApiHandle, uri: &str) -> AppResult<()> {
    api.call_rc(&format!("ixClearPortStats {}", uri)).await?;
    api.call_rc(&format!("ixClearPortPacketGroups {}", uri))
        .await?;
    let port_list = api.port_list(&[uri.to_string()]).await?;
    api.call_rc(&format!("ixClearPerStreamTxStats {}", port_list))
        .await
}
