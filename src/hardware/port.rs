//! Traffic generator port.
//!
//! A port is addressed by `"<chassis> <card> <port>"`. Besides its attribute
//! table it owns the streams discovered or added on it and, lazily, its
//! data-integrity and packet-group sub-objects.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::port_objects::{PortSubObject, DATA_INTEGRITY_KIND, PACKET_GROUP_KIND};
use super::stream::IxeStream;
use crate::api::ApiHandle;
use crate::capture::CapFileFormat;
use crate::error::{AppResult, IxeError};
use crate::object::{refresh_with_parent, IxeObject, ObjectKind};
use crate::parameter::{quote, MemberType, MemberValue, TclMember};
use crate::traffic;

static PORT_MEMBERS: [TclMember; 51] = [
    TclMember::typed("advertise1000FullDuplex", MemberType::Bool),
    TclMember::typed("advertise100FullDuplex", MemberType::Bool),
    TclMember::typed("advertise100HalfDuplex", MemberType::Bool),
    TclMember::typed("advertise10FullDuplex", MemberType::Bool),
    TclMember::typed("advertise10HalfDuplex", MemberType::Bool),
    TclMember::new("advertiseAbilities"),
    TclMember::typed("autoDetectInstrumentationMode", MemberType::Bool),
    TclMember::typed("autonegotiate", MemberType::Bool),
    TclMember::typed("dataCenterMode", MemberType::Bool),
    TclMember::typed("DestMacAddress", MemberType::MacStr),
    TclMember::typed("directedAddress", MemberType::MacStr),
    TclMember::new("duplex"),
    TclMember::typed("enableAutoDetectInstrumentation", MemberType::Bool),
    TclMember::typed("enableDataCenterMode", MemberType::Bool),
    TclMember::typed("enableManualAutoNegotiate", MemberType::Bool),
    TclMember::typed("enablePhyPolling", MemberType::Bool),
    TclMember::typed("enableRepeatableLastRandomPattern", MemberType::Bool),
    TclMember::typed("enableSimulateCableDisconnect", MemberType::Bool),
    TclMember::typed("enableTransparentDynamicRateChange", MemberType::Bool),
    TclMember::typed("enableTxRxSyncStatsMode", MemberType::Bool),
    TclMember::typed("flowControl", MemberType::Bool),
    TclMember::typed("flowControlType", MemberType::Int),
    TclMember::typed("ignoreLink", MemberType::Bool),
    TclMember::typed("linkState", MemberType::Int).read_only(),
    TclMember::new("loopback"),
    TclMember::typed("MacAddress", MemberType::MacStr),
    TclMember::typed("masterSlave", MemberType::Bool),
    TclMember::new("multicastPauseAddress"),
    TclMember::typed("negotiateMasterSlave", MemberType::Bool),
    TclMember::typed("operationModeList", MemberType::Int),
    TclMember::new("owner"),
    TclMember::new("packetFlowFileName"),
    TclMember::new("pfcEnableValueList"),
    TclMember::new("pfcEnableValueListBitMatrix"),
    TclMember::new("pfcResponseDelayEnabled"),
    TclMember::new("pfcResponseDelayQuanta"),
    TclMember::new("phyMode").read_only(),
    TclMember::typed("pmaClock", MemberType::Int),
    TclMember::typed("portMode", MemberType::Int),
    TclMember::new("preEmphasis"),
    TclMember::new("receiveMode"),
    TclMember::typed("rxTxMode", MemberType::Int),
    TclMember::typed("speed", MemberType::Int),
    TclMember::new("timeoutEnable"),
    TclMember::typed("transmitClockDeviation", MemberType::Bool),
    TclMember::typed("transmitClockMode", MemberType::Int),
    TclMember::typed("transmitMode", MemberType::Int),
    TclMember::typed("txRxSyncInterval", MemberType::Int),
    TclMember::new("type").read_only(),
    TclMember::new("typeName").read_only(),
    TclMember::typed("usePacketFlowImageFile", MemberType::Bool),
];

/// IxTclHal `port` object.
pub static PORT_KIND: ObjectKind = ObjectKind::new("port", &PORT_MEMBERS);

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Decoded value of the read-only `linkState` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// `linkDown` (0)
    Down,
    /// `linkUp` (1)
    Up,
    /// `linkLoopback` (2)
    Loopback,
    /// `miiWrite` (3)
    MiiWrite,
    /// `restartAuto` (4)
    RestartAuto,
    /// `autoNegotiating` (5)
    AutoNegotiating,
    /// `miiFail` (6)
    MiiFail,
    /// `noTransceiver` (7)
    NoTransceiver,
    /// `invalidAddress` (8)
    InvalidAddress,
    /// `readLinkPartner` (9)
    ReadLinkPartner,
    /// `noLinkPartner` (10)
    NoLinkPartner,
    /// `restartAutoEnd` (11)
    RestartAutoEnd,
    /// `fpgaDownloadFailed` (12)
    FpgaDownloadFailed,
    /// `lossOfFrame` (24)
    LossOfFrame,
    /// `lossOfSignal` (25)
    LossOfSignal,
    /// Code with no known meaning.
    Other(i64),
}

impl LinkState {
    /// Map an IxTclHal `linkState` code.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LinkState::Down,
            1 => LinkState::Up,
            2 => LinkState::Loopback,
            3 => LinkState::MiiWrite,
            4 => LinkState::RestartAuto,
            5 => LinkState::AutoNegotiating,
            6 => LinkState::MiiFail,
            7 => LinkState::NoTransceiver,
            8 => LinkState::InvalidAddress,
            9 => LinkState::ReadLinkPartner,
            10 => LinkState::NoLinkPartner,
            11 => LinkState::RestartAutoEnd,
            12 => LinkState::FpgaDownloadFailed,
            24 => LinkState::LossOfFrame,
            25 => LinkState::LossOfSignal,
            other => LinkState::Other(other),
        }
    }
}

/// Normalize a user-supplied port address (`1/1/1`, `1 1 1`) to Tcl form.
pub fn normalize_uri(uri: &str) -> String {
    uri.split(|c: char| c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Kind of profile accepted by [`IxePort::load_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKind {
    Port,
    Stream,
}

fn config_kind(file: &str) -> AppResult<ConfigKind> {
    let ext = Path::new(file)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "prt" => Ok(ConfigKind::Port),
        "str" => Ok(ConfigKind::Stream),
        other => Err(IxeError::UnsupportedFormat(format!(".{}", other))),
    }
}

/// One reserved port with its streams and sub-objects.
pub struct IxePort {
    obj: IxeObject,
    streams: BTreeMap<u32, IxeStream>,
    data_integrity: Option<PortSubObject>,
    packet_group: Option<PortSubObject>,
}

impl IxePort {
    /// Port object for `uri` (`1/1/1` or `1 1 1`). Nothing is sent.
    pub fn new(uri: &str, api: ApiHandle) -> Self {
        Self {
            obj: IxeObject::new(&PORT_KIND, normalize_uri(uri), api),
            streams: BTreeMap::new(),
            data_integrity: None,
            packet_group: None,
        }
    }

    /// Tcl address, `"1 1 1"`.
    pub fn uri(&self) -> &str {
        self.obj.uri()
    }

    /// Underlying object with the cached attributes.
    pub fn object(&self) -> &IxeObject {
        &self.obj
    }

    fn api(&self) -> &ApiHandle {
        self.obj.api()
    }

    /// Read one attribute or all of them.
    pub async fn get(&mut self, attribute: Option<&str>, force: bool) -> AppResult<()> {
        self.obj.get(attribute, force).await
    }

    /// Read one attribute, loading the port when needed.
    pub async fn get_value(&mut self, attribute: &str, force: bool) -> AppResult<MemberValue> {
        self.obj.get_value(attribute, force).await
    }

    /// Set one attribute and store the port.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        self.obj.set(attribute, value).await
    }

    /// Take ownership of the port; `force` takes it from another user.
    pub async fn reserve(&self, force: bool) -> AppResult<()> {
        let command = if force {
            format!("ixPortTakeOwnership {} force", self.uri())
        } else {
            format!("ixPortTakeOwnership {}", self.uri())
        };
        self.api().call_rc(&command).await
    }

    /// Give up ownership of the port.
    pub async fn release(&self) -> AppResult<()> {
        self.api()
            .call_rc(&format!("ixPortClearOwnership {}", self.uri()))
            .await
    }

    /// Reset the global port object to defaults and store it to this port.
    pub async fn set_default(&mut self) -> AppResult<()> {
        self.obj.set_default().await
    }

    /// Reset the port hardware.
    pub async fn reset(&self) -> AppResult<()> {
        self.obj.command("reset", &[]).await
    }

    /// Commit the port configuration to the hardware.
    pub async fn write(&self) -> AppResult<()> {
        self.obj.command("write", &[]).await
    }

    /// Restore the factory defaults of the port.
    pub async fn set_factory_defaults(&self) -> AppResult<()> {
        self.obj.command("setFactoryDefaults", &[]).await
    }

    /// Switch between copper and fiber PHY, e.g. `portPhyModeFiber`.
    pub async fn set_phy_mode(&self, mode: &str) -> AppResult<()> {
        self.api()
            .call_rc(&format!("port setPhyMode {} {}", mode, self.uri()))
            .await?;
        self.api().invalidate(PORT_KIND.keyword).await;
        Ok(())
    }

    /// Raw reply of `port getFeature` for `feature`.
    pub async fn get_feature(&self, feature: &str) -> AppResult<String> {
        self.obj.query("getFeature", &[feature]).await
    }

    /// Line rates (Mbps) the port supports.
    pub async fn supported_speeds(&self) -> AppResult<Vec<u64>> {
        let reply = self.get_feature("ethernetLineRate").await?;
        Ok(DIGITS
            .find_iter(&reply)
            .filter_map(|m| m.as_str().parse().ok())
            .collect())
    }

    /// Current link state, always read from the chassis.
    pub async fn link_state(&mut self) -> AppResult<LinkState> {
        let value = self.get_value("linkState", true).await?;
        value
            .as_int()
            .map(LinkState::from_code)
            .ok_or_else(|| IxeError::Protocol(format!("bad linkState '{}'", value)))
    }

    /// Number of streams currently defined on the chassis.
    pub async fn stream_count(&self) -> AppResult<u32> {
        let reply = self.obj.query("getStreamCount", &[]).await?;
        reply
            .trim()
            .parse()
            .map_err(|_| IxeError::Protocol(format!("bad stream count '{}'", reply)))
    }

    /// Import a `.prt` port profile or `.str` stream profile, write it and
    /// rediscover the streams.
    ///
    /// The suffix is checked before anything is sent.
    pub async fn load_config(&mut self, file: impl AsRef<Path>) -> AppResult<()> {
        let file = file.as_ref().to_string_lossy().replace('\\', "/");
        match config_kind(&file)? {
            ConfigKind::Port => {
                self.api()
                    .call_rc(&format!("port import {} {}", quote(&file), self.uri()))
                    .await?;
            }
            ConfigKind::Stream => {
                self.reset().await?;
                self.api()
                    .call_rc(&format!("stream import {} {}", quote(&file), self.uri()))
                    .await?;
                self.api().invalidate("stream").await;
            }
        }
        self.api().invalidate(PORT_KIND.keyword).await;
        self.write().await?;
        self.discover().await
    }

    /// Rebuild the stream map from the chassis stream count.
    ///
    /// Streams already known keep their objects.
    pub async fn discover(&mut self) -> AppResult<()> {
        info!("Discover port {}", self);
        let count = self.stream_count().await?;
        self.streams.retain(|id, _| *id <= count);
        for id in 1..=count {
            if !self.streams.contains_key(&id) {
                let stream = IxeStream::new(self.obj.uri(), id, self.api().clone());
                self.streams.insert(id, stream);
            }
        }
        debug!("Port {} has {} streams", self, count);
        Ok(())
    }

    /// Append a stream after the last one on the chassis, reset it to
    /// defaults and name it. Without `name`, the stream is named after its
    /// address (`c/ca/p/id`).
    pub async fn add_stream(&mut self, name: Option<&str>) -> AppResult<&mut IxeStream> {
        let id = self.stream_count().await? + 1;
        let mut stream = IxeStream::new(self.obj.uri(), id, self.api().clone());
        stream.set_default().await?;
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => stream.to_string(),
        };
        stream.set("name", name).await?;
        self.streams.remove(&id);
        Ok(self.streams.entry(id).or_insert(stream))
    }

    /// Streams keyed by id, starting at 1.
    pub fn streams(&self) -> &BTreeMap<u32, IxeStream> {
        &self.streams
    }

    /// Stream `id`, if discovered or added.
    pub fn stream_mut(&mut self, id: u32) -> Option<&mut IxeStream> {
        self.streams.get_mut(&id)
    }

    /// Clear port counters, packet groups and per-stream counters.
    pub async fn clear_stats(&self) -> AppResult<()> {
        traffic::clear_stats(self.api(), self.uri()).await
    }

    /// Start transmit on this port only.
    pub async fn start_transmit(&self, blocking: bool) -> AppResult<()> {
        traffic::start_transmit(self.api(), &[self.uri().to_string()], blocking).await
    }

    /// Stop transmit on this port only.
    pub async fn stop_transmit(&self) -> AppResult<()> {
        traffic::stop_transmit(self.api(), &[self.uri().to_string()]).await
    }

    /// Start capture on this port only.
    pub async fn start_capture(&self) -> AppResult<()> {
        traffic::start_capture(self.api(), &[self.uri().to_string()]).await
    }

    /// Stop capture and export it as `<prefix>-<c_ca_p>.<ext>`.
    ///
    /// Returns `None` when nothing was captured.
    pub async fn stop_capture(
        &self,
        prefix: &str,
        format: CapFileFormat,
    ) -> AppResult<Option<PathBuf>> {
        let uri = self.uri().to_string();
        let mut files =
            traffic::stop_capture(self.api(), std::slice::from_ref(&uri), prefix, format).await?;
        Ok(files.remove(&uri))
    }

    /// Data-integrity receive settings, created and defaulted on first use.
    pub async fn data_integrity(&mut self) -> AppResult<&mut PortSubObject> {
        if self.data_integrity.is_none() {
            let sub =
                PortSubObject::attach(&DATA_INTEGRITY_KIND, self.obj.uri(), self.api().clone())
                    .await?;
            self.data_integrity = Some(sub);
        }
        self.data_integrity
            .as_mut()
            .ok_or_else(|| IxeError::Protocol("data integrity not attached".to_string()))
    }

    /// Packet-group receive settings, created and defaulted on first use.
    pub async fn packet_group(&mut self) -> AppResult<&mut PortSubObject> {
        if self.packet_group.is_none() {
            let sub =
                PortSubObject::attach(&PACKET_GROUP_KIND, self.obj.uri(), self.api().clone())
                    .await?;
            self.packet_group = Some(sub);
        }
        self.packet_group
            .as_mut()
            .ok_or_else(|| IxeError::Protocol("packet group not attached".to_string()))
    }

    /// Refresh the data-integrity settings, port first.
    pub async fn refresh_data_integrity(
        &mut self,
        attribute: Option<&str>,
        force: bool,
    ) -> AppResult<&PortSubObject> {
        self.data_integrity().await?;
        let Some(sub) = self.data_integrity.as_mut() else {
            return Err(IxeError::Protocol("data integrity not attached".to_string()));
        };
        refresh_with_parent(&mut self.obj, &mut sub.obj, attribute, force).await?;
        Ok(sub)
    }

    /// Refresh the packet-group settings, port first.
    pub async fn refresh_packet_group(
        &mut self,
        attribute: Option<&str>,
        force: bool,
    ) -> AppResult<&PortSubObject> {
        self.packet_group().await?;
        let Some(sub) = self.packet_group.as_mut() else {
            return Err(IxeError::Protocol("packet group not attached".to_string()));
        };
        refresh_with_parent(&mut self.obj, &mut sub.obj, attribute, force).await?;
        Ok(sub)
    }
}

impl fmt::Display for IxePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.obj, f)
    }
}

impl fmt::Debug for IxePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IxePort")
            .field("uri", &self.obj.uri())
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .finish()
    }
}
