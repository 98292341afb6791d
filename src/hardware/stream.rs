//! Transmit stream of a port.

use std::fmt;

use crate::api::ApiHandle;
use crate::error::AppResult;
use crate::object::{IxeObject, ObjectKind};
use crate::parameter::{MemberType, MemberValue, TclMember};

static STREAM_MEMBERS: [TclMember; 26] = [
    TclMember::new("name"),
    TclMember::typed("enable", MemberType::Bool),
    TclMember::typed("numFrames", MemberType::Int),
    TclMember::typed("numBursts", MemberType::Int),
    TclMember::typed("framesize", MemberType::Int),
    TclMember::typed("frameSizeType", MemberType::Int),
    TclMember::typed("frameSizeMIN", MemberType::Int),
    TclMember::typed("frameSizeMAX", MemberType::Int),
    TclMember::typed("da", MemberType::MacStr),
    TclMember::typed("sa", MemberType::MacStr),
    TclMember::typed("daRepeatCounter", MemberType::Int),
    TclMember::typed("saRepeatCounter", MemberType::Int),
    TclMember::typed("dma", MemberType::Int),
    TclMember::typed("rateMode", MemberType::Int),
    TclMember::new("percentPacketRate"),
    TclMember::new("fpsRate"),
    TclMember::typed("gapUnit", MemberType::Int),
    TclMember::new("ifg"),
    TclMember::typed("loopCount", MemberType::Int),
    TclMember::typed("returnToId", MemberType::Int),
    TclMember::typed("enableTimestamp", MemberType::Bool),
    TclMember::typed("patternType", MemberType::Int),
    TclMember::typed("dataPattern", MemberType::Int),
    TclMember::typed("fcs", MemberType::Int),
    TclMember::typed("priorityGroup", MemberType::Int),
    TclMember::new("packetView").read_only(),
];

/// IxTclHal `stream` object.
pub static STREAM_KIND: ObjectKind = ObjectKind::new("stream", &STREAM_MEMBERS);

/// Stream `id` (1-based) of a port; addressed as `<port uri> <id>`.
pub struct IxeStream {
    obj: IxeObject,
    id: u32,
}

impl IxeStream {
    /// Stream `id` of the port at `port_uri`. Nothing is sent.
    pub fn new(port_uri: &str, id: u32, api: ApiHandle) -> Self {
        Self {
            obj: IxeObject::new(&STREAM_KIND, format!("{} {}", port_uri, id), api),
            id,
        }
    }

    /// Stream number on its port.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Underlying object with the cached attributes.
    pub fn object(&self) -> &IxeObject {
        &self.obj
    }

    /// Mutable access to the underlying object.
    pub fn object_mut(&mut self) -> &mut IxeObject {
        &mut self.obj
    }

    /// Read one attribute or all of them.
    pub async fn get(&mut self, attribute: Option<&str>, force: bool) -> AppResult<()> {
        self.obj.get(attribute, force).await
    }

    /// Read one attribute, loading the stream when needed.
    pub async fn get_value(&mut self, attribute: &str, force: bool) -> AppResult<MemberValue> {
        self.obj.get_value(attribute, force).await
    }

    /// Set one attribute and store the stream.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        self.obj.set(attribute, value).await
    }

    /// Reset the stream to defaults on the chassis.
    pub async fn set_default(&mut self) -> AppResult<()> {
        self.obj.set_default().await
    }

    /// Cached stream name, if read or written before.
    pub fn name(&self) -> Option<&str> {
        self.obj.cached("name").and_then(MemberValue::as_str)
    }
}

impl fmt::Display for IxeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.obj, f)
    }
}
