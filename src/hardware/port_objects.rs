//! Receive-side port sub-objects: data integrity and packet groups.
//!
//! Both share their port's address and are loaded/stored with
//! `getRx`/`setRx`. The chassis keeps part of their state on the port itself,
//! so they are always refreshed through [`IxePort`](super::IxePort), which
//! refreshes the port first.

use crate::api::ApiHandle;
use crate::error::AppResult;
use crate::object::{IxeObject, ObjectKind};
use crate::parameter::{MemberType, MemberValue, TclMember};

static DATA_INTEGRITY_MEMBERS: [TclMember; 4] = [
    TclMember::typed("signatureOffset", MemberType::Int),
    TclMember::new("signature"),
    TclMember::typed("enableTimeStamp", MemberType::Bool),
    TclMember::typed("insertSignature", MemberType::Bool),
];

static PACKET_GROUP_MEMBERS: [TclMember; 6] = [
    TclMember::new("signature"),
    TclMember::typed("signatureOffset", MemberType::Int),
    TclMember::typed("groupId", MemberType::Int),
    TclMember::typed("groupIdOffset", MemberType::Int),
    TclMember::typed("insertSignature", MemberType::Bool),
    TclMember::typed("latencyControl", MemberType::Int),
];

/// IxTclHal `dataIntegrity` receive object.
pub static DATA_INTEGRITY_KIND: ObjectKind =
    ObjectKind::new("dataIntegrity", &DATA_INTEGRITY_MEMBERS).with_verbs("getRx", "setRx");

/// IxTclHal `packetGroup` receive object.
pub static PACKET_GROUP_KIND: ObjectKind =
    ObjectKind::new("packetGroup", &PACKET_GROUP_MEMBERS).with_verbs("getRx", "setRx");

/// Singleton sub-object of a port.
pub struct PortSubObject {
    pub(crate) obj: IxeObject,
}

impl PortSubObject {
    /// Create the sub-object and reset it to defaults on the chassis.
    pub(crate) async fn attach(
        kind: &'static ObjectKind,
        port_uri: &str,
        api: ApiHandle,
    ) -> AppResult<Self> {
        let mut obj = IxeObject::new(kind, port_uri, api);
        obj.set_default().await?;
        Ok(Self { obj })
    }

    /// Underlying object with the cached attributes.
    pub fn object(&self) -> &IxeObject {
        &self.obj
    }

    /// Cached value of `attribute`, if read or written before.
    pub fn cached(&self, attribute: &str) -> Option<&MemberValue> {
        self.obj.cached(attribute)
    }

    /// Set one attribute and store the sub-object.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        self.obj.set(attribute, value).await
    }
}
