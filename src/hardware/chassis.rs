//! Chassis connection.

use tracing::info;

use crate::api::ApiHandle;
use crate::error::AppResult;
use crate::object::{IxeObject, ObjectKind};
use crate::parameter::{quote, MemberType, MemberValue, TclMember};

static CHASSIS_MEMBERS: [TclMember; 5] = [
    TclMember::typed("id", MemberType::Int).read_only(),
    TclMember::new("name"),
    TclMember::new("hostName").read_only(),
    TclMember::new("typeName").read_only(),
    TclMember::new("ixServerVersion").read_only(),
];

/// IxTclHal `chassis` object.
pub static CHASSIS_KIND: ObjectKind = ObjectKind::new("chassis", &CHASSIS_MEMBERS);

/// The chassis the Tcl server talks to, addressed by host name.
pub struct IxeChassis {
    obj: IxeObject,
    host: String,
}

impl IxeChassis {
    /// Chassis at `host`. Nothing is sent.
    pub fn new(host: impl Into<String>, api: ApiHandle) -> Self {
        let host = host.into();
        Self {
            obj: IxeObject::new(&CHASSIS_KIND, host.clone(), api),
            host,
        }
    }

    /// Chassis host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Connect the Tcl server to the chassis and read its identity.
    pub async fn connect(&mut self) -> AppResult<()> {
        self.obj
            .api()
            .call_rc(&format!("ixConnectToChassis {}", quote(&self.host)))
            .await?;
        self.obj.get(None, true).await?;
        info!(
            "Connected to chassis {} (id {})",
            self.host,
            self.obj
                .cached("id")
                .map(ToString::to_string)
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Disconnect the Tcl server from the chassis.
    pub async fn disconnect(&mut self) -> AppResult<()> {
        self.obj
            .api()
            .call_rc(&format!("ixDisconnectFromChassis {}", quote(&self.host)))
            .await
    }

    /// Chassis id as read on connect.
    pub fn id(&self) -> Option<i64> {
        self.obj.cached("id").and_then(MemberValue::as_int)
    }

    /// Read one attribute or all of them.
    pub async fn get(&mut self, attribute: Option<&str>, force: bool) -> AppResult<()> {
        self.obj.get(attribute, force).await
    }

    /// Read one attribute, loading the chassis object when needed.
    pub async fn get_value(&mut self, attribute: &str, force: bool) -> AppResult<MemberValue> {
        self.obj.get_value(attribute, force).await
    }

    /// Set one attribute and store the chassis object.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        self.obj.set(attribute, value).await
    }
}
