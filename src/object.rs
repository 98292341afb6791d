//! Object model base: addressable IxTclHal objects.
//!
//! An [`IxeObject`] pairs a remote address (`uri`, the space-separated Tcl
//! address such as `"1 1 1"`) with a static [`ObjectKind`] describing its
//! command keyword, attribute table and load/store verbs. Every attribute
//! access maps 1:1 onto remote commands:
//!
//! ```text
//! get  speed        ->  port get 1 1 1          (unless already loaded)
//!                       port cget -speed
//! set  speed 1000   ->  port get 1 1 1          (unless already loaded)
//!                       port config -speed 1000
//!                       port set 1 1 1
//! ```
//!
//! The values kept in the object are a mirror of the last round trip; the
//! instrument is always authoritative.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::api::ApiHandle;
use crate::error::{AppResult, IxeError};
use crate::parameter::{find_member, MemberValue, TclMember};

/// Static description of one object type.
#[derive(Debug)]
pub struct ObjectKind {
    /// IxTclHal command keyword (`port`, `stream`, ...).
    pub keyword: &'static str,
    /// Attribute table.
    pub members: &'static [TclMember],
    /// Verb loading the remote object into the global one.
    pub get_verb: &'static str,
    /// Verb storing the global object back to the remote one.
    pub set_verb: &'static str,
}

impl ObjectKind {
    /// Kind using the plain `get` and `set` verbs.
    pub const fn new(keyword: &'static str, members: &'static [TclMember]) -> Self {
        Self {
            keyword,
            members,
            get_verb: "get",
            set_verb: "set",
        }
    }

    /// Same kind with other load and store verbs.
    pub const fn with_verbs(self, get_verb: &'static str, set_verb: &'static str) -> Self {
        Self {
            get_verb,
            set_verb,
            ..self
        }
    }
}

/// Addressable remote object with a mirrored attribute cache.
pub struct IxeObject {
    kind: &'static ObjectKind,
    uri: String,
    api: ApiHandle,
    values: HashMap<&'static str, MemberValue>,
}

impl IxeObject {
    /// Object of `kind` at `uri`. Nothing is sent.
    pub fn new(kind: &'static ObjectKind, uri: impl Into<String>, api: ApiHandle) -> Self {
        Self {
            kind,
            uri: uri.into(),
            api,
            values: HashMap::new(),
        }
    }

    /// Tcl address of the object.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// IxTclHal command keyword.
    pub fn keyword(&self) -> &'static str {
        self.kind.keyword
    }

    /// Static description of the object type.
    pub fn kind(&self) -> &'static ObjectKind {
        self.kind
    }

    /// API handle the object talks through.
    pub fn api(&self) -> &ApiHandle {
        &self.api
    }

    /// Last value read or written for `attribute`.
    pub fn cached(&self, attribute: &str) -> Option<&MemberValue> {
        self.values.get(attribute)
    }

    /// Descriptor of `attribute`, or `UnknownAttribute`.
    pub fn member(&self, attribute: &str) -> AppResult<&'static TclMember> {
        find_member(self.kind.members, attribute).ok_or_else(|| IxeError::UnknownAttribute {
            object: format!("{} {}", self.kind.keyword, self.uri),
            attribute: attribute.to_string(),
        })
    }

    /// Load the remote object into the keyword's global object.
    ///
    /// Skipped when this object is already the loaded one, unless `force`.
    pub async fn load(&self, force: bool) -> AppResult<()> {
        if !force && self.api.is_loaded(self.kind.keyword, &self.uri).await {
            return Ok(());
        }
        self.api
            .call_rc(&self.command_line(self.kind.get_verb, &[]))
            .await?;
        self.api.mark_loaded(self.kind.keyword, &self.uri).await;
        Ok(())
    }

    /// Refresh one attribute, or all declared attributes when `None`.
    pub async fn get(&mut self, attribute: Option<&str>, force: bool) -> AppResult<()> {
        let members: Vec<&'static TclMember> = match attribute {
            Some(name) => vec![self.member(name)?],
            None => self.kind.members.iter().collect(),
        };
        self.load(force).await?;
        for member in members {
            let raw = self
                .api
                .call(&format!("{} cget -{}", self.kind.keyword, member.name))
                .await?;
            let value = member.parse(&raw)?;
            self.values.insert(member.name, value);
        }
        Ok(())
    }

    /// Read one attribute from the instrument.
    pub async fn get_value(&mut self, attribute: &str, force: bool) -> AppResult<MemberValue> {
        self.get(Some(attribute), force).await?;
        self.values
            .get(attribute)
            .cloned()
            .ok_or_else(|| IxeError::Protocol(format!("no value read for '{}'", attribute)))
    }

    /// Write one attribute.
    ///
    /// Read-only, unknown and mistyped attributes are rejected before any
    /// command is sent. The cache is updated only after the store succeeds.
    pub async fn set(&mut self, attribute: &str, value: impl Into<MemberValue>) -> AppResult<()> {
        let member = self.member(attribute)?;
        if member.read_only {
            return Err(IxeError::ReadOnlyAttribute(attribute.to_string()));
        }
        let value = member.coerce(value.into())?;
        let serialized = member.serialize(&value)?;

        self.load(false).await?;
        let config = format!("{} config -{} {}", self.kind.keyword, member.name, serialized);
        let written = match self.api.call(&config).await {
            Ok(_) => self.store().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            // The global object may still hold the rejected value.
            self.api.invalidate(self.kind.keyword).await;
            return Err(err);
        }
        debug!("{} {}: {} = {}", self.kind.keyword, self.uri, member.name, value);
        self.values.insert(member.name, value);
        Ok(())
    }

    /// Store the global object to this remote object.
    pub async fn store(&self) -> AppResult<()> {
        self.api
            .call_rc(&self.command_line(self.kind.set_verb, &[]))
            .await?;
        self.api.mark_loaded(self.kind.keyword, &self.uri).await;
        Ok(())
    }

    /// Reset the global object to defaults and store it to this object.
    pub async fn set_default(&mut self) -> AppResult<()> {
        self.api
            .call(&format!("{} setDefault", self.kind.keyword))
            .await?;
        self.api.invalidate(self.kind.keyword).await;
        self.store().await?;
        self.values.clear();
        Ok(())
    }

    /// Run `<keyword> <verb> <uri> [args]` and require return code 0.
    pub async fn command(&self, verb: &str, args: &[&str]) -> AppResult<()> {
        let command = self.command_line(verb, args);
        self.api.call_rc(&command).await?;
        self.api.invalidate(self.kind.keyword).await;
        Ok(())
    }

    /// Run `<keyword> <verb> <uri> [args]` and return its result.
    pub async fn query(&self, verb: &str, args: &[&str]) -> AppResult<String> {
        self.api.call(&self.command_line(verb, args)).await
    }

    fn command_line(&self, verb: &str, args: &[&str]) -> String {
        let mut line = format!("{} {}", self.kind.keyword, verb);
        if !self.uri.is_empty() {
            line.push(' ');
            line.push_str(&self.uri);
        }
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for IxeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri.replace(' ', "/"))
    }
}

impl fmt::Debug for IxeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IxeObject")
            .field("keyword", &self.kind.keyword)
            .field("uri", &self.uri)
            .field("values", &self.values)
            .finish()
    }
}

/// Refresh a sub-object that shares state with its parent.
///
/// The parent is fully refreshed first, then the child.
pub async fn refresh_with_parent(
    parent: &mut IxeObject,
    child: &mut IxeObject,
    attribute: Option<&str>,
    force: bool,
) -> AppResult<()> {
    parent.get(None, force).await?;
    child.get(attribute, force).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTclAdapter;
    use crate::parameter::{MacAddress, MemberType};

    static TEST_MEMBERS: [TclMember; 5] = [
        TclMember::typed("enable", MemberType::Bool),
        TclMember::typed("numFrames", MemberType::Int),
        TclMember::new("name"),
        TclMember::typed("da", MemberType::MacStr),
        TclMember::typed("state", MemberType::Int).read_only(),
    ];
    static TEST_KIND: ObjectKind = ObjectKind::new("stream", &TEST_MEMBERS);

    async fn object() -> (IxeObject, MockTclAdapter) {
        let mock = MockTclAdapter::new();
        let api = ApiHandle::new(Box::new(mock.clone()));
        api.connect().await.unwrap();
        (IxeObject::new(&TEST_KIND, "1 1 1 1", api), mock)
    }

    #[tokio::test]
    async fn test_read_only_rejected_without_remote_call() {
        let (mut obj, mock) = object().await;
        let err = obj.set("state", 3i64).await.unwrap_err();
        assert!(matches!(err, IxeError::ReadOnlyAttribute(_)));
        assert!(mock.call_log().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_attribute_rejected_without_remote_call() {
        let (mut obj, mock) = object().await;
        assert!(obj.get(Some("bogus"), false).await.is_err());
        assert!(obj.set("bogus", true).await.is_err());
        assert!(obj.set("numFrames", "many").await.is_err());
        assert!(mock.call_log().is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip_all_types() {
        let (mut obj, _mock) = object().await;
        let mac: MacAddress = "00:de:bb:00:00:01".parse().unwrap();
        let upper: MacAddress = "00:DE:BB:00:00:0A".parse().unwrap();
        let cases: Vec<(&str, MemberValue)> = vec![
            ("enable", MemberValue::Bool(true)),
            ("enable", MemberValue::Bool(false)),
            ("numFrames", MemberValue::Int(12345)),
            ("numFrames", MemberValue::Int(-1)),
            ("numFrames", MemberValue::Int(i64::MIN)),
            ("name", MemberValue::from("first stream")),
            ("name", MemberValue::from("")),
            ("name", MemberValue::from("{abc}")),
            ("name", MemberValue::from(" padded  twice ")),
            ("name", MemberValue::from("unbalanced {")),
            ("name", MemberValue::from("a} ; ixLogout {")),
            ("name", MemberValue::from("back\\slash $x [cmd]")),
            ("da", MemberValue::Mac(mac)),
            ("da", MemberValue::Mac(upper)),
        ];
        for (attribute, value) in cases {
            obj.set(attribute, value.clone()).await.unwrap();
            let read = obj.get_value(attribute, true).await.unwrap();
            assert_eq!(read, value, "round trip of {}", attribute);
        }
    }

    #[tokio::test]
    async fn test_set_command_sequence() {
        let (mut obj, mock) = object().await;
        obj.set("numFrames", 10i64).await.unwrap();
        assert_eq!(
            mock.call_log(),
            vec![
                "stream get 1 1 1 1",
                "stream config -numFrames 10",
                "stream set 1 1 1 1",
            ]
        );
        assert_eq!(obj.cached("numFrames"), Some(&MemberValue::Int(10)));
    }

    #[tokio::test]
    async fn test_get_skips_load_unless_forced() {
        let (mut obj, mock) = object().await;
        obj.get(Some("name"), false).await.unwrap();
        obj.get(Some("name"), false).await.unwrap();
        assert_eq!(mock.count_calls("stream get"), 1);
        obj.get(Some("name"), true).await.unwrap();
        assert_eq!(mock.count_calls("stream get"), 2);
    }

    #[tokio::test]
    async fn test_get_all_reads_every_member_in_order() {
        let (mut obj, mock) = object().await;
        obj.get(None, true).await.unwrap();
        let cgets: Vec<String> = mock
            .call_log()
            .into_iter()
            .filter(|c| c.contains("cget"))
            .collect();
        assert_eq!(
            cgets,
            vec![
                "stream cget -enable",
                "stream cget -numFrames",
                "stream cget -name",
                "stream cget -da",
                "stream cget -state",
            ]
        );
        assert_eq!(obj.cached("enable"), Some(&MemberValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_failed_store_keeps_cache() {
        let (mut obj, mock) = object().await;
        mock.fail_on("stream set", "stream 1 is not configured");
        let err = obj.set("numFrames", 7i64).await.unwrap_err();
        assert!(matches!(err, IxeError::Remote { .. }));
        assert!(obj.cached("numFrames").is_none());
    }

    #[tokio::test]
    async fn test_failed_store_reloads_on_next_get() {
        let mock = MockTclAdapter::new().with_value("stream", "1 1 1 1", "numFrames", "100");
        let api = ApiHandle::new(Box::new(mock.clone()));
        api.connect().await.unwrap();
        let mut obj = IxeObject::new(&TEST_KIND, "1 1 1 1", api);
        mock.fail_on("stream set", "stream 1 is not configured");

        assert!(obj.set("numFrames", 1000i64).await.is_err());
        let value = obj.get_value("numFrames", false).await.unwrap();
        assert_eq!(value, MemberValue::Int(100));
        assert_eq!(mock.count_calls("stream get 1 1 1 1"), 2);
        assert_eq!(
            mock.stored_value("stream", "1 1 1 1", "numFrames").as_deref(),
            Some("100")
        );
    }

    #[test]
    fn test_display_uses_slashes() {
        let api = ApiHandle::new(Box::new(MockTclAdapter::new()));
        let obj = IxeObject::new(&TEST_KIND, "1 2 3 4", api);
        assert_eq!(obj.to_string(), "1/2/3/4");
    }
}
