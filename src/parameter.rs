//! Declarative attribute descriptors for IxTclHal objects.
//!
//! Every object kind declares a static table of [`TclMember`]s (name, type,
//! read-only flag). The generic get/set routine in [`crate::object`] consults
//! this table to decide how a value is serialized into a `config` command and
//! how a `cget` reply is parsed back.
//!
//! # Wire formats
//!
//! | Type | Client value | Written as | Read from |
//! |------|--------------|------------|-----------|
//! | `Bool` | `true` | `true` | `1`, `0`, `true`, `false` |
//! | `Int` | `1000` | `1000` | `1000` |
//! | `Str` | `abc def` | `{abc def}` | `abc def` |
//! | `MacStr` | `00:de:bb:00:00:01` | `{00 de bb 00 00 01}` | `00 DE BB 00 00 01` |

use std::fmt;

use crate::error::{AppResult, IxeError};

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    /// `true`/`false`, also read back as `1`/`0`.
    Bool,
    /// Signed integer.
    Int,
    /// Free text, sent as one Tcl word.
    Str,
    /// MAC address as six hex bytes separated by spaces.
    MacStr,
}

/// Static description of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TclMember {
    /// Attribute name without the leading `-`.
    pub name: &'static str,
    /// Value type on the wire.
    pub kind: MemberType,
    /// Rejected by `set` when true.
    pub read_only: bool,
}

impl TclMember {
    /// Read-write string attribute.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: MemberType::Str,
            read_only: false,
        }
    }

    /// Writable attribute of type `kind`.
    pub const fn typed(name: &'static str, kind: MemberType) -> Self {
        Self {
            name,
            kind,
            read_only: false,
        }
    }

    /// Mark the attribute read-only.
    pub const fn read_only(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }

    /// Check `value` against the declared type, converting textual MAC
    /// addresses into [`MacAddress`].
    pub fn coerce(&self, value: MemberValue) -> AppResult<MemberValue> {
        match (self.kind, value) {
            (MemberType::Bool, v @ MemberValue::Bool(_))
            | (MemberType::Int, v @ MemberValue::Int(_))
            | (MemberType::Str, v @ MemberValue::Str(_))
            | (MemberType::MacStr, v @ MemberValue::Mac(_)) => Ok(v),
            (MemberType::MacStr, MemberValue::Str(s)) => s
                .parse()
                .map(MemberValue::Mac)
                .map_err(|reason| IxeError::InvalidValue {
                    attribute: self.name.to_string(),
                    reason,
                }),
            (kind, value) => Err(IxeError::InvalidValue {
                attribute: self.name.to_string(),
                reason: format!("expected {:?}, got {:?}", kind, value),
            }),
        }
    }

    /// Serialize `value` into the form accepted by `<kw> config -<name>`.
    pub fn serialize(&self, value: &MemberValue) -> AppResult<String> {
        match self.coerce(value.clone())? {
            MemberValue::Bool(b) => Ok(b.to_string()),
            MemberValue::Int(i) => Ok(i.to_string()),
            MemberValue::Str(s) => Ok(quote(&s)),
            MemberValue::Mac(mac) => Ok(format!("{{{}}}", mac.to_tcl())),
        }
    }

    /// Parse a `cget` reply into a typed value.
    ///
    /// String results are taken verbatim.
    pub fn parse(&self, raw: &str) -> AppResult<MemberValue> {
        if self.kind == MemberType::Str {
            return Ok(MemberValue::Str(raw.to_string()));
        }
        let raw = raw.trim();
        let invalid = |reason: String| IxeError::InvalidValue {
            attribute: self.name.to_string(),
            reason,
        };
        match self.kind {
            MemberType::Bool => match raw {
                "1" | "true" => Ok(MemberValue::Bool(true)),
                "0" | "false" => Ok(MemberValue::Bool(false)),
                other => Err(invalid(format!("'{}' is not a boolean", other))),
            },
            MemberType::Int => raw
                .parse::<i64>()
                .map(MemberValue::Int)
                .map_err(|e| invalid(format!("'{}': {}", raw, e))),
            MemberType::Str => Ok(MemberValue::Str(raw.to_string())),
            MemberType::MacStr => strip_braces(raw)
                .parse::<MacAddress>()
                .map(MemberValue::Mac)
                .map_err(invalid),
        }
    }
}

/// Quote `value` as a single Tcl word.
///
/// Values with balanced braces and no backslashes or line breaks are
/// brace-quoted; anything else is backslash-escaped so it cannot end the
/// word or the command.
pub fn quote(value: &str) -> String {
    if braces_balanced(value) && !value.contains(['\\', '\r', '\n']) {
        return format!("{{{}}}", value);
    }
    let mut quoted = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\\' | '{' | '}' | '[' | ']' | '$' | '"' | ';' | ' ' => {
                quoted.push('\\');
                quoted.push(c);
            }
            _ => quoted.push(c),
        }
    }
    quoted
}

fn braces_balanced(value: &str) -> bool {
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

fn strip_braces(raw: &str) -> &str {
    raw.strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(raw)
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValue {
    /// Value of a [`MemberType::Bool`] attribute.
    Bool(bool),
    /// Value of a [`MemberType::Int`] attribute.
    Int(i64),
    /// Value of a [`MemberType::MacStr`] attribute.
    Mac(MacAddress),
    /// Value of a [`MemberType::Str`] attribute.
    Str(String),
}

impl MemberValue {
    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MemberValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MemberValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The text, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MemberValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Parse free text (e.g. from the command line) according to `kind`.
    pub fn from_text(kind: MemberType, text: &str) -> Result<Self, String> {
        match kind {
            MemberType::Bool => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(MemberValue::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(MemberValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", text)),
            },
            MemberType::Int => text
                .parse()
                .map(MemberValue::Int)
                .map_err(|e| format!("'{}': {}", text, e)),
            MemberType::Str => Ok(MemberValue::Str(text.to_string())),
            MemberType::MacStr => text.parse().map(MemberValue::Mac),
        }
    }
}

impl fmt::Display for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberValue::Bool(b) => write!(f, "{}", b),
            MemberValue::Int(i) => write!(f, "{}", i),
            MemberValue::Mac(mac) => write!(f, "{}", mac),
            MemberValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for MemberValue {
    fn from(value: bool) -> Self {
        MemberValue::Bool(value)
    }
}

impl From<i64> for MemberValue {
    fn from(value: i64) -> Self {
        MemberValue::Int(value)
    }
}

impl From<&str> for MemberValue {
    fn from(value: &str) -> Self {
        MemberValue::Str(value.to_string())
    }
}

impl From<String> for MemberValue {
    fn from(value: String) -> Self {
        MemberValue::Str(value)
    }
}

impl From<MacAddress> for MemberValue {
    fn from(value: MacAddress) -> Self {
        MemberValue::Mac(value)
    }
}

/// Six-octet MAC address.
///
/// Accepts `:`, `-`, `.` or whitespace between octets; displays as
/// lower-case colon-separated hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Space-separated form used by IxTclHal.
    pub fn to_tcl(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::str::FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s
            .split(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if octets.len() != 6 {
            return Err(format!("'{}' is not a MAC address", s));
        }
        let mut bytes = [0u8; 6];
        for (byte, octet) in bytes.iter_mut().zip(octets) {
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| format!("'{}' is not a MAC address", s))?;
        }
        Ok(MacAddress(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// Look up `name` in a descriptor table.
pub fn find_member(members: &'static [TclMember], name: &str) -> Option<&'static TclMember> {
    members.iter().find(|m| m.name == name)
}
