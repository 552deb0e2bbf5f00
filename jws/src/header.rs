//! The JOSE header: registered members with checked types, and everything else
//! as an open extension map

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A header object as it appears in JSON
pub type HeaderMap = Map<String, Value>;

/// Header members that are not registered by RFC 7515
pub type ExtensionMap = Map<String, Value>;

/// The shape of a JSON value, as far as header validation cares
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// A JSON string
    String,
    /// A JSON array whose elements are all strings
    StringList,
    /// A JSON object
    Object,
    /// Anything else
    Other,
}

impl ValueKind {
    /// Classify a JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Array(items) if items.iter().all(Value::is_string) => ValueKind::StringList,
            Value::Object(_) => ValueKind::Object,
            _ => ValueKind::Other,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::String => "string",
            ValueKind::StringList => "list of strings",
            ValueKind::Object => "object",
            ValueKind::Other => "other value",
        })
    }
}

/// The registered header names this crate understands, with their types
pub const REGISTERED_HEADERS: &[(&str, ValueKind)] = &[
    ("alg", ValueKind::String),
    ("crit", ValueKind::StringList),
    ("typ", ValueKind::String),
    ("cty", ValueKind::String),
    ("jku", ValueKind::String),
    ("jwk", ValueKind::Object),
    ("kid", ValueKind::String),
];

/// Returns true if `name` is one of the [`REGISTERED_HEADERS`]
pub fn is_registered(name: &str) -> bool {
    REGISTERED_HEADERS.iter().any(|(registered, _)| *registered == name)
}

/// A registered header member was present with the wrong JSON type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("header member {name} should be a {expected}, was {found}")]
pub struct HeaderTypeError {
    /// The registered member name
    pub name: &'static str,
    /// The type RFC 7515 requires
    pub expected: ValueKind,
    /// The type that was present
    pub found: ValueKind,
}

/// Typed view of the registered members of one header object
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegisteredHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<HeaderMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl RegisteredHeader {
    /// Split a raw header object into its registered members and extensions,
    /// failing on the first registered member with the wrong type.
    pub fn decode(raw: &HeaderMap) -> Result<(RegisteredHeader, ExtensionMap), HeaderTypeError> {
        for (name, expected) in REGISTERED_HEADERS {
            if let Some(value) = raw.get(*name) {
                let found = ValueKind::of(value);
                if found != *expected {
                    return Err(HeaderTypeError {
                        name: *name,
                        expected: *expected,
                        found,
                    });
                }
            }
        }

        let string = |name: &str| raw.get(name).and_then(Value::as_str).map(String::from);

        let registered = RegisteredHeader {
            alg: string("alg"),
            crit: raw.get("crit").and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            }),
            typ: string("typ"),
            cty: string("cty"),
            jku: string("jku"),
            jwk: raw.get("jwk").and_then(Value::as_object).cloned(),
            kid: string("kid"),
        };

        let extensions = raw
            .iter()
            .filter(|(name, _)| !is_registered(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok((registered, extensions))
    }
}

/// One decoded header object, either the protected or the unprotected half of
/// a JOSE header. An absent header is an empty one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    raw: HeaderMap,
    registered: RegisteredHeader,
}

impl Header {
    /// Validate the registered members of `raw` and wrap it
    pub fn decode(raw: HeaderMap) -> Result<Self, HeaderTypeError> {
        let (registered, _) = RegisteredHeader::decode(&raw)?;
        Ok(Header { raw, registered })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn registered(&self) -> &RegisteredHeader {
        &self.registered
    }

    /// The members that are not registered header names
    pub fn extensions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.raw.iter().filter(|(name, _)| !is_registered(name))
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        match is_registered(name) {
            true => None,
            false => self.raw.get(name),
        }
    }

    pub fn as_map(&self) -> &HeaderMap {
        &self.raw
    }
}

/// The protected and unprotected headers of one signature entry.
///
/// Reads prefer the protected value. Decoding guarantees the two halves never
/// share a member name, so the preference only matters for headers assembled
/// by hand.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoseHeader {
    protected: Header,
    unprotected: Header,
}

impl JoseHeader {
    pub fn new(protected: Header, unprotected: Header) -> Self {
        JoseHeader {
            protected,
            unprotected,
        }
    }

    pub fn protected(&self) -> &Header {
        &self.protected
    }

    pub fn unprotected(&self) -> &Header {
        &self.unprotected
    }

    /// Look up any member, protected first
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.protected
            .get(name)
            .or_else(|| self.unprotected.get(name))
    }

    fn registered<'a, T: ?Sized>(
        &'a self,
        field: impl Fn(&'a RegisteredHeader) -> Option<&'a T>,
    ) -> Option<&'a T> {
        field(&self.protected.registered).or_else(|| field(&self.unprotected.registered))
    }

    /// The registered "alg" header
    pub fn algorithm(&self) -> Option<&str> {
        self.registered(|header| header.alg.as_deref())
    }

    /// The registered "crit" header
    pub fn critical(&self) -> Option<&[String]> {
        self.registered(|header| header.crit.as_deref())
    }

    /// The registered "typ" header
    pub fn typ(&self) -> Option<&str> {
        self.registered(|header| header.typ.as_deref())
    }

    /// The registered "cty" header
    pub fn content_type(&self) -> Option<&str> {
        self.registered(|header| header.cty.as_deref())
    }

    /// The registered "jku" header, unparsed
    pub fn jwk_set_url(&self) -> Option<&str> {
        self.registered(|header| header.jku.as_deref())
    }

    /// The registered "jwk" header as a raw JSON object
    pub fn jwk(&self) -> Option<&HeaderMap> {
        self.registered(|header| header.jwk.as_ref())
    }

    /// The registered "kid" header
    pub fn key_id(&self) -> Option<&str> {
        self.registered(|header| header.kid.as_deref())
    }
}
