use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, DecodeError, Engine};
use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use serde_json::{Map, Value};

/// Encode bytes with the unpadded, URL-safe base64 alphabet used by every
/// JWS segment
pub fn base64url_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an unpadded, URL-safe base64 segment. Padding, whitespace, the
/// standard alphabet and non-canonical trailing bits are all rejected.
pub fn base64url_decode<T: AsRef<[u8]>>(segment: T) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(segment)
}

/// Helper trait to encode any serde-implementing value as base64url JSON, the
/// form a protected header takes on the wire
pub trait Base64Encode: Serialize {
    fn jws_base64_encode(&self) -> Result<String, serde_json::Error> {
        Ok(base64url_encode(serde_json::to_vec(self)?))
    }
}

impl<T> Base64Encode for T where T: Serialize + ?Sized {}

/// A JSON object that refuses duplicate member names.
///
/// `serde_json` keeps the last occurrence of a repeated member, which would let
/// two parties read different values out of the same header.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct StrictObject(pub(crate) Map<String, Value>);

impl<'de> Deserialize<'de> for StrictObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrictObjectVisitor;

        impl<'de> Visitor<'de> for StrictObjectVisitor {
            type Value = StrictObject;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a JSON object with unique member names")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut members = Map::new();

                while let Some(name) = access.next_key::<String>()? {
                    if members.contains_key(&name) {
                        return Err(de::Error::custom(format!("duplicate member `{name}`")));
                    }
                    let value: Value = access.next_value()?;
                    members.insert(name, value);
                }

                Ok(StrictObject(members))
            }
        }

        deserializer.deserialize_map(StrictObjectVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_padded_and_standard_alphabet_segments() {
        assert!(base64url_decode("e30=").is_err());
        assert!(base64url_decode("a+b/").is_err());
        assert!(base64url_decode("e30 ").is_err());
        assert_eq!(base64url_decode("e30").unwrap(), b"{}");
    }

    #[test]
    fn it_refuses_duplicate_members() {
        let error = serde_json::from_str::<StrictObject>(r#"{"alg":"none","alg":"HS256"}"#)
            .unwrap_err();
        assert!(error.to_string().contains("duplicate member `alg`"));

        let object = serde_json::from_str::<StrictObject>(r#"{"alg":"none"}"#).unwrap();
        assert_eq!(object.0.get("alg"), Some(&Value::from("none")));
    }

    #[test]
    fn it_refuses_non_objects() {
        assert!(serde_json::from_str::<StrictObject>(r#"["alg"]"#).is_err());
        assert!(serde_json::from_str::<StrictObject>(r#""alg":"foo""#).is_err());
    }
}
