//! Boolean-coercion wrapper for schema fields that are declared as strings
//! but carry a boolification tag: on serialization, values matching
//! `"true"`/`"false"` (case-insensitively) are emitted as real YAML/JSON
//! booleans; every other string passes through verbatim.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoolifyStr(pub String);

impl BoolifyStr {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` if the value isn't a recognized boolean literal.
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

impl From<bool> for BoolifyStr {
    fn from(b: bool) -> Self {
        Self(if b { "true".to_string() } else { "false".to_string() })
    }
}

impl fmt::Display for BoolifyStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BoolifyStr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_bool() {
            Some(b) => serializer.serialize_bool(b),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for BoolifyStr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BoolifyVisitor;

        impl<'de> Visitor<'de> for BoolifyVisitor {
            type Value = BoolifyStr;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or a string")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(BoolifyStr::from(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(BoolifyStr::new(v))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(BoolifyStr::new(v))
            }
        }

        deserializer.deserialize_any(BoolifyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_false_round_trip_as_bool() {
        let a = BoolifyStr::new("true");
        let b = BoolifyStr::new("TRUE");
        assert_eq!(serde_yaml::to_string(&a).unwrap().trim(), "true");
        assert_eq!(serde_yaml::to_string(&b).unwrap().trim(), "true");
    }

    #[test]
    fn other_strings_pass_through() {
        let maybe = BoolifyStr::new("maybe");
        assert_eq!(serde_yaml::to_string(&maybe).unwrap().trim(), "maybe");
    }

    #[test]
    fn deserializes_from_native_bool_or_string() {
        let from_bool: BoolifyStr = serde_yaml::from_str("true").unwrap();
        assert_eq!(from_bool.as_bool(), Some(true));
        let from_str: BoolifyStr = serde_yaml::from_str("\"true\"").unwrap();
        assert_eq!(from_str.as_bool(), Some(true));
        let other: BoolifyStr = serde_yaml::from_str("maybe").unwrap();
        assert_eq!(other.as_str(), "maybe");
    }
}
