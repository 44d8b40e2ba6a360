//! Property metadata for registered host classes.
//!
//! Registered classes publish a property list to the engine so editors
//! and serializers can see host-side state. Defaults are served on
//! demand through the registration callbacks; this module holds the
//! host-side description of them.

use serde::{Deserialize, Serialize};

use rift_sys::codes::VariantTag;

use crate::error::{Error, Result};
use crate::variant::Variant;

/// A property default that can cross the variant boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view; floats coerce by truncation.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Float view; integers coerce losslessly enough for editor use.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// The variant tag this value marshals as.
    pub fn tag(&self) -> VariantTag {
        match self {
            PropertyValue::Nil => VariantTag::Nil,
            PropertyValue::Bool(_) => VariantTag::Bool,
            PropertyValue::Int(_) => VariantTag::Int,
            PropertyValue::Float(_) => VariantTag::Float,
            PropertyValue::String(_) => VariantTag::String,
        }
    }

    /// Boxes the value for the engine.
    pub fn to_variant(&self) -> Result<Variant> {
        match self {
            PropertyValue::Nil => Variant::nil(),
            PropertyValue::Bool(v) => Variant::from_bool(*v),
            PropertyValue::Int(v) => Variant::from_i64(*v),
            PropertyValue::Float(v) => Variant::from_f64(*v),
            PropertyValue::String(v) => Variant::from_str(v),
        }
    }

    /// Reads a value back out of an engine box.
    pub fn from_variant(variant: &Variant) -> Result<Self> {
        match variant.tag()? {
            VariantTag::Nil => Ok(PropertyValue::Nil),
            VariantTag::Bool => Ok(PropertyValue::Bool(variant.try_to_bool()?)),
            VariantTag::Int => Ok(PropertyValue::Int(variant.try_to_i64()?)),
            VariantTag::Float => Ok(PropertyValue::Float(variant.try_to_f64()?)),
            VariantTag::String | VariantTag::StringName => {
                Ok(PropertyValue::String(variant.try_to_string()?))
            }
            found => Err(Error::VariantType {
                expected: VariantTag::Nil,
                found,
            }),
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Nil
    }
}

/// Declared type of a property, as published to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
    Object,
}

impl PropertyKind {
    pub fn variant_tag(self) -> VariantTag {
        match self {
            PropertyKind::Bool => VariantTag::Bool,
            PropertyKind::Int => VariantTag::Int,
            PropertyKind::Float => VariantTag::Float,
            PropertyKind::String => VariantTag::String,
            PropertyKind::Object => VariantTag::Object,
        }
    }
}

/// One property a registered class publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
    /// Editor hint string, e.g. a range or a file filter.
    pub hint: Option<String>,
    pub default: PropertyValue,
}

impl PropertyInfo {
    /// Describes a property whose kind matches its default.
    ///
    /// A `Nil` default declares a string property with no initial value;
    /// use [`PropertyInfo::with_kind`] when that is wrong.
    pub fn new(name: impl Into<String>, default: PropertyValue) -> Self {
        let kind = match default.tag() {
            VariantTag::Bool => PropertyKind::Bool,
            VariantTag::Int => PropertyKind::Int,
            VariantTag::Float => PropertyKind::Float,
            _ => PropertyKind::String,
        };
        PropertyInfo {
            name: name.into(),
            kind,
            hint: None,
            default,
        }
    }

    pub fn with_kind(mut self, kind: PropertyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_accessors() {
        assert_eq!(PropertyValue::Bool(true).as_bool(), Some(true));
        assert_eq!(PropertyValue::Int(42).as_int(), Some(42));
        assert_eq!(PropertyValue::Int(42).as_float(), Some(42.0));
        assert_eq!(PropertyValue::Float(2.5).as_int(), Some(2));
        assert_eq!(PropertyValue::String("hi".into()).as_str(), Some("hi"));
        assert_eq!(PropertyValue::Nil.as_bool(), None);
    }

    #[test]
    fn value_tags() {
        assert_eq!(PropertyValue::Nil.tag(), VariantTag::Nil);
        assert_eq!(PropertyValue::Bool(false).tag(), VariantTag::Bool);
        assert_eq!(PropertyValue::Int(0).tag(), VariantTag::Int);
        assert_eq!(PropertyValue::Float(0.0).tag(), VariantTag::Float);
        assert_eq!(PropertyValue::String(String::new()).tag(), VariantTag::String);
    }

    #[test]
    fn info_derives_kind_from_default() {
        let info = PropertyInfo::new("speed", PropertyValue::Float(4.0));
        assert_eq!(info.kind, PropertyKind::Float);
        assert!(info.hint.is_none());

        let info = PropertyInfo::new("target", PropertyValue::Nil).with_kind(PropertyKind::Object);
        assert_eq!(info.kind, PropertyKind::Object);
    }

    #[test]
    fn info_round_trips_through_toml() {
        let info = PropertyInfo::new("speed", PropertyValue::Float(4.0)).with_hint("0.0,10.0");
        let text = toml::to_string(&info).unwrap();
        let back: PropertyInfo = toml::from_str(&text).unwrap();
        assert_eq!(back.name, "speed");
        assert_eq!(back.kind, PropertyKind::Float);
        assert_eq!(back.hint.as_deref(), Some("0.0,10.0"));
        assert_eq!(back.default, PropertyValue::Float(4.0));
    }
}
