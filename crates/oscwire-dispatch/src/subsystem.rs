use std::fmt;

use oscwire_codec::Argument;

use crate::error::{DispatchError, Result};

/// Argument type a property reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    String,
    Blob,
}

impl ValueType {
    /// Check `arg` against this type. An `Int` is promoted for a `Float` property.
    pub fn coerce(self, property: &str, arg: Argument) -> Result<Argument> {
        match (self, arg) {
            (ValueType::Int, arg @ Argument::Int(_))
            | (ValueType::Float, arg @ Argument::Float(_))
            | (ValueType::String, arg @ Argument::String(_))
            | (ValueType::Blob, arg @ Argument::Blob(_)) => Ok(arg),
            (ValueType::Float, Argument::Int(v)) => Ok(Argument::Float(v as f32)),
            (expected, arg) => Err(DispatchError::TypeMismatch {
                property: property.to_string(),
                expected,
                found: arg.type_tag(),
            }),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Blob => "blob",
        })
    }
}

/// Which directions a property supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

/// One named property of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub value_type: ValueType,
    pub access: Access,
}

impl PropertyInfo {
    pub const fn read_write(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            access: Access::ReadWrite,
        }
    }

    pub const fn read_only(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            access: Access::ReadOnly,
        }
    }

    pub const fn write_only(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            access: Access::WriteOnly,
        }
    }
}

/// A device subsystem addressable as `/<name>[/<index>]/<property>`.
///
/// The registry resolves the address, checks access and argument type, and
/// only then calls [`get`](Self::get) or [`set`](Self::set) with a property
/// name taken from [`properties`](Self::properties). `index` is `Some` exactly
/// when [`instance_count`](Self::instance_count) is `Some`, and is always in range.
///
/// Implementations guard their own peripheral state; the registry holds no locks.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    /// Number of instances, or `None` for a subsystem without an index segment.
    fn instance_count(&self) -> Option<usize> {
        None
    }

    fn properties(&self) -> &[PropertyInfo];

    fn get(&self, index: Option<usize>, property: &str) -> Result<Argument>;

    fn set(&self, index: Option<usize>, property: &str, value: Argument) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_property_accepts_int() {
        assert_eq!(
            ValueType::Float.coerce("speed", Argument::Int(3)).unwrap(),
            Argument::Float(3.0)
        );
    }

    #[test]
    fn int_property_rejects_float() {
        let err = ValueType::Int.coerce("value", Argument::Float(1.5)).unwrap_err();
        assert_eq!(
            err,
            DispatchError::TypeMismatch {
                property: "value".into(),
                expected: ValueType::Int,
                found: 'f',
            }
        );
        assert_eq!(err.to_string(), "property 'value' expects int, got 'f'");
    }

    #[test]
    fn access_flags() {
        assert!(Access::ReadOnly.readable() && !Access::ReadOnly.writable());
        assert!(!Access::WriteOnly.readable() && Access::WriteOnly.writable());
        assert!(Access::ReadWrite.readable() && Access::ReadWrite.writable());
    }
}
