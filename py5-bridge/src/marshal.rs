//! Value marshaling between the host runtime and user code
//!
//! The bridge treats conversion as opaque: it hands host parameters to a
//! `ValueConverter` before every user call and converts return values back.

use crate::types::{HostValue, ScriptResult, Value};

/// Bidirectional conversion between host values and native values
pub trait ValueConverter: Send + Sync {
    /// Convert host parameters into native positional arguments
    fn to_native(&self, params: &[HostValue]) -> ScriptResult<Vec<Value>>;

    /// Convert a native return value into its host representation
    fn to_host(&self, value: Value) -> ScriptResult<HostValue>;
}

/// Default converter for the primitive types of the callback contract
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl StandardConverter {
    fn convert_native(value: &HostValue) -> ScriptResult<Value> {
        Ok(match value {
            HostValue::Null => Value::None,
            HostValue::Boolean(b) => Value::Bool(*b),
            HostValue::Int(v) => Value::Int(i64::from(*v)),
            HostValue::Long(v) => Value::Int(*v),
            HostValue::Float(v) => Value::Float(f64::from(*v)),
            HostValue::Double(v) => Value::Float(*v),
            HostValue::Char(c) => Value::Str(c.to_string()),
            HostValue::String(s) => Value::Str(s.clone()),
            HostValue::Array(items) => Value::List(
                items
                    .iter()
                    .map(Self::convert_native)
                    .collect::<ScriptResult<Vec<_>>>()?,
            ),
        })
    }

    fn convert_host(value: Value) -> ScriptResult<HostValue> {
        Ok(match value {
            Value::None => HostValue::Null,
            Value::Bool(b) => HostValue::Boolean(b),
            Value::Int(v) => HostValue::Long(v),
            Value::Float(v) => HostValue::Double(v),
            Value::Str(s) => HostValue::String(s),
            Value::List(items) => HostValue::Array(
                items
                    .into_iter()
                    .map(Self::convert_host)
                    .collect::<ScriptResult<Vec<_>>>()?,
            ),
        })
    }
}

impl ValueConverter for StandardConverter {
    fn to_native(&self, params: &[HostValue]) -> ScriptResult<Vec<Value>> {
        params.iter().map(Self::convert_native).collect()
    }

    fn to_host(&self, value: Value) -> ScriptResult<HostValue> {
        Self::convert_host(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_native_primitives() {
        let converter = StandardConverter;
        let native = converter
            .to_native(&[
                HostValue::Int(7),
                HostValue::Char('k'),
                HostValue::Float(0.5),
                HostValue::Null,
            ])
            .unwrap();
        assert_eq!(
            native,
            vec![
                Value::Int(7),
                Value::Str("k".into()),
                Value::Float(0.5),
                Value::None
            ]
        );
    }

    #[test]
    fn test_to_native_nested_array() {
        let converter = StandardConverter;
        let native = converter
            .to_native(&[HostValue::Array(vec![HostValue::Boolean(true), HostValue::Long(3)])])
            .unwrap();
        assert_eq!(native, vec![Value::List(vec![Value::Bool(true), Value::Int(3)])]);
    }

    #[test]
    fn test_to_host_widens_integers() {
        let converter = StandardConverter;
        assert_eq!(converter.to_host(Value::Int(5)).unwrap(), HostValue::Long(5));
        assert_eq!(converter.to_host(Value::None).unwrap(), HostValue::Null);
    }

    #[test]
    fn test_to_host_nested_list() {
        let converter = StandardConverter;
        let host = converter
            .to_host(Value::List(vec![Value::Str("a".into()), Value::Float(1.5)]))
            .unwrap();
        assert_eq!(
            host,
            HostValue::Array(vec![HostValue::String("a".into()), HostValue::Double(1.5)])
        );
    }
}
