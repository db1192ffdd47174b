use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::metadata::{FieldMeta, ScalarKind};

/// A filter value supplied to the builder and, after compilation, a bind value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
    /// Enum variant name. Bound as text.
    Enum(String),
}

impl Value {
    /// Wrap an enum-like value; it is bound by its textual name.
    pub fn enumeration(variant: impl fmt::Display) -> Self {
        Value::Enum(variant.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Null or a string with no characters.
    pub fn is_null_or_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) | Value::Enum(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Convert into the value handed to the driver.
    pub fn into_bind(self) -> Value {
        match self {
            Value::Enum(name) => Value::String(name),
            v => v,
        }
    }

    /// True when this value is indistinguishable from an unset field of the
    /// declared type.
    ///
    /// Primitive numeric and boolean fields default to zero, so a zero value
    /// for them means "no filter". Nullable fields never match. For
    /// properties without metadata, any numeric text equal to zero matches.
    pub fn is_zero_for(&self, field: Option<&FieldMeta>) -> bool {
        let text = self.to_string();
        let Some(field) = field else {
            return looks_numeric(&text) && text.parse::<f64>().is_ok_and(|n| n == 0.0);
        };
        if field.nullable {
            return false;
        }
        match field.kind {
            ScalarKind::Int | ScalarKind::Long | ScalarKind::Short | ScalarKind::Byte => {
                integer_part(&text).parse::<i64>().is_ok_and(|n| n == 0)
            }
            ScalarKind::Float | ScalarKind::Double => text.parse::<f64>().is_ok_and(|n| n == 0.0),
            ScalarKind::Bool => match self {
                Value::Bool(b) => !b,
                _ => integer_part(&text).parse::<i64>().is_ok_and(|n| n == 0),
            },
            ScalarKind::Text | ScalarKind::Timestamp | ScalarKind::Decimal | ScalarKind::Other => {
                false
            }
        }
    }

    /// Render as an inline SQL literal for IN lists.
    pub(crate) fn to_literal(&self, quoted: bool) -> String {
        let text = self.to_string();
        if quoted {
            format!("'{}'", text.replace('\'', "''"))
        } else {
            text
        }
    }
}

fn integer_part(s: &str) -> &str {
    match s.find('.') {
        Some(i) => &s[..i],
        None => s,
    }
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) | Value::Enum(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Lower and upper bound of a BETWEEN clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinMax {
    pub min: Value,
    pub max: Value,
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: ScalarKind) -> FieldMeta {
        FieldMeta::new("f", kind)
    }

    #[test]
    fn test_zero_for_primitive_kinds() {
        assert!(Value::Int(0).is_zero_for(Some(&field(ScalarKind::Int))));
        assert!(Value::from("0").is_zero_for(Some(&field(ScalarKind::Long))));
        assert!(Value::Float(0.0).is_zero_for(Some(&field(ScalarKind::Short))));
        assert!(Value::Bool(false).is_zero_for(Some(&field(ScalarKind::Bool))));
        assert!(Value::Float(0.0).is_zero_for(Some(&field(ScalarKind::Double))));
        assert!(!Value::Int(1).is_zero_for(Some(&field(ScalarKind::Int))));
        assert!(!Value::Int(0).is_zero_for(Some(&field(ScalarKind::Text))));
    }

    #[test]
    fn test_zero_for_nullable_field() {
        let f = field(ScalarKind::Int).nullable();
        assert!(!Value::Int(0).is_zero_for(Some(&f)));
    }

    #[test]
    fn test_zero_without_metadata() {
        assert!(Value::Int(0).is_zero_for(None));
        assert!(Value::from("0.0").is_zero_for(None));
        assert!(!Value::from("abc").is_zero_for(None));
        assert!(!Value::Bool(false).is_zero_for(None));
    }

    #[test]
    fn test_enum_binds_as_text() {
        let v = Value::enumeration("ACTIVE");
        assert_eq!(v.into_bind(), Value::String("ACTIVE".to_string()));
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i32> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(Value::from("o'neil").to_literal(true), "'o''neil'");
        assert_eq!(Value::Int(7).to_literal(false), "7");
    }
}
