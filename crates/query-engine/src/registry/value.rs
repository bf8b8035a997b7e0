//! Runtime values produced by filters and parsed from query text.
//!
//! Every filter getter returns a Rust value that is converted into a [`Value`]
//! through the [`FilterValue`] trait. The closed [`ValueType`] sum type is what
//! operator handlers and type parsers are keyed by.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::types::{ParseResult, StringComparison};

/// Identity of a user-defined value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomType {
    id: TypeId,
    name: &'static str,
}

impl CustomType {
    pub fn of<V: 'static>() -> Self {
        let full = std::any::type_name::<V>();
        Self {
            id: TypeId::of::<V>(),
            name: full.rsplit("::").next().unwrap_or(full),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Kind of a value, used as the key of operator handlers and type parsers.
///
/// `Object` stands for "any value" and is what generic handlers accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Object,
    String,
    Int,
    Float,
    Bool,
    Custom(CustomType),
}

impl ValueType {
    pub fn custom<V: 'static>() -> Self {
        Self::Custom(CustomType::of::<V>())
    }

    pub fn is_object(self) -> bool {
        self == Self::Object
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Custom(custom) => f.write_str(custom.name()),
        }
    }
}

/// A type-erased user value together with its display label.
#[derive(Clone)]
pub struct CustomValue {
    value_type: CustomType,
    label: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn value_type(&self) -> CustomType {
        self.value_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type", &self.value_type.name())
            .field("label", &self.label)
            .finish()
    }
}

/// A runtime value: the left-hand side produced by a filter getter or the
/// right-hand side parsed from query text.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Custom(CustomValue),
}

impl Value {
    /// Wraps a user value, labelled with its `Debug` output.
    pub fn custom<V: Any + Send + Sync + fmt::Debug>(value: V) -> Self {
        let label = format!("{value:?}");
        Self::custom_with_label(value, label)
    }

    pub fn custom_with_label<V: Any + Send + Sync>(value: V, label: impl Into<String>) -> Self {
        Self::Custom(CustomValue {
            value_type: CustomType::of::<V>(),
            label: label.into(),
            inner: Arc::new(value),
        })
    }

    /// Parses raw text into the most specific built-in value.
    ///
    /// Integers win over floats, floats over booleans, and anything else stays
    /// a string. This is the parser of the `Object` type.
    pub fn parse_loose(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return Self::Float(value);
            }
        }
        if let Some(value) = parse_bool(trimmed) {
            return Self::Bool(value);
        }
        Self::String(raw.to_string())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Bool,
            Self::Custom(custom) => ValueType::Custom(custom.value_type),
        }
    }

    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        match self {
            Self::Custom(custom) => custom.inner.downcast_ref::<V>(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Text form used by generic string comparisons.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::String(value) => Cow::Borrowed(value),
            Self::Int(value) => Cow::Owned(value.to_string()),
            Self::Float(value) => Cow::Owned(value.to_string()),
            Self::Bool(value) => Cow::Borrowed(if *value { "true" } else { "false" }),
            Self::Custom(custom) => Cow::Borrowed(custom.label()),
        }
    }

    /// Orders two values of possibly different kinds.
    ///
    /// Numbers compare numerically, also against strings that parse as
    /// numbers. Everything else compares by label.
    pub fn loose_cmp(&self, other: &Value, comparison: StringComparison) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(left), Self::Int(right)) => Some(left.cmp(right)),
            (Self::Bool(left), Self::Bool(right)) => Some(left.cmp(right)),
            _ => match (self.numeric(), other.numeric()) {
                (Some(left), Some(right)) => left.partial_cmp(&right),
                _ => Some(comparison.compare(&self.label(), &other.label())),
            },
        }
    }

    pub fn loose_eq(&self, other: &Value, comparison: StringComparison) -> bool {
        self.loose_cmp(other, comparison) == Some(Ordering::Equal)
    }

    /// Substring match on labels; numbers and booleans match on equality.
    pub fn loose_contains(&self, other: &Value, comparison: StringComparison) -> bool {
        match self {
            Self::String(_) | Self::Custom(_) => comparison.contains(&self.label(), &other.label()),
            Self::Int(_) | Self::Float(_) | Self::Bool(_) => self.loose_eq(other, comparison),
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Self::String(value) => value.trim().parse::<f64>().ok(),
            _ => self.as_f64(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Int(left), Self::Int(right)) => left == right,
            (Self::Float(left), Self::Float(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Custom(left), Self::Custom(right)) => {
                left.value_type == right.value_type && left.label == right.label
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A Rust type that filters can return and operator handlers can accept.
pub trait FilterValue: Clone + Send + Sync + 'static {
    fn value_type() -> ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Cow<'_, Self>>;

    /// Parser registered for this type the first time it shows up in a
    /// handler or filter.
    fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
        None
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl FilterValue for Value {
    fn value_type() -> ValueType {
        ValueType::Object
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
        Some(Cow::Borrowed(value))
    }

    fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
        let parse: fn(&str) -> ParseResult<Self> = |raw| Some(Value::parse_loose(raw));
        Some(parse)
    }
}

impl FilterValue for String {
    fn value_type() -> ValueType {
        ValueType::String
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
        match value {
            Value::String(value) => Some(Cow::Borrowed(value)),
            _ => None,
        }
    }

    fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
        let parse: fn(&str) -> ParseResult<Self> = |raw| Some(raw.to_string());
        Some(parse)
    }
}

impl FilterValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
        match value {
            Value::Bool(value) => Some(Cow::Owned(*value)),
            _ => None,
        }
    }

    fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
        let parse: fn(&str) -> ParseResult<Self> = |raw| parse_bool(raw.trim());
        Some(parse)
    }
}

macro_rules! impl_int_value {
    ($($ty:ty),* $(,)?) => {$(
        impl FilterValue for $ty {
            fn value_type() -> ValueType {
                ValueType::Int
            }

            fn into_value(self) -> Value {
                Value::Int(i64::try_from(self).unwrap_or(i64::MAX))
            }

            fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
                match value {
                    Value::Int(value) => <$ty>::try_from(*value).ok().map(Cow::Owned),
                    _ => None,
                }
            }

            fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
                let parse: fn(&str) -> ParseResult<Self> = |raw| raw.trim().parse::<$ty>().ok();
                Some(parse)
            }
        }
    )*};
}

impl_int_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float_value {
    ($($ty:ty),* $(,)?) => {$(
        impl FilterValue for $ty {
            fn value_type() -> ValueType {
                ValueType::Float
            }

            fn into_value(self) -> Value {
                Value::Float(self as f64)
            }

            fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
                match value {
                    Value::Float(value) => Some(Cow::Owned(*value as $ty)),
                    Value::Int(value) => Some(Cow::Owned(*value as $ty)),
                    _ => None,
                }
            }

            fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
                let parse: fn(&str) -> ParseResult<Self> = |raw| raw.trim().parse::<$ty>().ok();
                Some(parse)
            }
        }
    )*};
}

impl_float_value!(f32, f64);

/// Enumerations usable as filter values.
///
/// Implementing this trait is enough for a type to be returned by filters:
/// its parser matches variant names case-insensitively and is registered
/// automatically.
pub trait QueryEnum: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn variants() -> &'static [(&'static str, Self)];

    fn name(self) -> &'static str {
        Self::variants()
            .iter()
            .find(|(_, variant)| *variant == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

impl<E: QueryEnum> FilterValue for E {
    fn value_type() -> ValueType {
        ValueType::custom::<E>()
    }

    fn into_value(self) -> Value {
        Value::custom_with_label(self, self.name())
    }

    fn from_value(value: &Value) -> Option<Cow<'_, Self>> {
        value.downcast_ref::<E>().map(Cow::Borrowed)
    }

    fn parser() -> Option<fn(&str) -> ParseResult<Self>> {
        let parse: fn(&str) -> ParseResult<Self> = |raw| {
            let raw = raw.trim();
            E::variants()
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(raw))
                .map(|(_, variant)| *variant)
        };
        Some(parse)
    }
}
