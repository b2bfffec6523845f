//! Dynamic JSON values for message payloads.
//!
//! pgmq stores every message body in a `jsonb` column and places no schema on it. [`JsonValue`]
//! is the in-memory form of such a payload: a closed enum with one variant per JSON shape.
//!
//! ## What
//!
//! - [`JsonValue`] holds any JSON document. Integers and doubles are kept apart, so a numeric id
//!   embedded in a payload stays exact.
//! - [`JsonValue::from_slice`] and [`JsonValue::to_vec`] convert to and from UTF-8 JSON text.
//! - Typed accessors (`as_i64`, `as_str`, ...) and [`JsonValue::get`] are queries: a type mismatch or a
//!   missing key gives `None`, never a panic.
//!
//! ## How
//!
//! Build values from native literals with `From`/`Into` or the [`json_value!`](crate::json_value) macro,
//! and read them back with the accessors.
//!
//! ### Example
//!
//! ```rust
//! use pgmq_client::{json_value, JsonValue};
//!
//! let payload = json_value!({"task": "email", "retries": 0});
//! assert_eq!(payload["task"].as_str(), Some("email"));
//! assert_eq!(payload.get("retries").and_then(JsonValue::as_i64), Some(0));
//! assert!(payload.get("missing").is_none());
//! ```
use crate::error::{Error, Result};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// JSON object: unique keys, ordered by key.
pub type JsonObject = BTreeMap<String, JsonValue>;

/// JSON array.
pub type JsonArray = Vec<JsonValue>;

static NULL: JsonValue = JsonValue::Null;

/// Any JSON document.
///
/// Equality is structural and variant-sensitive: `Integer(1)` and `Double(1.0)` are different values.
/// Doubles compare by bit pattern after folding `-0.0` into `0.0` and every `NaN` into one, so
/// equality is reflexive and agrees with [`Hash`].
#[derive(Debug, Clone, Default)]
pub enum JsonValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Object(JsonObject),
    Array(JsonArray),
}

impl JsonValue {
    /// Parse a UTF-8 JSON document.
    ///
    /// Numbers without a fraction or exponent that fit in `i64` become [`JsonValue::Integer`]; every
    /// other number becomes [`JsonValue::Double`]. When an object repeats a key, the last value wins.
    ///
    /// # Errors
    /// [`Error::Parse`] for truncated documents, unterminated strings, invalid number literals or
    /// trailing data.
    ///
    /// Nesting depth is not limited; the stack grows on demand while descending.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let value = JsonValue::deserialize(serde_stacker::Deserializer::new(&mut de))
            .map_err(|source| Error::Parse { source })?;
        de.end().map_err(|source| Error::Parse { source })?;
        Ok(value)
    }

    /// Serialize as compact JSON. Object keys come out sorted, so equal values give equal bytes.
    ///
    /// Non-finite doubles are written as `null`.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Integer(_) => "integer",
            JsonValue::Double(_) => "double",
            JsonValue::String(_) => "string",
            JsonValue::Object(_) => "object",
            JsonValue::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsonArray> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up an object member by key or an array element by position.
    ///
    /// Returns `None` when the key is missing, the index is out of bounds, or the receiver is not
    /// the matching container.
    pub fn get<I: JsonIndex>(&self, index: I) -> Option<&JsonValue> {
        index.index_into(self)
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for usize {}
    impl Sealed for str {}
    impl Sealed for String {}
    impl<T: ?Sized + Sealed> Sealed for &T {}
}

/// Types usable with [`JsonValue::get`] and `value[...]`: string keys and `usize` positions.
pub trait JsonIndex: private::Sealed {
    #[doc(hidden)]
    fn index_into<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue>;
}

impl JsonIndex for usize {
    fn index_into<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue> {
        match value {
            JsonValue::Array(items) => items.get(*self),
            _ => None,
        }
    }
}

impl JsonIndex for str {
    fn index_into<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue> {
        match value {
            JsonValue::Object(map) => map.get(self),
            _ => None,
        }
    }
}

impl JsonIndex for String {
    fn index_into<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue> {
        self.as_str().index_into(value)
    }
}

impl<T: ?Sized + JsonIndex> JsonIndex for &T {
    fn index_into<'v>(&self, value: &'v JsonValue) -> Option<&'v JsonValue> {
        (**self).index_into(value)
    }
}

/// `value["key"]` and `value[2]` yield `Null` where [`JsonValue::get`] would yield `None`.
impl<I: JsonIndex> std::ops::Index<I> for JsonValue {
    type Output = JsonValue;

    fn index(&self, index: I) -> &JsonValue {
        index.index_into(self).unwrap_or(&NULL)
    }
}

/// Bits of `d` with `-0.0` folded into `0.0` and all NaNs into the canonical one.
fn double_bits(d: f64) -> u64 {
    if d == 0.0 {
        0.0_f64.to_bits()
    } else if d.is_nan() {
        f64::NAN.to_bits()
    } else {
        d.to_bits()
    }
}

impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonValue::Null, JsonValue::Null) => true,
            (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (JsonValue::Integer(a), JsonValue::Integer(b)) => a == b,
            (JsonValue::Double(a), JsonValue::Double(b)) => double_bits(*a) == double_bits(*b),
            (JsonValue::String(a), JsonValue::String(b)) => a == b,
            (JsonValue::Object(a), JsonValue::Object(b)) => a == b,
            (JsonValue::Array(a), JsonValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JsonValue {}

impl Hash for JsonValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            JsonValue::Null => {}
            JsonValue::Bool(b) => b.hash(state),
            JsonValue::Integer(i) => i.hash(state),
            JsonValue::Double(d) => double_bits(*d).hash(state),
            JsonValue::String(s) => s.hash(state),
            JsonValue::Object(map) => map.hash(state),
            JsonValue::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for JsonValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_slice(s.as_bytes())
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Bool(b) => serializer.serialize_bool(*b),
            JsonValue::Integer(i) => serializer.serialize_i64(*i),
            JsonValue::Double(d) => serializer.serialize_f64(*d),
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            JsonValue::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// Classifies each token in a fixed order: null, integer, double, string, boolean, array, object.
///
/// The deserializer reports an unsigned literal only when it has no fraction or exponent, so
/// `visit_u64`/`visit_i64` see exactly the integer candidates; those outside `i64` fall through to
/// the double interpretation.
struct JsonValueVisitor;

impl<'de> Visitor<'de> for JsonValueVisitor {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any valid JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<JsonValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<JsonValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => JsonValue::Integer(i),
            Err(_) => JsonValue::Double(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<JsonValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<JsonValue, A::Error> {
        let mut object = JsonObject::new();
        while let Some((key, value)) = map.next_entry::<String, JsonValue>()? {
            // last key wins
            object.insert(key, value);
        }
        Ok(JsonValue::Object(object))
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(JsonValueVisitor)
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonValue::Null,
            serde_json::Value::Bool(b) => JsonValue::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => JsonValue::Integer(i),
                (None, Some(d)) => JsonValue::Double(d),
                (None, None) => JsonValue::Null,
            },
            serde_json::Value::String(s) => JsonValue::String(s),
            serde_json::Value::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            serde_json::Value::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, JsonValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for serde_json::Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => serde_json::Value::Null,
            JsonValue::Bool(b) => serde_json::Value::Bool(b),
            JsonValue::Integer(i) => serde_json::Value::Number(i.into()),
            JsonValue::Double(d) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            JsonValue::String(s) => serde_json::Value::String(s),
            JsonValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            JsonValue::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<()> for JsonValue {
    fn from(_: ()) -> Self {
        JsonValue::Null
    }
}

impl From<bool> for JsonValue {
    fn from(b: bool) -> Self {
        JsonValue::Bool(b)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for JsonValue {
                fn from(i: $ty) -> Self {
                    JsonValue::Integer(i64::from(i))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for JsonValue {
    fn from(d: f32) -> Self {
        JsonValue::Double(f64::from(d))
    }
}

impl From<f64> for JsonValue {
    fn from(d: f64) -> Self {
        JsonValue::Double(d)
    }
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> Self {
        JsonValue::String(s.to_owned())
    }
}

impl From<String> for JsonValue {
    fn from(s: String) -> Self {
        JsonValue::String(s)
    }
}

impl<'a> From<Cow<'a, str>> for JsonValue {
    fn from(s: Cow<'a, str>) -> Self {
        JsonValue::String(s.into_owned())
    }
}

impl<T: Into<JsonValue>> From<Option<T>> for JsonValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(JsonValue::Null)
    }
}

impl<T: Into<JsonValue>> From<Vec<T>> for JsonValue {
    fn from(items: Vec<T>) -> Self {
        JsonValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<JsonValue>> From<BTreeMap<K, V>> for JsonValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        JsonValue::Object(
            map.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<JsonValue>> From<HashMap<K, V>> for JsonValue {
    fn from(map: HashMap<K, V>) -> Self {
        JsonValue::Object(
            map.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<T: Into<JsonValue>> FromIterator<T> for JsonValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        JsonValue::Array(iter.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for JsonValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        JsonValue::Object(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Build a [`JsonValue`](crate::JsonValue) from JSON literal syntax.
///
/// Accepts the same input as `serde_json::json!`.
///
/// ```rust
/// use pgmq_client::{json_value, JsonValue};
///
/// let v = json_value!({"a": 1, "b": [true, null]});
/// assert_eq!(v["b"][1], JsonValue::Null);
/// ```
#[macro_export]
macro_rules! json_value {
    ($($json:tt)+) => {
        $crate::JsonValue::from($crate::__private::serde_json::json!($($json)+))
    };
}
