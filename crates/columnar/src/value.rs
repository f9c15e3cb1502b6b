use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// One decoded row, keyed by column name in schema order.
pub type DataRow = IndexMap<String, DataValue>;

/// Dynamically typed scalar produced by every decoder in this crate.
///
/// Serialises to the natural JSON value (`Null` as `null`, `Struct` as an
/// object that keeps field order).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum DataValue {
	#[default]
	Null,
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	String(String),
	List(Vec<DataValue>),
	Struct(IndexMap<String, DataValue>),
}

impl DataValue {
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Int(v) => Some(*v),
			Self::UInt(v) => i64::try_from(*v).ok(),
			_ => None,
		}
	}

	pub fn as_u64(&self) -> Option<u64> {
		match self {
			Self::UInt(v) => Some(*v),
			Self::Int(v) => u64::try_from(*v).ok(),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Float(v) => Some(*v),
			Self::Int(v) => Some(*v as f64),
			Self::UInt(v) => Some(*v as f64),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[DataValue]> {
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}

	/// Field lookup on a [`DataValue::Struct`].
	pub fn get(&self, key: &str) -> Option<&DataValue> {
		match self {
			Self::Struct(fields) => fields.get(key),
			_ => None,
		}
	}
}

impl fmt::Display for DataValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => Ok(()),
			Self::Bool(v) => write!(f, "{v}"),
			Self::Int(v) => write!(f, "{v}"),
			Self::UInt(v) => write!(f, "{v}"),
			Self::Float(v) => write!(f, "{v}"),
			Self::String(v) => f.write_str(v),
			nested => match serde_json::to_string(nested) {
				Ok(json) => f.write_str(&json),
				Err(_) => Err(fmt::Error),
			},
		}
	}
}

macro_rules! impl_from {
	($($source:ty => $variant:ident as $target:ty),* $(,)?) => {
		$(
			impl From<$source> for DataValue {
				fn from(value: $source) -> Self {
					Self::$variant(<$target>::from(value))
				}
			}
		)*
	};
}

impl_from! {
	bool => Bool as bool,
	i8 => Int as i64,
	i16 => Int as i64,
	i32 => Int as i64,
	i64 => Int as i64,
	u8 => UInt as u64,
	u16 => UInt as u64,
	u32 => UInt as u64,
	u64 => UInt as u64,
	f32 => Float as f64,
	f64 => Float as f64,
	String => String as String,
	&str => String as String,
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl From<serde_json::Value> for DataValue {
	fn from(value: serde_json::Value) -> Self {
		use serde_json::Value;

		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => {
				if let Some(v) = n.as_i64() {
					Self::Int(v)
				} else if let Some(v) = n.as_u64() {
					Self::UInt(v)
				} else {
					n.as_f64().map_or(Self::Null, Self::Float)
				}
			}
			Value::String(s) => Self::String(s),
			Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
			Value::Object(fields) => Self::Struct(
				fields
					.into_iter()
					.map(|(key, value)| (key, value.into()))
					.collect(),
			),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	#[test]
	fn serialises_to_plain_json() {
		let value = DataValue::Struct(IndexMap::from([
			("id".to_string(), DataValue::Int(7)),
			("name".to_string(), DataValue::from("seven")),
			("missing".to_string(), DataValue::Null),
			(
				"tags".to_string(),
				DataValue::List(vec![DataValue::from("a"), DataValue::from("b")]),
			),
		]));

		assert_eq!(
			serde_json::to_value(&value).unwrap(),
			json!({"id": 7, "name": "seven", "missing": null, "tags": ["a", "b"]})
		);
	}

	#[test]
	fn typed_accessors() {
		let value = DataValue::from(json!({"n": 3, "big": u64::MAX, "f": 1.5, "s": "x"}));

		assert_eq!(value.get("n").and_then(DataValue::as_i64), Some(3));
		assert_eq!(value.get("big").and_then(DataValue::as_i64), None);
		assert_eq!(value.get("big").and_then(DataValue::as_u64), Some(u64::MAX));
		assert_eq!(value.get("f").and_then(DataValue::as_f64), Some(1.5));
		assert_eq!(value.get("s").and_then(DataValue::as_str), Some("x"));
		assert!(value.get("absent").is_none());
		assert!(DataValue::from(None::<i32>).is_null());
	}

	#[test]
	fn display_renders_nested_values_as_json() {
		assert_eq!(DataValue::Null.to_string(), "");
		assert_eq!(DataValue::Float(0.25).to_string(), "0.25");
		assert_eq!(
			DataValue::List(vec![DataValue::Int(1), DataValue::Null]).to_string(),
			"[1,null]"
		);
	}
}
