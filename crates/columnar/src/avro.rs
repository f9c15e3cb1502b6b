//! Avro object container files, decoded with their embedded writer schema.

use apache_avro::{types::Value, Reader};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
	convert::{date_from_days, time_of_day, timestamp_millis},
	error::{ColumnarError, Result},
	schema::ColumnarFormat,
	value::DataValue,
};

pub const MAGIC: &[u8; 4] = b"Obj\x01";
const FORMAT: ColumnarFormat = ColumnarFormat::Avro;

/// Decodes every record of an Avro container held in memory.
pub fn decode(data: &[u8]) -> Result<Vec<DataValue>> {
	if !data.starts_with(MAGIC) {
		return Err(ColumnarError::format(FORMAT, "missing Obj\\x01 magic"));
	}

	let reader = Reader::new(data).map_err(|e| ColumnarError::classify(FORMAT, &e))?;

	let records = reader
		.map(|value| {
			value
				.map(to_data_value)
				.map_err(|e| ColumnarError::classify(FORMAT, &e))
		})
		.collect::<Result<Vec<_>>>()?;

	debug!(records = records.len(), "Decoded Avro container");
	Ok(records)
}

fn to_data_value(value: Value) -> DataValue {
	match value {
		Value::Null => DataValue::Null,
		Value::Boolean(b) => DataValue::Bool(b),
		Value::Int(v) => v.into(),
		Value::Long(v) => v.into(),
		Value::Float(v) => v.into(),
		Value::Double(v) => v.into(),
		Value::String(s) => DataValue::String(s),
		Value::Enum(_, symbol) => DataValue::String(symbol),
		Value::Bytes(bytes) | Value::Fixed(_, bytes) => {
			DataValue::String(String::from_utf8_lossy(&bytes).into_owned())
		}
		Value::Union(_, inner) => to_data_value(*inner),
		Value::Array(items) => DataValue::List(items.into_iter().map(to_data_value).collect()),
		Value::Map(entries) => {
			let mut entries = entries.into_iter().collect::<Vec<_>>();
			entries.sort_by(|(a, _), (b, _)| a.cmp(b));
			DataValue::Struct(
				entries
					.into_iter()
					.map(|(key, value)| (key, to_data_value(value)))
					.collect::<IndexMap<_, _>>(),
			)
		}
		Value::Record(fields) => DataValue::Struct(
			fields
				.into_iter()
				.map(|(name, value)| (name, to_data_value(value)))
				.collect(),
		),
		Value::Date(days) => date_from_days(i64::from(days)).unwrap_or(DataValue::Int(days.into())),
		Value::TimeMillis(millis) => {
			time_of_day(i64::from(millis)).unwrap_or(DataValue::Int(millis.into()))
		}
		Value::TimeMicros(micros) => time_of_day(micros / 1_000).unwrap_or(DataValue::Int(micros)),
		Value::TimestampMillis(millis) | Value::LocalTimestampMillis(millis) => {
			timestamp_millis(millis).unwrap_or(DataValue::Int(millis))
		}
		Value::TimestampMicros(micros) | Value::LocalTimestampMicros(micros) => {
			timestamp_millis(micros.div_euclid(1_000)).unwrap_or(DataValue::Int(micros))
		}
		Value::Uuid(uuid) => DataValue::String(uuid.to_string()),
		other => match serde_json::Value::try_from(other) {
			Ok(json) => json.into(),
			Err(e) => {
				warn!(?e, "Avro value has no JSON form");
				DataValue::Null
			}
		},
	}
}
