//! Arrow arrays to [`DataValue`] rows.

use arrow::{
	array::{Array, ArrayRef, AsArray},
	compute::cast,
	datatypes::{
		DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type, Float32Type,
		Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType,
		Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
		TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
		TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
	},
	record_batch::RecordBatch,
	util::display::{ArrayFormatter, FormatOptions},
};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat};
use indexmap::IndexMap;

use crate::{
	error::{ColumnarError, Result},
	schema::ColumnarFormat,
	value::{DataRow, DataValue},
};

/// Decodes every row of `batch`, keyed by the batch's field names.
pub(crate) fn batch_to_rows(format: ColumnarFormat, batch: &RecordBatch) -> Result<Vec<DataRow>> {
	let schema = batch.schema();
	let columns = batch
		.columns()
		.iter()
		.map(|column| flatten_dictionary(format, column))
		.collect::<Result<Vec<_>>>()?;

	let mut rows = Vec::with_capacity(batch.num_rows());
	for row in 0..batch.num_rows() {
		let mut values = IndexMap::with_capacity(columns.len());
		for (field, column) in schema.fields().iter().zip(&columns) {
			values.insert(field.name().clone(), value_at(column.as_ref(), row));
		}
		rows.push(values);
	}

	Ok(rows)
}

fn flatten_dictionary(format: ColumnarFormat, column: &ArrayRef) -> Result<ArrayRef> {
	match column.data_type() {
		DataType::Dictionary(_, value_type) => {
			cast(column, value_type).map_err(|e| ColumnarError::classify(format, &e))
		}
		_ => Ok(column.clone()),
	}
}

pub(crate) fn value_at(array: &dyn Array, i: usize) -> DataValue {
	if array.is_null(i) {
		return DataValue::Null;
	}

	match array.data_type() {
		DataType::Null => DataValue::Null,
		DataType::Boolean => DataValue::Bool(array.as_boolean().value(i)),

		DataType::Int8 => array.as_primitive::<Int8Type>().value(i).into(),
		DataType::Int16 => array.as_primitive::<Int16Type>().value(i).into(),
		DataType::Int32 => array.as_primitive::<Int32Type>().value(i).into(),
		DataType::Int64 => array.as_primitive::<Int64Type>().value(i).into(),
		DataType::UInt8 => array.as_primitive::<UInt8Type>().value(i).into(),
		DataType::UInt16 => array.as_primitive::<UInt16Type>().value(i).into(),
		DataType::UInt32 => array.as_primitive::<UInt32Type>().value(i).into(),
		DataType::UInt64 => array.as_primitive::<UInt64Type>().value(i).into(),
		DataType::Float32 => array.as_primitive::<Float32Type>().value(i).into(),
		DataType::Float64 => array.as_primitive::<Float64Type>().value(i).into(),

		DataType::Utf8 => array.as_string::<i32>().value(i).into(),
		DataType::LargeUtf8 => array.as_string::<i64>().value(i).into(),
		DataType::Utf8View => array.as_string_view().value(i).into(),
		DataType::Binary => lossy(array.as_binary::<i32>().value(i)),
		DataType::LargeBinary => lossy(array.as_binary::<i64>().value(i)),
		DataType::FixedSizeBinary(_) => lossy(array.as_fixed_size_binary().value(i)),

		DataType::Decimal128(_, _) => {
			DataValue::String(array.as_primitive::<Decimal128Type>().value_as_string(i))
		}
		DataType::Decimal256(_, _) => {
			DataValue::String(array.as_primitive::<Decimal256Type>().value_as_string(i))
		}

		DataType::Timestamp(unit, _) => {
			let millis = match unit {
				TimeUnit::Second => array
					.as_primitive::<TimestampSecondType>()
					.value(i)
					.saturating_mul(1_000),
				TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value(i),
				TimeUnit::Microsecond => array
					.as_primitive::<TimestampMicrosecondType>()
					.value(i)
					.div_euclid(1_000),
				TimeUnit::Nanosecond => array
					.as_primitive::<TimestampNanosecondType>()
					.value(i)
					.div_euclid(1_000_000),
			};
			timestamp_millis(millis).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Date32 => {
			let days = array.as_primitive::<Date32Type>().value(i);
			date_from_days(i64::from(days)).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Date64 => {
			let millis = array.as_primitive::<Date64Type>().value(i);
			date_from_days(millis.div_euclid(86_400_000)).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Time32(TimeUnit::Second) => {
			let secs = array.as_primitive::<Time32SecondType>().value(i);
			time_of_day(i64::from(secs) * 1_000).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Time32(TimeUnit::Millisecond) => {
			let millis = array.as_primitive::<Time32MillisecondType>().value(i);
			time_of_day(i64::from(millis)).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Time64(TimeUnit::Microsecond) => {
			let micros = array.as_primitive::<Time64MicrosecondType>().value(i);
			time_of_day(micros / 1_000).unwrap_or_else(|| formatted(array, i))
		}
		DataType::Time64(TimeUnit::Nanosecond) => {
			let nanos = array.as_primitive::<Time64NanosecondType>().value(i);
			time_of_day(nanos / 1_000_000).unwrap_or_else(|| formatted(array, i))
		}

		DataType::List(_) => list(array.as_list::<i32>().value(i)),
		DataType::LargeList(_) => list(array.as_list::<i64>().value(i)),
		DataType::FixedSizeList(_, _) => list(array.as_fixed_size_list().value(i)),
		DataType::Struct(fields) => {
			let columns = array.as_struct();
			DataValue::Struct(
				fields
					.iter()
					.zip(columns.columns())
					.map(|(field, column)| (field.name().clone(), value_at(column.as_ref(), i)))
					.collect(),
			)
		}
		DataType::Map(_, _) => {
			let entries = array.as_map().value(i);
			let (keys, values) = (entries.column(0), entries.column(1));
			DataValue::Struct(
				(0..entries.len())
					.map(|j| {
						(
							value_at(keys.as_ref(), j).to_string(),
							value_at(values.as_ref(), j),
						)
					})
					.collect(),
			)
		}

		_ => formatted(array, i),
	}
}

fn list(values: ArrayRef) -> DataValue {
	DataValue::List(
		(0..values.len())
			.map(|j| value_at(values.as_ref(), j))
			.collect(),
	)
}

fn lossy(bytes: &[u8]) -> DataValue {
	DataValue::String(String::from_utf8_lossy(bytes).into_owned())
}

/// Arrow's own textual rendering, for types without a canonical encoding.
fn formatted(array: &dyn Array, i: usize) -> DataValue {
	ArrayFormatter::try_new(array, &FormatOptions::default())
		.map(|formatter| DataValue::String(formatter.value(i).to_string()))
		.unwrap_or(DataValue::Null)
}

pub(crate) fn timestamp_millis(millis: i64) -> Option<DataValue> {
	DateTime::from_timestamp_millis(millis)
		.map(|dt| DataValue::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

pub(crate) fn date_from_days(days: i64) -> Option<DataValue> {
	NaiveDate::from_ymd_opt(1970, 1, 1)?
		.checked_add_signed(chrono::TimeDelta::try_days(days)?)
		.map(|date| DataValue::String(date.format("%Y-%m-%d").to_string()))
}

pub(crate) fn time_of_day(millis: i64) -> Option<DataValue> {
	let secs = u32::try_from(millis.div_euclid(1_000)).ok()?;
	let nanos = u32::try_from(millis.rem_euclid(1_000) * 1_000_000).ok()?;
	NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
		.map(|time| DataValue::String(time.format("%H:%M:%S%.3f").to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	use arrow::{
		array::{
			Date32Array, Decimal128Array, DictionaryArray, Int32Array, ListArray, StringArray,
			TimestampMicrosecondArray,
		},
		datatypes::{Field, Schema},
	};
	use pretty_assertions::assert_eq;

	#[test]
	fn canonical_scalar_encodings() {
		assert_eq!(
			timestamp_millis(1_704_164_645_678),
			Some(DataValue::from("2024-01-02T03:04:05.678Z"))
		);
		assert_eq!(date_from_days(19_724), Some(DataValue::from("2024-01-02")));
		assert_eq!(time_of_day(3_723_004), Some(DataValue::from("01:02:03.004")));
	}

	#[test]
	fn batch_rows_follow_schema_order() {
		let keys = Int32Array::from(vec![0, 1, 0]);
		let dictionary = DictionaryArray::try_new(keys, Arc::new(StringArray::from(vec!["x", "y"])))
			.unwrap();
		let decimals = Decimal128Array::from(vec![Some(12_345), None, Some(-5)])
			.with_precision_and_scale(10, 2)
			.unwrap();
		let lists = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
			Some(vec![Some(1), Some(2)]),
			Some(vec![]),
			None,
		]);
		let stamps = TimestampMicrosecondArray::from(vec![1_000_999, 0, -1]);
		let dates = Date32Array::from(vec![0, 1, 2]);

		let batch = RecordBatch::try_from_iter(vec![
			("tag", Arc::new(dictionary) as ArrayRef),
			("amount", Arc::new(decimals) as ArrayRef),
			("items", Arc::new(lists) as ArrayRef),
			("at", Arc::new(stamps) as ArrayRef),
			("day", Arc::new(dates) as ArrayRef),
		])
		.unwrap();

		let rows = batch_to_rows(ColumnarFormat::Parquet, &batch).unwrap();

		assert_eq!(rows.len(), 3);
		assert_eq!(
			rows[0].keys().cloned().collect::<Vec<_>>(),
			vec!["tag", "amount", "items", "at", "day"]
		);
		assert_eq!(rows[0]["tag"], DataValue::from("x"));
		assert_eq!(rows[1]["tag"], DataValue::from("y"));
		assert_eq!(rows[0]["amount"], DataValue::from("123.45"));
		assert_eq!(rows[1]["amount"], DataValue::Null);
		assert_eq!(rows[2]["amount"], DataValue::from("-0.05"));
		assert_eq!(
			rows[0]["items"],
			DataValue::List(vec![DataValue::Int(1), DataValue::Int(2)])
		);
		assert_eq!(rows[1]["items"], DataValue::List(vec![]));
		assert_eq!(rows[2]["items"], DataValue::Null);
		assert_eq!(rows[0]["at"], DataValue::from("1970-01-01T00:00:01.000Z"));
		assert_eq!(rows[2]["at"], DataValue::from("1969-12-31T23:59:59.999Z"));
		assert_eq!(rows[2]["day"], DataValue::from("1970-01-03"));
	}

	#[test]
	fn struct_columns_keep_field_order() {
		let inner = arrow::array::StructArray::from(vec![
			(
				Arc::new(Field::new("b", DataType::Int32, false)),
				Arc::new(Int32Array::from(vec![2])) as ArrayRef,
			),
			(
				Arc::new(Field::new("a", DataType::Utf8, false)),
				Arc::new(StringArray::from(vec!["one"])) as ArrayRef,
			),
		]);
		let schema = Schema::new(vec![Field::new("s", inner.data_type().clone(), false)]);
		let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(inner)]).unwrap();

		let rows = batch_to_rows(ColumnarFormat::Orc, &batch).unwrap();
		assert_eq!(
			serde_json::to_string(&rows[0]["s"]).unwrap(),
			r#"{"b":2,"a":"one"}"#
		);
	}
}
