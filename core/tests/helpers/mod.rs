//! Shared fixtures for the gateway integration tests
#![allow(dead_code)]

use std::{fs, sync::Arc};

use apache_avro::{types::Record, Schema, Writer};
use arrow::{
	array::{ArrayRef, Int64Array, StringArray},
	record_batch::RecordBatch,
};
use bytes::Bytes;
use hx_core::{testing::TestCluster, GatewayConfig};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use tempfile::TempDir;

pub fn cluster() -> TestCluster {
	TestCluster::new().unwrap()
}

pub fn cluster_with(config: GatewayConfig) -> TestCluster {
	TestCluster::with_config(config).unwrap()
}

pub fn paths(items: &[&str]) -> Vec<String> {
	items.iter().map(|p| p.to_string()).collect()
}

pub fn people(rows: i64) -> RecordBatch {
	let ids = Int64Array::from_iter_values(0..rows);
	let names = StringArray::from_iter((0..rows).map(|i| match i % 4 {
		3 => None,
		_ => Some(format!("person-{i}")),
	}));

	RecordBatch::try_from_iter(vec![
		("id", Arc::new(ids) as ArrayRef),
		("name", Arc::new(names) as ArrayRef),
	])
	.unwrap()
}

pub fn parquet_bytes(rows: i64, row_group_size: usize) -> Bytes {
	let batch = people(rows);
	let props = WriterProperties::builder()
		.set_max_row_group_size(row_group_size)
		.build();
	let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props)).unwrap();
	writer.write(&batch).unwrap();
	Bytes::from(writer.into_inner().unwrap())
}

pub fn orc_bytes(rows: i64) -> Bytes {
	let batch = people(rows);
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("people.orc");

	let file = fs::File::create(&path).unwrap();
	let mut writer = orc_rust::arrow_writer::ArrowWriterBuilder::new(file, batch.schema())
		.try_build()
		.unwrap();
	writer.write(&batch).unwrap();
	writer.close().unwrap();

	Bytes::from(fs::read(&path).unwrap())
}

pub fn avro_bytes(rows: i64) -> Bytes {
	let schema = Schema::parse_str(
		r#"{
			"type": "record",
			"name": "event",
			"fields": [
				{"name": "id", "type": "long"},
				{"name": "kind", "type": "string"}
			]
		}"#,
	)
	.unwrap();

	let mut writer = Writer::new(&schema, Vec::new());
	for i in 0..rows {
		let mut record = Record::new(writer.schema()).unwrap();
		record.put("id", i);
		record.put("kind", if i % 2 == 0 { "open" } else { "close" });
		writer.append(record).unwrap();
	}
	Bytes::from(writer.into_inner().unwrap())
}
