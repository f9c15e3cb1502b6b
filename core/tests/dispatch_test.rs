//! Integration tests for named JSON calls through the dispatcher

mod helpers;

use std::{fs, time::Duration};

use helpers::*;
use hx_core::{api::operation_names, testing::TestCluster};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

const PROFILE: &str = TestCluster::PROFILE;

#[test]
fn test_every_operation_is_registered() {
	let names = operation_names();

	for expected in [
		"listFiles",
		"createDir",
		"createEmptyFile",
		"renameFile",
		"deleteFiles",
		"deleteFilesForce",
		"setPermissions",
		"upload",
		"downloadFile",
		"downloadFolder",
		"previewContent",
		"readContent",
		"writeContent",
		"getAcl",
		"addAcl",
		"removeAcl",
		"removeDefaultAcl",
		"removeAllAcl",
		"orcSchema",
		"orcMeta",
		"orcPage",
		"orcRowCount",
		"orcExportCsv",
		"parquetSchema",
		"parquetMeta",
		"parquetPage",
		"parquetRowCount",
		"parquetExportCsv",
		"avroContent",
		"invalidateProfile",
		"cancel",
	] {
		assert!(names.contains(&expected), "{expected} is not registered");
	}
}

#[tokio::test]
async fn test_list_files_returns_camel_case_records() {
	let cluster = cluster();
	cluster.backend.put_file("/data/a.txt", "abc");
	let dispatcher = cluster.dispatcher();

	let value = dispatcher
		.call("listFiles", json!({ "profileId": PROFILE, "parentPath": "/data" }))
		.await
		.unwrap();

	let node = &value[0];
	assert_eq!(node["name"], "a.txt");
	assert_eq!(node["parentPath"], "/data");
	assert_eq!(node["isDirectory"], false);
	assert_eq!(node["permissionBits"], 0o644);
	assert_eq!(node["length"], 3);
}

#[tokio::test]
async fn test_errors_come_back_as_records() {
	let cluster = cluster();
	let dispatcher = cluster.dispatcher();

	let record = dispatcher
		.call_record("statFile", json!({ "profileId": PROFILE, "path": "/missing" }))
		.await
		.unwrap_err();
	assert_eq!(record.code, "PATH_NOT_FOUND");
	assert!(record.message.contains("/missing"));

	let record = dispatcher
		.call_record("noSuchOperation", json!({}))
		.await
		.unwrap_err();
	assert_eq!(record.code, "INVALID_ARGUMENT");

	let record = dispatcher
		.call_record("renameFile", json!({ "profileId": PROFILE }))
		.await
		.unwrap_err();
	assert_eq!(record.code, "INVALID_ARGUMENT");

	let record = dispatcher
		.call_record("listFiles", json!({ "profileId": "nope", "parentPath": "/" }))
		.await
		.unwrap_err();
	assert_eq!(record.code, "PROFILE_NOT_FOUND");
}

#[tokio::test]
async fn test_batch_calls_report_partial_failure() {
	let cluster = cluster();
	cluster.backend.put_file("/data/a.txt", "a");
	let dispatcher = cluster.dispatcher();

	let report = dispatcher
		.call(
			"setPermissions",
			json!({ "profileId": PROFILE, "paths": ["/data/a.txt", "/gone"], "bits": "600" }),
		)
		.await
		.unwrap();

	assert_eq!(report["success"], false);
	assert_eq!(report["failures"][0]["path"], "/gone");
	assert_eq!(report["failures"][0]["code"], "PATH_NOT_FOUND");
	assert_eq!(cluster.backend.permission("/data/a.txt"), Some(0o600));

	let report = dispatcher
		.call(
			"deleteFilesForce",
			json!({ "profileId": PROFILE, "paths": ["/data/a.txt"] }),
		)
		.await
		.unwrap();
	assert_eq!(report, json!({ "success": true, "failures": [] }));
}

#[tokio::test]
async fn test_acl_calls_take_flat_entries() {
	let cluster = cluster();
	cluster.backend.put_dir("/data");
	let dispatcher = cluster.dispatcher();
	let alice = json!({
		"profileId": PROFILE,
		"path": "/data",
		"type": "user",
		"scope": "access",
		"permissions": "r-x",
		"name": "alice"
	});

	let acl = dispatcher.call("addAcl", alice.clone()).await.unwrap();
	let entries = acl["entries"].as_array().unwrap();
	assert!(entries.contains(&json!({
		"type": "user", "scope": "access", "permissions": "r-x", "name": "alice"
	})));
	assert_eq!(acl["fileStatus"]["path"], "/data");

	assert_eq!(dispatcher.call("removeAcl", alice.clone()).await.unwrap(), true);
	assert_eq!(dispatcher.call("removeAcl", alice).await.unwrap(), false);

	let record = dispatcher
		.call_record(
			"addAcl",
			json!({ "profileId": PROFILE, "path": "/data", "type": "mask", "scope": "access", "permissions": "rwx", "name": "x" }),
		)
		.await
		.unwrap_err();
	assert_eq!(record.code, "INVALID_ACL_ENTRY");
}

#[tokio::test]
async fn test_columnar_calls() {
	let cluster = cluster();
	cluster.backend.put_file("/data/people.parquet", parquet_bytes(8, 3));
	cluster.backend.put_file("/data/events.avro", avro_bytes(2));
	let dispatcher = cluster.dispatcher();
	let file = json!({ "profileId": PROFILE, "path": "/data/people.parquet" });

	assert_eq!(dispatcher.call("parquetRowCount", file.clone()).await.unwrap(), 8);

	let schema = dispatcher.call("parquetSchema", file).await.unwrap();
	assert_eq!(schema[0]["name"], "id");

	let rows = dispatcher
		.call(
			"parquetPage",
			json!({ "profileId": PROFILE, "path": "/data/people.parquet", "page": 2, "pageSize": 2 }),
		)
		.await
		.unwrap();
	assert_eq!(rows, json!([{ "id": 2, "name": "person-2" }, { "id": 3, "name": null }]));

	let records = dispatcher
		.call("avroContent", json!({ "profileId": PROFILE, "path": "/data/events.avro" }))
		.await
		.unwrap();
	assert_eq!(records, json!([{ "id": 0, "kind": "open" }, { "id": 1, "kind": "close" }]));

	let record = dispatcher
		.call_record(
			"orcSchema",
			json!({ "profileId": PROFILE, "path": "/data/people.parquet" }),
		)
		.await
		.unwrap_err();
	assert_eq!(record.code, "FORMAT_ERROR");
}

#[tokio::test]
async fn test_invalidate_profile() {
	let cluster = cluster();
	let dispatcher = cluster.dispatcher();
	let args = json!({ "profileId": PROFILE });

	assert_eq!(dispatcher.call("invalidateProfile", args.clone()).await.unwrap(), false);

	dispatcher
		.call("statFile", json!({ "profileId": PROFILE, "path": "/" }))
		.await
		.unwrap();
	assert_eq!(dispatcher.call("invalidateProfile", args).await.unwrap(), true);
	assert!(cluster.backend.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_a_running_download() {
	let cluster = cluster();
	for i in 0..10 {
		cluster.backend.put_file(&format!("/data/logs/{i}.log"), "log line");
	}
	let dispatcher = cluster.dispatcher();
	let local = TempDir::new().unwrap();
	dispatcher
		.call("statFile", json!({ "profileId": PROFILE, "path": "/" }))
		.await
		.unwrap();
	cluster.backend.set_latency(Some(Duration::from_secs(1)));

	let download = dispatcher.call(
		"downloadFolder",
		json!({
			"profileId": PROFILE,
			"path": "/data/logs",
			"localParentPath": local.path(),
			"requestId": "download-1"
		}),
	);
	let cancel = async {
		tokio::time::sleep(Duration::from_millis(3_500)).await;
		assert!(dispatcher.requests().is_running("download-1"));
		dispatcher
			.call("cancel", json!({ "requestId": "download-1" }))
			.await
			.unwrap()
	};

	let (downloaded, cancelled) = tokio::join!(download, cancel);

	assert_eq!(cancelled, Value::Bool(true));
	assert_eq!(downloaded.unwrap_err().code(), "CANCELLED");
	assert!(!dispatcher.requests().is_running("download-1"));
	assert_eq!(fs::read_dir(local.path()).unwrap().count(), 0);

	let unknown = dispatcher
		.call("cancel", json!({ "requestId": "download-1" }))
		.await
		.unwrap();
	assert_eq!(unknown, false);
}
