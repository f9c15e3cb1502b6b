use std::collections::BTreeMap;

use hx_columnar::DataValue;
use serde::Serialize;

use super::path;
use crate::backend::RawFileStatus;

/// Immutable snapshot of one remote file or directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
	pub name: String,
	pub path: String,
	pub parent_path: String,
	pub owner: String,
	pub group: String,
	pub is_directory: bool,
	pub permission_bits: u16,
	/// Epoch milliseconds
	pub modification_time: i64,
	/// Epoch milliseconds
	pub access_time: i64,
	pub length: u64,
	/// Extra attributes the remote reported (`blockSize`, `replication`, ...)
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub attributes: BTreeMap<String, DataValue>,
}

impl FileNode {
	/// Builds a node for the normalized `path` from what the backend returned.
	pub fn from_raw(path: &str, raw: RawFileStatus) -> Self {
		let mut attributes = BTreeMap::new();
		let mut put = |key: &str, value: DataValue| {
			if !value.is_null() {
				attributes.insert(key.to_string(), value);
			}
		};

		put("blockSize", raw.block_size.into());
		put("replication", raw.replication.into());
		put("fileId", raw.file_id.into());
		put("childrenNum", raw.children_num.into());
		put("storagePolicy", raw.storage_policy.into());
		put("symlink", raw.symlink.into());
		put("aclBit", raw.acl_bit.into());
		put("encBit", raw.enc_bit.into());
		put("ecBit", raw.ec_bit.into());
		put(
			"type",
			if raw.is_directory {
				"DIRECTORY"
			} else {
				"FILE"
			}
			.into(),
		);

		let name = match path::file_name(path) {
			"" => path::ROOT.to_string(),
			name => name.to_string(),
		};
		let parent_path = if path == path::ROOT {
			String::new()
		} else {
			path::parent(path).to_string()
		};

		Self {
			name,
			path: path.to_string(),
			parent_path,
			owner: raw.owner,
			group: raw.group,
			is_directory: raw.is_directory,
			permission_bits: raw.permission,
			modification_time: raw.modification_time,
			access_time: raw.access_time,
			length: raw.length,
			attributes,
		}
	}

	pub fn attribute(&self, key: &str) -> Option<&DataValue> {
		self.attributes.get(key)
	}

	pub fn is_sticky(&self) -> bool {
		self.permission_bits & 0o1000 != 0
	}

	/// `ls -l` style rendering, e.g. `drwxr-xr-t`.
	pub fn mode_string(&self) -> String {
		let mut mode = String::with_capacity(10);
		mode.push(if self.is_directory { 'd' } else { '-' });
		for shift in [6, 3, 0] {
			let bits = (self.permission_bits >> shift) & 0o7;
			mode.push(if bits & 0o4 != 0 { 'r' } else { '-' });
			mode.push(if bits & 0o2 != 0 { 'w' } else { '-' });
			mode.push(if bits & 0o1 != 0 { 'x' } else { '-' });
		}
		if self.is_sticky() {
			let other_exec = self.permission_bits & 0o1 != 0;
			mode.pop();
			mode.push(if other_exec { 't' } else { 'T' });
		}
		mode
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nodes_derive_names_and_attributes() {
		let node = FileNode::from_raw(
			"/data/f.parquet",
			RawFileStatus {
				length: 42,
				owner: "hdfs".into(),
				group: "supergroup".into(),
				permission: 0o644,
				block_size: 134_217_728,
				replication: 3,
				..Default::default()
			},
		);

		assert_eq!(node.name, "f.parquet");
		assert_eq!(node.parent_path, "/data");
		assert_eq!(node.attribute("replication").and_then(DataValue::as_u64), Some(3));
		assert_eq!(node.attribute("type").and_then(DataValue::as_str), Some("FILE"));
		assert!(node.attribute("symlink").is_none());
		assert_eq!(node.mode_string(), "-rw-r--r--");
	}

	#[test]
	fn root_and_sticky_directories() {
		let node = FileNode::from_raw(
			"/",
			RawFileStatus {
				is_directory: true,
				permission: 0o1777,
				..Default::default()
			},
		);

		assert_eq!(node.name, "/");
		assert_eq!(node.parent_path, "");
		assert_eq!(node.mode_string(), "drwxrwxrwt");
	}
}
