//! Namespace, transfer and content operations

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use super::{CallContext, Operation};
use crate::{
	domain::{FileContent, FileNode, PreviewResult},
	error::{Error, Result},
	ops::{BatchReport, DeleteMode},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFiles {
	pub profile_id: String,
	pub parent_path: String,
}

#[async_trait]
impl Operation for ListFiles {
	const METHOD: &'static str = "listFiles";
	type Output = Vec<FileNode>;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.profile_id)
			.await?
			.list(&self.parent_path)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatFile {
	pub profile_id: String,
	pub path: String,
}

#[async_trait]
impl Operation for StatFile {
	const METHOD: &'static str = "statFile";
	type Output = FileNode;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.profile_id).await?.stat(&self.path).await
	}
}

/// Arguments of `createDir` and `createEmptyFile`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
	pub profile_id: String,
	pub parent_path: String,
	pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct CreateDir(pub NewEntry);

#[async_trait]
impl Operation for CreateDir {
	const METHOD: &'static str = "createDir";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		let NewEntry {
			profile_id,
			parent_path,
			name,
		} = self.0;
		ctx.namespace(&profile_id)
			.await?
			.mkdir(&parent_path, &name)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct CreateEmptyFile(pub NewEntry);

#[async_trait]
impl Operation for CreateEmptyFile {
	const METHOD: &'static str = "createEmptyFile";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		let NewEntry {
			profile_id,
			parent_path,
			name,
		} = self.0;
		ctx.namespace(&profile_id)
			.await?
			.touch(&parent_path, &name)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFile {
	pub profile_id: String,
	pub old_path: String,
	pub new_name: String,
	#[serde(default)]
	pub overwrite: bool,
}

#[async_trait]
impl Operation for RenameFile {
	const METHOD: &'static str = "renameFile";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.profile_id)
			.await?
			.rename(&self.old_path, &self.new_name, self.overwrite)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathBatch {
	pub profile_id: String,
	pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DeleteFiles(pub PathBatch);

#[async_trait]
impl Operation for DeleteFiles {
	const METHOD: &'static str = "deleteFiles";
	type Output = BatchReport;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		let namespace = ctx.namespace(&self.0.profile_id).await?;
		Ok(namespace.delete(&self.0.paths, DeleteMode::Trash).await)
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DeleteFilesForce(pub PathBatch);

#[async_trait]
impl Operation for DeleteFilesForce {
	const METHOD: &'static str = "deleteFilesForce";
	type Output = BatchReport;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		let namespace = ctx.namespace(&self.0.profile_id).await?;
		Ok(namespace.delete(&self.0.paths, DeleteMode::Permanent).await)
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPermissions {
	pub profile_id: String,
	pub paths: Vec<String>,
	/// A number, or an octal string such as `"755"`
	#[serde(deserialize_with = "permission_bits")]
	pub bits: u16,
	#[serde(default)]
	pub recursive: bool,
}

#[async_trait]
impl Operation for SetPermissions {
	const METHOD: &'static str = "setPermissions";
	type Output = BatchReport;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.profile_id)
			.await?
			.set_permissions(&self.paths, self.bits, self.recursive)
			.await
	}
}

fn permission_bits<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Bits {
		Number(u16),
		Octal(String),
	}

	match Bits::deserialize(deserializer)? {
		Bits::Number(bits) => Ok(bits),
		Bits::Octal(text) => u16::from_str_radix(text.trim_start_matches("0o"), 8)
			.map_err(|_| serde::de::Error::custom(format!("invalid octal permission {text:?}"))),
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
	pub profile_id: String,
	pub parent_path: String,
	pub local_path: PathBuf,
}

#[async_trait]
impl Operation for Upload {
	const METHOD: &'static str = "upload";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.profile_id)
			.await?
			.upload(&self.parent_path, &self.local_path, &ctx.cancel)
			.await
			.map(|_| true)
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
	pub profile_id: String,
	pub path: String,
	pub local_parent_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DownloadFile(pub Download);

#[async_trait]
impl Operation for DownloadFile {
	const METHOD: &'static str = "downloadFile";
	type Output = PathBuf;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.download_file(&self.0.path, &self.0.local_parent_path, &ctx.cancel)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DownloadFolder(pub Download);

#[async_trait]
impl Operation for DownloadFolder {
	const METHOD: &'static str = "downloadFolder";
	type Output = PathBuf;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.download_folder(&self.0.path, &self.0.local_parent_path, &ctx.cancel)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct PreviewContent(pub StatFile);

#[async_trait]
impl Operation for PreviewContent {
	const METHOD: &'static str = "previewContent";
	type Output = PreviewResult;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.preview(&self.0.path)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct ReadContent(pub StatFile);

#[async_trait]
impl Operation for ReadContent {
	const METHOD: &'static str = "readContent";
	type Output = FileContent;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.read_text(&self.0.path)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteContent {
	pub profile_id: String,
	pub path: String,
	pub content: String,
}

#[async_trait]
impl Operation for WriteContent {
	const METHOD: &'static str = "writeContent";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		if self.path.trim().is_empty() {
			return Err(Error::InvalidArgument("path must not be empty".into()));
		}
		ctx.namespace(&self.profile_id)
			.await?
			.write_text(&self.path, &self.content)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn permission_bits_accept_numbers_and_octal_strings() {
		let parse = |bits| {
			serde_json::from_value::<SetPermissions>(json!({
				"profileId": "p", "paths": ["/a"], "bits": bits
			}))
		};

		assert_eq!(parse(json!(493)).unwrap().bits, 0o755);
		assert_eq!(parse(json!("755")).unwrap().bits, 0o755);
		assert_eq!(parse(json!("1777")).unwrap().bits, 0o1777);
		assert!(parse(json!("9")).is_err());
		assert!(!parse(json!(420)).unwrap().recursive);
	}

	#[test]
	fn arguments_use_camel_case_keys() {
		let rename: RenameFile = serde_json::from_value(json!({
			"profileId": "p", "oldPath": "/a/b", "newName": "c", "requestId": "ignored"
		}))
		.unwrap();
		assert_eq!(rename.new_name, "c");
		assert!(!rename.overwrite);

		let dir: CreateDir = serde_json::from_value(json!({
			"profileId": "p", "parentPath": "/", "name": "x"
		}))
		.unwrap();
		assert_eq!(dir.0.parent_path, "/");
	}
}
