use async_trait::async_trait;
use serde::Deserialize;

use super::{files::StatFile, CallContext, Operation};
use crate::{
	domain::{AclDescriptor, AclEntry, AclEntryType, AclScope, FsAction},
	error::Result,
};

/// An ACL entry as flat call arguments
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntryArgs {
	pub profile_id: String,
	pub path: String,
	#[serde(rename = "type")]
	pub entry_type: AclEntryType,
	pub scope: AclScope,
	/// Ignored on removal
	#[serde(default)]
	pub permissions: FsAction,
	#[serde(default)]
	pub name: Option<String>,
}

impl AclEntryArgs {
	fn entry(&self) -> AclEntry {
		AclEntry::new(
			self.entry_type,
			self.scope,
			self.permissions,
			self.name.clone(),
		)
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct GetAcl(pub StatFile);

#[async_trait]
impl Operation for GetAcl {
	const METHOD: &'static str = "getAcl";
	type Output = AclDescriptor;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.get_acl(&self.0.path)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct AddAcl(pub AclEntryArgs);

#[async_trait]
impl Operation for AddAcl {
	const METHOD: &'static str = "addAcl";
	type Output = AclDescriptor;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.add_acl_entry(&self.0.path, &self.0.entry())
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct RemoveAcl(pub AclEntryArgs);

#[async_trait]
impl Operation for RemoveAcl {
	const METHOD: &'static str = "removeAcl";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.remove_acl_entry(&self.0.path, &self.0.entry())
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct RemoveDefaultAcl(pub StatFile);

#[async_trait]
impl Operation for RemoveDefaultAcl {
	const METHOD: &'static str = "removeDefaultAcl";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.remove_default_acl(&self.0.path)
			.await
	}
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct RemoveAllAcl(pub StatFile);

#[async_trait]
impl Operation for RemoveAllAcl {
	const METHOD: &'static str = "removeAllAcl";
	type Output = bool;

	async fn run(self, ctx: &CallContext<'_>) -> Result<Self::Output> {
		ctx.namespace(&self.0.profile_id)
			.await?
			.remove_all_acl(&self.0.path)
			.await
	}
}
