//! ACL manager
//!
//! Entries are validated locally before anything is sent, and results are
//! always read back from the remote so callers see the ACL the NameNode
//! actually applied (mask recalculation included).

use tracing::info;

use crate::{
	domain::{acl, path, AclDescriptor, AclEntry, AclScope},
	error::{Error, Result},
	ops::Namespace,
};

impl Namespace {
	pub async fn get_acl(&self, target: &str) -> Result<AclDescriptor> {
		let node = self.stat(target).await?;
		let status = self
			.call("get_acl", &node.path, self.backend().acl_status(&node.path))
			.await?;
		AclDescriptor::from_status(status, node)
	}

	/// Adds `entry`, or updates the permissions of the entry with the same
	/// scope, type and name.
	pub async fn add_acl_entry(&self, target: &str, entry: &AclEntry) -> Result<AclDescriptor> {
		entry.validate_for_update()?;

		let node = self.stat(target).await?;
		if entry.scope == AclScope::Default && !node.is_directory {
			return Err(Error::InvalidAclEntry(format!(
				"default entries are only valid on directories <path='{}'>",
				node.path
			)));
		}

		let spec = acl::to_spec([entry]);
		self.call(
			"add_acl",
			&node.path,
			self.backend().modify_acl_entries(&node.path, &spec),
		)
		.await?;

		info!(path = %node.path, entry = %spec, "Added ACL entry");
		self.get_acl(&node.path).await
	}

	/// Removes the entry matching `entry`'s scope, type and name. Returns
	/// `false` when there was no such entry.
	pub async fn remove_acl_entry(&self, target: &str, entry: &AclEntry) -> Result<bool> {
		entry.validate_for_removal()?;

		let current = self.get_acl(target).await?;
		if current.find(entry.key()).is_none() {
			return Ok(false);
		}

		let target = &current.file_status.path;
		let spec = entry.removal_spec();
		self.call(
			"remove_acl",
			target,
			self.backend().remove_acl_entries(target, &spec),
		)
		.await?;

		info!(path = %target, entry = %spec, "Removed ACL entry");
		Ok(true)
	}

	pub async fn remove_default_acl(&self, target: &str) -> Result<bool> {
		let target = path::normalize(target)?;
		self.call(
			"remove_default_acl",
			&target,
			self.backend().remove_default_acl(&target),
		)
		.await?;

		info!(path = %target, "Removed default ACL");
		Ok(true)
	}

	/// Drops every extended entry, leaving the base entries.
	pub async fn remove_all_acl(&self, target: &str) -> Result<bool> {
		let target = path::normalize(target)?;
		self.call("remove_all_acl", &target, self.backend().remove_acl(&target))
			.await?;

		info!(path = %target, "Removed ACL");
		Ok(true)
	}
}
