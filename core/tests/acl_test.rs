//! Integration tests for ACL management
//!
//! Results are read back after each change, so these check what the cluster
//! applied: mask recalculation, default entry completion and the base entries
//! rebuilt from the permission bits.

mod helpers;

use helpers::*;
use hx_core::domain::{AclEntry, AclEntryType, AclScope, FsAction};
use pretty_assertions::assert_eq;

fn entry(entry_type: AclEntryType, scope: AclScope, perms: &str, name: Option<&str>) -> AclEntry {
	AclEntry::new(
		entry_type,
		scope,
		perms.parse().unwrap(),
		name.map(str::to_string),
	)
}

fn specs(entries: &[AclEntry]) -> Vec<String> {
	entries.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_plain_file_has_only_base_entries() {
	let cluster = cluster();
	cluster.backend.put_file("/data/a.txt", "a");
	let ns = cluster.namespace().await.unwrap();

	let acl = ns.get_acl("/data/a.txt").await.unwrap();

	assert_eq!(specs(&acl.entries), vec!["user::rw-", "group::r--", "other::r--"]);
	assert!(!acl.has_extended_entries());
	assert_eq!(acl.owner, "hdfs");
	assert_eq!(acl.group, "supergroup");
	assert_eq!(acl.file_status.path, "/data/a.txt");
}

#[tokio::test]
async fn test_named_entries_recalculate_the_mask() {
	let cluster = cluster();
	cluster.backend.put_file("/data/a.txt", "a");
	let ns = cluster.namespace().await.unwrap();

	let acl = ns
		.add_acl_entry(
			"/data/a.txt",
			&entry(AclEntryType::User, AclScope::Access, "rwx", Some("alice")),
		)
		.await
		.unwrap();

	assert_eq!(
		specs(&acl.entries),
		vec![
			"user::rw-",
			"user:alice:rwx",
			"group::r--",
			"mask::rwx",
			"other::r--"
		]
	);
	assert_eq!(acl.permission_bits, 0o674);

	// updating the same entry replaces its permissions
	let acl = ns
		.add_acl_entry(
			"/data/a.txt",
			&entry(AclEntryType::User, AclScope::Access, "r--", Some("alice")),
		)
		.await
		.unwrap();

	let alice = acl
		.find((AclScope::Access, AclEntryType::User, Some("alice")))
		.unwrap();
	assert_eq!(alice.permissions, "r--".parse::<FsAction>().unwrap());
	assert_eq!(
		acl.find((AclScope::Access, AclEntryType::Mask, None))
			.unwrap()
			.permissions
			.to_string(),
		"r--"
	);
	assert_eq!(acl.entries.len(), 5);
}

#[tokio::test]
async fn test_remove_named_entry() {
	let cluster = cluster();
	cluster.backend.put_dir("/data");
	let ns = cluster.namespace().await.unwrap();
	let analysts = entry(AclEntryType::Group, AclScope::Access, "r-x", Some("analysts"));

	ns.add_acl_entry("/data", &analysts).await.unwrap();

	assert!(ns.remove_acl_entry("/data", &analysts).await.unwrap());
	assert!(!ns.remove_acl_entry("/data", &analysts).await.unwrap());

	let acl = ns.get_acl("/data").await.unwrap();
	assert!(acl
		.find((AclScope::Access, AclEntryType::Group, Some("analysts")))
		.is_none());
	assert!(!acl.has_extended_entries());
}

#[tokio::test]
async fn test_default_entries_only_on_directories() {
	let cluster = cluster();
	cluster.backend.put_file("/data/a.txt", "a");
	let ns = cluster.namespace().await.unwrap();
	let bob = entry(AclEntryType::User, AclScope::Default, "r-x", Some("bob"));

	let err = ns.add_acl_entry("/data/a.txt", &bob).await.unwrap_err();
	assert_eq!(err.code(), "INVALID_ACL_ENTRY");

	let acl = ns.add_acl_entry("/data", &bob).await.unwrap();
	for key in [
		(AclScope::Default, AclEntryType::User, Some("bob")),
		(AclScope::Default, AclEntryType::User, None),
		(AclScope::Default, AclEntryType::Group, None),
		(AclScope::Default, AclEntryType::Mask, None),
		(AclScope::Default, AclEntryType::Other, None),
	] {
		assert!(acl.find(key).is_some(), "{key:?} missing from {:?}", specs(&acl.entries));
	}
	// the access ACL is untouched
	assert!(acl.find((AclScope::Access, AclEntryType::Mask, None)).is_none());

	assert!(ns.remove_default_acl("/data").await.unwrap());
	let acl = ns.get_acl("/data").await.unwrap();
	assert!(acl.entries.iter().all(|e| e.scope == AclScope::Access));
}

#[tokio::test]
async fn test_remove_all_acl_restores_group_bits() {
	let cluster = cluster();
	cluster.backend.put_dir("/data");
	let ns = cluster.namespace().await.unwrap();

	ns.add_acl_entry(
		"/data",
		&entry(AclEntryType::User, AclScope::Access, "rwx", Some("alice")),
	)
	.await
	.unwrap();
	ns.add_acl_entry(
		"/data",
		&entry(AclEntryType::Group, AclScope::Default, "r--", Some("ops")),
	)
	.await
	.unwrap();

	assert!(ns.remove_all_acl("/data").await.unwrap());

	let acl = ns.get_acl("/data").await.unwrap();
	assert_eq!(specs(&acl.entries), vec!["user::rwx", "group::r-x", "other::r-x"]);
	assert_eq!(acl.permission_bits, 0o755);
}

#[tokio::test]
async fn test_malformed_entries_are_rejected_before_any_call() {
	let cluster = cluster();
	cluster.backend.put_dir("/data");
	let ns = cluster.namespace().await.unwrap();
	let calls = cluster.backend.call_count();

	let unnamed_user = entry(AclEntryType::User, AclScope::Access, "rwx", None);
	let named_mask = entry(AclEntryType::Mask, AclScope::Access, "rwx", Some("m"));
	let base_other = entry(AclEntryType::Other, AclScope::Access, "---", None);

	for err in [
		ns.add_acl_entry("/data", &unnamed_user).await.unwrap_err(),
		ns.add_acl_entry("/data", &named_mask).await.unwrap_err(),
		ns.remove_acl_entry("/data", &base_other).await.unwrap_err(),
	] {
		assert_eq!(err.code(), "INVALID_ACL_ENTRY");
	}
	assert_eq!(cluster.backend.call_count(), calls);
}
