//! POSIX ACL model in the form HDFS speaks it.
//!
//! Entries travel as ACL spec strings: `[default:]<type>:[<name>]:<perms>`,
//! for example `user:alice:rw-` or `default:group::r-x`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use super::file::FileNode;
use crate::{
	backend::RawAclStatus,
	error::{Error, Result},
};

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	Display,
	EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AclEntryType {
	User,
	Group,
	Mask,
	Other,
}

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	Display,
	EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AclScope {
	Access,
	Default,
}

/// `rwx` permission triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FsAction(u8);

impl FsAction {
	pub const NONE: Self = Self(0);
	pub const ALL: Self = Self(0o7);

	pub fn from_bits(bits: u16) -> Self {
		Self((bits & 0o7) as u8)
	}

	pub fn bits(self) -> u16 {
		u16::from(self.0)
	}

	pub fn union(self, other: Self) -> Self {
		Self(self.0 | other.0)
	}
}

impl fmt::Display for FsAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let flag = |bit: u8, c: char| if self.0 & bit != 0 { c } else { '-' };
		write!(f, "{}{}{}", flag(4, 'r'), flag(2, 'w'), flag(1, 'x'))
	}
}

impl FromStr for FsAction {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let invalid = || Error::InvalidAclEntry(format!("invalid permission string {s:?}"));

		let chars: Vec<char> = s.chars().collect();
		let &[r, w, x] = chars.as_slice() else {
			return Err(invalid());
		};

		let mut bits = 0;
		for (c, expected, bit) in [(r, 'r', 4), (w, 'w', 2), (x, 'x', 1)] {
			match c {
				'-' => {}
				c if c == expected => bits |= bit,
				_ => return Err(invalid()),
			}
		}

		Ok(Self(bits))
	}
}

impl Serialize for FsAction {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for FsAction {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
	#[serde(rename = "type")]
	pub entry_type: AclEntryType,
	pub scope: AclScope,
	pub permissions: FsAction,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

impl AclEntry {
	pub fn new(
		entry_type: AclEntryType,
		scope: AclScope,
		permissions: FsAction,
		name: Option<String>,
	) -> Self {
		Self {
			entry_type,
			scope,
			permissions,
			name: name.filter(|n| !n.is_empty()),
		}
	}

	/// Identity of an entry within an ACL, permissions aside.
	pub fn key(&self) -> (AclScope, AclEntryType, Option<&str>) {
		(self.scope, self.entry_type, self.name.as_deref())
	}

	pub fn is_named(&self) -> bool {
		self.name.is_some()
	}

	/// Rules for entries a caller asks to add: `user` and `group` need a name,
	/// `mask` and `other` must not have one.
	pub fn validate_for_update(&self) -> Result<()> {
		match (self.entry_type, self.is_named()) {
			(AclEntryType::User | AclEntryType::Group, false) => Err(Error::InvalidAclEntry(
				format!("a {} entry needs a name", self.entry_type),
			)),
			(AclEntryType::Mask | AclEntryType::Other, true) => Err(Error::InvalidAclEntry(
				format!("a {} entry cannot be named", self.entry_type),
			)),
			_ => Ok(()),
		}
	}

	/// Only named `user` and `group` entries can be removed individually, the
	/// base entries always stay.
	pub fn validate_for_removal(&self) -> Result<()> {
		match (self.entry_type, self.is_named()) {
			(AclEntryType::User | AclEntryType::Group, true) => Ok(()),
			_ => Err(Error::InvalidAclEntry(format!(
				"the {} {} base entry cannot be removed",
				self.scope, self.entry_type
			))),
		}
	}

	fn scope_prefix(&self) -> &'static str {
		match self.scope {
			AclScope::Access => "",
			AclScope::Default => "default:",
		}
	}

	/// Spec without permissions, as `REMOVEACLENTRIES` expects.
	pub fn removal_spec(&self) -> String {
		format!(
			"{}{}:{}",
			self.scope_prefix(),
			self.entry_type,
			self.name.as_deref().unwrap_or_default()
		)
	}
}

impl fmt::Display for AclEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}{}:{}:{}",
			self.scope_prefix(),
			self.entry_type,
			self.name.as_deref().unwrap_or_default(),
			self.permissions
		)
	}
}

impl FromStr for AclEntry {
	type Err = Error;

	fn from_str(spec: &str) -> Result<Self> {
		let invalid = || Error::InvalidAclEntry(format!("malformed ACL spec {spec:?}"));

		let (scope, rest) = match spec.strip_prefix("default:") {
			Some(rest) => (AclScope::Default, rest),
			None => (AclScope::Access, spec),
		};

		let mut parts = rest.splitn(3, ':');
		let (Some(entry_type), Some(name), Some(perms)) = (parts.next(), parts.next(), parts.next())
		else {
			return Err(invalid());
		};

		let entry_type = entry_type.parse().map_err(|_| invalid())?;

		Ok(Self::new(
			entry_type,
			scope,
			perms.parse()?,
			Some(name.to_string()),
		))
	}
}

/// Joins entries into a comma separated ACL spec.
pub fn to_spec<'a>(entries: impl IntoIterator<Item = &'a AclEntry>) -> String {
	entries
		.into_iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(",")
}

/// Full ACL of one path, base entries included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AclDescriptor {
	pub owner: String,
	pub group: String,
	pub sticky: bool,
	pub permission_bits: u16,
	pub entries: Vec<AclEntry>,
	pub file_status: FileNode,
}

impl AclDescriptor {
	/// Rebuilds the logical ACL from what the remote reports.
	///
	/// The remote only lists extended entries. Owner and other come from the
	/// permission bits. Once an extended ACL exists the group bits hold the
	/// mask and the owning group shows up as an unnamed `group` entry.
	pub fn from_status(status: RawAclStatus, file_status: FileNode) -> Result<Self> {
		let reported = status
			.entries
			.iter()
			.map(|spec| spec.parse::<AclEntry>())
			.collect::<Result<Vec<_>>>()?;

		let (access, default): (Vec<_>, Vec<_>) = reported
			.into_iter()
			.partition(|e| e.scope == AclScope::Access);

		let base = |entry_type, shift: u16| {
			AclEntry::new(
				entry_type,
				AclScope::Access,
				FsAction::from_bits(status.permission >> shift),
				None,
			)
		};

		let mut entries = vec![base(AclEntryType::User, 6)];

		let extended = !access.is_empty();
		let owning_group = access
			.iter()
			.find(|e| e.entry_type == AclEntryType::Group && !e.is_named())
			.cloned()
			.unwrap_or_else(|| base(AclEntryType::Group, 3));

		entries.extend(
			access
				.iter()
				.filter(|e| e.entry_type == AclEntryType::User && e.is_named())
				.cloned(),
		);
		entries.push(owning_group);
		entries.extend(
			access
				.iter()
				.filter(|e| e.entry_type == AclEntryType::Group && e.is_named())
				.cloned(),
		);
		if extended {
			entries.push(base(AclEntryType::Mask, 3));
		}
		entries.push(base(AclEntryType::Other, 0));
		entries.extend(default);

		Ok(Self {
			owner: status.owner,
			group: status.group,
			sticky: status.sticky,
			permission_bits: status.permission,
			entries,
			file_status,
		})
	}

	pub fn find(&self, key: (AclScope, AclEntryType, Option<&str>)) -> Option<&AclEntry> {
		self.entries.iter().find(|e| e.key() == key)
	}

	/// Whether anything beyond the base `user`/`group`/`other` entries is set.
	pub fn has_extended_entries(&self) -> bool {
		self.entries.len() > 3
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::RawFileStatus;
	use pretty_assertions::assert_eq;

	fn descriptor(permission: u16, entries: &[&str]) -> AclDescriptor {
		AclDescriptor::from_status(
			RawAclStatus {
				owner: "alice".into(),
				group: "staff".into(),
				sticky: false,
				permission,
				entries: entries.iter().map(|s| s.to_string()).collect(),
			},
			FileNode::from_raw("/data", RawFileStatus::default()),
		)
		.unwrap()
	}

	#[test]
	fn specs_round_trip() {
		for spec in ["user:bob:rw-", "default:group::r-x", "mask::rwx", "other::---"] {
			assert_eq!(spec.parse::<AclEntry>().unwrap().to_string(), spec);
		}

		let entry: AclEntry = "default:user:bob:r--".parse().unwrap();
		assert_eq!(entry.scope, AclScope::Default);
		assert_eq!(entry.name.as_deref(), Some("bob"));
		assert_eq!(entry.removal_spec(), "default:user:bob");

		assert!("user:bob".parse::<AclEntry>().is_err());
		assert!("owner::rwx".parse::<AclEntry>().is_err());
		assert!("user:bob:rwz".parse::<AclEntry>().is_err());
	}

	#[test]
	fn validation_rules() {
		let entry = |t, name: Option<&str>| {
			AclEntry::new(t, AclScope::Access, FsAction::ALL, name.map(str::to_string))
		};

		assert!(entry(AclEntryType::User, Some("bob")).validate_for_update().is_ok());
		assert!(entry(AclEntryType::User, None).validate_for_update().is_err());
		assert!(entry(AclEntryType::Group, Some("")).validate_for_update().is_err());
		assert!(entry(AclEntryType::Mask, None).validate_for_update().is_ok());
		assert!(entry(AclEntryType::Other, Some("x")).validate_for_update().is_err());

		assert!(entry(AclEntryType::Group, Some("ops")).validate_for_removal().is_ok());
		assert!(entry(AclEntryType::Other, None).validate_for_removal().is_err());
	}

	#[test]
	fn plain_permissions_yield_three_base_entries() {
		let acl = descriptor(0o750, &[]);

		assert_eq!(
			acl.entries.iter().map(ToString::to_string).collect::<Vec<_>>(),
			vec!["user::rwx", "group::r-x", "other::---"]
		);
		assert!(!acl.has_extended_entries());
	}

	#[test]
	fn extended_acl_exposes_mask_from_group_bits() {
		let acl = descriptor(0o770, &["user:bob:r--", "group::r-x", "default:user::rwx"]);

		assert_eq!(
			acl.entries.iter().map(ToString::to_string).collect::<Vec<_>>(),
			vec![
				"user::rwx",
				"user:bob:r--",
				"group::r-x",
				"mask::rwx",
				"other::---",
				"default:user::rwx"
			]
		);
		assert!(acl
			.find((AclScope::Access, AclEntryType::User, Some("bob")))
			.is_some());
	}

	#[test]
	fn entries_serialise_with_symbolic_permissions() {
		let entry: AclEntry = "user:bob:r-x".parse().unwrap();
		assert_eq!(
			serde_json::to_value(&entry).unwrap(),
			serde_json::json!({"type": "user", "scope": "access", "permissions": "r-x", "name": "bob"})
		);
	}
}
