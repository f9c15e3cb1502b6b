//! In-process HDFS namespace
//!
//! Emulates the NameNode behaviours the gateway relies on: boolean rename and
//! delete, the replacing `rename2`, parent creation on `create`, permission
//! bits with a sticky bit, and POSIX ACLs stored the way HDFS stores them
//! (named entries plus the owning group, with the mask folded into the group
//! permission bits). Failures and latency can be injected per path or per
//! operation, which is what most of the tests use it for.

use std::{
	collections::{BTreeMap, HashMap},
	ops::Range,
	sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
	time::Duration,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{
	BackendError, BackendErrorKind, BackendType, ByteStream, HdfsBackend, RawAclStatus,
	RawFileStatus,
};
use crate::domain::{
	acl::{AclEntry, AclEntryType, AclScope, FsAction},
	path,
};

const DEFAULT_GROUP: &str = "supergroup";
const OPEN_CHUNK: usize = 64 * 1024;
const BLOCK_SIZE: u64 = 128 * 1024 * 1024;

#[derive(Debug, Clone)]
struct Node {
	is_dir: bool,
	data: Bytes,
	owner: String,
	group: String,
	permission: u16,
	modification_time: i64,
	access_time: i64,
	file_id: u64,
	/// Extended entries as the remote reports them
	acl: Vec<AclEntry>,
}

/// In-memory backend
#[derive(Debug)]
pub struct MemoryBackend {
	user: String,
	nodes: RwLock<BTreeMap<String, Node>>,
	failures: Mutex<HashMap<String, BackendErrorKind>>,
	operation_failures: Mutex<HashMap<&'static str, BackendErrorKind>>,
	latency: Mutex<Option<Duration>>,
	next_id: AtomicU64,
	calls: AtomicUsize,
	closed: AtomicBool,
}

impl MemoryBackend {
	/// A namespace with `/`, `/tmp` and the home directory of `user`.
	pub fn new(user: impl Into<String>) -> Self {
		let backend = Self {
			user: user.into(),
			nodes: RwLock::new(BTreeMap::new()),
			failures: Mutex::new(HashMap::new()),
			operation_failures: Mutex::new(HashMap::new()),
			latency: Mutex::new(None),
			next_id: AtomicU64::new(16_385),
			calls: AtomicUsize::new(0),
			closed: AtomicBool::new(false),
		};

		{
			let mut nodes = backend.nodes.write();
			let root = backend.new_node(true, Bytes::new(), 0o755);
			nodes.insert(path::ROOT.to_string(), root);
		}
		backend.put_dir("/tmp");
		backend.put_dir(&format!("/user/{}", backend.user));

		backend
	}

	fn new_node(&self, is_dir: bool, data: Bytes, permission: u16) -> Node {
		let now = Utc::now().timestamp_millis();
		Node {
			is_dir,
			data,
			owner: self.user.clone(),
			group: DEFAULT_GROUP.to_string(),
			permission,
			modification_time: now,
			access_time: if is_dir { 0 } else { now },
			file_id: self.next_id.fetch_add(1, Ordering::Relaxed),
			acl: Vec::new(),
		}
	}

	/// Creates a directory and its parents, bypassing failure injection.
	pub fn put_dir(&self, dir: &str) {
		let mut nodes = self.nodes.write();
		if let Err(e) = self.ensure_dirs(&mut nodes, dir, 0o755) {
			warn!(%e, dir, "MemoryBackend::put_dir skipped");
		}
	}

	/// Writes a file, creating parents, bypassing failure injection.
	pub fn put_file(&self, file: &str, data: impl Into<Bytes>) {
		let mut nodes = self.nodes.write();
		if let Err(e) = self.ensure_dirs(&mut nodes, path::parent(file), 0o755) {
			warn!(%e, file, "MemoryBackend::put_file skipped");
			return;
		}
		let node = self.new_node(false, data.into(), 0o644);
		nodes.insert(file.to_string(), node);
	}

	pub fn read_file(&self, file: &str) -> Option<Bytes> {
		self.nodes
			.read()
			.get(file)
			.filter(|n| !n.is_dir)
			.map(|n| n.data.clone())
	}

	pub fn exists(&self, path: &str) -> bool {
		self.nodes.read().contains_key(path)
	}

	pub fn is_dir(&self, path: &str) -> bool {
		self.nodes.read().get(path).is_some_and(|n| n.is_dir)
	}

	pub fn permission(&self, path: &str) -> Option<u16> {
		self.nodes.read().get(path).map(|n| n.permission)
	}

	/// Every path below (and including) `root`, sorted.
	pub fn paths_under(&self, root: &str) -> Vec<String> {
		self.nodes
			.read()
			.keys()
			.filter(|k| path::is_within(k, root))
			.cloned()
			.collect()
	}

	/// Makes every call touching exactly `path` fail with `kind`.
	pub fn inject_failure(&self, path: &str, kind: BackendErrorKind) {
		self.failures.lock().insert(path.to_string(), kind);
	}

	/// Makes every call of `operation` (`"rename"`, `"delete"`, ...) fail.
	pub fn fail_operation(&self, operation: &'static str, kind: BackendErrorKind) {
		self.operation_failures.lock().insert(operation, kind);
	}

	pub fn clear_failures(&self) {
		self.failures.lock().clear();
		self.operation_failures.lock().clear();
	}

	/// Delays every call, for timeout tests.
	pub fn set_latency(&self, latency: Option<Duration>) {
		*self.latency.lock() = latency;
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Accepts calls again after [`HdfsBackend::close`], keeping the namespace.
	pub fn reopen(&self) {
		self.closed.store(false, Ordering::SeqCst);
	}

	async fn enter(&self, operation: &str, paths: &[&str]) -> Result<(), BackendError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		debug!(operation, ?paths, "MemoryBackend call");

		let latency = *self.latency.lock();
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}

		if self.is_closed() {
			return Err(BackendError::new(
				BackendErrorKind::Connection,
				"client is closed",
			));
		}

		if let Some(kind) = self.operation_failures.lock().get(operation) {
			return Err(BackendError::new(
				*kind,
				format!("injected failure for {operation}"),
			));
		}

		let failures = self.failures.lock();
		for p in paths {
			if let Some(kind) = failures.get(*p) {
				return Err(BackendError::new(
					*kind,
					format!("injected failure for {operation} on {p}"),
				));
			}
		}

		Ok(())
	}

	fn ensure_dirs(
		&self,
		nodes: &mut BTreeMap<String, Node>,
		dir: &str,
		permission: u16,
	) -> Result<(), BackendError> {
		let mut current = String::new();
		for segment in dir.split('/').filter(|s| !s.is_empty()) {
			current.push('/');
			current.push_str(segment);

			match nodes.get(&current) {
				Some(node) if node.is_dir => {}
				Some(_) => {
					return Err(BackendError::new(
						BackendErrorKind::NotADirectory,
						format!("Parent path is not a directory: {current}"),
					))
				}
				None => {
					let node = self.new_node(true, Bytes::new(), permission);
					nodes.insert(current.clone(), node);
				}
			}
		}
		Ok(())
	}

	fn status(nodes: &BTreeMap<String, Node>, node_path: &str, node: &Node, suffix: &str) -> RawFileStatus {
		RawFileStatus {
			path_suffix: suffix.to_string(),
			is_directory: node.is_dir,
			length: node.data.len() as u64,
			owner: node.owner.clone(),
			group: node.group.clone(),
			permission: node.permission,
			modification_time: node.modification_time,
			access_time: node.access_time,
			block_size: if node.is_dir { 0 } else { BLOCK_SIZE },
			replication: if node.is_dir { 0 } else { 3 },
			file_id: Some(node.file_id),
			children_num: Some(children(nodes, node_path).count() as u64),
			storage_policy: Some(0),
			symlink: None,
			acl_bit: !node.acl.is_empty(),
			enc_bit: false,
			ec_bit: false,
		}
	}

	fn update_acl(
		&self,
		target: &str,
		update: impl FnOnce(&mut LogicalAcl) -> Result<(), BackendError>,
	) -> Result<(), BackendError> {
		let mut nodes = self.nodes.write();
		let node = nodes
			.get_mut(target)
			.ok_or_else(|| BackendError::not_found(target))?;

		let mut acl = LogicalAcl::load(node);
		update(&mut acl)?;
		if !node.is_dir && !acl.default.is_empty() {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				"Invalid ACL: only directories may have a default ACL",
			));
		}
		acl.store(node);
		node.modification_time = Utc::now().timestamp_millis();
		Ok(())
	}
}

fn children<'a>(
	nodes: &'a BTreeMap<String, Node>,
	dir: &str,
) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
	let prefix = if dir == path::ROOT {
		path::ROOT.to_string()
	} else {
		format!("{dir}/")
	};

	nodes
		.range(prefix.clone()..)
		.take_while({
			let prefix = prefix.clone();
			move |(k, _)| k.starts_with(&prefix)
		})
		.filter(move |(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
}

/// rename2 with OVERWRITE: checks and replacement happen under one lock.
fn replace_into(nodes: &mut BTreeMap<String, Node>, from: &str, to: &str) -> Result<(), BackendError> {
	let invalid = |message: String| BackendError::new(BackendErrorKind::InvalidArgument, message);

	if from == path::ROOT || to == path::ROOT {
		return Err(invalid("The root cannot be renamed or replaced".into()));
	}
	if path::is_within(to, from) {
		return Err(invalid(format!("Cannot rename {from} into its own subtree {to}")));
	}
	let source_is_dir = nodes
		.get(from)
		.ok_or_else(|| BackendError::not_found(from))?
		.is_dir;
	if !nodes.get(path::parent(to)).is_some_and(|n| n.is_dir) {
		return Err(BackendError::not_found(path::parent(to)));
	}

	if let Some(existing) = nodes.get(to) {
		if existing.is_dir != source_is_dir {
			return Err(invalid(format!(
				"Source {from} and destination {to} must both be directories or both be files"
			)));
		}
		if existing.is_dir && children(nodes, to).next().is_some() {
			return Err(invalid(format!("Rename destination directory is not empty: {to}")));
		}
		nodes.remove(to);
	}

	move_subtree(nodes, from, to);
	Ok(())
}

fn move_subtree(nodes: &mut BTreeMap<String, Node>, from: &str, target: &str) {
	let moved = nodes
		.keys()
		.filter(|k| path::is_within(k, from))
		.cloned()
		.collect::<Vec<_>>();
	for key in moved {
		if let Some(mut node) = nodes.remove(&key) {
			if key == from {
				node.modification_time = Utc::now().timestamp_millis();
			}
			nodes.insert(format!("{target}{}", &key[from.len()..]), node);
		}
	}
}

fn parse_specs(spec: &str, append: &str) -> Result<Vec<AclEntry>, BackendError> {
	spec.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| {
			format!("{s}{append}")
				.parse::<AclEntry>()
				.map_err(|e| BackendError::new(BackendErrorKind::InvalidArgument, e.to_string()))
		})
		.collect()
}

/// Full ACL of a node, base entries and masks included.
struct LogicalAcl {
	user: FsAction,
	group: FsAction,
	other: FsAction,
	named: Vec<AclEntry>,
	mask: Option<FsAction>,
	default: Vec<AclEntry>,
	mask_given: bool,
}

impl LogicalAcl {
	fn load(node: &Node) -> Self {
		let bits = |shift: u16| FsAction::from_bits(node.permission >> shift);
		let access = node.acl.iter().filter(|e| e.scope == AclScope::Access);

		let owning_group = access
			.clone()
			.find(|e| e.entry_type == AclEntryType::Group && !e.is_named())
			.map(|e| e.permissions);

		Self {
			user: bits(6),
			group: owning_group.unwrap_or_else(|| bits(3)),
			other: bits(0),
			named: access.filter(|e| e.is_named()).cloned().collect(),
			mask: owning_group.map(|_| bits(3)),
			default: node
				.acl
				.iter()
				.filter(|e| e.scope == AclScope::Default)
				.cloned()
				.collect(),
			mask_given: false,
		}
	}

	fn merge(&mut self, entry: AclEntry) {
		if entry.scope == AclScope::Default {
			upsert(&mut self.default, entry);
			return;
		}

		match (entry.entry_type, entry.is_named()) {
			(AclEntryType::User, false) => self.user = entry.permissions,
			(AclEntryType::Group, false) => self.group = entry.permissions,
			(AclEntryType::Other, _) => self.other = entry.permissions,
			(AclEntryType::Mask, _) => {
				self.mask = Some(entry.permissions);
				self.mask_given = true;
			}
			_ => upsert(&mut self.named, entry),
		}
	}

	fn remove(&mut self, entry: &AclEntry) {
		let list = match entry.scope {
			AclScope::Access => &mut self.named,
			AclScope::Default => &mut self.default,
		};
		list.retain(|e| e.key() != entry.key());
	}

	fn store(mut self, node: &mut Node) {
		if self.named.is_empty() {
			self.mask = None;
		} else if !self.mask_given || self.mask.is_none() {
			let union = self
				.named
				.iter()
				.fold(self.group, |acc, e| acc.union(e.permissions));
			self.mask = Some(union);
		}

		self.complete_default();

		let group_bits = self.mask.unwrap_or(self.group);
		node.permission = (node.permission & 0o1000)
			| (self.user.bits() << 6)
			| (group_bits.bits() << 3)
			| self.other.bits();

		let mut acl = Vec::new();
		if self.mask.is_some() {
			acl.extend(self.named);
			acl.push(AclEntry::new(
				AclEntryType::Group,
				AclScope::Access,
				self.group,
				None,
			));
		}
		acl.extend(self.default);
		acl.sort_by(|a, b| {
			(a.scope, a.entry_type, a.name.as_deref()).cmp(&(b.scope, b.entry_type, b.name.as_deref()))
		});
		node.acl = acl;
	}

	/// A default ACL always carries its own base entries, copied from the
	/// access ACL when the caller did not give them, plus a mask once named
	/// entries exist.
	fn complete_default(&mut self) {
		if self.default.is_empty() {
			return;
		}

		let base = [
			(AclEntryType::User, self.user),
			(AclEntryType::Group, self.group),
			(AclEntryType::Other, self.other),
		];
		for (entry_type, permissions) in base {
			let key = (AclScope::Default, entry_type, None);
			if !self.default.iter().any(|e| e.key() == key) {
				self.default
					.push(AclEntry::new(entry_type, AclScope::Default, permissions, None));
			}
		}

		let named = self.default.iter().filter(|e| e.is_named());
		let has_mask = self
			.default
			.iter()
			.any(|e| e.entry_type == AclEntryType::Mask);
		if named.clone().next().is_some() && !has_mask {
			let group = self
				.default
				.iter()
				.find(|e| e.entry_type == AclEntryType::Group && !e.is_named())
				.map_or(FsAction::NONE, |e| e.permissions);
			let mask = named.fold(group, |acc, e| acc.union(e.permissions));
			self.default
				.push(AclEntry::new(AclEntryType::Mask, AclScope::Default, mask, None));
		}
	}
}

fn upsert(list: &mut Vec<AclEntry>, entry: AclEntry) {
	match list.iter_mut().find(|e| e.key() == entry.key()) {
		Some(existing) => existing.permissions = entry.permissions,
		None => list.push(entry),
	}
}

#[async_trait]
impl HdfsBackend for MemoryBackend {
	async fn file_status(&self, target: &str) -> Result<RawFileStatus, BackendError> {
		self.enter("file_status", &[target]).await?;

		let nodes = self.nodes.read();
		let node = nodes
			.get(target)
			.ok_or_else(|| BackendError::not_found(target))?;
		Ok(Self::status(&nodes, target, node, ""))
	}

	async fn list_status(&self, dir: &str) -> Result<Vec<RawFileStatus>, BackendError> {
		self.enter("list_status", &[dir]).await?;

		let nodes = self.nodes.read();
		let node = nodes.get(dir).ok_or_else(|| BackendError::not_found(dir))?;
		if !node.is_dir {
			return Ok(vec![Self::status(&nodes, dir, node, "")]);
		}

		Ok(children(&nodes, dir)
			.map(|(k, child)| Self::status(&nodes, k, child, path::file_name(k)))
			.collect())
	}

	async fn mkdirs(&self, dir: &str, permission: u16) -> Result<bool, BackendError> {
		self.enter("mkdirs", &[dir]).await?;

		let mut nodes = self.nodes.write();
		if nodes.get(dir).is_some_and(|n| !n.is_dir) {
			return Err(BackendError::new(
				BackendErrorKind::AlreadyExists,
				format!("Path is not a directory: {dir}"),
			));
		}
		self.ensure_dirs(&mut nodes, dir, permission)?;
		Ok(true)
	}

	async fn create(
		&self,
		file: &str,
		mut data: ByteStream,
		overwrite: bool,
	) -> Result<(), BackendError> {
		self.enter("create", &[file, path::parent(file)]).await?;

		{
			let mut nodes = self.nodes.write();
			match nodes.get(file) {
				Some(node) if node.is_dir => {
					return Err(BackendError::new(
						BackendErrorKind::AlreadyExists,
						format!("{file} already exists as a directory"),
					))
				}
				Some(_) if !overwrite => {
					return Err(BackendError::new(
						BackendErrorKind::AlreadyExists,
						format!("{file} for client already exists"),
					))
				}
				_ => {}
			}
			self.ensure_dirs(&mut nodes, path::parent(file), 0o755)?;
			let node = self.new_node(false, Bytes::new(), 0o644);
			nodes.insert(file.to_string(), node);
		}

		// Bytes become visible as they arrive, so a broken upload leaves a
		// partial file behind like a real DataNode pipeline would.
		let mut written = BytesMut::new();
		while let Some(chunk) = data.next().await {
			let chunk = chunk.map_err(|e| {
				BackendError::new(BackendErrorKind::Other, format!("upload stream failed: {e}"))
			})?;
			written.extend_from_slice(&chunk);
			if let Some(node) = self.nodes.write().get_mut(file) {
				node.data = Bytes::copy_from_slice(&written);
			}
		}

		Ok(())
	}

	async fn read_range(&self, file: &str, range: Range<u64>) -> Result<Bytes, BackendError> {
		self.enter("read_range", &[file]).await?;

		let nodes = self.nodes.read();
		let node = nodes.get(file).ok_or_else(|| BackendError::not_found(file))?;
		if node.is_dir {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				format!("Path is not a file: {file}"),
			));
		}

		let len = node.data.len() as u64;
		if range.start > len || range.start > range.end {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				format!("Offset={} out of the range [0, {len})", range.start),
			));
		}

		Ok(node
			.data
			.slice(range.start as usize..range.end.min(len) as usize))
	}

	async fn open(&self, file: &str) -> Result<ByteStream, BackendError> {
		self.enter("open", &[file]).await?;

		let nodes = self.nodes.read();
		let node = nodes.get(file).ok_or_else(|| BackendError::not_found(file))?;
		if node.is_dir {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				format!("Path is not a file: {file}"),
			));
		}

		let data = node.data.clone();
		let chunks = (0..data.len())
			.step_by(OPEN_CHUNK)
			.map(|start| Ok(data.slice(start..(start + OPEN_CHUNK).min(data.len()))))
			.collect::<Vec<_>>();

		Ok(Box::pin(stream::iter(chunks)))
	}

	async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<bool, BackendError> {
		self.enter("rename", &[from, to]).await?;

		let mut nodes = self.nodes.write();
		if overwrite {
			return replace_into(&mut nodes, from, to).map(|()| true);
		}

		if from == path::ROOT || !nodes.contains_key(from) || path::is_within(to, from) {
			return Ok(false);
		}

		let target = match nodes.get(to) {
			Some(node) if node.is_dir => path::join(to, path::file_name(from)),
			Some(_) => return Ok(false),
			None => to.to_string(),
		};
		if nodes.contains_key(&target) || !nodes.get(path::parent(&target)).is_some_and(|n| n.is_dir)
		{
			return Ok(false);
		}

		move_subtree(&mut nodes, from, &target);
		Ok(true)
	}

	async fn delete(&self, target: &str, recursive: bool) -> Result<bool, BackendError> {
		self.enter("delete", &[target]).await?;

		let mut nodes = self.nodes.write();
		if target == path::ROOT {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				"Cannot delete the root directory",
			));
		}
		if !nodes.contains_key(target) {
			return Ok(false);
		}
		if !recursive && children(&nodes, target).next().is_some() {
			return Err(BackendError::new(
				BackendErrorKind::InvalidArgument,
				format!("{target} is non empty"),
			));
		}

		nodes.retain(|k, _| !path::is_within(k, target));
		Ok(true)
	}

	async fn set_permission(&self, target: &str, permission: u16) -> Result<(), BackendError> {
		self.enter("set_permission", &[target]).await?;

		let mut nodes = self.nodes.write();
		let node = nodes
			.get_mut(target)
			.ok_or_else(|| BackendError::not_found(target))?;
		node.permission = permission;
		Ok(())
	}

	async fn acl_status(&self, target: &str) -> Result<RawAclStatus, BackendError> {
		self.enter("acl_status", &[target]).await?;

		let nodes = self.nodes.read();
		let node = nodes
			.get(target)
			.ok_or_else(|| BackendError::not_found(target))?;

		Ok(RawAclStatus {
			owner: node.owner.clone(),
			group: node.group.clone(),
			sticky: node.permission & 0o1000 != 0,
			permission: node.permission,
			entries: node.acl.iter().map(ToString::to_string).collect(),
		})
	}

	async fn modify_acl_entries(&self, target: &str, spec: &str) -> Result<(), BackendError> {
		self.enter("modify_acl_entries", &[target]).await?;

		let entries = parse_specs(spec, "")?;
		self.update_acl(target, |acl| {
			entries.into_iter().for_each(|e| acl.merge(e));
			Ok(())
		})
	}

	async fn remove_acl_entries(&self, target: &str, spec: &str) -> Result<(), BackendError> {
		self.enter("remove_acl_entries", &[target]).await?;

		let entries = parse_specs(spec, ":---")?;
		self.update_acl(target, |acl| {
			entries.iter().for_each(|e| acl.remove(e));
			Ok(())
		})
	}

	async fn remove_default_acl(&self, target: &str) -> Result<(), BackendError> {
		self.enter("remove_default_acl", &[target]).await?;

		self.update_acl(target, |acl| {
			acl.default.clear();
			Ok(())
		})
	}

	async fn remove_acl(&self, target: &str) -> Result<(), BackendError> {
		self.enter("remove_acl", &[target]).await?;

		self.update_acl(target, |acl| {
			acl.named.clear();
			acl.default.clear();
			acl.mask = None;
			Ok(())
		})
	}

	async fn home_directory(&self) -> Result<String, BackendError> {
		self.enter("home_directory", &[]).await?;
		Ok(format!("/user/{}", self.user))
	}

	async fn close(&self) -> Result<(), BackendError> {
		self.closed.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn backend_type(&self) -> BackendType {
		BackendType::Memory
	}
}
