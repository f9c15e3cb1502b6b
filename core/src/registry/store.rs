use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::{
	domain::ConnectionProfile,
	error::{Error, Result},
};

/// Source of connection profiles, keyed by id.
///
/// Profiles are owned elsewhere; the gateway only reads them.
#[async_trait]
pub trait ProfileStore: Send + Sync {
	async fn get(&self, id: &str) -> Result<Option<ConnectionProfile>>;
}

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
	profiles: RwLock<HashMap<String, ConnectionProfile>>,
}

impl InMemoryProfileStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_profiles(profiles: impl IntoIterator<Item = ConnectionProfile>) -> Self {
		let store = Self::new();
		for profile in profiles {
			store.insert(profile);
		}
		store
	}

	/// Reads a JSON array of profiles.
	pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path).map_err(|e| Error::local_io("load_profiles", path, e))?;
		let profiles: Vec<ConnectionProfile> = serde_json::from_str(&json).map_err(|e| {
			Error::InvalidArgument(format!("invalid profiles file {}: {e}", path.display()))
		})?;

		info!(count = profiles.len(), "Loaded connection profiles from {:?}", path);
		Ok(Self::from_profiles(profiles))
	}

	pub fn insert(&self, profile: ConnectionProfile) -> Option<ConnectionProfile> {
		self.profiles.write().insert(profile.id.clone(), profile)
	}

	pub fn remove(&self, id: &str) -> Option<ConnectionProfile> {
		self.profiles.write().remove(id)
	}

	/// Flags a profile as deleted without dropping it.
	pub fn soft_delete(&self, id: &str) -> bool {
		match self.profiles.write().get_mut(id) {
			Some(profile) => {
				profile.deleted = true;
				true
			}
			None => false,
		}
	}

	pub fn ids(&self) -> Vec<String> {
		let mut ids = self.profiles.read().keys().cloned().collect::<Vec<_>>();
		ids.sort();
		ids
	}
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
	async fn get(&self, id: &str) -> Result<Option<ConnectionProfile>> {
		Ok(self.profiles.read().get(id).cloned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn loads_profiles_from_json() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("profiles.json");
		std::fs::write(
			&path,
			r#"[{"id":"prod","name":"Production","url":"hdfs://nn:8020",
				"rawConfig":"{\"user.name\":\"etl\"}"},
			   {"id":"old","name":"Old","url":"webhdfs://old:9870","deleted":true}]"#,
		)
		.unwrap();

		let store = InMemoryProfileStore::load_json(&path).unwrap();

		assert_eq!(store.ids(), vec!["old", "prod"]);
		let prod = store.get("prod").await.unwrap().unwrap();
		assert_eq!(prod.user().as_deref(), Some("etl"));
		assert!(store.get("old").await.unwrap().unwrap().deleted);
		assert!(store.get("nope").await.unwrap().is_none());
	}

	#[test]
	fn malformed_files_are_rejected() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("profiles.json");
		std::fs::write(&path, "{").unwrap();

		let err = InMemoryProfileStore::load_json(&path).unwrap_err();
		assert_eq!(err.code(), "INVALID_ARGUMENT");

		let err = InMemoryProfileStore::load_json(dir.path().join("missing.json")).unwrap_err();
		assert_eq!(err.code(), "IO_ERROR");
	}
}
