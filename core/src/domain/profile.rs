use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Named connection to one cluster, as stored by the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
	pub id: String,
	pub name: String,
	/// `hdfs://`, `webhdfs://`, `swebhdfs://` or a plain `http(s)://` endpoint
	pub url: String,
	/// JSON object of Hadoop style string settings
	#[serde(default)]
	pub raw_config: String,
	#[serde(default)]
	pub deleted: bool,
}

impl ConnectionProfile {
	pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			url: url.into(),
			raw_config: String::new(),
			deleted: false,
		}
	}

	pub fn with_setting(mut self, key: &str, value: &str) -> Self {
		let mut settings = self.settings();
		settings.insert(key.to_string(), value.to_string());
		self.raw_config = serde_json::to_string(&settings).unwrap_or_default();
		self
	}

	/// Parsed `raw_config`. Anything that is not a JSON object of strings is
	/// treated as empty.
	pub fn settings(&self) -> HashMap<String, String> {
		if self.raw_config.trim().is_empty() {
			return HashMap::new();
		}

		serde_json::from_str(&self.raw_config).unwrap_or_else(|e| {
			warn!(profile = %self.id, ?e, "Ignoring unparseable connection settings");
			HashMap::new()
		})
	}

	/// User to act as, from `user.name` or `hadoop.user.name`.
	pub fn user(&self) -> Option<String> {
		let settings = self.settings();
		settings
			.get("user.name")
			.or_else(|| settings.get("hadoop.user.name"))
			.filter(|u| !u.is_empty())
			.cloned()
	}
}
