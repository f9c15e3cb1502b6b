//! Gateway configuration

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// Tunables for every gateway subsystem.
///
/// Missing keys fall back to their defaults, so an old config file keeps
/// loading after new knobs are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	/// Bound on every single remote round trip
	pub request_timeout_ms: u64,

	/// Bound on opening a connection, including the probe request
	pub connect_timeout_ms: u64,

	/// Cached client handles unused for this long are closed
	pub idle_timeout_secs: u64,

	/// Prefix size read by the content preview
	pub preview_bytes: u64,

	/// Largest file `readContent` will load whole
	pub max_text_bytes: u64,

	/// Largest Avro container decoded in memory
	pub max_avro_bytes: u64,

	/// Chunk size for uploads and downloads
	pub transfer_chunk_bytes: usize,

	/// Paths processed concurrently by batch deletes and permission changes
	pub batch_concurrency: usize,

	/// Logging configuration
	pub logging: LoggingConfig,
}

/// Configuration for log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// Default filter directive, overridden by `RUST_LOG`
	pub level: String,

	/// Also write a daily rolling log file
	pub file_logging: bool,

	/// Directory for log files
	pub log_dir: PathBuf,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			request_timeout_ms: 30_000,
			connect_timeout_ms: 10_000,
			idle_timeout_secs: 300,
			preview_bytes: MIB,
			max_text_bytes: 10 * MIB,
			max_avro_bytes: 64 * MIB,
			transfer_chunk_bytes: 4 * MIB as usize,
			batch_concurrency: 8,
			logging: LoggingConfig::default(),
		}
	}
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "hx_core=info,hx_columnar=info".to_string(),
			file_logging: false,
			log_dir: PathBuf::from("logs"),
		}
	}
}

impl GatewayConfig {
	/// Load configuration from `path`, writing the defaults there if it does
	/// not exist yet.
	pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();

		if path.exists() {
			info!("Loading config from {:?}", path);
			let json =
				fs::read_to_string(path).map_err(|e| Error::local_io("loadConfig", path, e))?;
			let config: GatewayConfig = serde_json::from_str(&json).map_err(|e| {
				Error::InvalidArgument(format!("malformed config {}: {e}", path.display()))
			})?;
			config.validate()?;
			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", path);
			let config = Self::default();
			config.save(path)?;
			Ok(config)
		}
	}

	/// Save configuration to disk
	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| Error::local_io("saveConfig", parent, e))?;
		}

		let json = serde_json::to_string_pretty(self)
			.map_err(|e| Error::InvalidArgument(format!("config is not serialisable: {e}")))?;
		fs::write(path, json).map_err(|e| Error::local_io("saveConfig", path, e))?;
		info!("Saved config to {:?}", path);
		Ok(())
	}

	/// Rejects values that would make every operation fail.
	pub fn validate(&self) -> Result<()> {
		let checks = [
			(self.request_timeout_ms == 0, "request_timeout_ms"),
			(self.connect_timeout_ms == 0, "connect_timeout_ms"),
			(self.idle_timeout_secs == 0, "idle_timeout_secs"),
			(self.preview_bytes == 0, "preview_bytes"),
			(self.max_text_bytes == 0, "max_text_bytes"),
			(self.max_avro_bytes == 0, "max_avro_bytes"),
			(self.transfer_chunk_bytes == 0, "transfer_chunk_bytes"),
			(self.batch_concurrency == 0, "batch_concurrency"),
		];

		match checks.iter().find(|(is_zero, _)| *is_zero) {
			Some((_, key)) => Err(Error::InvalidArgument(format!("{key} must be greater than zero"))),
			None => Ok(()),
		}
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	pub fn idle_timeout(&self) -> Duration {
		Duration::from_secs(self.idle_timeout_secs)
	}
}
