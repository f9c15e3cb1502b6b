//! Tracing setup

use std::{fs, sync::Once};

use tracing_appender::{
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
	config::LoggingConfig,
	error::{Error, Result},
};

/// Installs the global subscriber: human readable output on stderr, plus a
/// daily rolling `hx.log` when file logging is enabled.
///
/// Only the first call installs anything. Keep the returned guard alive for
/// as long as file logs should be flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
	static INIT: Once = Once::new();
	let mut result = Ok(None);

	INIT.call_once(|| result = install(config));

	result
}

fn install(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

	let (file_layer, guard) = if config.file_logging {
		fs::create_dir_all(&config.log_dir)
			.map_err(|e| Error::local_io("createLogDir", &config.log_dir, e))?;

		let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "hx.log");
		let (writer, guard) = tracing_appender::non_blocking(appender);

		let layer = fmt::layer()
			.with_target(true)
			.with_thread_ids(true)
			.with_ansi(false)
			.with_writer(writer);
		(Some(layer), Some(guard))
	} else {
		(None, None)
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(
			fmt::layer()
				.with_target(true)
				.with_writer(std::io::stderr),
		)
		.with(file_layer)
		.try_init()
		.map_err(|e| Error::InvalidArgument(format!("failed to initialize tracing: {e}")))?;

	Ok(guard)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn unusable_log_dir_is_an_io_error() {
		let dir = TempDir::new().unwrap();
		let blocker = dir.path().join("logs");
		fs::write(&blocker, "").unwrap();

		let config = LoggingConfig {
			file_logging: true,
			log_dir: blocker.join("nested"),
			..Default::default()
		};

		let err = init(&config).unwrap_err();
		assert_eq!(err.code(), "IO_ERROR");
		assert!(err.to_string().contains("nested"));
	}
}
