use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hx_core::{api, logging, Gateway, GatewayConfig, InMemoryProfileStore};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "hxctl", about = "Run HDFS gateway operations from the command line")]
struct Cli {
	/// Gateway configuration file, created with defaults if missing
	#[arg(long, env = "HX_CONFIG", default_value = "hx-gateway.json")]
	config: PathBuf,

	/// JSON array of connection profiles
	#[arg(long, env = "HX_PROFILES", default_value = "profiles.json")]
	profiles: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run one operation and print its JSON result
	Call {
		/// Operation name, e.g. listFiles
		operation: String,
		/// Arguments as a JSON object
		#[arg(default_value = "{}")]
		args: String,
	},
	/// List the available operations
	Ops,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let cli = Cli::parse();

	let (operation, args) = match cli.command {
		Command::Ops => {
			for name in api::operation_names() {
				println!("{name}");
			}
			return Ok(ExitCode::SUCCESS);
		}
		Command::Call { operation, args } => (operation, args),
	};

	let config = GatewayConfig::load_from(&cli.config)?;
	let _guard = logging::init(&config.logging)?;

	let args: Value = serde_json::from_str(&args).context("arguments must be a JSON object")?;
	let profiles = Arc::new(InMemoryProfileStore::load_json(&cli.profiles)?);
	let gateway = Gateway::with_webhdfs(config, profiles)?;

	let result = api::Dispatcher::new(&gateway)
		.call_record(&operation, args)
		.await;
	gateway.shutdown().await;

	match result {
		Ok(value) => {
			println!("{}", serde_json::to_string_pretty(&value)?);
			Ok(ExitCode::SUCCESS)
		}
		Err(record) => {
			println!("{}", serde_json::to_string_pretty(&record)?);
			Ok(ExitCode::FAILURE)
		}
	}
}
