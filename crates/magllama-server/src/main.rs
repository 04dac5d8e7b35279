// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! magllama access core administration binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use magllama_common_secret::SecretString;
use magllama_server::AccessCore;
use magllama_server_audit::AuditEventType;
use magllama_server_auth::UserId;
use magllama_server_config::{LogFormat, LoggingConfig, ServerConfig};
use magllama_server_db::{create_pool, run_migrations, ActivityLogQuery, RbacRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// magllama-server - access control and secrets core.
#[derive(Parser, Debug)]
#[command(name = "magllama-server", about = "magllama access control and secrets core", version)]
struct Args {
	/// Config file to layer between defaults and environment.
	#[arg(long, env = "MAGLLAMA_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply database migrations and seed the core permissions
	Migrate,
	/// Print a fresh base64 encryption key for MAGLLAMA_SERVER_SECRETS_ENCRYPTION_KEY
	GenerateKey,
	/// Load configuration, open the database and build the core, then exit
	Check,
	/// Create an admin login holding every core permission
	BootstrapAdmin {
		#[arg(long)]
		username: String,
		#[arg(long, env = "MAGLLAMA_ADMIN_PASSWORD", hide_env_values = true)]
		password: String,
	},
	/// Print recent activity log entries as JSON lines
	AuditLog {
		#[arg(long)]
		user: Option<UserId>,
		#[arg(long)]
		action: Option<AuditEventType>,
		#[arg(long, default_value_t = 100)]
		limit: u32,
	},
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	match args.command {
		Command::Version => {
			println!("magllama-server {}", env!("CARGO_PKG_VERSION"));
			return Ok(());
		}
		Command::GenerateKey => {
			println!("{}", magllama_server_secrets::generate_key_base64().expose());
			return Ok(());
		}
		_ => {}
	}

	dotenvy::dotenv().ok();

	let config = load_config(args.config.as_deref())?;
	init_tracing(&config.logging);

	match args.command {
		Command::Migrate => {
			let pool = create_pool(&config.database.url, config.database.max_connections).await?;
			run_migrations(&pool).await?;
			let seeded = RbacRepository::new(pool).ensure_core_permissions().await?;
			tracing::info!(seeded, "migrations complete");
		}
		Command::Check => {
			AccessCore::connect(&config)
				.await
				.context("failed to build access core")?;
			println!("ok");
		}
		Command::BootstrapAdmin { username, password } => {
			let core = AccessCore::connect(&config).await?;
			let user_id = core
				.bootstrap_admin(&username, &SecretString::new(password))
				.await?;
			println!("{user_id}");
		}
		Command::AuditLog {
			user,
			action,
			limit,
		} => {
			let core = AccessCore::connect(&config).await?;
			let entries = core
				.activity
				.query_logs(&ActivityLogQuery {
					user_id: user,
					action,
					limit: Some(limit),
					..Default::default()
				})
				.await?;
			for entry in entries {
				println!("{}", serde_json::to_string(&entry)?);
			}
		}
		Command::Version | Command::GenerateKey => {}
	}

	Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ServerConfig> {
	let config = match path {
		Some(path) => magllama_server_config::load_config_with_file(path),
		None => magllama_server_config::load_config(),
	};
	config.context("failed to load configuration")
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

	let registry = tracing_subscriber::registry().with(filter);
	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}
