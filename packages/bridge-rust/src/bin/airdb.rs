//! `airdb` command-line front end for the database bridge.
//!
//! ```text
//! airdb --app /Applications/UtilAirDatabase.app create-from-sql test.sql test.db
//! AIRDB_TIMEOUT_MS=60000 airdb decrypt enc.db plain.db --key secret
//! ```

use std::path::PathBuf;

use airdb_bridge::network::{ListenerConfig, DEFAULT_REPLY_PORT};
use airdb_bridge::service::{timeout_from_millis, BridgeConfig, DatabaseBridge, LaunchMode};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "airdb", version, about = "Drive the AIR database utility and wait for its reply")]
struct Cli {
    /// Path to the database utility (binary or application bundle).
    #[arg(long, env = "AIRDB_APP", default_value = "UtilAirDatabase")]
    app: PathBuf,

    /// How to start the utility. Defaults to `open` on macOS, `direct` elsewhere.
    #[arg(long, env = "AIRDB_LAUNCH_MODE", value_enum)]
    launch_mode: Option<LaunchMode>,

    /// Address the reply listener binds to.
    #[arg(long, env = "AIRDB_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port the utility calls back on.
    #[arg(long, env = "AIRDB_PORT", default_value_t = DEFAULT_REPLY_PORT)]
    port: u16,

    /// Per-operation timeout in milliseconds. Zero or negative waits forever.
    #[arg(long, env = "AIRDB_TIMEOUT_MS", default_value_t = -1, allow_negative_numbers = true)]
    timeout_ms: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a database from a SQL script.
    CreateFromSql {
        source: PathBuf,
        dest: PathBuf,
        /// Encrypt the result with this key.
        #[arg(long)]
        key: Option<String>,
    },
    /// Build a database from an existing SQLite store.
    CreateFromDb {
        store: PathBuf,
        dest: PathBuf,
        /// Encrypt the result with this key.
        #[arg(long)]
        key: Option<String>,
    },
    /// Decrypt an encrypted database.
    Decrypt {
        encrypted: PathBuf,
        dest: PathBuf,
        #[arg(long)]
        key: String,
    },
    /// Encrypt a database.
    Encrypt {
        path: PathBuf,
        dest: PathBuf,
        #[arg(long)]
        key: String,
    },
    /// Decrypt into `out`, then optionally re-encrypt it with a new key.
    Derive {
        encrypted: PathBuf,
        out: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long)]
        out_key: Option<String>,
    },
}

impl Cli {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            app_path: self.app.clone(),
            launch_mode: self.launch_mode.unwrap_or_default(),
            timeout: timeout_from_millis(self.timeout_ms),
            listener: ListenerConfig {
                host: self.host.clone(),
                port: self.port,
                ..ListenerConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let bridge = DatabaseBridge::from_config(cli.bridge_config());

    match cli.command {
        Command::CreateFromSql { source, dest, key } => {
            bridge
                .create_database_from_source(source, dest, key.as_deref())
                .await?;
        }
        Command::CreateFromDb { store, dest, key } => {
            bridge
                .create_database_from_existing_store(store, dest, key.as_deref())
                .await?;
        }
        Command::Decrypt {
            encrypted,
            dest,
            key,
        } => bridge.decrypt(encrypted, dest, &key).await?,
        Command::Encrypt { path, dest, key } => bridge.encrypt(path, dest, &key).await?,
        Command::Derive {
            encrypted,
            out,
            key,
            out_key,
        } => {
            bridge
                .derive_from_encrypted(encrypted, &key, out, out_key.as_deref())
                .await?;
        }
    }

    info!("done");
    Ok(())
}
