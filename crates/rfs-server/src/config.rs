//! Server configuration from the environment

use anyhow::{bail, Context, Result};
use rfs_core::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";
const DEFAULT_CREDENTIALS_FILE: &str = "/etc/rfs/credentials";
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub chunk_size: usize,
    pub scratch_dir: PathBuf,
    pub credentials_file: PathBuf,
    pub session_ttl: Duration,
    /// Static web client, served for every unmatched path
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment...");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let chunk_size = match lookup("RFS_CHUNK_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("RFS_CHUNK_SIZE is not a number: {}", raw))?,
            None => DEFAULT_CHUNK_SIZE,
        };
        if chunk_size == 0 {
            bail!("RFS_CHUNK_SIZE must be greater than zero");
        }

        let scratch_dir = lookup("RFS_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let credentials_file = lookup("RFS_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));

        let session_ttl = match lookup("RFS_SESSION_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("RFS_SESSION_TTL_SECS is not a number: {}", raw))?,
            ),
            None => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        let static_dir = lookup("STATIC_DIR").map(PathBuf::from);

        Ok(Config {
            bind_address,
            chunk_size,
            scratch_dir,
            credentials_file,
            session_ttl,
            static_dir,
        })
    }
}
