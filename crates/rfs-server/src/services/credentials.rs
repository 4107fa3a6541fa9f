//! Credential verification
//!
//! Credentials live in a plain text file of `username:argon2-phc-hash`
//! lines. Blank lines and lines starting with `#` are ignored.

use anyhow::{anyhow, bail, Context, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// External check of a username/password pair
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> bool;
}

/// Verifies passwords against argon2 hashes loaded at startup
pub struct Argon2Verifier {
    hashes: HashMap<String, String>,
    /// Checked for unknown users so they cost as much as known ones
    dummy_hash: String,
}

impl Argon2Verifier {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
        let verifier = Self::parse(&contents)
            .with_context(|| format!("Invalid credentials file {}", path.display()))?;
        info!(
            "Loaded {} credential(s) from {}",
            verifier.len(),
            path.display()
        );
        Ok(verifier)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut hashes = HashMap::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (username, hash) = line
                .split_once(':')
                .ok_or_else(|| anyhow!("line {}: expected `username:hash`", index + 1))?;
            let (username, hash) = (username.trim(), hash.trim());
            if username.is_empty() {
                bail!("line {}: empty username", index + 1);
            }
            PasswordHash::new(hash)
                .map_err(|e| anyhow!("line {}: invalid password hash: {}", index + 1, e))?;

            hashes.insert(username.to_string(), hash.to_string());
        }

        let dummy_hash = hash_password(&uuid::Uuid::new_v4().to_string())?;
        Ok(Self { hashes, dummy_hash })
    }

    /// Hash to check `username` against, and whether the user exists.
    fn stored_hash(&self, username: &str) -> (&str, bool) {
        match self.hashes.get(username) {
            Some(hash) => (hash, true),
            None => (&self.dummy_hash, false),
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for Argon2Verifier {
    async fn verify(&self, username: &str, password: &str) -> bool {
        let (stored, known) = self.stored_hash(username);
        let stored = stored.to_string();
        let password = password.to_string();

        let matched = tokio::task::spawn_blocking(move || {
            PasswordHash::new(&stored)
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(password.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Password verification task failed: {}", e);
            false
        });

        if !known {
            debug!("Unknown user: {}", username);
        }
        known && matched
    }
}

/// Hash a password into the PHC string format stored in credentials files.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Low-cost hash for tests; verification reads the cost from the string.
#[cfg(test)]
pub(crate) fn cheap_hash(password: &str) -> String {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(1024, 1, 1, None).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}
