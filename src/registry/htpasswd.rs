use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Result;

/// Secret data key the registry chart reads its htpasswd file from
pub const HTPASSWD_KEY: &str = "htpasswd";

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("htpasswd data is not valid UTF-8")]
    NotUtf8,

    #[error("malformed htpasswd line {0}: expected 'user:hash'")]
    MalformedLine(usize),
}

/// Username to password hash mapping in htpasswd format
///
/// Entries serialize sorted by username, one `user:hash` per line, so the same
/// set of entries always produces the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtpasswdStore {
    entries: BTreeMap<String, String>,
}

impl HtpasswdStore {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(data).map_err(|_| ParseError::NotUtf8)?;
        let mut entries = BTreeMap::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(':') {
                Some((user, hash)) if !user.is_empty() && !hash.is_empty() => {
                    entries.insert(user.to_string(), hash.to_string());
                }
                _ => return Err(ParseError::MalformedLine(index + 1)),
            }
        }

        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for (user, hash) in &self.entries {
            out.push_str(user);
            out.push(':');
            out.push_str(hash);
            out.push('\n');
        }
        out.into_bytes()
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.entries.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check `password` against the stored hash for `username`
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.get(username)
            .map(|hash| bcrypt::verify(password, hash).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Set `username`'s password to a fresh bcrypt hash, leaving other users alone
    ///
    /// An entry whose hash already matches `password` is kept as is.
    pub fn set_password(&mut self, username: &str, password: &str) -> Result<()> {
        if self.verify(username, password) {
            debug!(username, "htpasswd entry already up to date");
            return Ok(());
        }
        let hash = bcrypt::hash(password, HASH_COST)?;
        self.entries.insert(username.to_string(), hash);
        Ok(())
    }
}

/// Merge one username/password pair into a serialized htpasswd store
///
/// A store that cannot be parsed is treated as empty, so the given user ends
/// up with access even if earlier data was corrupted.
pub fn merge_credentials(existing: Option<&[u8]>, username: &str, password: &str) -> Result<Vec<u8>> {
    let mut store = match existing {
        Some(data) if !data.is_empty() => HtpasswdStore::parse(data).unwrap_or_else(|e| {
            warn!(error = %e, "Existing htpasswd data is unreadable, starting from an empty store");
            HtpasswdStore::default()
        }),
        _ => HtpasswdStore::default(),
    };

    if store.is_empty() {
        debug!("Starting a new htpasswd store");
    }
    store.set_password(username, password)?;
    debug!(users = store.len(), "Merged credentials into htpasswd store");
    Ok(store.to_bytes())
}
