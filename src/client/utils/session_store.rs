use std::path::{Path, PathBuf};

use anyhow::anyhow;
use keyring::Entry;
use log::{debug, warn};

const SERVICE: &str = "studmatch";
const ACCOUNT: &str = "studmatch_session";
const TOKEN_ENV: &str = "SESSION_TOKEN";
const FALLBACK_ENV: &str = "KEYRING_FALLBACK";

pub fn default_token_path() -> PathBuf {
    Path::new("data").join("session_token.txt")
}

/// Session token for the REST backend. `SESSION_TOKEN` wins; otherwise the
/// OS keyring, and a plain file only when `KEYRING_FALLBACK=true`.
/// Obtaining the token is the auth provider's business.
#[derive(Debug, Clone)]
pub struct SessionStore {
    fallback: Option<PathBuf>,
}

impl SessionStore {
    pub fn from_env() -> Self {
        let allow_fallback = std::env::var(FALLBACK_ENV).unwrap_or_default() == "true";
        Self { fallback: allow_fallback.then(default_token_path) }
    }

    pub fn with_fallback_file(path: impl Into<PathBuf>) -> Self {
        Self { fallback: Some(path.into()) }
    }

    fn entry() -> Entry {
        Entry::new(SERVICE, ACCOUNT)
    }

    pub fn load(&self) -> Option<String> {
        if let Some(token) = std::env::var(TOKEN_ENV).ok().and_then(|t| non_blank(&t)) {
            debug!("[SESSION_STORE] using token from {}", TOKEN_ENV);
            return Some(token);
        }
        match Self::entry().get_password() {
            Ok(token) => non_blank(&token),
            Err(e) => {
                debug!("[SESSION_STORE] keyring lookup failed: {}", e);
                self.fallback.as_deref().and_then(read_token_file)
            }
        }
    }

    pub fn save(&self, token: &str) -> anyhow::Result<()> {
        match Self::entry().set_password(token) {
            Ok(()) => Ok(()),
            Err(e) => match &self.fallback {
                Some(path) => {
                    write_token_file(path, token)?;
                    warn!("[SESSION_STORE] keyring unavailable ({}), token written to {}", e, path.display());
                    Ok(())
                }
                None => Err(anyhow!("keyring unavailable and file fallback disabled: {}", e)),
            },
        }
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if let Err(e) = Self::entry().delete_password() {
            debug!("[SESSION_STORE] nothing removed from keyring: {}", e);
        }
        if let Some(path) = &self.fallback {
            remove_token_file(path)?;
        }
        Ok(())
    }
}

fn non_blank(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn read_token_file(path: &Path) -> Option<String> {
    let token = non_blank(&std::fs::read_to_string(path).ok()?)?;
    debug!("[SESSION_STORE] using token from {}", path.display());
    Some(token)
}

fn write_token_file(path: &Path, token: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token)?;
    Ok(())
}

fn remove_token_file(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
