//! Persistence for the chat session identity

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use eyre::{Context, Result};
use tracing::debug;

/// Key-value slot for the session identity, injected into the channel
pub trait IdentityStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, session_id: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Identity kept in a single file
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> Option<String> {
        let id = fs::read_to_string(&self.path).ok()?;
        let id = id.trim();
        if id.is_empty() { None } else { Some(id.to_string()) }
    }

    fn set(&self, session_id: &str) -> Result<()> {
        debug!(path = %self.path.display(), %session_id, "FileIdentityStore::set: called");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        fs::write(&self.path, session_id).context("Failed to write session identity")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        debug!(path = %self.path.display(), "FileIdentityStore::clear: called");
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session identity"),
        }
    }
}

/// In-process identity slot
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    value: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(session_id: &str) -> Self {
        Self {
            value: Mutex::new(Some(session_id.to_string())),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, session_id: &str) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
