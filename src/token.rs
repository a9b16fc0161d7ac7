use std::fs;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Bearer token kept alongside the cookie session, optionally persisted to disk.
#[derive(Debug)]
pub struct TokenStore {
    current: watch::Sender<Option<String>>,
    path: Option<PathBuf>,
}

impl TokenStore {
    pub fn in_memory() -> Self {
        Self {
            current: watch::Sender::new(None),
            path: None,
        }
    }

    /// Loads a previously saved token from `path`, if any.
    pub fn persistent(path: PathBuf) -> Self {
        let saved = match fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Could not read token file {}: {}", path.display(), e);
                None
            }
        };
        Self {
            current: watch::Sender::new(saved),
            path: Some(path),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn set(&self, token: &str) {
        self.current.send_replace(Some(token.to_string()));
        if let Some(path) = &self.path {
            if let Err(e) = fs::write(path, token) {
                warn!("Could not save token to {}: {}", path.display(), e);
            }
        }
    }

    pub fn clear(&self) {
        let previous = self.current.send_replace(None);
        if previous.is_some() {
            debug!("Cleared stored session token");
        }
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove token file {}: {}", path.display(), e),
            }
        }
    }
}
