//! Bearer token held in memory and mirrored to a credential file

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::application::ports::{CredentialError, CredentialProvider};
use crate::infrastructure::config::XdgConfigStore;

/// File name of the credential file, next to `config.toml`
pub const CREDENTIALS_FILE: &str = "credentials";

/// Token loaded at startup.
///
/// `invalidate` forgets the token. When the token came from the credential
/// file, the file is deleted too so the next run asks for a fresh one; a
/// rejected environment or config token leaves the file alone.
pub struct StoredCredential {
    token: RwLock<Option<String>>,
    path: Option<PathBuf>,
    from_file: bool,
}

impl StoredCredential {
    /// Token that only lives in memory
    pub fn in_memory(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(normalize(token)),
            path: None,
            from_file: false,
        }
    }

    /// Default credential file path
    pub fn default_path() -> PathBuf {
        XdgConfigStore::app_dir().join(CREDENTIALS_FILE)
    }

    /// Use `explicit` when given (environment or config), otherwise read
    /// the credential file at `path`. A missing file means no token.
    pub fn load(path: impl Into<PathBuf>, explicit: Option<String>) -> Result<Self, CredentialError> {
        let path = path.into();
        let (token, from_file) = match normalize(explicit) {
            Some(token) => (Some(token), false),
            None => {
                let token = read_token(&path)?;
                let from_file = token.is_some();
                (token, from_file)
            }
        };
        Ok(Self {
            token: RwLock::new(token),
            path: Some(path),
            from_file,
        })
    }

    /// Write `token` to the credential file
    pub fn store(path: &Path, token: &str) -> Result<(), CredentialError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CredentialError::WriteError(e.to_string()))?;
        }
        let write_error = |e: std::io::Error| CredentialError::WriteError(e.to_string());
        let mut file = open_private(path).map_err(write_error)?;
        writeln!(file, "{token}").map_err(write_error)

    }

    /// Delete the credential file. Returns false if there was none.
    pub fn clear(path: &Path) -> Result<bool, CredentialError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CredentialError::WriteError(e.to_string())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the token was read from the credential file
    pub fn is_from_file(&self) -> bool {
        self.from_file
    }
}

impl CredentialProvider for StoredCredential {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn invalidate(&self) {
        self.token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if !self.from_file {
            return;
        }
        if let Some(path) = &self.path {
            match Self::clear(path) {
                Ok(true) => debug!(path = %path.display(), "credential file removed"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "failed to remove credential file"),
            }
        }
    }
}

fn normalize(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn read_token(path: &Path) -> Result<Option<String>, CredentialError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(normalize(Some(content))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CredentialError::ReadError(e.to_string())),
    }
}

/// Open for writing, owner-only from the moment the file exists. A file
/// left with wider permissions is narrowed before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
