//! Where the client keeps its session cookie, and the identity behind it.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};
use thiserror::Error;

use crate::session::{Session, SessionCookie, SESSION_COOKIE_NAME};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session store lock poisoned")]
    Poisoned,
}

pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Returns an error if the cookie cannot be written.
    fn save(&self, cookie: &SessionCookie) -> Result<(), StoreError>;

    /// Token of the stored cookie, if any.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// # Errors
    /// Returns an error if the stored cookie cannot be removed.
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    cookie: Mutex<Option<SessionCookie>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cookie as last saved.
    #[must_use]
    pub fn cookie(&self) -> Option<SessionCookie> {
        self.cookie.lock().ok().and_then(|cookie| cookie.clone())
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        let mut slot = self.cookie.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(cookie.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        let slot = self.cookie.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(slot.as_ref().map(|cookie| cookie.value().to_string()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self.cookie.lock().map_err(|_| StoreError::Poisoned)?;
        *slot = None;
        Ok(())
    }
}

/// Keeps the `Set-Cookie` rendering of the session in a file only the owner can read.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|err| self.io_error(err))?;
        writeln!(file, "{}", cookie.to_set_cookie()).map_err(|err| self.io_error(err))
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        let token = contents
            .lines()
            .next()
            .and_then(|line| line.split(';').next())
            .and_then(|pair| pair.trim().strip_prefix(SESSION_COOKIE_NAME))
            .and_then(|rest| rest.strip_prefix('='))
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Ok(token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// The signed-in identity, resolved once after login and handed to whoever needs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    session: Session,
    token: String,
}

impl SessionContext {
    #[must_use]
    pub fn new(session: Session, token: String) -> Self {
        Self { session, token }
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.session.subject_id
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}
