//! Who is logged in.
//!
//! A [`SessionStore`] is created once at startup. It restores the persisted
//! login (if any), is updated by login/register, and is cleared by logout.
//! The token it holds is what the API client sends as bearer credential.

mod token;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{AuthResponse, Character, Role};

pub use token::decode_role;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 5;

/// The persisted login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
}

impl Session {
    /// Build a session from a login/register response, reading the role out
    /// of the token.
    pub fn from_auth(auth: AuthResponse, character: Option<Character>) -> Self {
        let role = decode_role(&auth.token);
        Self {
            name: auth.name,
            token: auth.token,
            role,
            character,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn character_or_default(&self) -> Character {
        self.character.unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot write session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Problems found before a registration request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("name must be at least {MIN_NAME_LEN} characters")]
    NameTooShort,
}

/// Check a registration form. Runs before any request is made.
pub fn validate_registration(
    name: &str,
    password: &str,
    confirm: &str,
) -> Result<(), RegistrationError> {
    if password != confirm {
        return Err(RegistrationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RegistrationError::PasswordTooShort);
    }
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(RegistrationError::NameTooShort);
    }
    Ok(())
}

/// Holds the current session and its on-disk copy.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: Option<Session>,
}

impl SessionStore {
    /// Open the store, restoring a previously saved session.
    ///
    /// A missing, unreadable or malformed file means "logged out".
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = restore(&path);
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.current.as_ref().is_some_and(Session::is_admin)
    }

    /// Replace the current session and persist it.
    ///
    /// The session stays current for this run even when saving fails.
    pub fn establish(&mut self, session: Session) -> Result<&Session, SessionError> {
        let saved = self.save(&session);
        tracing::info!(name = %session.name, role = ?session.role, "Session established");
        let session = self.current.insert(session);
        saved?;
        Ok(session)
    }

    /// Forget the session in memory and on disk.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.current.take() {
            tracing::info!(name = %session.name, "Session cleared");
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

fn restore(path: &Path) -> Option<Session> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read saved session");
            return None;
        }
    };

    match serde_json::from_str::<Session>(&content) {
        Ok(session) if !session.token.is_empty() => {
            tracing::debug!(name = %session.name, "Restored saved session");
            Some(session)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed saved session");
            None
        }
    }
}
