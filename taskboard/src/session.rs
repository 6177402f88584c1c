//! Identity of the signed-in user.
//!
//! Authentication itself happens elsewhere; the board only needs to know
//! who is acting, for notification payloads and request authorization.

/// An authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: Option<String>,
    pub email: String,
    /// Bearer token sent to the CRUD endpoint, when the backend wants one.
    pub token: Option<String>,
}

impl Session {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
            token: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Name shown to other users: the profile name, else the email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Raised when an action needs a session and there is none.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no active session")]
pub struct AuthError;
