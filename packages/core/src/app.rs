//! Application identity: who a call is addressed to, and who we are.
//!
//! An [`App`] is the sending-side view of another application — enough to
//! address a URL at it. A [`Receiver`] is the local application's own
//! identity plus the list of actions it is willing to be called with.
//!
//! # Configuration
//!
//! The local identity is read from environment variables, so a process can
//! receive answers with zero code changes:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CALLBRIDGE_SCHEME` | (required) | URL scheme this application is registered to handle |
//! | `CALLBRIDGE_HOST` | `x-callback-url` | Host component expected on inbound URLs |
//!
//! A missing or empty scheme is reported once with guidance and the
//! process degrades to send-only: calls still go out, but no return
//! address can be built, so answers never come back.

use thiserror::Error;

use crate::action::AnyAction;

/// Environment variable holding the local application's URL scheme.
pub const SCHEME_VAR: &str = "CALLBRIDGE_SCHEME";

/// Environment variable overriding the expected host component.
pub const HOST_VAR: &str = "CALLBRIDGE_HOST";

/// The host used when an app does not specify one, per the
/// x-callback-url draft.
pub const DEFAULT_HOST: &str = "x-callback-url";

/// An application calls can be addressed to.
pub trait App {
    /// The URL scheme the application is registered to handle.
    fn scheme(&self) -> String;

    /// The host component it expects. Almost always the default.
    fn host(&self) -> String {
        DEFAULT_HOST.into()
    }
}

/// The local application: an [`App`] that can also be called.
pub trait Receiver: App {
    /// The actions this application accepts, in lookup order.
    fn actions(&self) -> &[AnyAction] {
        &[]
    }
}

/// Another application, known only by its scheme (and optionally host).
/// Use this to address calls when you have no richer type for the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteApp {
    pub scheme: String,
    pub host: String,
}

impl RemoteApp {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: DEFAULT_HOST.into(),
        }
    }
}

impl App for RemoteApp {
    fn scheme(&self) -> String {
        self.scheme.clone()
    }

    fn host(&self) -> String {
        self.host.clone()
    }
}

/// Errors resolving the local application's identity.
///
/// Each message carries the fix, because this fails at integration time
/// when the missing piece is a configuration line, not a code change.
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error(
        "{SCHEME_VAR} is not set. Set it to the url scheme your application \
         is registered to handle (for example {SCHEME_VAR}=myapp) so that \
         responses can be addressed back to this application."
    )]
    SchemeMissing,

    #[error(
        "{SCHEME_VAR} is set but empty. Set it to the url scheme your \
         application is registered to handle (for example {SCHEME_VAR}=myapp)."
    )]
    SchemeEmpty,
}

/// A [`Receiver`] configured from the environment.
///
/// Register actions with [`EnvReceiver::register`]; an empty-scheme
/// receiver (the degraded fallback) can hold actions but will never see
/// them invoked, since no URL can reach it.
#[derive(Debug)]
pub struct EnvReceiver {
    scheme: String,
    host: String,
    actions: Vec<AnyAction>,
}

impl EnvReceiver {
    /// Resolve identity from `CALLBRIDGE_SCHEME` / `CALLBRIDGE_HOST`.
    pub fn from_env() -> Result<Self, IdentityError> {
        Self::from_vars(
            std::env::var(SCHEME_VAR).ok(),
            std::env::var(HOST_VAR).ok(),
        )
    }

    /// Build directly from a known scheme.
    pub fn with_scheme(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: DEFAULT_HOST.into(),
            actions: Vec::new(),
        }
    }

    /// The send-only fallback: an empty scheme that cannot receive.
    pub fn degraded() -> Self {
        Self {
            scheme: String::new(),
            host: DEFAULT_HOST.into(),
            actions: Vec::new(),
        }
    }

    /// Add an action to the receivable list.
    pub fn register(&mut self, action: AnyAction) {
        self.actions.push(action);
    }

    // Separated from `from_env` so identity resolution is testable
    // without touching process environment.
    fn from_vars(
        scheme: Option<String>,
        host: Option<String>,
    ) -> Result<Self, IdentityError> {
        let scheme = scheme.ok_or(IdentityError::SchemeMissing)?;
        if scheme.is_empty() {
            return Err(IdentityError::SchemeEmpty);
        }
        Ok(Self {
            scheme,
            host: host.filter(|h| !h.is_empty()).unwrap_or_else(|| DEFAULT_HOST.into()),
            actions: Vec::new(),
        })
    }
}

impl App for EnvReceiver {
    fn scheme(&self) -> String {
        self.scheme.clone()
    }

    fn host(&self) -> String {
        self.host.clone()
    }
}

impl Receiver for EnvReceiver {
    fn actions(&self) -> &[AnyAction] {
        &self.actions
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_app_defaults_the_host() {
        let app = RemoteApp::new("notes");
        assert_eq!(app.scheme(), "notes");
        assert_eq!(app.host(), DEFAULT_HOST);
    }

    #[test]
    fn identity_resolution_requires_a_nonempty_scheme() {
        assert_eq!(
            EnvReceiver::from_vars(None, None).unwrap_err(),
            IdentityError::SchemeMissing
        );
        assert_eq!(
            EnvReceiver::from_vars(Some(String::new()), None).unwrap_err(),
            IdentityError::SchemeEmpty
        );

        let receiver = EnvReceiver::from_vars(Some("myapp".into()), None).unwrap();
        assert_eq!(receiver.scheme(), "myapp");
        assert_eq!(receiver.host(), DEFAULT_HOST);

        let custom =
            EnvReceiver::from_vars(Some("myapp".into()), Some("callbacks".into())).unwrap();
        assert_eq!(custom.host(), "callbacks");
    }

    #[test]
    fn degraded_receiver_has_no_scheme() {
        let receiver = EnvReceiver::degraded();
        assert!(receiver.scheme().is_empty());
        assert!(receiver.actions().is_empty());
    }

    #[test]
    fn guidance_names_the_variable() {
        let message = IdentityError::SchemeMissing.to_string();
        assert!(message.contains(SCHEME_VAR));
    }
}
