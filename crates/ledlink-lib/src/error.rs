//! Unified error type for the ledlink-lib crate.
//!
//! [`LedlinkError`] wraps module-specific errors (`TransportError`,
//! `ValidationError`) and domain-specific error kinds (`Protocol`, `Config`,
//! `Color`, `Connection`). `From` impls allow `?` to propagate across module boundaries.

use std::fmt;

use crate::device_config::ValidationError;
use crate::transport::TransportError;

/// Unified error type for ledlink-lib operations.
#[derive(Debug)]
pub enum LedlinkError {
    /// UDP transport failure (bind, resolve, send, receive, timeout).
    Transport(TransportError),
    /// Standard I/O error (settings file read/write).
    Io(std::io::Error),
    /// A device reply did not have the expected shape.
    Protocol(String),
    /// A configuration edit was rejected.
    Validation(ValidationError),
    /// Client settings error.
    Config(String),
    /// Color parsing error.
    Color(String),
    /// The device could not be reached or did not answer a connect.
    Connection(String),
}

impl fmt::Display for LedlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedlinkError::Transport(e) => write!(f, "{e}"),
            LedlinkError::Io(e) => write!(f, "I/O error: {e}"),
            LedlinkError::Protocol(e) => write!(f, "Protocol error: {e}"),
            LedlinkError::Validation(e) => write!(f, "{e}"),
            LedlinkError::Config(e) => write!(f, "Config error: {e}"),
            LedlinkError::Color(e) => write!(f, "Color error: {e}"),
            LedlinkError::Connection(e) => write!(f, "Connection error: {e}"),
        }
    }
}

impl std::error::Error for LedlinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedlinkError::Transport(e) => Some(e),
            LedlinkError::Io(e) => Some(e),
            LedlinkError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for LedlinkError {
    fn from(e: TransportError) -> Self {
        LedlinkError::Transport(e)
    }
}

impl From<ValidationError> for LedlinkError {
    fn from(e: ValidationError) -> Self {
        LedlinkError::Validation(e)
    }
}

impl From<std::io::Error> for LedlinkError {
    fn from(e: std::io::Error) -> Self {
        LedlinkError::Io(e)
    }
}

/// Crate-level Result alias using [`LedlinkError`].
pub type Result<T> = std::result::Result<T, LedlinkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn from_transport_error() {
        let e: LedlinkError = TransportError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(
            e,
            LedlinkError::Transport(TransportError::Timeout(_))
        ));
    }

    #[test]
    fn from_validation_error() {
        let e: LedlinkError = ValidationError::UnknownField("speed".into()).into();
        assert!(matches!(e, LedlinkError::Validation(_)));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: LedlinkError = io_err.into();
        assert!(matches!(e, LedlinkError::Io(_)));
    }

    #[test]
    fn display_transport_error_is_transparent() {
        let e = LedlinkError::Transport(TransportError::Timeout(Duration::from_secs(3)));
        assert_eq!(e.to_string(), "No reply within 3.0s");
    }

    #[test]
    fn display_protocol_error() {
        let e = LedlinkError::Protocol("bad json".into());
        assert_eq!(e.to_string(), "Protocol error: bad json");
    }

    #[test]
    fn display_config_error() {
        let e = LedlinkError::Config("invalid input".into());
        assert_eq!(e.to_string(), "Config error: invalid input");
    }

    #[test]
    fn display_color_error() {
        let e = LedlinkError::Color("bad hex".into());
        assert_eq!(e.to_string(), "Color error: bad hex");
    }

    #[test]
    fn display_connection_error() {
        let e = LedlinkError::Connection("10.0.0.2: No reply within 3.0s".into());
        assert_eq!(e.to_string(), "Connection error: 10.0.0.2: No reply within 3.0s");
    }

    #[test]
    fn source_chains_transport_error() {
        let e = LedlinkError::Transport(TransportError::SendFailed("no route".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("no route"));
    }

    #[test]
    fn source_none_for_string_variants() {
        let e = LedlinkError::Protocol("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_transport_to_ledlink() {
        fn inner() -> crate::transport::Result<()> {
            Err(TransportError::SendFailed("unreachable".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(
            err,
            LedlinkError::Transport(TransportError::SendFailed(_))
        ));
    }
}
