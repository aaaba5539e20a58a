use thiserror::Error;

/// Status reported for failures that never produced a usable HTTP response.
pub const TRANSPORT_FAILURE_STATUS: i32 = 500;

/// Status reported when the service answers 2xx but `ErrNum` is non-zero.
pub const APPLICATION_FAILURE_STATUS: i32 = 422;

/// Sentinel status: the connection dropped while the body was being read.
pub const STATUS_ABORTED: i32 = -1;

/// Which of the failure surfaces produced a [`KvsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected locally before any network activity.
    Validation,
    /// The HTTP call itself failed (DNS, refused connection, TLS, timeout).
    Transport,
    /// The service answered with a failing HTTP status, or the body was cut off.
    Http,
    /// HTTP succeeded but the body carries a non-zero `ErrNum`.
    Application,
}

/// All errors that can occur when using the KVS client.
#[derive(Error, Debug)]
pub enum KvsError {
    /// A required construction field was empty.
    #[error("must pass \"config.{0}\"")]
    MissingConfig(&'static str),

    /// The action name is not one of the known operations.
    #[error("invalid action: {0:?}")]
    InvalidAction(String),

    /// Request parameters were not a flat JSON object.
    #[error("params must be a JSON object, got {0}")]
    InvalidParams(String),

    /// A caller-supplied header name or value cannot be sent.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The request could not be signed, e.g. an overridden path is not a valid URI.
    #[error("cannot sign request: {0}")]
    Signing(String),

    /// The HTTP call failed, including any timeout while headers or body were in flight.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A successful response carried a body that is not valid JSON.
    #[error("response body is not valid JSON: {message}")]
    Decode { message: String },

    /// The connection was interrupted while reading the response body.
    #[error("response aborted ({status}): {message}")]
    Aborted { status: i32, message: String },

    /// The service answered with an HTTP status above 399.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// The service reported a non-zero `ErrNum` inside a successful response.
    #[error("service error {err_num}: {message}")]
    Application {
        err_num: i64,
        message: String,
        body: serde_json::Value,
    },
}

impl KvsError {
    /// The failure surface this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfig(_)
            | Self::InvalidAction(_)
            | Self::InvalidParams(_)
            | Self::InvalidHeader(_)
            | Self::Signing(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Decode { .. } => ErrorKind::Transport,
            Self::Aborted { .. } | Self::Http { .. } => ErrorKind::Http,
            Self::Application { .. } => ErrorKind::Application,
        }
    }

    /// Status code associated with the failure. `None` for local validation errors.
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Transport(_) | Self::Decode { .. } => Some(TRANSPORT_FAILURE_STATUS),
            Self::Aborted { status, .. } => Some(*status),
            Self::Http { status, .. } => Some(i32::from(*status)),
            Self::Application { .. } => Some(APPLICATION_FAILURE_STATUS),
            _ => None,
        }
    }

    /// The parsed response body attached for diagnostics, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            Self::Application { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, KvsError>`.
pub type Result<T> = std::result::Result<T, KvsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_errors_have_no_status() {
        let err = KvsError::InvalidAction("Nope".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.status(), None);
        assert!(err.body().is_none());
    }

    #[test]
    fn application_errors_report_422() {
        let body = json!({"ErrNum": 1, "ErrMsg": "quota exceeded"});
        let err = KvsError::Application {
            err_num: 1,
            message: "quota exceeded".into(),
            body: body.clone(),
        };
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.body(), Some(&body));
    }

    #[test]
    fn aborted_keeps_sentinel_status() {
        let err = KvsError::Aborted {
            status: STATUS_ABORTED,
            message: "connection reset".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.status(), Some(-1));
    }

    #[test]
    fn signing_errors_are_local() {
        let err = KvsError::Signing("bad uri".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.status(), None);
    }
}
