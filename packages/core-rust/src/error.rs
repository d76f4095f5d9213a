//! Error taxonomy shared by the shim and its callers.
//!
//! Every shim operation resolves to an [`Envelope`](crate::Envelope) whose
//! error side is a [`ShimError`]. On the wire (and in UI notifications) an
//! error is reduced to its message: `{ "message": "..." }`.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Fallback message used when a failed response carries no error text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

/// Failure modes surfaced by the data-access shim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShimError {
    /// Fetch-level failure: DNS, refused connection, reset, TLS.
    #[error("{message}")]
    Transport { message: String },
    /// Non-2xx response from the data endpoint.
    #[error("{message}")]
    Application { status: u16, message: String },
    /// Caller-side validation rejected the row before any request was made.
    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },
    /// `update`/`delete` executed without an identifying filter.
    #[error("Column filter required for {operation}")]
    MissingFilter { operation: &'static str },
    /// `update`/`delete` filtered by a column other than the primary key.
    #[error("{operation} can only target rows by `id`, not `{column}`")]
    UnsupportedFilter {
        operation: &'static str,
        column: String,
    },
    /// A read filtered on a name the endpoint reserves for query controls.
    #[error("`{column}` is a reserved query parameter and cannot be filtered on")]
    ReservedColumn { column: String },
    /// The request did not complete within its deadline.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The request was cancelled through its cancellation token.
    #[error("request cancelled")]
    Cancelled,
    /// The response body could not be decoded into the expected row type.
    #[error("invalid response body: {message}")]
    Decode { message: String },
    /// A row or patch could not be encoded as a JSON object.
    #[error("could not encode row: {message}")]
    Encode { message: String },
}

impl ShimError {
    /// Builds a transport error from any displayable source.
    pub fn transport(source: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: source.to_string(),
        }
    }

    /// Builds a decode error from any displayable source.
    pub fn decode(source: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: source.to_string(),
        }
    }

    /// Builds an encode error from any displayable source.
    pub fn encode(source: impl std::fmt::Display) -> Self {
        Self::Encode {
            message: source.to_string(),
        }
    }

    /// User-facing message, as shown in notifications.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether a read that failed this way may be retried.
    ///
    /// Only transport failures qualify: an application error is the server's
    /// answer and repeating the request would not change it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the error was produced locally without touching the network.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::MissingFilter { .. }
                | Self::UnsupportedFilter { .. }
                | Self::ReservedColumn { .. }
                | Self::Encode { .. }
        )
    }
}

impl Serialize for ShimError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ShimError", 1)?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}
