//! The `{ data, error }` result shape returned by every shim operation,
//! and the JSON body exchanged with the data endpoint.

use serde::{Deserialize, Serialize};

use crate::error::{ShimError, DEFAULT_FAILURE_MESSAGE};

/// Uniform result of a shim operation.
///
/// At most one side is populated. Both are empty only for a successful
/// operation that produced no row: a `single()` read with no match, or a
/// write whose endpoint did not echo the row. List reads with no rows carry
/// `Some(vec![])`, never `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    data: Option<T>,
    error: Option<ShimError>,
}

impl<T> Envelope<T> {
    /// Successful result carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// Successful result with no row.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    /// Failed result.
    pub fn err(error: ShimError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    /// Successful result carrying `data` when present.
    pub fn from_option(data: Option<T>) -> Self {
        Self { data, error: None }
    }

    /// Envelope for an operation that may legitimately produce no row.
    pub fn from_optional(result: Result<Option<T>, ShimError>) -> Self {
        match result {
            Ok(data) => Self::from_option(data),
            Err(error) => Self::err(error),
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ShimError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_parts(self) -> (Option<T>, Option<ShimError>) {
        (self.data, self.error)
    }

    /// Converts to a `Result`, for callers that prefer `?`.
    ///
    /// # Errors
    ///
    /// Returns the envelope's error when it holds one.
    pub fn into_result(self) -> Result<Option<T>, ShimError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            data: self.data.map(f),
            error: self.error,
        }
    }
}

impl<T> From<Result<T, ShimError>> for Envelope<T> {
    fn from(result: Result<T, ShimError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(error),
        }
    }
}

/// Error field of a response body: either a bare string or `{ message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireError {
    Text(String),
    Object { message: String },
}

impl WireError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Text(message) | Self::Object { message } => message,
        }
    }
}

/// JSON body of every `/db` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl ResponseBody {
    /// Success body wrapping `data`.
    #[must_use]
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// Failure body with a plain-string error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(WireError::Text(message.into())),
        }
    }

    /// Message to surface for a failed response.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .map_or(DEFAULT_FAILURE_MESSAGE, WireError::message)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn exclusive<T>(env: &Envelope<T>) -> bool {
        !(env.data().is_some() && env.error().is_some())
    }

    #[test]
    fn constructors_keep_sides_exclusive() {
        assert!(exclusive(&Envelope::ok(1)));
        assert!(exclusive(&Envelope::<i32>::empty()));
        assert!(exclusive(&Envelope::<i32>::err(ShimError::Cancelled)));
        assert!(exclusive(&Envelope::from(Err::<i32, _>(ShimError::Cancelled))));
    }

    #[test]
    fn empty_list_is_data_not_none() {
        let env = Envelope::ok(Vec::<i32>::new());
        assert_eq!(env.data(), Some(&vec![]));
        assert!(env.error().is_none());
    }

    #[test]
    fn into_result_surfaces_error() {
        let env = Envelope::<i32>::err(ShimError::Timeout { timeout_ms: 5 });
        assert_eq!(env.into_result(), Err(ShimError::Timeout { timeout_ms: 5 }));
        assert_eq!(Envelope::ok(3).into_result(), Ok(Some(3)));
        assert_eq!(Envelope::<i32>::empty().into_result(), Ok(None));
    }

    #[test]
    fn serializes_as_data_error_pair() {
        let env = Envelope::<i32>::err(ShimError::MissingFilter {
            operation: "delete",
        });
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({ "data": null, "error": { "message": "Column filter required for delete" } })
        );
    }

    #[test]
    fn response_body_accepts_both_error_shapes() {
        let text: ResponseBody = serde_json::from_value(json!({ "error": "nope" })).unwrap();
        assert_eq!(text.error_message(), "nope");

        let object: ResponseBody =
            serde_json::from_value(json!({ "error": { "message": "denied" } })).unwrap();
        assert_eq!(object.error_message(), "denied");
    }

    #[test]
    fn response_body_without_error_uses_fallback() {
        let body: ResponseBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.error_message(), "Request failed");
        assert!(body.data.is_none());
    }
}
