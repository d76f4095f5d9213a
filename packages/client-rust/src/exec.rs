//! Request execution: deadline, cancellation, read retries, and response
//! normalization into [`ResponseBody`].

use std::future::Future;
use std::time::Duration;

use folio_core::{ResponseBody, ShimError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Per-call execution settings, seeded from [`ClientConfig`](crate::ClientConfig)
/// and adjustable on every builder.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
    pub retries: u32,
    pub backoff: Duration,
}

impl CallOptions {
    /// Same options with retries disabled, for non-idempotent writes.
    #[must_use]
    pub fn without_retries(mut self) -> Self {
        self.retries = 0;
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `fut` under `timeout` and, when given, `cancel`.
///
/// # Errors
///
/// [`ShimError::Timeout`] when the deadline passes first,
/// [`ShimError::Cancelled`] when the token fires first, otherwise whatever
/// `fut` resolved to.
pub async fn guarded<T, F>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<T, ShimError>
where
    F: Future<Output = Result<T, ShimError>>,
{
    let timed = async {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ShimError::Timeout {
                timeout_ms: duration_ms(timeout),
            }),
        }
    };
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(ShimError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}

/// Sends `request`, retrying transport failures up to `opts.retries` times.
async fn send_with_retries(
    transport: &dyn Transport,
    request: ApiRequest,
    opts: &CallOptions,
) -> Result<ApiResponse, ShimError> {
    let mut attempt = 0;
    loop {
        debug!(
            method = %request.method,
            path = %request.path(),
            attempt,
            "sending request"
        );
        match transport.send(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() && attempt < opts.retries => {
                warn!(
                    path = %request.path(),
                    attempt,
                    error = %err,
                    "request failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(opts.backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Maps a raw response onto the success body or an application error.
///
/// A non-2xx status yields `body.error`, or the default message when the
/// body is missing or unparsable. A 2xx body that is not JSON is a decode
/// error; an empty 2xx body counts as `{}`.
///
/// # Errors
///
/// [`ShimError::Application`] for non-2xx, [`ShimError::Decode`] for a
/// malformed success body.
pub fn normalize(response: &ApiResponse) -> Result<ResponseBody, ShimError> {
    let parsed = if response.body.is_empty() {
        Ok(ResponseBody::default())
    } else {
        serde_json::from_slice::<ResponseBody>(&response.body)
    };

    if !response.status.is_success() {
        let body = parsed.unwrap_or_default();
        return Err(ShimError::Application {
            status: response.status.as_u16(),
            message: body.error_message().to_string(),
        });
    }
    parsed.map_err(ShimError::decode)
}

/// Sends one request under the call's deadline and cancellation token and
/// normalizes the response.
///
/// # Errors
///
/// Any [`ShimError`]: transport, timeout, cancellation, application, decode.
pub async fn execute(
    transport: &dyn Transport,
    request: ApiRequest,
    opts: &CallOptions,
) -> Result<ResponseBody, ShimError> {
    let response = guarded(
        send_with_retries(transport, request, opts),
        opts.timeout,
        opts.cancel.as_ref(),
    )
    .await?;
    normalize(&response)
}

/// Decodes `data` as a list. Missing or `null` data is an empty list; a
/// bare object is a one-element list.
///
/// # Errors
///
/// [`ShimError::Decode`] if any element does not match `T`.
pub fn decode_rows<T: DeserializeOwned>(data: Option<Value>) -> Result<Vec<T>, ShimError> {
    match data {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ShimError::decode))
            .collect(),
        Some(other) => Ok(vec![serde_json::from_value(other).map_err(ShimError::decode)?]),
    }
}

/// Decodes `data` as at most one row. An array yields its first element.
///
/// # Errors
///
/// [`ShimError::Decode`] if the row does not match `T`.
pub fn decode_row<T: DeserializeOwned>(data: Option<Value>) -> Result<Option<T>, ShimError> {
    match data {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .into_iter()
            .next()
            .map(|item| serde_json::from_value(item).map_err(ShimError::decode))
            .transpose(),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(ShimError::decode),
    }
}
