//! Scripted transport and recording notifier for unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use folio_core::ShimError;
use http::StatusCode;
use parking_lot::Mutex;

use crate::optimistic::{Notification, Notifier, Phase};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Records every request and replays queued responses in order.
///
/// When the queue is empty it answers `200 {"data": []}`.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    responses: Mutex<VecDeque<Result<ApiResponse, ShimError>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_json(&self, status: StatusCode, body: serde_json::Value) {
        self.responses.lock().push_back(Ok(ApiResponse {
            status,
            body: Bytes::from(body.to_string()),
        }));
    }

    pub fn push_error(&self, error: ShimError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().last().cloned()
    }
}

/// Keeps every notification and phase change it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    phases: Mutex<Vec<(String, Phase, Phase)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.is_error())
            .cloned()
            .collect()
    }

    pub fn phases_of(&self, id: &str) -> Vec<(Phase, Phase)> {
        self.phases
            .lock()
            .iter()
            .filter(|(entity, _, _)| entity == id)
            .map(|(_, from, to)| (*from, *to))
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.notifications.lock().push(notification.clone());
    }

    fn on_phase_change(&self, entity_id: &str, from: Phase, to: Phase) {
        self.phases.lock().push((entity_id.to_owned(), from, to));
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ShimError> {
        self.requests.lock().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| {
            Ok(ApiResponse {
                status: StatusCode::OK,
                body: Bytes::from_static(br#"{"data":[]}"#),
            })
        })
    }
}
