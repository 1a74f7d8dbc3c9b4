//! Shared test utilities for the `ai` module.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::{BackendMetadata, Generation, GenerationRequest, GenerativeBackend};

/// Mock backend with a pre-programmed queue of responses.
///
/// Responses are returned in FIFO order. When the queue is exhausted,
/// subsequent calls return `Err("no more mock responses")`.
///
/// Every call records the full [`GenerationRequest`] so tests can inspect
/// what was dispatched. Use [`request_handle`](Self::request_handle) to read
/// the recorded requests after the backend has been moved into a
/// [`ChatTransport`](super::transport::ChatTransport).
pub(crate) struct ConfigurableMockBackend {
    responses: Arc<Mutex<VecDeque<Result<Generation>>>>,
    recorded_requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ConfigurableMockBackend {
    /// Creates a mock that returns the given generations in order.
    pub(crate) fn new(responses: Vec<Result<Generation>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            recorded_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock that returns plain texts without usage metadata.
    pub(crate) fn with_texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| {
                    Ok(Generation {
                        text: (*t).to_string(),
                        usage: None,
                    })
                })
                .collect(),
        )
    }

    /// Returns a handle for inspecting dispatched requests.
    pub(crate) fn request_handle(&self) -> RequestRecordHandle {
        RequestRecordHandle {
            recorded_requests: self.recorded_requests.clone(),
        }
    }
}

/// Shared handle to a mock backend's recorded requests.
pub(crate) struct RequestRecordHandle {
    recorded_requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl RequestRecordHandle {
    /// Returns all recorded requests.
    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.recorded_requests.lock().unwrap().clone()
    }

    /// Returns the number of requests that were made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded_requests.lock().unwrap().len()
    }
}

impl GenerativeBackend for ConfigurableMockBackend {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Generation>> + Send + 'a>> {
        let responses = self.responses.clone();
        let recorded = self.recorded_requests.clone();
        let request = request.clone();
        Box::pin(async move {
            recorded.lock().unwrap().push(request);
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no more mock responses")))
        })
    }

    fn get_metadata(&self) -> BackendMetadata {
        BackendMetadata {
            provider: "Mock".to_string(),
            base_url: "mock://".to_string(),
        }
    }
}
