use crate::api::client::{ByteStream, MockStreamProducer};
use crate::error::StreamError;
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Serves canned NDJSON bodies, one per request, and remembers what was asked.
#[derive(Clone, Default)]
pub struct MockWorkflowServer {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockWorkflowServer {
    /// Each response is a list of body chunks, delivered as-is.
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockWorkflowServer {
    fn create_mock_stream(&self, url: &str, body: &Value) -> Result<ByteStream, StreamError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(StreamError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        let chunks = responses_guard.remove(0);

        let byte_chunks: Vec<Result<Bytes, StreamError>> =
            chunks.into_iter().map(|s| Ok(Bytes::from(s))).collect();

        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}
