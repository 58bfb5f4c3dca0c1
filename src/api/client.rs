use super::logging::{debug_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::StreamError;
use crate::util::is_local_endpoint_url;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use std::pin::Pin;
#[cfg(test)]
use serde_json::Value;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, url: &str, body: &Value) -> Result<ByteStream, StreamError>;
}

/// POSTs a JSON body to a workflow endpoint and hands back the raw NDJSON
/// response body.
#[derive(Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    auth_token: Option<String>,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl StreamClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_http_client(config, http))
    }

    /// Uses a caller-built `reqwest::Client` (proxies, TLS roots, pooling).
    pub fn with_http_client(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            auth_token: config.auth_token.clone(),
            #[cfg(test)]
            mock_stream_producer: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_token: None,
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub async fn open_stream<B>(&self, url: &str, body: &B) -> Result<ByteStream, StreamError>
    where
        B: Serialize + ?Sized,
    {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                let body = serde_json::to_value(body).unwrap_or(Value::Null);
                return producer.create_mock_stream(url, &body);
            }
        }

        if debug_enabled() {
            if let Ok(payload) = serde_json::to_value(body) {
                emit_debug_payload(url, &payload);
            }
        }

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, NDJSON_CONTENT_TYPE)
            .json(body);
        if let Some(token) = &self.auth_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_request_error(error, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if is_null_body_status(status) {
            return Err(StreamError::MissingBody {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let url_for_stream = url.to_string();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| StreamError::Interrupted {
                url: url_for_stream.clone(),
                reason: error.to_string(),
            })
        });
        Ok(Box::pin(stream))
    }
}

/// Success statuses that by definition carry no body.
fn is_null_body_status(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT
}

fn map_request_error(error: reqwest::Error, request_url: &str) -> StreamError {
    let reason = if error.is_connect() && is_local_endpoint_url(request_url) {
        format!("{error}. Start the local backend or update CRMSTREAM_API_URL.")
    } else if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_builder() {
        format!("invalid request: {error}")
    } else {
        error.to_string()
    };
    StreamError::Connect {
        url: request_url.to_string(),
        reason,
    }
}
