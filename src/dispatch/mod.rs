//! The NDJSON event-dispatch engine.
//!
//! [`StreamDispatcher::run_stream`] opens a workflow stream, frames the body
//! into lines, parses each line into a [`WorkflowEvent`] and routes it to the
//! matching slot of a [`Handlers`] set. Bad lines and unknown tags are
//! absorbed; only transport failures and handler errors end a run early.

pub mod handlers;

pub use handlers::{HandlerResult, Handlers};

use crate::api::logging::{emit_malformed_record, emit_stream_summary};
use crate::api::{ByteStream, LineFramer, StreamClient};
use crate::error::StreamError;
use crate::types::{EventKind, WorkflowEvent};
use futures::StreamExt;
use handlers::{fire, fire_hook, fire_step, fire_text};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// What happened to the records of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Records routed to the handler set (whether or not a slot was filled).
    pub dispatched: usize,
    /// Well-formed records with a tag this workflow doesn't handle.
    pub ignored: usize,
    /// Lines that were not valid records.
    pub malformed: usize,
    pub cancelled: bool,
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dispatched={} ignored={} malformed={} cancelled={}",
            self.dispatched, self.ignored, self.malformed, self.cancelled
        )
    }
}

#[derive(Clone)]
pub struct StreamDispatcher {
    client: StreamClient,
    accepted: &'static [EventKind],
}

impl StreamDispatcher {
    /// A dispatcher that routes every known event kind.
    pub fn new(client: StreamClient) -> Self {
        Self {
            client,
            accepted: &EventKind::ALL,
        }
    }

    /// Restricts routing to `accepted`; other kinds count as unknown.
    pub fn with_accepted_events(mut self, accepted: &'static [EventKind]) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.accepted.contains(&kind)
    }

    pub async fn run_stream<B>(
        &self,
        endpoint_url: &str,
        body: &B,
        handlers: &mut Handlers<'_>,
    ) -> Result<StreamSummary, StreamError>
    where
        B: Serialize + ?Sized,
    {
        let never = CancellationToken::new();
        self.run_stream_with_cancel(endpoint_url, body, handlers, &never)
            .await
    }

    /// Like [`run_stream`](Self::run_stream), but stops early once `cancel`
    /// fires. Cancellation resolves `Ok` with `cancelled` set.
    pub async fn run_stream_with_cancel<B>(
        &self,
        endpoint_url: &str,
        body: &B,
        handlers: &mut Handlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, StreamError>
    where
        B: Serialize + ?Sized,
    {
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(StreamSummary { cancelled: true, ..StreamSummary::default() });
            }
            opened = self.client.open_stream(endpoint_url, body) => opened?,
        };

        let summary = self.consume(stream, handlers, cancel).await?;
        emit_stream_summary(endpoint_url, &summary.to_string());
        Ok(summary)
    }

    /// Drives an already-open body to completion.
    pub async fn consume(
        &self,
        mut stream: ByteStream,
        handlers: &mut Handlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, StreamError> {
        let mut framer = LineFramer::new();
        let mut summary = StreamSummary::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };

            let chunk = match next {
                None => {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                Some(None) => break,
                Some(Some(chunk)) => chunk?,
            };

            for line in framer.feed(&chunk) {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                self.route_line(&line, handlers, &mut summary)?;
            }
        }

        if let Some(line) = framer.finish() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(summary);
            }
            self.route_line(&line, handlers, &mut summary)?;
        }

        Ok(summary)
    }

    fn route_line(
        &self,
        line: &str,
        handlers: &mut Handlers<'_>,
        summary: &mut StreamSummary,
    ) -> Result<(), StreamError> {
        if line.trim().is_empty() {
            return Ok(());
        }

        let event = match parse_record(line) {
            Ok(event) => event,
            Err(_) => {
                summary.malformed += 1;
                return Ok(());
            }
        };

        match event.kind() {
            Some(kind) if self.accepts(kind) => {
                summary.dispatched += 1;
                dispatch_event(event, handlers).map_err(StreamError::Callback)
            }
            _ => {
                summary.ignored += 1;
                Ok(())
            }
        }
    }
}

/// Parses one NDJSON line. Failures are logged when diagnostics are on.
pub fn parse_record(line: &str) -> Result<WorkflowEvent, serde_json::Error> {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            emit_malformed_record(None, line, &err);
            return Err(err);
        }
    };

    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    serde_json::from_value(value).inspect_err(|err| {
        emit_malformed_record(event_type.as_deref(), line, err);
    })
}

/// Invokes the handlers for one event, in the order the hooks are documented.
pub fn dispatch_event(event: WorkflowEvent, handlers: &mut Handlers<'_>) -> HandlerResult {
    match event {
        WorkflowEvent::AgentThinking(_) => fire_hook(&mut handlers.reasoning_start),
        WorkflowEvent::ReasoningStep(payload) => fire(&mut handlers.reasoning_step, &payload),
        WorkflowEvent::ReasoningCompleted(_) => fire_hook(&mut handlers.reasoning_end),
        WorkflowEvent::ToolCalled(tool) => {
            fire(&mut handlers.tool_called, &tool)?;
            fire(&mut handlers.tool_call, &tool)
        }
        WorkflowEvent::ToolCompleted(tool) => fire(&mut handlers.tool_completed, &tool),
        WorkflowEvent::RunResponse(_) => fire_hook(&mut handlers.run_response_started),
        WorkflowEvent::Artifact(event) => fire(&mut handlers.artifact, &event.artifact),
        WorkflowEvent::ArtifactCreated(event) => {
            fire(&mut handlers.artifact_created, &event)?;
            fire(&mut handlers.artifact, &event.artifact)
        }
        WorkflowEvent::WorkflowStarted(payload) => fire(&mut handlers.workflow_started, &payload),
        WorkflowEvent::WorkflowCompleted(payload) => {
            fire(&mut handlers.workflow_completed, &payload)?;
            fire_hook(&mut handlers.completed)
        }
        WorkflowEvent::WorkflowMessage(payload) => fire(&mut handlers.workflow_message, &payload),
        WorkflowEvent::ContentChunk(chunk) => fire_text(&mut handlers.content_chunk, chunk.text()),
        WorkflowEvent::TeamMessage(payload) => fire(&mut handlers.team_message, &payload),
        WorkflowEvent::AgentStarted(payload) => fire(&mut handlers.agent_started, &payload),
        WorkflowEvent::AgentMessage(payload) => fire(&mut handlers.agent_message, &payload),
        WorkflowEvent::AgentCompleted(payload) => fire(&mut handlers.agent_completed, &payload),
        WorkflowEvent::FinalResponse(payload) => fire(&mut handlers.final_response, &payload),
        WorkflowEvent::StepStarted(step) => {
            fire_step(&mut handlers.step_started, &step.step_name, &step)
        }
        WorkflowEvent::StepCompleted(step) => {
            fire_step(&mut handlers.step_completed, &step.step_name, &step)
        }
        WorkflowEvent::RunCompleted(_) => fire_hook(&mut handlers.run_completed),
        WorkflowEvent::Error(error) => fire(&mut handlers.error, &error),
        WorkflowEvent::Unknown => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_client::MockWorkflowServer;
    use std::sync::{Arc, Mutex};

    fn dispatcher_for(chunks: Vec<&str>) -> (StreamDispatcher, MockWorkflowServer) {
        let server = MockWorkflowServer::new(vec![chunks.into_iter().map(String::from).collect()]);
        let client = StreamClient::new_mock(Arc::new(server.clone()));
        (StreamDispatcher::new(client), server)
    }

    #[test]
    fn test_parse_record_rejects_known_tag_with_wrong_shape() {
        assert!(parse_record(r#"{"type":"artifact","artifact":"not an object"}"#).is_err());
        assert!(parse_record(r#"[1,2,3]"#).is_err());
        assert!(parse_record(r#"{"type":"content_chunk","content":"ok"}"#).is_ok());
    }

    #[test]
    fn test_workflow_completed_fires_both_completion_hooks() {
        let calls = Mutex::new(Vec::new());
        let mut handlers = Handlers::new()
            .on_workflow_completed(|_| {
                calls.lock().unwrap().push("workflow_completed");
                Ok(())
            })
            .on_completed(|| {
                calls.lock().unwrap().push("completed");
                Ok(())
            })
            .on_final_response(|_| {
                calls.lock().unwrap().push("final_response");
                Ok(())
            });

        let event = parse_record(r#"{"type":"workflow_completed"}"#).unwrap();
        dispatch_event(event, &mut handlers).unwrap();
        let event = parse_record(r#"{"type":"final_response","content":"done"}"#).unwrap();
        dispatch_event(event, &mut handlers).unwrap();
        drop(handlers);

        assert_eq!(
            calls.into_inner().unwrap(),
            vec!["workflow_completed", "completed", "final_response"]
        );
    }

    #[tokio::test]
    async fn test_run_stream_posts_body_and_counts_records() {
        let (dispatcher, server) = dispatcher_for(vec![
            "{\"type\":\"agent_thinking\"}\nnot json\n",
            "{\"type\":\"brand_new_kind\"}\n\n{\"type\":\"content_chunk\",\"content\":\"Hi\"}",
        ]);
        let mut chunks = Vec::new();
        let mut handlers = Handlers::new().on_content_chunk(|chunk| {
            chunks.push(chunk.to_string());
            Ok(())
        });

        let summary = dispatcher
            .run_stream(
                "http://localhost:5002/api/crm/workflow",
                &serde_json::json!({"query": "q", "session_id": null}),
                &mut handlers,
            )
            .await
            .expect("stream should finish");
        drop(handlers);

        assert_eq!(chunks, vec!["Hi"]);
        assert_eq!(
            summary,
            StreamSummary {
                dispatched: 2,
                ignored: 1,
                malformed: 1,
                cancelled: false,
            }
        );
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "http://localhost:5002/api/crm/workflow");
        assert_eq!(requests[0].1["query"], "q");
    }

    #[tokio::test]
    async fn test_filtered_kinds_count_as_ignored() {
        let (dispatcher, _server) = dispatcher_for(vec!["{\"type\":\"team_message\"}\n"]);
        let dispatcher = dispatcher.with_accepted_events(&[EventKind::ContentChunk]);
        let mut invoked = false;
        let mut handlers = Handlers::new().on_team_message(|_| {
            invoked = true;
            Ok(())
        });

        let summary = dispatcher
            .run_stream("http://localhost:5002/x", &Value::Null, &mut handlers)
            .await
            .unwrap();
        drop(handlers);

        assert!(!invoked);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.dispatched, 0);
    }

    #[tokio::test]
    async fn test_cancel_before_open_skips_request() {
        let (dispatcher, server) = dispatcher_for(vec!["{\"type\":\"run_response\"}\n"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = dispatcher
            .run_stream_with_cancel(
                "http://localhost:5002/x",
                &Value::Null,
                &mut Handlers::new(),
                &cancel,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert!(server.requests().is_empty());
    }
}
