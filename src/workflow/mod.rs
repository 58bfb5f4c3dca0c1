//! The two backend workflows, as configuration over one [`StreamDispatcher`].

use crate::api::StreamClient;
use crate::config::Config;
use crate::dispatch::handlers::{fire, fire_step, Handler};
use crate::dispatch::{HandlerResult, Handlers, StreamDispatcher, StreamSummary};
use crate::error::StreamError;
use crate::state::{Timeline, TimelineEntry, ToolCallRef};
use crate::types::{
    AccountIntelRequest, Artifact, CrmWorkflowRequest, EventKind, StepEvent, ToolEvent,
};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

const ACCOUNT_INTEL_EVENTS: [EventKind; 16] = [
    EventKind::AgentThinking,
    EventKind::ReasoningStep,
    EventKind::ReasoningCompleted,
    EventKind::ToolCalled,
    EventKind::ToolCompleted,
    EventKind::RunResponse,
    EventKind::Artifact,
    EventKind::ArtifactCreated,
    EventKind::WorkflowStarted,
    EventKind::WorkflowCompleted,
    EventKind::WorkflowMessage,
    EventKind::ContentChunk,
    EventKind::StepStarted,
    EventKind::StepCompleted,
    EventKind::RunCompleted,
    EventKind::Error,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    AccountIntel,
    Crm,
}

impl WorkflowKind {
    /// Event kinds this workflow routes. The CRM workflow adds the
    /// team/agent lifecycle and `final_response` to the account-intel set.
    pub fn events(self) -> &'static [EventKind] {
        match self {
            Self::AccountIntel => &ACCOUNT_INTEL_EVENTS,
            Self::Crm => &EventKind::ALL,
        }
    }

    pub fn endpoint_path(self, config: &Config) -> &str {
        match self {
            Self::AccountIntel => &config.account_intel_path,
            Self::Crm => &config.crm_workflow_path,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AccountIntel => "account_intel",
            Self::Crm => "crm",
        }
    }
}

/// What a workflow run produced, besides the live handler calls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowOutcome {
    pub artifacts: Vec<Artifact>,
    pub timeline: Timeline,
    pub summary: StreamSummary,
}

impl WorkflowOutcome {
    pub fn latest_artifact(&self) -> Option<&Artifact> {
        self.artifacts.last()
    }
}

#[derive(Default)]
struct RunState {
    artifacts: Vec<Artifact>,
    timeline: Timeline,
}

#[derive(Clone)]
pub struct WorkflowClient {
    config: Config,
    client: StreamClient,
}

impl WorkflowClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = StreamClient::new(&config)?;
        Ok(Self::with_stream_client(config, client))
    }

    pub fn with_stream_client(config: Config, client: StreamClient) -> Self {
        Self { config, client }
    }

    pub fn endpoint_url(&self, kind: WorkflowKind) -> String {
        self.config.endpoint_url(kind.endpoint_path(&self.config))
    }

    pub fn dispatcher(&self, kind: WorkflowKind) -> StreamDispatcher {
        StreamDispatcher::new(self.client.clone()).with_accepted_events(kind.events())
    }

    pub async fn account_intel(
        &self,
        request: &AccountIntelRequest,
        handlers: Handlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, StreamError> {
        self.run(WorkflowKind::AccountIntel, request, handlers, cancel)
            .await
    }

    pub async fn crm_workflow(
        &self,
        request: &CrmWorkflowRequest,
        handlers: Handlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, StreamError> {
        self.run(WorkflowKind::Crm, request, handlers, cancel).await
    }

    /// Runs `kind` with the caller's handlers, accumulating the timeline and
    /// artifacts on the side.
    pub async fn run<B>(
        &self,
        kind: WorkflowKind,
        body: &B,
        handlers: Handlers<'_>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowOutcome, StreamError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let state = Mutex::new(RunState::default());
        let url = self.endpoint_url(kind);
        let mut handlers = track_run(handlers, &state);

        let summary = self
            .dispatcher(kind)
            .run_stream_with_cancel(&url, body, &mut handlers, cancel)
            .await?;
        drop(handlers);

        let state = state
            .into_inner()
            .map_err(|_| StreamError::Callback(anyhow!("workflow run state poisoned")))?;
        Ok(WorkflowOutcome {
            artifacts: state.artifacts,
            timeline: state.timeline,
            summary,
        })
    }
}

fn lock(state: &Mutex<RunState>) -> Result<MutexGuard<'_, RunState>> {
    state
        .lock()
        .map_err(|_| anyhow!("workflow run state poisoned"))
}

fn tool_call_ref(tool: &ToolEvent) -> ToolCallRef {
    ToolCallRef {
        kind: EventKind::ToolCalled.as_str().to_string(),
        name: tool.tool_name().unwrap_or("tool_call").to_string(),
    }
}

fn notify_step(
    hook: &Mutex<Option<Handler<'_, TimelineEntry>>>,
    entry: &TimelineEntry,
) -> HandlerResult {
    let mut hook = hook
        .lock()
        .map_err(|_| anyhow!("timeline hook poisoned"))?;
    fire(&mut *hook, entry)
}

/// Wraps the step, tool-call and artifact slots so `state` sees every event
/// before the caller's own handler does.
///
/// A step completion that matches no running entry changes nothing and is
/// not forwarded.
fn track_run<'s>(mut handlers: Handlers<'s>, state: &'s Mutex<RunState>) -> Handlers<'s> {
    let timeline_step = Arc::new(Mutex::new(handlers.timeline_step.take()));

    let on_started = Arc::clone(&timeline_step);
    let mut forward_step_started = handlers.step_started.take();
    handlers.step_started = Some(Box::new(
        move |step_name: &str, event: &StepEvent| -> HandlerResult {
            let entry = lock(state)?.timeline.start_step(step_name).clone();
            notify_step(&on_started, &entry)?;
            fire_step(&mut forward_step_started, step_name, event)
        },
    ));

    let on_completed = timeline_step;
    let mut forward_step_completed = handlers.step_completed.take();
    handlers.step_completed = Some(Box::new(
        move |step_name: &str, event: &StepEvent| -> HandlerResult {
            let completed = lock(state)?.timeline.complete_step(step_name).cloned();
            let Some(entry) = completed else {
                return Ok(());
            };
            notify_step(&on_completed, &entry)?;
            fire_step(&mut forward_step_completed, step_name, event)
        },
    ));

    let mut forward_tool_call = handlers.tool_call.take();
    handlers.tool_call = Some(Box::new(move |tool: &ToolEvent| -> HandlerResult {
        lock(state)?.timeline.record_tool_call(tool_call_ref(tool));
        fire(&mut forward_tool_call, tool)
    }));

    let mut forward_artifact = handlers.artifact.take();
    handlers.artifact = Some(Box::new(move |artifact: &Artifact| -> HandlerResult {
        lock(state)?.artifacts.push(artifact.clone());
        fire(&mut forward_artifact, artifact)
    }));

    handlers
}
