use crate::state::TimelineEntry;
use crate::types::{Artifact, ArtifactEvent, ErrorEvent, EventPayload, StepEvent, ToolEvent};

/// Result handlers return. An `Err` stops the stream and surfaces as
/// [`crate::StreamError::Callback`].
pub type HandlerResult = anyhow::Result<()>;

pub type Hook<'h> = Box<dyn FnMut() -> HandlerResult + Send + 'h>;
pub type Handler<'h, T> = Box<dyn FnMut(&T) -> HandlerResult + Send + 'h>;
pub type TextHandler<'h> = Box<dyn FnMut(&str) -> HandlerResult + Send + 'h>;
pub type StepHandler<'h> = Box<dyn FnMut(&str, &StepEvent) -> HandlerResult + Send + 'h>;

/// Caller-supplied callbacks, one optional slot per hook.
///
/// Every slot starts empty; subscribe only to what you need:
///
/// ```
/// use crmstream::Handlers;
///
/// let mut answer = String::new();
/// let handlers = Handlers::new().on_content_chunk(|chunk| {
///     answer.push_str(chunk);
///     Ok(())
/// });
/// assert_eq!(handlers.subscribed(), vec!["on_content_chunk"]);
/// ```
#[derive(Default)]
pub struct Handlers<'h> {
    pub(crate) reasoning_start: Option<Hook<'h>>,
    pub(crate) reasoning_step: Option<Handler<'h, EventPayload>>,
    pub(crate) reasoning_end: Option<Hook<'h>>,
    pub(crate) tool_call: Option<Handler<'h, ToolEvent>>,
    pub(crate) tool_called: Option<Handler<'h, ToolEvent>>,
    pub(crate) tool_completed: Option<Handler<'h, ToolEvent>>,
    pub(crate) step_started: Option<StepHandler<'h>>,
    pub(crate) step_completed: Option<StepHandler<'h>>,
    pub(crate) run_response_started: Option<Hook<'h>>,
    pub(crate) artifact: Option<Handler<'h, Artifact>>,
    pub(crate) artifact_created: Option<Handler<'h, ArtifactEvent>>,
    pub(crate) completed: Option<Hook<'h>>,
    pub(crate) workflow_message: Option<Handler<'h, EventPayload>>,
    pub(crate) content_chunk: Option<TextHandler<'h>>,
    pub(crate) workflow_started: Option<Handler<'h, EventPayload>>,
    pub(crate) workflow_completed: Option<Handler<'h, EventPayload>>,
    pub(crate) team_message: Option<Handler<'h, EventPayload>>,
    pub(crate) agent_started: Option<Handler<'h, EventPayload>>,
    pub(crate) agent_message: Option<Handler<'h, EventPayload>>,
    pub(crate) agent_completed: Option<Handler<'h, EventPayload>>,
    pub(crate) final_response: Option<Handler<'h, EventPayload>>,
    pub(crate) run_completed: Option<Hook<'h>>,
    pub(crate) error: Option<Handler<'h, ErrorEvent>>,
    pub(crate) timeline_step: Option<Handler<'h, TimelineEntry>>,
}

impl<'h> Handlers<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `agent_thinking`: a reasoning phase started.
    pub fn on_reasoning_start(mut self, f: impl FnMut() -> HandlerResult + Send + 'h) -> Self {
        self.reasoning_start = Some(Box::new(f));
        self
    }

    pub fn on_reasoning_step(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.reasoning_step = Some(Box::new(f));
        self
    }

    /// `reasoning_completed`.
    pub fn on_reasoning_end(mut self, f: impl FnMut() -> HandlerResult + Send + 'h) -> Self {
        self.reasoning_end = Some(Box::new(f));
        self
    }

    /// Every `tool_called` record.
    pub fn on_tool_call(mut self, f: impl FnMut(&ToolEvent) -> HandlerResult + Send + 'h) -> Self {
        self.tool_call = Some(Box::new(f));
        self
    }

    /// Also fires for `tool_called`, ahead of [`Handlers::on_tool_call`].
    pub fn on_tool_called(
        mut self,
        f: impl FnMut(&ToolEvent) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.tool_called = Some(Box::new(f));
        self
    }

    pub fn on_tool_completed(
        mut self,
        f: impl FnMut(&ToolEvent) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.tool_completed = Some(Box::new(f));
        self
    }

    /// Legacy `step_started`, called with the step name.
    pub fn on_step_started(
        mut self,
        f: impl FnMut(&str, &StepEvent) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.step_started = Some(Box::new(f));
        self
    }

    pub fn on_step_completed(
        mut self,
        f: impl FnMut(&str, &StepEvent) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.step_completed = Some(Box::new(f));
        self
    }

    /// `run_response`: artifact generation began.
    pub fn on_run_response_started(
        mut self,
        f: impl FnMut() -> HandlerResult + Send + 'h,
    ) -> Self {
        self.run_response_started = Some(Box::new(f));
        self
    }

    /// The artifact of an `artifact` or `artifact_created` record.
    pub fn on_artifact(mut self, f: impl FnMut(&Artifact) -> HandlerResult + Send + 'h) -> Self {
        self.artifact = Some(Box::new(f));
        self
    }

    pub fn on_artifact_created(
        mut self,
        f: impl FnMut(&ArtifactEvent) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.artifact_created = Some(Box::new(f));
        self
    }

    /// Generic completion, fired right after `on_workflow_completed`.
    pub fn on_completed(mut self, f: impl FnMut() -> HandlerResult + Send + 'h) -> Self {
        self.completed = Some(Box::new(f));
        self
    }

    pub fn on_workflow_message(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.workflow_message = Some(Box::new(f));
        self
    }

    pub fn on_content_chunk(mut self, f: impl FnMut(&str) -> HandlerResult + Send + 'h) -> Self {
        self.content_chunk = Some(Box::new(f));
        self
    }

    pub fn on_workflow_started(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.workflow_started = Some(Box::new(f));
        self
    }

    pub fn on_workflow_completed(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.workflow_completed = Some(Box::new(f));
        self
    }

    pub fn on_team_message(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.team_message = Some(Box::new(f));
        self
    }

    pub fn on_agent_started(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.agent_started = Some(Box::new(f));
        self
    }

    pub fn on_agent_message(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.agent_message = Some(Box::new(f));
        self
    }

    pub fn on_agent_completed(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.agent_completed = Some(Box::new(f));
        self
    }

    /// `final_response`. Does not fire `on_completed`.
    pub fn on_final_response(
        mut self,
        f: impl FnMut(&EventPayload) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.final_response = Some(Box::new(f));
        self
    }

    pub fn on_run_completed(mut self, f: impl FnMut() -> HandlerResult + Send + 'h) -> Self {
        self.run_completed = Some(Box::new(f));
        self
    }

    /// A failure the backend reported in-band.
    pub fn on_error(mut self, f: impl FnMut(&ErrorEvent) -> HandlerResult + Send + 'h) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// The timeline entry a step transition produced. Only
    /// [`crate::WorkflowClient`] runs fire this; completions that match no
    /// running step are not reported.
    pub fn on_timeline_step(
        mut self,
        f: impl FnMut(&TimelineEntry) -> HandlerResult + Send + 'h,
    ) -> Self {
        self.timeline_step = Some(Box::new(f));
        self
    }

    /// Names of the hooks that have a handler, in declaration order.
    pub fn subscribed(&self) -> Vec<&'static str> {
        [
            ("on_reasoning_start", self.reasoning_start.is_some()),
            ("on_reasoning_step", self.reasoning_step.is_some()),
            ("on_reasoning_end", self.reasoning_end.is_some()),
            ("on_tool_call", self.tool_call.is_some()),
            ("on_tool_called", self.tool_called.is_some()),
            ("on_tool_completed", self.tool_completed.is_some()),
            ("on_step_started", self.step_started.is_some()),
            ("on_step_completed", self.step_completed.is_some()),
            ("on_run_response_started", self.run_response_started.is_some()),
            ("on_artifact", self.artifact.is_some()),
            ("on_artifact_created", self.artifact_created.is_some()),
            ("on_completed", self.completed.is_some()),
            ("on_workflow_message", self.workflow_message.is_some()),
            ("on_content_chunk", self.content_chunk.is_some()),
            ("on_workflow_started", self.workflow_started.is_some()),
            ("on_workflow_completed", self.workflow_completed.is_some()),
            ("on_team_message", self.team_message.is_some()),
            ("on_agent_started", self.agent_started.is_some()),
            ("on_agent_message", self.agent_message.is_some()),
            ("on_agent_completed", self.agent_completed.is_some()),
            ("on_final_response", self.final_response.is_some()),
            ("on_run_completed", self.run_completed.is_some()),
            ("on_error", self.error.is_some()),
            ("on_timeline_step", self.timeline_step.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

pub(crate) fn fire_hook(hook: &mut Option<Hook<'_>>) -> HandlerResult {
    match hook {
        Some(hook) => hook(),
        None => Ok(()),
    }
}

pub(crate) fn fire<T>(handler: &mut Option<Handler<'_, T>>, value: &T) -> HandlerResult {
    match handler {
        Some(handler) => handler(value),
        None => Ok(()),
    }
}

pub(crate) fn fire_text(handler: &mut Option<TextHandler<'_>>, text: &str) -> HandlerResult {
    match handler {
        Some(handler) => handler(text),
        None => Ok(()),
    }
}

pub(crate) fn fire_step(
    handler: &mut Option<StepHandler<'_>>,
    step_name: &str,
    event: &StepEvent,
) -> HandlerResult {
    match handler {
        Some(handler) => handler(step_name, event),
        None => Ok(()),
    }
}
