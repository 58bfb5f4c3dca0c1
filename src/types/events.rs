use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One NDJSON record from a workflow stream, tagged by its `type` field.
///
/// Tags this client doesn't know deserialize to [`WorkflowEvent::Unknown`] so
/// the backend can grow new event kinds without breaking older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    AgentThinking(EventPayload),
    ReasoningStep(EventPayload),
    ReasoningCompleted(EventPayload),
    ToolCalled(ToolEvent),
    ToolCompleted(ToolEvent),
    RunResponse(EventPayload),
    Artifact(ArtifactEvent),
    ArtifactCreated(ArtifactEvent),
    WorkflowStarted(EventPayload),
    WorkflowCompleted(EventPayload),
    WorkflowMessage(EventPayload),
    ContentChunk(ContentChunk),
    TeamMessage(EventPayload),
    AgentStarted(EventPayload),
    AgentMessage(EventPayload),
    AgentCompleted(EventPayload),
    FinalResponse(EventPayload),
    StepStarted(StepEvent),
    StepCompleted(StepEvent),
    RunCompleted(EventPayload),
    Error(ErrorEvent),
    #[serde(other)]
    Unknown,
}

impl WorkflowEvent {
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            Self::AgentThinking(_) => EventKind::AgentThinking,
            Self::ReasoningStep(_) => EventKind::ReasoningStep,
            Self::ReasoningCompleted(_) => EventKind::ReasoningCompleted,
            Self::ToolCalled(_) => EventKind::ToolCalled,
            Self::ToolCompleted(_) => EventKind::ToolCompleted,
            Self::RunResponse(_) => EventKind::RunResponse,
            Self::Artifact(_) => EventKind::Artifact,
            Self::ArtifactCreated(_) => EventKind::ArtifactCreated,
            Self::WorkflowStarted(_) => EventKind::WorkflowStarted,
            Self::WorkflowCompleted(_) => EventKind::WorkflowCompleted,
            Self::WorkflowMessage(_) => EventKind::WorkflowMessage,
            Self::ContentChunk(_) => EventKind::ContentChunk,
            Self::TeamMessage(_) => EventKind::TeamMessage,
            Self::AgentStarted(_) => EventKind::AgentStarted,
            Self::AgentMessage(_) => EventKind::AgentMessage,
            Self::AgentCompleted(_) => EventKind::AgentCompleted,
            Self::FinalResponse(_) => EventKind::FinalResponse,
            Self::StepStarted(_) => EventKind::StepStarted,
            Self::StepCompleted(_) => EventKind::StepCompleted,
            Self::RunCompleted(_) => EventKind::RunCompleted,
            Self::Error(_) => EventKind::Error,
            Self::Unknown => return None,
        };
        Some(kind)
    }
}

/// Payload-free discriminant of [`WorkflowEvent`], used to describe which
/// events a workflow recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AgentThinking,
    ReasoningStep,
    ReasoningCompleted,
    ToolCalled,
    ToolCompleted,
    RunResponse,
    Artifact,
    ArtifactCreated,
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowMessage,
    ContentChunk,
    TeamMessage,
    AgentStarted,
    AgentMessage,
    AgentCompleted,
    FinalResponse,
    StepStarted,
    StepCompleted,
    RunCompleted,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 21] = [
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
        EventKind::TeamMessage,
        EventKind::AgentStarted,
        EventKind::AgentMessage,
        EventKind::AgentCompleted,
        EventKind::FinalResponse,
        EventKind::StepStarted,
        EventKind::StepCompleted,
        EventKind::RunCompleted,
        EventKind::Error,
    ];

    /// Wire tag of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentThinking => "agent_thinking",
            Self::ReasoningStep => "reasoning_step",
            Self::ReasoningCompleted => "reasoning_completed",
            Self::ToolCalled => "tool_called",
            Self::ToolCompleted => "tool_completed",
            Self::RunResponse => "run_response",
            Self::Artifact => "artifact",
            Self::ArtifactCreated => "artifact_created",
            Self::WorkflowStarted => "workflow_started",
            Self::WorkflowCompleted => "workflow_completed",
            Self::WorkflowMessage => "workflow_message",
            Self::ContentChunk => "content_chunk",
            Self::TeamMessage => "team_message",
            Self::AgentStarted => "agent_started",
            Self::AgentMessage => "agent_message",
            Self::AgentCompleted => "agent_completed",
            Self::FinalResponse => "final_response",
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::RunCompleted => "run_completed",
            Self::Error => "error",
        }
    }
}

/// Free-form event body. Everything except `type` is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Narrative text, when the backend sent one under `content` or `message`.
    pub fn text(&self) -> Option<&str> {
        self.str_field("content")
            .or_else(|| self.str_field("message"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Tool identity as the backend reports it: a display name or an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolEvent {
    /// `name`, else the `tool` identity (string or `tool.name`).
    pub fn tool_name(&self) -> Option<&str> {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return Some(name);
        }
        match &self.tool {
            Some(Value::String(name)) if !name.is_empty() => Some(name),
            Some(Value::Object(tool)) => tool
                .get("name")
                .or_else(|| tool.get("tool_name"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn args(&self) -> Option<&Value> {
        self.args.as_ref().or_else(|| self.extra.get("tool_args"))
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref().or_else(|| self.extra.get("result"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEvent {
    pub artifact: Artifact,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A deliverable produced by the workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<ArtifactKind>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Table,
    Brief,
    Email,
    Chart,
    File,
    /// Any other label the backend uses, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl ArtifactKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "table" => Self::Table,
            "brief" => Self::Brief,
            "email" => Self::Email,
            "chart" => Self::Chart,
            "file" => Self::File,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "table",
            Self::Brief => "brief",
            Self::Email => "email",
            Self::Chart => "chart",
            Self::File => "file",
            Self::Other(label) => label,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentChunk {
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Legacy coarse step lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    pub step_name: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A failure reported by the backend inside the stream. Not fatal to the
/// stream itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorEvent {
    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown workflow error")
    }
}

// Incidental fields never reject a record: strings pass through, null is
// absent and anything else is kept as its JSON text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_kind<'de, D>(deserializer: D) -> Result<Option<ArtifactKind>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(label)) => Some(ArtifactKind::from_label(&label)),
        _ => None,
    })
}
