pub mod events;
pub mod requests;

pub use events::{
    Artifact, ArtifactEvent, ArtifactKind, ContentChunk, ErrorEvent, EventKind, EventPayload,
    StepEvent, ToolEvent, WorkflowEvent,
};
pub use requests::{AccountIntelRequest, CrmWorkflowRequest};
