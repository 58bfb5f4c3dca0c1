pub mod timeline;

pub use timeline::{StepStatus, Timeline, TimelineEntry, ToolCallRef};
