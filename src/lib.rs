pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod state;
pub mod types;
pub mod util;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use api::StreamClient;
pub use config::Config;
pub use dispatch::{Handlers, StreamDispatcher, StreamSummary};
pub use error::StreamError;
pub use workflow::{WorkflowClient, WorkflowKind, WorkflowOutcome};
