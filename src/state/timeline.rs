use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
}

/// A tool invocation attached to a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub step: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRef>,
}

/// Step/tool-call structure rebuilt from the flat event stream.
///
/// Entries are only ever appended and updated in place. Step names are not
/// unique, so every lookup prefers the entry nearest the end of the list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_step(&mut self, step: &str) -> &TimelineEntry {
        self.start_step_at(step, Utc::now())
    }

    pub fn start_step_at(&mut self, step: &str, at: DateTime<Utc>) -> &TimelineEntry {
        self.entries.push(TimelineEntry {
            step: step.to_string(),
            status: StepStatus::Running,
            timestamp: at,
            tool_calls: Vec::new(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Attaches `call` to the most recent running step. Returns `false` and
    /// drops the call when nothing is running.
    pub fn record_tool_call(&mut self, call: ToolCallRef) -> bool {
        match self
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.status == StepStatus::Running)
        {
            Some(entry) => {
                entry.tool_calls.push(call);
                true
            }
            None => false,
        }
    }

    pub fn complete_step(&mut self, step: &str) -> Option<&TimelineEntry> {
        self.complete_step_at(step, Utc::now())
    }

    /// Marks the most recent running entry named `step` as completed.
    pub fn complete_step_at(&mut self, step: &str, at: DateTime<Utc>) -> Option<&TimelineEntry> {
        let index = self
            .entries
            .iter()
            .rposition(|entry| entry.step == step && entry.status == StepStatus::Running)?;
        let entry = &mut self.entries[index];
        entry.status = StepStatus::Completed;
        entry.timestamp = at;
        Some(entry)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn running(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.status == StepStatus::Running)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
