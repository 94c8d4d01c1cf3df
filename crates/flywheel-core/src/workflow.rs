use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;
use crate::trigger::TriggerInstantSpec;

/// Identity of a workflow: the owning component plus the workflow's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId {
    pub component_id: String,
    pub id: String,
}

impl WorkflowId {
    pub fn new(component_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.component_id, self.id)
    }
}

/// How a workflow's executions are driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Executions are started by this scheduler through the trigger listener.
    #[default]
    Managed,
    /// Executions are driven by a separate orchestrator; the scheduler only
    /// advances this workflow's schedule bookkeeping.
    External,
}

/// A workflow's declarative configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfiguration {
    /// Workflow id within its component.
    pub id: String,
    /// Recurrence of the workflow's natural trigger.
    pub schedule: Schedule,
    /// Fixed distance from a due instant to the end of its window, in
    /// seconds. When absent the window ends at the next schedule boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<i64>,
    /// Who drives this workflow's executions.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
}

impl WorkflowConfiguration {
    /// The pure schedule-advance function: the first due instant strictly
    /// after the given one.
    pub fn next_trigger(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.next_after(after)
    }

    /// The end of the window represented by the given due instant.
    pub fn add_offset(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.offset_seconds {
            Some(secs) => instant.checked_add_signed(Duration::seconds(secs)),
            None => self.schedule.next_after(instant),
        }
    }

    /// Compute the spec that replaces the given due instant on advancement.
    pub fn next_trigger_spec(&self, current_due: DateTime<Utc>) -> Option<TriggerInstantSpec> {
        let next = self.next_trigger(current_due)?;
        let offset = self.add_offset(next)?;
        Some(TriggerInstantSpec::new(next, offset))
    }
}

/// A registered workflow: identity plus configuration, read as an immutable
/// snapshot each scheduler cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub component_id: String,
    pub configuration: WorkflowConfiguration,
}

impl Workflow {
    pub fn new(component_id: impl Into<String>, configuration: WorkflowConfiguration) -> Self {
        Self {
            component_id: component_id.into(),
            configuration,
        }
    }

    /// The workflow's identity.
    pub fn id(&self) -> WorkflowId {
        WorkflowId::new(self.component_id.clone(), self.configuration.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn daily_config() -> WorkflowConfiguration {
        WorkflowConfiguration {
            id: "daily-report".into(),
            schedule: Schedule::Days,
            offset_seconds: None,
            execution_mode: ExecutionMode::Managed,
        }
    }

    #[test]
    fn test_workflow_id_display() {
        let id = WorkflowId::new("comp", "daily-report");
        assert_eq!(id.to_string(), "comp#daily-report");
    }

    #[test]
    fn test_next_trigger_spec_daily() {
        let spec = daily_config()
            .next_trigger_spec(at("2016-10-01T00:00:00Z"))
            .unwrap();
        assert_eq!(spec.instant(), at("2016-10-02T00:00:00Z"));
        assert_eq!(spec.offset_instant(), at("2016-10-03T00:00:00Z"));
    }

    #[test]
    fn test_explicit_offset_overrides_schedule_boundary() {
        let mut config = daily_config();
        config.offset_seconds = Some(3600);
        let spec = config.next_trigger_spec(at("2016-10-01T00:00:00Z")).unwrap();
        assert_eq!(spec.instant(), at("2016-10-02T00:00:00Z"));
        assert_eq!(spec.offset_instant(), at("2016-10-02T01:00:00Z"));
    }

    #[test]
    fn test_execution_mode_default_is_managed() {
        let config: WorkflowConfiguration = serde_json::from_str(
            r#"{"id": "wf", "schedule": "@daily"}"#,
        )
        .unwrap();
        assert_eq!(config.execution_mode, ExecutionMode::Managed);
        assert!(config.offset_seconds.is_none());
    }
}
