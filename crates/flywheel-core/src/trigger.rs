use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an execution was started.
///
/// The trigger scheduler only ever emits [`Trigger::Natural`]; the other
/// kinds identify executions requested out of band and are carried so a
/// listener can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// The workflow's regularly scheduled firing.
    Natural,
    /// A one-off, manually requested firing.
    Adhoc { trigger_id: String },
    /// A firing replayed over a historical window.
    Backfill { trigger_id: String },
}

impl Trigger {
    /// A short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Adhoc { .. } => "adhoc",
            Self::Backfill { .. } => "backfill",
        }
    }
}

/// Caller-supplied parameters attached to a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerParameters {
    /// Environment overrides passed through to the execution.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TriggerParameters {
    /// The empty parameter set used for natural triggers.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// A workflow's next due instant and the end of the window it represents.
///
/// Immutable: advancement replaces the whole value, it never mutates one
/// field in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInstantSpec {
    instant: DateTime<Utc>,
    offset_instant: DateTime<Utc>,
}

impl TriggerInstantSpec {
    /// Create a new spec from a due instant and its window end.
    pub fn new(instant: DateTime<Utc>, offset_instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            offset_instant,
        }
    }

    /// The due instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// The end of the window the due instant represents.
    pub fn offset_instant(&self) -> DateTime<Utc> {
        self.offset_instant
    }

    /// Whether this spec is due at the given time (not after it).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.instant <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_parameters_are_empty() {
        assert!(TriggerParameters::zero().env.is_empty());
    }

    #[test]
    fn test_due_is_inclusive() {
        let now: DateTime<Utc> = "2016-10-10T13:11:11Z".parse().unwrap();
        let spec = TriggerInstantSpec::new(now, now);
        assert!(spec.is_due(now));
        assert!(!spec.is_due(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_trigger_serde_tagging() {
        let json = serde_json::to_value(Trigger::Natural).unwrap();
        assert_eq!(json["kind"], "natural");
        assert_eq!(Trigger::Natural.kind(), "natural");

        let json = serde_json::to_value(Trigger::Adhoc {
            trigger_id: "ad-hoc-1".into(),
        })
        .unwrap();
        assert_eq!(json["trigger_id"], "ad-hoc-1");
    }
}
