use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::WiggumError;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z]{2,8})-([0-9]{1,4})$").expect("valid regex"))
}

/// Task identifier: an uppercase prefix of 2-8 letters, a dash, and a
/// number of 1-4 digits (`AUTH-12`). The prefix groups sibling tasks of
/// one feature area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The feature prefix, e.g. `AUTH` for `AUTH-12`.
    pub fn prefix(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = WiggumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = id_pattern()
            .captures(s)
            .ok_or_else(|| WiggumError::InvalidTaskId(s.to_string()))?;
        let prefix = captures[1].to_uppercase();
        Ok(Self(format!("{}-{}", prefix, &captures[2])))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Checkbox glyph encoding a task's status on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMarker {
    Pending,
    InProgress,
    Done,
    Failed,
    /// Finished but awaiting human approval; never satisfies a dependency.
    PendingApproval,
}

impl StatusMarker {
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[=]",
            Self::Done => "[x]",
            Self::Failed => "[*]",
            Self::PendingApproval => "[P]",
        }
    }

    pub fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph {
            "[ ]" => Some(Self::Pending),
            "[=]" => Some(Self::InProgress),
            "[x]" | "[X]" => Some(Self::Done),
            "[*]" => Some(Self::Failed),
            "[P]" => Some(Self::PendingApproval),
            _ => None,
        }
    }

    /// Only `Done` satisfies a dependency edge.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::PendingApproval => "pending-approval",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Base weight in the scheduler's priority score.
    pub fn base_weight(&self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

impl FromStr for Priority {
    type Err = WiggumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(WiggumError::BoardParse {
                line: 0,
                message: format!("invalid priority: {}", other),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub marker: StatusMarker,
    pub title: String,
    pub description: String,
    pub priority: Priority,

    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    #[serde(default)]
    pub scope: Vec<String>,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            marker: StatusMarker::Pending,
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            dependencies: Vec::new(),
            scope: Vec::new(),
            acceptance_criteria: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    /// A task is ready iff pending and every dependency is done.
    pub fn is_ready(&self, done: &[&TaskId]) -> bool {
        self.marker == StatusMarker::Pending
            && self.dependencies.iter().all(|dep| done.contains(&dep))
    }

    /// A task is blocked iff pending with at least one unmet dependency.
    pub fn is_blocked(&self, done: &[&TaskId]) -> bool {
        self.marker == StatusMarker::Pending
            && self.dependencies.iter().any(|dep| !done.contains(&dep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_grammar() {
        assert!("AUTH-1".parse::<TaskId>().is_ok());
        assert!("DB-9999".parse::<TaskId>().is_ok());
        assert!("ABCDEFGH-1".parse::<TaskId>().is_ok());

        assert!("A-1".parse::<TaskId>().is_err()); // prefix too short
        assert!("ABCDEFGHI-1".parse::<TaskId>().is_err()); // prefix too long
        assert!("AUTH-12345".parse::<TaskId>().is_err()); // number too long
        assert!("AUTH1".parse::<TaskId>().is_err()); // missing dash
        assert!("AU7H-1".parse::<TaskId>().is_err()); // digit in prefix
    }

    #[test]
    fn task_id_uppercases_prefix() {
        let id: TaskId = "auth-3".parse().unwrap();
        assert_eq!(id.as_str(), "AUTH-3");
        assert_eq!(id.prefix(), "AUTH");
    }

    #[test]
    fn marker_glyph_roundtrip() {
        for marker in [
            StatusMarker::Pending,
            StatusMarker::InProgress,
            StatusMarker::Done,
            StatusMarker::Failed,
            StatusMarker::PendingApproval,
        ] {
            assert_eq!(StatusMarker::from_glyph(marker.glyph()), Some(marker));
        }
        assert_eq!(StatusMarker::from_glyph("[?]"), None);
    }

    #[test]
    fn only_done_satisfies() {
        assert!(StatusMarker::Done.satisfies_dependency());
        assert!(!StatusMarker::PendingApproval.satisfies_dependency());
        assert!(!StatusMarker::InProgress.satisfies_dependency());
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::Critical.base_weight(), 4);
    }

    #[test]
    fn readiness() {
        let a: TaskId = "AUTH-1".parse().unwrap();
        let b: TaskId = "AUTH-2".parse().unwrap();
        let task = Task::new(b, "second").with_dependencies(vec![a.clone()]);

        assert!(!task.is_ready(&[]));
        assert!(task.is_blocked(&[]));
        assert!(task.is_ready(&[&a]));
        assert!(!task.is_blocked(&[&a]));
    }
}
