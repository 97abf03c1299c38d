use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::timestamp;

/// Server-assigned task identifier. Stable across fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TaskId)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// High and Critical tasks are surfaced in the "Smart Priority" section.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Lenient `Option<Priority>` codec: the predictor may return labels we do
/// not know, or an empty string. Both read as no prediction.
pub(crate) mod priority_label {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Priority>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(p) => s.serialize_some(p.as_label()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Priority>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.as_deref().and_then(Priority::from_label))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "task_name")]
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Set when the task is in My Day.
    #[serde(rename = "my_day_date", default)]
    pub category_date: Option<NaiveDate>,
    #[serde(rename = "predicted_time_min", default)]
    pub predicted_duration_minutes: Option<u32>,
    #[serde(default, with = "priority_label")]
    pub predicted_priority: Option<Priority>,
    #[serde(rename = "due_date", default, with = "timestamp::option")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(rename = "scheduled_time", default, with = "timestamp::option")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Pending,
            category_date: None,
            predicted_duration_minutes: None,
            predicted_priority: None,
            due_at: None,
            scheduled_at: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark completed. `completed_at` is only ever set once.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    pub fn is_priority(&self) -> bool {
        self.predicted_priority.is_some_and(|p| p.is_urgent())
    }

    pub fn in_my_day(&self) -> bool {
        self.category_date.is_some()
    }
}

/// Fields sent when creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_name: String,
    #[serde(default, with = "timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub predicted_time_min: Option<u32>,
    #[serde(default, with = "priority_label")]
    pub predicted_priority: Option<Priority>,
}

impl NewTask {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            due_date: None,
            predicted_time_min: None,
            predicted_priority: None,
        }
    }

    pub fn from_parsed(parsed: &ParsedTask) -> Self {
        Self {
            task_name: parsed.task_name.clone(),
            due_date: parsed.due_date,
            predicted_time_min: parsed.predicted_time_min,
            predicted_priority: parsed.predicted_priority,
        }
    }
}

/// Prediction for a piece of free text, as returned by the parse endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTask {
    #[serde(default)]
    pub task_name: String,
    #[serde(default, with = "timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub predicted_time_min: Option<u32>,
    #[serde(default, with = "priority_label")]
    pub predicted_priority: Option<Priority>,
}

const DURATION_CHOICES: [(&str, u32); 7] = [
    ("15 min", 15),
    ("30 min", 30),
    ("45 min", 45),
    ("1 hour", 60),
    ("1.5 hours", 90),
    ("2 hours", 120),
    ("3+ hours", 180),
];

/// Choices offered when asking how long a completed task took. The
/// prediction, when there is one, comes first.
pub fn duration_options(predicted: Option<u32>) -> Vec<(String, u32)> {
    let mut options = Vec::with_capacity(DURATION_CHOICES.len() + 1);
    if let Some(min) = predicted {
        options.push((format!("Use prediction (~{} min)", min), min));
    }
    options.extend(DURATION_CHOICES.iter().map(|(label, min)| (label.to_string(), *min)));
    options
}
