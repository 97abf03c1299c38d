use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId};

/// One of the three mutually exclusive task lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    MyDay,
    Pending,
    Completed,
}

impl CollectionKind {
    /// Order used when the caller doesn't know which list holds a task.
    pub const SEARCH_ORDER: [CollectionKind; 3] = [Self::MyDay, Self::Pending, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MyDay => "my_day",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// The list a task belongs in according to its own fields.
    pub fn for_task(task: &Task) -> Self {
        if task.status.is_done() {
            Self::Completed
        } else if task.in_my_day() {
            Self::MyDay
        } else {
            Self::Pending
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The categorized task set, in the same shape the server returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLists {
    #[serde(default)]
    pub my_day: Vec<Task>,
    #[serde(default)]
    pub pending: Vec<Task>,
    #[serde(default)]
    pub completed: Vec<Task>,
}

impl TaskLists {
    /// Partition a flat list by status and My Day membership.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut lists = Self::default();
        for task in tasks {
            let kind = CollectionKind::for_task(&task);
            lists.get_mut(kind).push(task);
        }
        lists
    }

    pub fn get(&self, kind: CollectionKind) -> &[Task] {
        match kind {
            CollectionKind::MyDay => &self.my_day,
            CollectionKind::Pending => &self.pending,
            CollectionKind::Completed => &self.completed,
        }
    }

    fn get_mut(&mut self, kind: CollectionKind) -> &mut Vec<Task> {
        match kind {
            CollectionKind::MyDay => &mut self.my_day,
            CollectionKind::Pending => &mut self.pending,
            CollectionKind::Completed => &mut self.completed,
        }
    }

    pub fn position(&self, kind: CollectionKind, id: TaskId) -> Option<usize> {
        self.get(kind).iter().position(|t| t.id == id)
    }

    pub fn find(&self, kind: CollectionKind, id: TaskId) -> Option<&Task> {
        self.get(kind).iter().find(|t| t.id == id)
    }

    /// First list holding `id`, in search order.
    pub fn locate(&self, id: TaskId) -> Option<(CollectionKind, usize)> {
        CollectionKind::SEARCH_ORDER
            .into_iter()
            .find_map(|kind| self.position(kind, id).map(|idx| (kind, idx)))
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.locate(id).is_some()
    }

    /// Remove `id` from `kind`, returning the record and where it was.
    pub fn remove(&mut self, kind: CollectionKind, id: TaskId) -> Option<(Task, usize)> {
        let idx = self.position(kind, id)?;
        Some((self.get_mut(kind).remove(idx), idx))
    }

    /// Insert at `index`, clamped to the list length. Index 0 is the head.
    pub fn insert(&mut self, kind: CollectionKind, index: usize, task: Task) {
        let list = self.get_mut(kind);
        let index = index.min(list.len());
        list.insert(index, task);
    }

    /// Drop every copy of `id` from every list.
    pub fn purge(&mut self, id: TaskId) -> usize {
        let mut removed = 0;
        for kind in CollectionKind::SEARCH_ORDER {
            let list = self.get_mut(kind);
            let before = list.len();
            list.retain(|t| t.id != id);
            removed += before - list.len();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.my_day.len() + self.pending.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.my_day
            .iter()
            .chain(&self.pending)
            .chain(&self.completed)
            .map(|t| t.id)
    }

    /// True when no id appears more than once across all lists.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        self.iter_ids().all(|id| seen.insert(id))
    }

    /// Keep only the first copy of each id, in search order. Returns how
    /// many duplicates were dropped.
    pub fn dedup(&mut self) -> usize {
        let mut seen = HashSet::new();
        let mut dropped = 0;
        for kind in CollectionKind::SEARCH_ORDER {
            let list = self.get_mut(kind);
            let before = list.len();
            list.retain(|t| seen.insert(t.id));
            dropped += before - list.len();
        }
        dropped
    }

    /// Pending tasks predicted High or Critical.
    pub fn priority_tasks(&self) -> Vec<&Task> {
        self.pending.iter().filter(|t| t.is_priority()).collect()
    }

    /// The rest of pending.
    pub fn other_tasks(&self) -> Vec<&Task> {
        self.pending.iter().filter(|t| !t.is_priority()).collect()
    }
}
