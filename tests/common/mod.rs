//! In-memory task service used by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Notify, Semaphore};

use smarttask::SyncError;
use smarttask::core::collections::{CollectionKind, TaskLists};
use smarttask::core::task::{NewTask, ParsedTask, Priority, Task, TaskId};
use smarttask::sync::TaskRemote;

pub fn task(id: i64, name: &str, priority: Option<Priority>) -> Task {
    let mut t = Task::new(TaskId(id), name);
    t.predicted_priority = priority;
    t.predicted_duration_minutes = Some(30);
    t
}

/// My Day: 3. Pending: 1 (High), 2 (Low), 4 (Critical). Completed: 5.
pub fn sample_lists() -> TaskLists {
    let mut in_day = task(3, "Grocery shopping", None);
    in_day.category_date = Some(chrono::Local::now().date_naive());
    let mut done = task(5, "Team meeting", Some(Priority::Medium));
    done.complete(Utc::now());
    TaskLists {
        my_day: vec![in_day],
        pending: vec![
            task(1, "Finish ML model", Some(Priority::High)),
            task(2, "Call back mom", Some(Priority::Low)),
            task(4, "Submit OS assignment", Some(Priority::Critical)),
        ],
        completed: vec![done],
    }
}

pub fn server_error() -> SyncError {
    SyncError::ServerRejected {
        status: 500,
        message: Some("Failed to update task".to_string()),
    }
}

/// Behaves like the real service, with knobs for failures and for holding
/// responses until the test releases them.
pub struct ScriptedRemote {
    server: Mutex<TaskLists>,
    mutation_failure: Mutex<Option<SyncError>>,
    fetch_failure: Mutex<Option<SyncError>>,
    fetch_delays: Mutex<VecDeque<Duration>>,
    held: AtomicBool,
    gate: Semaphore,
    entered: Notify,
    next_id: AtomicI64,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new(lists: TaskLists) -> Self {
        Self {
            server: Mutex::new(lists),
            mutation_failure: Mutex::new(None),
            fetch_failure: Mutex::new(None),
            fetch_delays: Mutex::new(VecDeque::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Notify::new(),
            next_id: AtomicI64::new(100),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_mutations(&self, err: SyncError) {
        *self.mutation_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_fetches(&self, err: SyncError) {
        *self.fetch_failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.mutation_failure.lock().unwrap() = None;
        *self.fetch_failure.lock().unwrap() = None;
    }

    pub fn delay_next_fetch(&self, delay: Duration) {
        self.fetch_delays.lock().unwrap().push_back(delay);
    }

    /// Mutations block after reaching the server until `release`.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Resolves once a mutation has reached the server.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn server(&self) -> TaskLists {
        self.server.lock().unwrap().clone()
    }

    pub fn set_server(&self, lists: TaskLists) {
        *self.server.lock().unwrap() = lists;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn mutation_gate(&self) -> Result<(), SyncError> {
        self.entered.notify_one();
        // Let other operations run between the local step and the server's.
        tokio::task::yield_now().await;
        if self.held.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .expect("gate closed")
                .forget();
        }
        match self.mutation_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found() -> SyncError {
        SyncError::ServerRejected {
            status: 404,
            message: Some("Task not found".to_string()),
        }
    }
}

#[async_trait]
impl TaskRemote for ScriptedRemote {
    async fn fetch_all(&self) -> Result<TaskLists, SyncError> {
        self.record("GET /tasks".into());
        let snapshot = self.server();
        let failure = self.fetch_failure.lock().unwrap().clone();
        let delay = self.fetch_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(snapshot),
        }
    }

    async fn fetch_task(&self, id: TaskId) -> Result<Task, SyncError> {
        self.record(format!("GET /tasks/{}", id));
        let server = self.server();
        server
            .locate(id)
            .map(|(kind, idx)| server.get(kind)[idx].clone())
            .ok_or_else(Self::not_found)
    }

    async fn create_task(&self, new: &NewTask) -> Result<Task, SyncError> {
        self.record("POST /tasks".into());
        self.mutation_gate().await?;
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut created = Task::new(id, new.task_name.clone());
        created.due_at = new.due_date;
        created.predicted_duration_minutes = new.predicted_time_min;
        created.predicted_priority = new.predicted_priority;
        let mut server = self.server.lock().unwrap();
        let end = server.pending.len();
        server.insert(CollectionKind::Pending, end, created.clone());
        Ok(created)
    }

    async fn complete_task(&self, id: TaskId, actual_time_min: u32) -> Result<(), SyncError> {
        self.record(format!("PUT /tasks/{}/complete {}", id, actual_time_min));
        self.mutation_gate().await?;
        let mut server = self.server.lock().unwrap();
        let (mut t, _) = server
            .remove(CollectionKind::MyDay, id)
            .or_else(|| server.remove(CollectionKind::Pending, id))
            .ok_or_else(Self::not_found)?;
        t.complete(Utc::now());
        server.insert(CollectionKind::Completed, 0, t);
        Ok(())
    }

    async fn toggle_my_day(&self, id: TaskId) -> Result<(), SyncError> {
        self.record(format!("POST /tasks/{}/myday", id));
        self.mutation_gate().await?;
        let mut server = self.server.lock().unwrap();
        if let Some((mut t, _)) = server.remove(CollectionKind::MyDay, id) {
            t.category_date = None;
            server.insert(CollectionKind::Pending, 0, t);
        } else if let Some((mut t, _)) = server.remove(CollectionKind::Pending, id) {
            t.category_date = Some(chrono::Local::now().date_naive());
            server.insert(CollectionKind::MyDay, 0, t);
        } else {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError> {
        self.record(format!("DELETE /tasks/{}", id));
        self.mutation_gate().await?;
        let mut server = self.server.lock().unwrap();
        if server.purge(id) == 0 {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn parse_task(&self, text: &str) -> Result<ParsedTask, SyncError> {
        self.record("POST /parse-task".into());
        Ok(ParsedTask {
            task_name: text.to_string(),
            due_date: None,
            predicted_time_min: Some(45),
            predicted_priority: Some(Priority::Medium),
        })
    }
}
