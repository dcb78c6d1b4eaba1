//! Task records and the in-memory task list
//!
//! This is the plaintext payload the vault encrypts. The JSON shape is
//! `{"state":{"tasks":[...]},"version":0}` with camelCase task fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};

/// Snapshot format version written alongside the tasks
pub const SNAPSHOT_VERSION: u32 = 0;

const HOUR_MS: i64 = 60 * 60 * 1000;
const MINUTE_MS: i64 = 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub title: String,
}

/// Whole hours and minutes spent on a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDuration {
    pub hours: u32,
    pub minutes: u32,
}

impl TaskDuration {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    /// Floor to whole minutes; negative spans count as zero
    pub fn from_millis(ms: i64) -> Self {
        let total_minutes = (ms.max(0) / MINUTE_MS) as u32;
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        }
    }
}

impl std::fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Unix millis
    pub start_time: Option<i64>,
    /// Unix millis
    pub end_time: Option<i64>,
    pub duration: Option<TaskDuration>,
    pub sub_tasks: Vec<SubTask>,
    /// `YYYY-MM-DD`, UTC
    pub date: String,
}

impl Task {
    pub fn new(title: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            start_time: Some(now.timestamp_millis()),
            end_time: None,
            duration: None,
            sub_tasks: Vec::new(),
            date: date_key(now.date_naive()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.duration.is_some()
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub duration: Option<TaskDuration>,
    pub sub_tasks: Option<Vec<SubTask>>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub tasks: Vec<Task>,
}

/// What gets encrypted under the storage key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub state: PersistedState,
    pub version: u32,
}

impl PersistedSnapshot {
    pub fn to_json(&self) -> VaultResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and check the version
    pub fn from_json(json: &str) -> VaultResult<Self> {
        let snapshot: PersistedSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(VaultError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Tasks held in memory while the vault is unlocked, newest first
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn set(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> VaultResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| VaultError::TaskNotFound(id.to_string()))
    }

    /// Start a new task now; returns its id
    pub fn add(&mut self, title: &str, now: DateTime<Utc>) -> String {
        let task = Task::new(title, now);
        let id = task.id.clone();
        self.tasks.insert(0, task);
        id
    }

    pub fn delete(&mut self, id: &str) -> VaultResult<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(VaultError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn update(&mut self, id: &str, update: TaskUpdate) -> VaultResult<()> {
        let task = self.get_mut(id)?;

        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(start) = update.start_time {
            task.start_time = Some(start);
        }
        if let Some(end) = update.end_time {
            task.end_time = Some(end);
        }
        if let Some(duration) = update.duration {
            task.duration = Some(duration);
        }
        if let Some(sub_tasks) = update.sub_tasks {
            task.sub_tasks = sub_tasks;
        }
        if let Some(date) = update.date {
            task.date = date;
        }
        Ok(())
    }

    /// Stop the clock on a task. A task without a start time gets zero.
    pub fn complete(&mut self, id: &str, now: DateTime<Utc>) -> VaultResult<TaskDuration> {
        let now_ms = now.timestamp_millis();
        let task = self.get_mut(id)?;

        let start = task.start_time.unwrap_or(now_ms);
        let duration = TaskDuration::from_millis(now_ms - start);

        task.end_time = Some(now_ms);
        task.duration = Some(duration);
        Ok(duration)
    }

    pub fn add_sub_task(&mut self, task_id: &str, title: &str) -> VaultResult<String> {
        let task = self.get_mut(task_id)?;
        let id = Uuid::new_v4().to_string();
        task.sub_tasks.push(SubTask {
            id: id.clone(),
            title: title.to_string(),
        });
        Ok(id)
    }

    pub fn delete_sub_task(&mut self, task_id: &str, sub_task_id: &str) -> VaultResult<()> {
        let task = self.get_mut(task_id)?;
        let before = task.sub_tasks.len();
        task.sub_tasks.retain(|st| st.id != sub_task_id);
        if task.sub_tasks.len() == before {
            return Err(VaultError::SubTaskNotFound(sub_task_id.to_string()));
        }
        Ok(())
    }

    /// Close out tasks left open on earlier days.
    ///
    /// Any task not dated `today` and without a duration is booked as one
    /// hour, ending an hour after its start (or `now` if it never started).
    /// Returns how many tasks changed.
    pub fn auto_correct_history(&mut self, today: NaiveDate, now: DateTime<Utc>) -> usize {
        let today = date_key(today);
        let mut changed = 0;

        for task in self.tasks.iter_mut() {
            if task.date != today && task.duration.is_none() {
                task.duration = Some(TaskDuration::new(1, 0));
                task.end_time = Some(match task.start_time {
                    Some(start) => start + HOUR_MS,
                    None => now.timestamp_millis(),
                });
                changed += 1;
            }
        }
        changed
    }

    pub fn for_date(&self, date: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.date == date).collect()
    }

    pub fn to_snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            state: PersistedState {
                tasks: self.tasks.clone(),
            },
            version: SNAPSHOT_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_add_is_newest_first() {
        let mut list = TaskList::new();
        let first = list.add("first", at(2026, 3, 1, 9, 0));
        let second = list.add("second", at(2026, 3, 1, 10, 0));

        assert_eq!(list.as_slice()[0].id, second);
        assert_eq!(list.as_slice()[1].id, first);
        assert_eq!(list.as_slice()[0].date, "2026-03-01");
    }

    #[test]
    fn test_complete_computes_duration() {
        let mut list = TaskList::new();
        let id = list.add("write report", at(2026, 3, 1, 9, 0));

        let d = list.complete(&id, at(2026, 3, 1, 11, 25)).unwrap();
        assert_eq!(d, TaskDuration::new(2, 25));

        let task = list.get(&id).unwrap();
        assert!(task.is_complete());
        assert_eq!(task.end_time, Some(at(2026, 3, 1, 11, 25).timestamp_millis()));
    }

    #[test]
    fn test_duration_floors_and_clamps() {
        assert_eq!(TaskDuration::from_millis(59_999), TaskDuration::new(0, 0));
        assert_eq!(TaskDuration::from_millis(61 * MINUTE_MS), TaskDuration::new(1, 1));
        assert_eq!(TaskDuration::from_millis(-5), TaskDuration::new(0, 0));
        assert_eq!(TaskDuration::new(1, 5).to_string(), "1h 5m");
    }

    #[test]
    fn test_sub_tasks() {
        let mut list = TaskList::new();
        let id = list.add("parent", at(2026, 3, 1, 9, 0));

        let sub = list.add_sub_task(&id, "child").unwrap();
        assert_eq!(list.get(&id).unwrap().sub_tasks.len(), 1);

        list.delete_sub_task(&id, &sub).unwrap();
        assert!(list.get(&id).unwrap().sub_tasks.is_empty());
        assert!(matches!(
            list.delete_sub_task(&id, &sub),
            Err(VaultError::SubTaskNotFound(_))
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let mut list = TaskList::new();
        let id = list.add("draft", at(2026, 3, 1, 9, 0));

        list.update(
            &id,
            TaskUpdate {
                title: Some("final".into()),
                duration: Some(TaskDuration::new(0, 45)),
                ..Default::default()
            },
        )
        .unwrap();

        let task = list.get(&id).unwrap();
        assert_eq!(task.title, "final");
        assert_eq!(task.duration, Some(TaskDuration::new(0, 45)));
        assert_eq!(task.start_time, Some(at(2026, 3, 1, 9, 0).timestamp_millis()));

        list.delete(&id).unwrap();
        assert!(list.is_empty());
        assert!(matches!(list.delete(&id), Err(VaultError::TaskNotFound(_))));
    }

    #[test]
    fn test_auto_correct_history() {
        let mut list = TaskList::new();
        let old_open = list.add("forgotten", at(2026, 2, 27, 14, 0));
        let old_done = list.add("finished", at(2026, 2, 27, 9, 0));
        list.complete(&old_done, at(2026, 2, 27, 9, 30)).unwrap();
        let today_open = list.add("running", at(2026, 3, 1, 8, 0));

        let now = at(2026, 3, 1, 12, 0);
        let changed = list.auto_correct_history(now.date_naive(), now);
        assert_eq!(changed, 1);

        let fixed = list.get(&old_open).unwrap();
        assert_eq!(fixed.duration, Some(TaskDuration::new(1, 0)));
        assert_eq!(fixed.end_time, Some(at(2026, 2, 27, 15, 0).timestamp_millis()));

        assert_eq!(list.get(&old_done).unwrap().duration, Some(TaskDuration::new(0, 30)));
        assert!(list.get(&today_open).unwrap().duration.is_none());

        // Second pass has nothing to do
        assert_eq!(list.auto_correct_history(now.date_naive(), now), 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut list = TaskList::new();
        let id = list.add("shape", at(2026, 3, 1, 9, 0));
        list.add_sub_task(&id, "sub").unwrap();

        let json = list.to_snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 0);
        let task = &value["state"]["tasks"][0];
        assert_eq!(task["title"], "shape");
        assert!(task["startTime"].is_i64());
        assert!(task["endTime"].is_null());
        assert!(task["duration"].is_null());
        assert_eq!(task["subTasks"][0]["title"], "sub");
        assert_eq!(task["date"], "2026-03-01");

        let parsed = PersistedSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed.state.tasks, list.as_slice());
    }

    #[test]
    fn test_snapshot_version_mismatch() {
        let json = r#"{"state":{"tasks":[]},"version":7}"#;
        assert!(matches!(
            PersistedSnapshot::from_json(json),
            Err(VaultError::VersionMismatch { expected: 0, got: 7 })
        ));
    }

    #[test]
    fn test_for_date() {
        let mut list = TaskList::new();
        list.add("a", at(2026, 3, 1, 9, 0));
        list.add("b", at(2026, 3, 2, 9, 0));
        assert_eq!(list.for_date("2026-03-02").len(), 1);
        assert!(list.for_date("2026-01-01").is_empty());
    }
}
