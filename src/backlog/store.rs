//! Backlog Store: the filesystem-backed task database under
//! `backlog/tasks/` (and its sibling `backlog/archive/`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::DomainError;

use super::lock::BacklogLock;
use super::task::{self, AcceptanceCriterion, Priority, Task, TaskFrontmatter};

#[derive(Debug)]
pub enum BacklogError {
    TaskNotFound(String),
    AcIndexOutOfRange { task_id: String, index: usize, total: usize },
    Locked,
    Io(std::io::Error),
    Parse(task::TaskParseError),
}

impl std::fmt::Display for BacklogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacklogError::TaskNotFound(id) => write!(f, "task `{id}` not found"),
            BacklogError::AcIndexOutOfRange { task_id, index, total } => write!(
                f,
                "acceptance criterion index {index} out of range for `{task_id}` ({total} total)"
            ),
            BacklogError::Locked => write!(f, "backlog is locked by another process"),
            BacklogError::Io(e) => write!(f, "backlog I/O error: {e}"),
            BacklogError::Parse(e) => write!(f, "backlog task file is malformed: {e}"),
        }
    }
}

impl std::error::Error for BacklogError {}

impl From<std::io::Error> for BacklogError {
    fn from(e: std::io::Error) -> Self {
        BacklogError::Io(e)
    }
}

impl DomainError for BacklogError {
    fn rule_id(&self) -> &'static str {
        match self {
            BacklogError::TaskNotFound(_) => "E300_TASK_NOT_FOUND",
            BacklogError::AcIndexOutOfRange { .. } => "E301_AC_INDEX_OUT_OF_RANGE",
            BacklogError::Locked => "E302_BACKLOG_LOCKED",
            BacklogError::Io(_) => "E303_BACKLOG_IO",
            BacklogError::Parse(_) => "E304_BACKLOG_PARSE",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            BacklogError::TaskNotFound(_) => 1,
            BacklogError::AcIndexOutOfRange { .. } | BacklogError::Io(_) | BacklogError::Parse(_) => 2,
            BacklogError::Locked => 3,
        }
    }

    fn remediation(&self) -> Option<String> {
        match self {
            BacklogError::Locked => {
                Some("retry once the other `flow` process finishes, or remove a stale `backlog/.lock`".to_string())
            }
            BacklogError::AcIndexOutOfRange { total, .. } => {
                Some(format!("pass an index between 1 and {total}"))
            }
            _ => None,
        }
    }
}

/// Writes `bytes` to `path` atomically: a sibling `.tmp` file in the same
/// directory, `sync_all`, then `rename` over the target.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("backlog")
    ));
    let mut tmp = fs::File::create(&tmp_path)?;
    tmp.write_all(bytes)?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, path)
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub labels: Vec<String>,
    pub priority: Priority,
    pub status: Option<String>,
    pub assignee: Vec<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub status: Option<String>,
    pub label: Option<String>,
    pub assignee: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditMutations {
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub assignee: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    pub notes_append: Option<String>,
    pub check_ac: Vec<usize>,
    pub uncheck_ac: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    pub status: Option<String>,
    pub done_before: Option<chrono::DateTime<Utc>>,
}

pub struct Store {
    tasks_dir: PathBuf,
    archive_dir: PathBuf,
}

impl Store {
    pub fn new(backlog_root: impl Into<PathBuf>) -> Self {
        let root = backlog_root.into();
        Store {
            tasks_dir: root.join("tasks"),
            archive_dir: root.join("archive"),
        }
    }

    fn lock(&self) -> Result<BacklogLock, BacklogError> {
        BacklogLock::acquire(self.tasks_dir.parent().unwrap_or(&self.tasks_dir)).map_err(|_| BacklogError::Locked)
    }

    fn next_id(&self) -> Result<u64, BacklogError> {
        let mut max = 0u64;
        for dir in [&self.tasks_dir, &self.archive_dir] {
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if let Some(caps) = task::filename_regex().captures(&entry.file_name().to_string_lossy()) {
                    if let Ok(n) = caps[1].parse::<u64>() {
                        max = max.max(n);
                    }
                }
            }
        }
        Ok(max + 1)
    }

    fn path_for(&self, id: &str, title: &str) -> PathBuf {
        self.tasks_dir.join(task::filename_for(id, title))
    }

    fn find_path(&self, id: &str) -> Option<PathBuf> {
        for dir in [&self.tasks_dir, &self.archive_dir] {
            if !dir.exists() {
                continue;
            }
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name.starts_with(&format!("{id} - ")) {
                        return Some(entry.path());
                    }
                }
            }
        }
        None
    }

    pub fn create(&self, title: &str, opts: CreateOptions) -> Result<Task, BacklogError> {
        let _lock = self.lock()?;
        let id = format!("task-{}", self.next_id()?);
        self.write_new(id, title, opts)
    }

    /// Creates a task under a caller-chosen id rather than the next
    /// sequential one - used by the dispatcher's auto-create path (§4.6
    /// step 3), where the id is the one named on the command line and must
    /// round-trip through a later `get`/`edit` by that same id.
    pub fn create_with_id(&self, id: &str, title: &str, opts: CreateOptions) -> Result<Task, BacklogError> {
        let _lock = self.lock()?;
        self.write_new(id.to_string(), title, opts)
    }

    fn write_new(&self, id: String, title: &str, opts: CreateOptions) -> Result<Task, BacklogError> {
        let now = Utc::now();
        let task = Task {
            frontmatter: TaskFrontmatter {
                id: id.clone(),
                title: title.to_string(),
                status: opts.status.unwrap_or_default(),
                priority: opts.priority,
                assignee: opts.assignee,
                labels: opts.labels,
                dependencies: opts.dependencies,
                created_at: now,
                updated_at: now,
                role: None,
            },
            description: opts.description,
            acceptance_criteria: opts
                .acceptance_criteria
                .into_iter()
                .map(|text| AcceptanceCriterion { text, checked: false })
                .collect(),
            notes: String::new(),
        };
        let path = self.path_for(&id, title);
        atomic_write(&path, task::render_task(&task).as_bytes())?;
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Result<Option<Task>, BacklogError> {
        let Some(path) = self.find_path(id) else {
            return Ok(None);
        };
        let content = fs::read_to_string(&path)?;
        task::parse_task(&content).map(Some).map_err(BacklogError::Parse)
    }

    fn all_active(&self) -> Result<Vec<Task>, BacklogError> {
        if !self.tasks_dir.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        for entry in fs::read_dir(&self.tasks_dir)? {
            let entry = entry?;
            if !task::filename_regex().is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let content = fs::read_to_string(entry.path())?;
            tasks.push(task::parse_task(&content).map_err(BacklogError::Parse)?);
        }
        tasks.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(tasks)
    }

    pub fn list(&self, filters: ListFilters) -> Result<Vec<Task>, BacklogError> {
        Ok(self
            .all_active()?
            .into_iter()
            .filter(|t| filters.status.as_deref().is_none_or(|s| t.frontmatter.status == s))
            .filter(|t| {
                filters
                    .label
                    .as_deref()
                    .is_none_or(|l| t.frontmatter.labels.iter().any(|x| x == l))
            })
            .filter(|t| {
                filters
                    .assignee
                    .as_deref()
                    .is_none_or(|a| t.frontmatter.assignee.iter().any(|x| x == a))
            })
            .filter(|t| {
                filters
                    .role
                    .as_deref()
                    .is_none_or(|r| t.frontmatter.role.as_ref().is_some_and(|tr| tr.to_string() == r))
            })
            .collect())
    }

    /// Case-insensitive substring search over title + description + notes.
    /// Score: exact title match (3) > title substring (2) > body/notes
    /// substring (1); ties broken by task id ascending.
    pub fn search(&self, query: &str) -> Result<Vec<(Task, u8)>, BacklogError> {
        let needle = query.to_lowercase();
        let mut scored: Vec<(Task, u8)> = Vec::new();
        for t in self.all_active()? {
            let title_lower = t.frontmatter.title.to_lowercase();
            let score = if title_lower == needle {
                3
            } else if title_lower.contains(&needle) {
                2
            } else if t.description.to_lowercase().contains(&needle) || t.notes.to_lowercase().contains(&needle) {
                1
            } else {
                0
            };
            if score > 0 {
                scored.push((t, score));
            }
        }
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.id().cmp(b.0.id())));
        Ok(scored)
    }

    pub fn edit(&self, id: &str, mutations: EditMutations) -> Result<Task, BacklogError> {
        let _lock = self.lock()?;
        let path = self.find_path(id).ok_or_else(|| BacklogError::TaskNotFound(id.to_string()))?;
        let content = fs::read_to_string(&path)?;
        let mut task = task::parse_task(&content).map_err(BacklogError::Parse)?;

        if let Some(status) = mutations.status {
            task.frontmatter.status = status;
        }
        if let Some(priority) = mutations.priority {
            task.frontmatter.priority = priority;
        }
        if let Some(assignee) = mutations.assignee {
            task.frontmatter.assignee = assignee;
        }
        if let Some(labels) = mutations.labels {
            task.frontmatter.labels = labels;
        }

        let total = task.acceptance_criteria.len();
        for index in mutations.check_ac.iter().chain(mutations.uncheck_ac.iter()) {
            if *index == 0 || *index > total {
                return Err(BacklogError::AcIndexOutOfRange { task_id: id.to_string(), index: *index, total });
            }
        }
        for index in &mutations.check_ac {
            task.acceptance_criteria[index - 1].checked = true;
        }
        for index in &mutations.uncheck_ac {
            task.acceptance_criteria[index - 1].checked = false;
        }

        if let Some(note) = mutations.notes_append {
            if !task.notes.is_empty() {
                task.notes.push_str("\n\n");
            }
            task.notes.push_str(&format!("{note} — {}", Utc::now().to_rfc3339()));
        }

        task.frontmatter.updated_at = Utc::now();
        atomic_write(&path, task::render_task(&task).as_bytes())?;
        Ok(task)
    }

    pub fn archive(&self, id: &str) -> Result<Task, BacklogError> {
        let _lock = self.lock()?;
        let path = self.find_path(id).ok_or_else(|| BacklogError::TaskNotFound(id.to_string()))?;
        let content = fs::read_to_string(&path)?;
        let task = task::parse_task(&content).map_err(BacklogError::Parse)?;
        fs::create_dir_all(&self.archive_dir)?;
        let dest = self.archive_dir.join(path.file_name().expect("task path has a filename"));
        fs::rename(&path, &dest)?;
        Ok(task)
    }

    pub fn archive_many(&self, filter: ArchiveFilter) -> Result<Vec<String>, BacklogError> {
        let status = filter.status.unwrap_or_else(|| "Done".to_string());
        let candidates: Vec<String> = self
            .all_active()?
            .into_iter()
            .filter(|t| t.frontmatter.status == status)
            .filter(|t| filter.done_before.is_none_or(|cutoff| t.frontmatter.updated_at < cutoff))
            .map(|t| t.id().to_string())
            .collect();
        let mut archived = Vec::new();
        for id in candidates {
            self.archive(&id)?;
            archived.push(id);
        }
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("backlog"));
        (dir, store)
    }

    #[test]
    fn create_allocates_sequential_ids() {
        let (_dir, store) = store();
        let t1 = store.create("First", CreateOptions::default()).unwrap();
        let t2 = store.create("Second", CreateOptions::default()).unwrap();
        assert_eq!(t1.id(), "task-1");
        assert_eq!(t2.id(), "task-2");
    }

    #[test]
    fn get_missing_task_returns_none() {
        let (_dir, store) = store();
        assert!(store.get("task-999").unwrap().is_none());
    }

    #[test]
    fn edit_unknown_task_is_not_found() {
        let (_dir, store) = store();
        let err = store.edit("task-1", EditMutations::default()).unwrap_err();
        assert_eq!(err.rule_id(), "E300_TASK_NOT_FOUND");
    }

    #[test]
    fn edit_check_ac_out_of_range() {
        let (_dir, store) = store();
        let opts = CreateOptions {
            acceptance_criteria: vec!["only one".to_string()],
            ..Default::default()
        };
        let t = store.create("Task", opts).unwrap();
        let err = store
            .edit(t.id(), EditMutations { check_ac: vec![5], ..Default::default() })
            .unwrap_err();
        assert_eq!(err.rule_id(), "E301_AC_INDEX_OUT_OF_RANGE");
    }

    #[test]
    fn edit_checks_ac_and_refreshes_updated_at() {
        let (_dir, store) = store();
        let opts = CreateOptions {
            acceptance_criteria: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let t = store.create("Task", opts).unwrap();
        let created_at = t.frontmatter.updated_at;
        let edited = store
            .edit(t.id(), EditMutations { check_ac: vec![1], ..Default::default() })
            .unwrap();
        assert!(edited.acceptance_criteria[0].checked);
        assert!(!edited.acceptance_criteria[1].checked);
        assert!(edited.frontmatter.updated_at >= created_at);
    }

    #[test]
    fn archive_moves_file_and_preserves_content() {
        let (_dir, store) = store();
        let t = store.create("Archive me", CreateOptions::default()).unwrap();
        let archived = store.archive(t.id()).unwrap();
        assert_eq!(archived, t);
        assert!(store.tasks_dir.read_dir().unwrap().next().is_none());
        let refetched = store.get(t.id()).unwrap().unwrap();
        assert_eq!(refetched, t);
    }

    #[test]
    fn archive_many_filters_by_status() {
        let (_dir, store) = store();
        let opts = CreateOptions { status: Some("Done".to_string()), ..Default::default() };
        let done = store.create("Done task", opts).unwrap();
        let _pending = store.create("Pending task", CreateOptions::default()).unwrap();
        let archived = store.archive_many(ArchiveFilter::default()).unwrap();
        assert_eq!(archived, vec![done.id().to_string()]);
    }

    #[test]
    fn search_ranks_exact_title_above_substring() {
        let (_dir, store) = store();
        store.create("Add login flow", CreateOptions::default()).unwrap();
        store.create("login", CreateOptions::default()).unwrap();
        let results = store.search("login").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.frontmatter.title, "login");
        assert_eq!(results[0].1, 3);
        assert_eq!(results[1].1, 2);
    }

    #[test]
    fn next_id_accounts_for_archived_tasks() {
        let (_dir, store) = store();
        let t1 = store.create("One", CreateOptions::default()).unwrap();
        store.archive(t1.id()).unwrap();
        let t2 = store.create("Two", CreateOptions::default()).unwrap();
        assert_eq!(t2.id(), "task-2");
    }
}
