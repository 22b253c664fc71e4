//! Backlog Store: task (backlog item) data model and the filesystem-backed
//! store that owns `backlog/tasks/` and `backlog/archive/`.

pub mod lock;
pub mod store;
pub mod task;

pub use store::{atomic_write, ArchiveFilter, BacklogError, CreateOptions, EditMutations, ListFilters, Store};
pub use task::{AcceptanceCriterion, Priority, Task, TaskFrontmatter, TaskParseError};
