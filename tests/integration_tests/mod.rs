mod common;

mod backlog_ac_progress;
mod dispatch_happy_path;
mod dispatch_invalid_state;
mod materialize_toml;
mod overlay_idempotence;
mod workflow_unreachable_state;
