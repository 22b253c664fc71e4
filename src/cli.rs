//! Command-line surface: argument parsing and the help/version machinery
//! clap needs help rendering.

use std::path::PathBuf;
use std::sync::OnceLock;

use clap::builder::Styles;
use clap::{Parser, Subcommand, ValueEnum};

/// Color palette for `--help` output, matching [`crate::styling`]'s error/
/// warning/success palette so help and runtime output feel like one tool.
pub fn help_styles() -> Styles {
    use anstyle::{AnsiColor, Color, Style};
    Styles::styled()
        .header(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))).bold())
        .usage(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))).bold())
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
        .error(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))).bold())
        .valid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))))
}

/// Resolves `flow --version`: prefers the git-describe string baked in by
/// `build.rs`, falling back to `CARGO_PKG_VERSION` outside a git checkout.
pub fn version_str() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let describe = env!("VERGEN_GIT_DESCRIBE");
        if describe.contains("IDEMPOTENT") {
            env!("CARGO_PKG_VERSION").to_string()
        } else {
            describe.to_string()
        }
    })
}

/// Builds the `clap::Command`, applying [`help_styles`] - used by
/// `flow completions` to render the same styling clap uses interactively.
pub fn build_command() -> clap::Command {
    use clap::CommandFactory;
    Cli::command().styles(help_styles())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "flow",
    about = "Spec-Driven Development: workflow state machine, template overlay, and backlog store",
    version = version_str(),
    styles = help_styles(),
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Run as if `flow` was started in this directory
    #[arg(short = 'C', long = "directory", global = true, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Path to the user config file (overrides the XDG default)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a project: write the default workflow document, install
    /// the base+extension template overlay, and materialize agent commands
    Init {
        /// Pin the base template release (default: latest)
        #[arg(long)]
        base_version: Option<String>,
        /// Pin the extension template release (default: latest)
        #[arg(long)]
        extension_version: Option<String>,
        /// `owner/repo` for the base template source
        #[arg(long, default_value = "flowspec-dev/flowspec-templates")]
        base_repo: String,
        /// `owner/repo` for the extension template source
        #[arg(long, default_value = "flowspec-dev/flowspec-templates-ext")]
        extension_repo: String,
        /// Agent keys to materialize commands for (default: detect installed CLIs)
        #[arg(long = "agent", value_delimiter = ',')]
        agents: Vec<String>,
        /// Re-initialize even if a workflow document already exists
        #[arg(long)]
        force: bool,
    },

    /// Re-resolve the overlay sources and merge any updates into the project
    Upgrade {
        /// Resolve and report what would change, without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Upgrade to this base template release (default: latest)
        #[arg(long)]
        base_version: Option<String>,
        /// Upgrade to this extension template release (default: latest)
        #[arg(long)]
        extension_version: Option<String>,
    },

    /// Validate the workflow document
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Dispatch a command invocation against a task, without mutating it
    Dispatch {
        /// Command token, e.g. `dev:plan` or `/noop`
        command: String,
        /// Backlog task id
        #[arg(long)]
        task: String,
        /// Invoking role namespace (default: `all`)
        #[arg(long, default_value = "all")]
        role: String,
        /// Confirms human approval for workflows that require it
        #[arg(long)]
        approved: bool,
        /// Emit the `{status, rule_id, message, location, suggestion}` JSON envelope
        #[arg(long)]
        json: bool,
    },

    /// Re-run a dispatch and commit its transition: validates output
    /// artifacts, writes the task's new status, and appends an audit note
    Commit {
        command: String,
        #[arg(long)]
        task: String,
        #[arg(long, default_value = "all")]
        role: String,
        #[arg(long)]
        approved: bool,
        #[arg(long)]
        json: bool,
    },

    /// Manage backlog tasks
    Backlog {
        #[command(subcommand)]
        action: BacklogAction,
    },

    /// Repo-hygiene checks
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },

    /// Maintenance and troubleshooting commands
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkflowAction {
    /// Validate a workflow document (default: the project's workflow file)
    Validate {
        /// Path to the document (default: `flowspec_workflow.yml`)
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BacklogAction {
    /// Create a task
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "ac", value_delimiter = ',')]
        acceptance_criteria: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "assignee", value_delimiter = ',')]
        assignee: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        dependencies: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// Edit a task: mutate fields, check/uncheck acceptance criteria, append a note
    Edit {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long = "assignee", value_delimiter = ',')]
        assignee: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
        #[arg(long)]
        note: Option<String>,
        /// 1-based acceptance-criterion indices to check
        #[arg(long = "check", value_delimiter = ',')]
        check_ac: Vec<usize>,
        /// 1-based acceptance-criterion indices to uncheck
        #[arg(long = "uncheck", value_delimiter = ',')]
        uncheck_ac: Vec<usize>,
        #[arg(long)]
        json: bool,
    },

    /// List tasks, optionally filtered
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Search tasks by title/body/notes substring
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },

    /// Archive a single task
    Archive {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Archive every task matching a filter (default: `status=Done`)
    ArchiveMany {
        #[arg(long)]
        status: Option<String>,
        /// RFC 3339 timestamp; only tasks updated before this are archived
        #[arg(long)]
        done_before: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CheckAction {
    /// Validate the `dev_setup` symlink invariants
    DevSetup {
        /// Agent keys to check (default: all agents with a Markdown consumer format)
        #[arg(long = "agent", value_delimiter = ',')]
        agents: Vec<String>,
        /// Re-run `dev_setup` to repair violations instead of just reporting them
        #[arg(long)]
        fix: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DebugAction {
    /// Write the JSON Schema for the workflow document to `memory/flowspec_workflow.schema.json`
    Schema,
    /// Write a Markdown diagnostic report to `.flowspec/diagnostic.md`
    Diagnostic,
}
