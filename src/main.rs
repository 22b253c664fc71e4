use std::io::Write;
use std::process;

use clap::Parser;
use flowspec::config;

mod cli;
mod commands;
mod verbose_log;

use cli::{BacklogAction, CheckAction, Cli, Commands, DebugAction, WorkflowAction};

/// Configures `env_logger` from `-v`/`-vv`/`RUST_LOG`, mirroring formatted
/// lines into [`verbose_log`] so `flow debug diagnostic` can embed recent
/// output without the caller re-running anything with `-v`.
fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let line = format!("{} {}", record.level(), record.args());
            verbose_log::write_line(&line);
            writeln!(buf, "{line}")
        })
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project_root = match commands::project::discover_root(cli.directory.as_deref()) {
        Ok(root) => root,
        Err(err) => {
            flowspec::styling::eprintln!("{} {err}", flowspec::styling::ERROR_EMOJI);
            process::exit(2);
        }
    };

    if let Some(config_path) = cli.config {
        config::set_config_path(config_path);
    }

    let code = match cli.command {
        Commands::Init {
            base_version,
            extension_version,
            base_repo,
            extension_repo,
            agents,
            force,
        } => commands::init::run(&project_root, base_version, extension_version, &base_repo, &extension_repo, agents, force),

        Commands::Upgrade { dry_run, base_version, extension_version } => {
            commands::upgrade::run(&project_root, dry_run, base_version, extension_version)
        }

        Commands::Workflow { action } => match action {
            WorkflowAction::Validate { file, json } => commands::workflow::validate(&project_root, file, json),
        },

        Commands::Dispatch { command, task, role, approved, json } => {
            commands::dispatch::run(&project_root, &command, &task, &role, approved, json)
        }

        Commands::Commit { command, task, role, approved, json } => {
            commands::dispatch::commit(&project_root, &command, &task, &role, approved, json)
        }

        Commands::Backlog { action } => match action {
            BacklogAction::Create {
                title,
                description,
                acceptance_criteria,
                labels,
                priority,
                status,
                assignee,
                dependencies,
                json,
            } => commands::backlog::create(
                &project_root,
                &title,
                description,
                acceptance_criteria,
                labels,
                priority,
                status,
                assignee,
                dependencies,
                json,
            ),
            BacklogAction::Edit {
                id,
                status,
                priority,
                assignee,
                labels,
                note,
                check_ac,
                uncheck_ac,
                json,
            } => commands::backlog::edit(&project_root, &id, status, priority, assignee, labels, note, check_ac, uncheck_ac, json),
            BacklogAction::List { status, label, assignee, role, json } => commands::backlog::list(&project_root, status, label, assignee, role, json),
            BacklogAction::Search { query, json } => commands::backlog::search(&project_root, &query, json),
            BacklogAction::Archive { id, json } => commands::backlog::archive(&project_root, &id, json),
            BacklogAction::ArchiveMany { status, done_before, json } => commands::backlog::archive_many(&project_root, status, done_before, json),
        },

        Commands::Check { action } => match action {
            CheckAction::DevSetup { agents, fix } => commands::check::dev_setup_check(&project_root, agents, fix),
        },

        Commands::Debug { action } => match action {
            DebugAction::Schema => commands::debug::schema(&project_root),
            DebugAction::Diagnostic => commands::debug::diagnostic(&project_root),
        },

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut cli::build_command(), "flow", &mut std::io::stdout());
            0
        }
    };

    process::exit(code);
}
