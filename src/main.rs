use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use uplaybook::cli::{Cli, Command};
use uplaybook::commands::{self, RunEnv};
use uplaybook::config::playbook_search_dirs;
use uplaybook::logging::{self, Logger};

/// Log file name for a run: the playbook's file or directory name.
fn log_name(playbook: &str) -> String {
    let trimmed = playbook.trim_end_matches(['/', '\\']);
    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    base.strip_suffix(".toml").unwrap_or(base).to_string()
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    match args.command {
        Some(Command::Completions { shell }) => {
            commands::completions::run(shell, &mut std::io::stdout());
            ExitCode::SUCCESS
        }
        Some(Command::List) => {
            logging::init_subscriber(args.verbose, "up");
            let log = Logger::new("up");
            commands::list::run(&playbook_search_dirs(), &log);
            ExitCode::SUCCESS
        }
        None => {
            let name = log_name(args.run.playbook.as_deref().unwrap_or("up"));
            logging::init_subscriber(args.verbose, &name);
            let log = Arc::new(Logger::new(&name));

            let interrupt = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&interrupt);
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                log.warn(&format!("cannot trap Ctrl-C: {e}"));
            }

            let env = RunEnv {
                search_dirs: playbook_search_dirs(),
                workdir: None,
                interrupt,
            };
            let report = commands::run::run(&args.run, &env, log.clone());
            if let Some(path) = log.log_path() {
                log.debug(&format!("log written to {}", path.display()));
            }
            exit_code(report.exit_code)
        }
    }
}
