use clap::{Args, Parser, Subcommand};

/// Version reported by `--version`: `git describe` at build time, else the
/// package version.
pub const VERSION: &str = match option_env!("UPLAYBOOK_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Top-level CLI entry point for the playbook runner.
#[derive(Parser, Debug)]
#[command(
    name = "up",
    about = "Run playbooks of tasks, typically to set up some sort of environment",
    version = VERSION,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub run: RunOpts,
}

/// Options for running a playbook.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOpts {
    /// Show every executing step and the full error chain on failure
    #[arg(long)]
    pub full_trace: bool,

    /// Playbook name on UP_PLAYBOOK_PATH, or a path to a playbook file or
    /// directory
    #[arg(required = true)]
    pub playbook: Option<String>,

    /// Arguments for the playbook itself (see `up <PLAYBOOK> --help`)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List playbooks found on UP_PLAYBOOK_PATH
    List,
    /// Print a shell completion script
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_playbook_only() {
        let cli = Cli::parse_from(["up", "site"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.run.playbook.as_deref(), Some("site"));
        assert!(cli.run.args.is_empty());
        assert!(!cli.run.full_trace);
    }

    #[test]
    fn parse_playbook_arguments_pass_through() {
        let cli = Cli::parse_from(["up", "site", "--hostname", "web1", "alice"]);
        assert_eq!(cli.run.playbook.as_deref(), Some("site"));
        assert_eq!(cli.run.args, ["--hostname", "web1", "alice"]);
    }

    #[test]
    fn parse_options_before_playbook() {
        let cli = Cli::parse_from(["up", "-v", "--full-trace", "./deploy.toml", "x"]);
        assert!(cli.verbose);
        assert!(cli.run.full_trace);
        assert_eq!(cli.run.playbook.as_deref(), Some("./deploy.toml"));
        assert_eq!(cli.run.args, ["x"]);
    }

    #[test]
    fn parse_list() {
        let cli = Cli::parse_from(["up", "list"]);
        assert!(matches!(cli.command, Some(Command::List)));
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["up", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Some(Command::Completions {
                shell: clap_complete::Shell::Bash
            })
        ));
    }

    #[test]
    fn missing_playbook_is_an_error() {
        assert!(Cli::try_parse_from(["up"]).is_err());
    }
}
