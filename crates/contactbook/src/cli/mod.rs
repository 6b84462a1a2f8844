//! Command-line interface for contactbook.
//!
//! This module provides the CLI structure for the `cbook` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, DeleteCommand, EditCommand, ListCommand, OutputFormat,
    ShowCommand,
};

use crate::logging::Verbosity;

/// cbook - Keep a validated list of contacts
///
/// Contacts are stored in a local JSON file or an `SQLite` database, chosen
/// by `storage.backend` in the configuration.
#[derive(Debug, Parser)]
#[command(name = "cbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List contacts, newest first
    List(ListCommand),

    /// Add a contact
    Add(AddCommand),

    /// Change fields of a contact
    Edit(EditCommand),

    /// Delete a contact
    Delete(DeleteCommand),

    /// Show one contact
    Show(ShowCommand),

    /// Print the list again whenever the database changes (sqlite backend)
    Watch,

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "cbook");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["cbook", "-q", "watch"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["cbook", "watch"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["cbook", "-v", "watch"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["cbook", "-vv", "watch"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_list_default_format() {
        let cli = parse(&["cbook", "list"]);
        assert!(matches!(
            cli.command,
            Command::List(ListCommand {
                format: OutputFormat::Table
            })
        ));
    }

    #[test]
    fn test_parse_list_json() {
        let cli = parse(&["cbook", "list", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Command::List(ListCommand {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn test_parse_add() {
        let cli = parse(&[
            "cbook",
            "add",
            "--name",
            "Jo",
            "--dob",
            "2020-01-01",
            "--email",
            "jo@x.com",
            "--mobile",
            "1112223333",
        ]);
        let Command::Add(add) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(add.name, "Jo");
        assert!(add.photo.is_none());
    }

    #[test]
    fn test_add_requires_all_fields() {
        assert!(Cli::try_parse_from(["cbook", "add", "--name", "Jo"]).is_err());
    }

    #[test]
    fn test_parse_edit_partial() {
        let cli = parse(&["cbook", "edit", "abc", "--email", "jo@work.com"]);
        let Command::Edit(edit) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(edit.id, "abc");
        assert_eq!(edit.email.as_deref(), Some("jo@work.com"));
        assert!(edit.name.is_none());
    }

    #[test]
    fn test_edit_photo_conflicts_with_clear() {
        let result = Cli::try_parse_from([
            "cbook",
            "edit",
            "abc",
            "--photo",
            "jo.png",
            "--clear-photo",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_delete() {
        let cli = parse(&["cbook", "delete", "abc", "--yes"]);
        assert!(matches!(
            cli.command,
            Command::Delete(DeleteCommand { yes: true, .. })
        ));
    }

    #[test]
    fn test_parse_config_show() {
        let cli = parse(&["cbook", "config", "show", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["cbook", "-c", "/custom/config.toml", "list"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }
}
