use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_MEMORY_STORE: &str = "memory-store";

/// Where credentials are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Options {
    File(PathBuf),
    Memory,
}

impl Options {
    /// Parse store arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the users file path is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        if matches.get_flag(ARG_MEMORY_STORE) {
            return Ok(Self::Memory);
        }

        match matches.get_one::<String>(ARG_USERS_FILE) {
            Some(path) if !path.trim().is_empty() => Ok(Self::File(PathBuf::from(path))),
            _ => anyhow::bail!("missing required argument: --{ARG_USERS_FILE}"),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("JSON document holding the user records")
                .env("KEYHOLE_USERS_FILE")
                .default_value("users.json"),
        )
        .arg(
            Arg::new(ARG_MEMORY_STORE)
                .long(ARG_MEMORY_STORE)
                .help("Keep users in memory only, nothing survives a restart")
                .env("KEYHOLE_MEMORY_STORE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new())
                .conflicts_with(ARG_USERS_FILE),
        )
}
