use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_MIN_PASSWORD_LENGTH: &str = "min-password-length";
pub const ARG_DEMO_ACCOUNT: &str = "demo-account";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// `0` keeps sessions until logout.
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub min_password_length: usize,
    pub demo_account: bool,
}

impl Options {
    /// Parse session and account arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_SESSION_TTL_SECONDS}"))?;
        let min_password_length = matches
            .get_one::<usize>(ARG_MIN_PASSWORD_LENGTH)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_MIN_PASSWORD_LENGTH}"))?;

        Ok(Self {
            session_ttl_seconds,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            min_password_length,
            demo_account: matches.get_flag(ARG_DEMO_ACCOUNT),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_account_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds, 0 keeps sessions until logout")
                .env("KEYHOLE_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("KEYHOLE_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}

fn with_account_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MIN_PASSWORD_LENGTH)
                .long(ARG_MIN_PASSWORD_LENGTH)
                .help("Minimum password length for new accounts, 0 disables the check")
                .env("KEYHOLE_MIN_PASSWORD_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_DEMO_ACCOUNT)
                .long(ARG_DEMO_ACCOUNT)
                .help("Create the testuser/pass123 account on startup if missing")
                .env("KEYHOLE_DEMO_ACCOUNT")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
