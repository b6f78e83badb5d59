use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const CMD_CHECK: &str = "check";
pub const ARG_ORACLE_URL: &str = "oracle-url";
pub const ARG_TOKEN: &str = "token";
pub const ARG_SUBJECT: &str = "subject";
pub const ARG_ROLE_HINT: &str = "role-hint";
pub const ARG_SHORT_CIRCUIT: &str = "short-circuit";
pub const ARG_REDIRECT_PATH: &str = "redirect-path";
pub const ARG_TIMEOUT_SECONDS: &str = "timeout-seconds";
pub const ARG_AUDIT_LIMIT: &str = "audit-limit";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_CHECK)
        .about("Run admin admission against an oracle")
        .long_about(
            "Run the dual-layer admission check for one session against a running oracle. \
             Exits with an error when access is denied.",
        )
        .arg(
            Arg::new(ARG_ORACLE_URL)
                .long(ARG_ORACLE_URL)
                .help("Base URL of the admin oracle")
                .env("REELGUARD_ORACLE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN)
                .long(ARG_TOKEN)
                .help("Bearer token of the session; omit to check without a session")
                .env("REELGUARD_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SUBJECT)
                .long(ARG_SUBJECT)
                .help("Subject id of the session")
                .default_value("cli")
                .env("REELGUARD_SUBJECT"),
        )
        .arg(
            Arg::new(ARG_ROLE_HINT)
                .long(ARG_ROLE_HINT)
                .help("Cached admin role hint (advisory only)")
                .env("REELGUARD_ROLE_HINT")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SHORT_CIRCUIT)
                .long(ARG_SHORT_CIRCUIT)
                .help("Deny without calling the oracle when the role hint is false")
                .env("REELGUARD_SHORT_CIRCUIT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_REDIRECT_PATH)
                .long(ARG_REDIRECT_PATH)
                .help("Where denied users are sent")
                .default_value("/")
                .env("REELGUARD_REDIRECT_PATH"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT_SECONDS)
                .long(ARG_TIMEOUT_SECONDS)
                .help("Oracle request timeout")
                .default_value("10")
                .env("REELGUARD_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_AUDIT_LIMIT)
                .long(ARG_AUDIT_LIMIT)
                .help("After admission, fetch this many audit records")
                .value_parser(clap::value_parser!(u32).range(1..=100)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub oracle_url: String,
    pub token: Option<SecretString>,
    pub subject: String,
    pub role_hint: Option<bool>,
    pub short_circuit: bool,
    pub redirect_path: String,
    pub timeout: Duration,
    pub audit_limit: Option<u32>,
}

impl Options {
    /// # Errors
    /// Returns an error if the oracle URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let oracle_url = matches
            .get_one::<String>(ARG_ORACLE_URL)
            .cloned()
            .context("missing required argument: --oracle-url")?;

        Ok(Self {
            oracle_url,
            token: matches
                .get_one::<String>(ARG_TOKEN)
                .filter(|token| !token.trim().is_empty())
                .map(|token| SecretString::from(token.trim().to_string())),
            subject: matches
                .get_one::<String>(ARG_SUBJECT)
                .cloned()
                .unwrap_or_else(|| "cli".to_string()),
            role_hint: matches.get_one::<bool>(ARG_ROLE_HINT).copied(),
            short_circuit: matches.get_flag(ARG_SHORT_CIRCUIT),
            redirect_path: matches
                .get_one::<String>(ARG_REDIRECT_PATH)
                .cloned()
                .unwrap_or_else(|| "/".to_string()),
            timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_TIMEOUT_SECONDS)
                    .copied()
                    .unwrap_or(10),
            ),
            audit_limit: matches.get_one::<u32>(ARG_AUDIT_LIMIT).copied(),
        })
    }
}
