use crate::api::limiter::LimiterConfig;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const CMD_SERVER: &str = "server";
pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_MAX_ATTEMPTS: &str = "max-attempts";
pub const ARG_ATTEMPT_WINDOW_SECONDS: &str = "attempt-window-seconds";
pub const ARG_COOLDOWN_SECONDS: &str = "cooldown-seconds";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_SERVER)
        .about("Run the admin oracle service")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("REELGUARD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("REELGUARD_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Studio origin allowed to call the API (CORS)")
                .env("REELGUARD_FRONTEND_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Failed verifications allowed per client before cooldown")
                .default_value("5")
                .env("REELGUARD_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_ATTEMPT_WINDOW_SECONDS)
                .long(ARG_ATTEMPT_WINDOW_SECONDS)
                .help("Rolling window for counting failed verifications")
                .default_value("600")
                .env("REELGUARD_ATTEMPT_WINDOW_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOLDOWN_SECONDS)
                .long(ARG_COOLDOWN_SECONDS)
                .help("Cooldown once the attempt limit is reached")
                .default_value("900")
                .env("REELGUARD_COOLDOWN_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: Option<String>,
    pub limiter: LimiterConfig,
}

impl Options {
    /// # Errors
    /// Returns an error if the DSN is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        let frontend_base_url = matches.get_one::<String>(ARG_FRONTEND_BASE_URL).cloned();

        let mut limiter = LimiterConfig::default();
        if let Some(max_attempts) = matches.get_one::<u32>(ARG_MAX_ATTEMPTS) {
            limiter = limiter.with_max_attempts(*max_attempts);
        }
        if let Some(seconds) = matches.get_one::<u64>(ARG_ATTEMPT_WINDOW_SECONDS) {
            limiter = limiter.with_window(Duration::from_secs(*seconds));
        }
        if let Some(seconds) = matches.get_one::<u64>(ARG_COOLDOWN_SECONDS) {
            limiter = limiter.with_cooldown(Duration::from_secs(*seconds));
        }

        Ok(Self {
            port,
            dsn,
            frontend_base_url,
            limiter,
        })
    }
}
