use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Accepts a numeric level (0 to 5) or a level name from `REELGUARD_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>()
            && parsed <= 5
        {
            return Ok(parsed);
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err(format!("invalid log level: {level}")),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("REELGUARD_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_args(Command::new("reelguard"))
    }

    #[test]
    fn env_accepts_level_names() {
        for (index, level) in ["error", "warn", "info", "debug", "trace"]
            .iter()
            .enumerate()
        {
            temp_env::with_vars([("REELGUARD_LOG_LEVEL", Some(*level))], || {
                let matches = command().get_matches_from(["reelguard"]);
                assert_eq!(
                    matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn env_rejects_unknown_level() {
        temp_env::with_vars([("REELGUARD_LOG_LEVEL", Some("loud"))], || {
            assert!(command().try_get_matches_from(["reelguard"]).is_err());
        });
    }

    #[test]
    fn verbosity_counts_flags() {
        temp_env::with_vars([("REELGUARD_LOG_LEVEL", None::<&str>)], || {
            let matches = command().get_matches_from(["reelguard", "-vvv"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
        });
    }
}
