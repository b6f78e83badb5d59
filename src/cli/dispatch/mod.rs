//! Map validated CLI matches to an action.

use crate::cli::{
    actions::{Action, check, server},
    commands::{self, check::CMD_CHECK, server::CMD_SERVER},
};
use anyhow::{Result, bail};

/// # Errors
/// Returns an error if the subcommand is unknown or its arguments are inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_SERVER, sub)) => {
            let options = commands::server::Options::parse(sub)?;
            Ok(Action::Server(server::Args {
                port: options.port,
                dsn: options.dsn,
                frontend_base_url: options.frontend_base_url,
                limiter: options.limiter,
            }))
        }
        Some((CMD_CHECK, sub)) => {
            let options = commands::check::Options::parse(sub)?;
            Ok(Action::Check(check::Args {
                oracle_url: options.oracle_url,
                token: options.token,
                subject: options.subject,
                role_hint: options.role_hint,
                short_circuit: options.short_circuit,
                redirect_path: options.redirect_path,
                timeout: options.timeout,
                audit_limit: options.audit_limit,
            }))
        }
        Some((name, _)) => bail!("unknown subcommand: {name}"),
        None => bail!("missing subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_server() {
        temp_env::with_vars(
            [
                ("REELGUARD_DSN", Some("postgres://localhost/studio")),
                ("REELGUARD_PORT", None),
            ],
            || {
                let matches = commands::new().get_matches_from(["reelguard", "server"]);
                let action = handler(&matches);
                assert!(matches!(
                    action,
                    Ok(Action::Server(server::Args { port: 8080, .. }))
                ));
            },
        );
    }

    #[test]
    fn dispatches_check() {
        temp_env::with_vars([("REELGUARD_TOKEN", None::<&str>)], || {
            let matches = commands::new().get_matches_from([
                "reelguard",
                "check",
                "--oracle-url",
                "http://localhost:8080",
            ]);
            let action = handler(&matches);
            assert!(matches!(
                action,
                Ok(Action::Check(check::Args { token: None, .. }))
            ));
        });
    }
}
