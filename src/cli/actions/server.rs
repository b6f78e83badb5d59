use crate::api::{self, ApiConfig, limiter::LimiterConfig};
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: Option<String>,
    pub limiter: LimiterConfig,
}

/// Run the admin oracle until interrupted.
/// # Errors
/// Returns an error if the database or the listener cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    debug!(port = args.port, "Starting admin oracle");

    let config = ApiConfig::new()
        .with_frontend_base_url(args.frontend_base_url)
        .with_limiter(args.limiter);

    api::new(args.port, args.dsn, config).await
}
