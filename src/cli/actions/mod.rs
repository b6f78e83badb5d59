pub mod check;
pub mod server;

// Single dispatch point for `Action`, kept out of `mod.rs`.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Check(check::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
