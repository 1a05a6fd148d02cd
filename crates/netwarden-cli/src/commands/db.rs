use anyhow::{Context, Result};
use netwarden_core::Config;
use netwarden_orchestrator::run_retention_cleanup;
use netwarden_store::Store;

use crate::args::DbAction;

pub async fn run(config: Config, action: DbAction) -> Result<()> {
    let store = Store::connect(&config.database_url)
        .await
        .context("connecting to store")?;

    match action {
        DbAction::Migrate => {
            println!("schema up to date");
        }
        DbAction::Cleanup => {
            run_retention_cleanup(&store)
                .await
                .context("running retention cleanup")?;
            println!("retention cleanup complete");
        }
        DbAction::ResetPassword {
            username,
            new_password,
        } => {
            let user = store
                .get_user_by_username(&username)
                .await
                .context("looking up user")?
                .with_context(|| format!("no such user: {username}"))?;

            netwarden_orchestrator::Auth::new(&store, &config)
                .reset_password(user.id, &new_password)
                .await
                .context("resetting password")?;
            println!("password reset for {username}");
        }
    }
    Ok(())
}
