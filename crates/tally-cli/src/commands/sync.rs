use tally_core::engine::SyncOutcome;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_sync(context: &AppContext) -> Result<(), CliError> {
    if !context.remote_configured {
        return Err(CliError::SyncNotConfigured);
    }
    if !context.signed_in {
        return Err(CliError::NotSignedIn);
    }

    match context.service.sync_now().await? {
        SyncOutcome::Completed { synced, failed: 0 } => {
            println!("Sync completed ({synced} operations)");
        }
        SyncOutcome::Completed { synced, failed } => {
            println!("Sync finished with errors: {synced} synced, {failed} failed (kept for retry)");
        }
        SyncOutcome::AlreadySyncing => println!("A sync is already running"),
        SyncOutcome::Offline => println!("Offline; changes stay queued until connectivity returns"),
        SyncOutcome::NoSession => println!("Session expired; sign in again to sync"),
        SyncOutcome::RemoteUnavailable => {
            println!("Remote store unreachable; changes stay queued");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::build_context;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_requires_remote_configuration() {
        let dir = tempdir().unwrap();
        let context = build_context(dir.path(), None, None).await.unwrap();

        let error = run_sync(&context).await.unwrap_err();
        assert!(matches!(error, CliError::SyncNotConfigured));
    }
}
