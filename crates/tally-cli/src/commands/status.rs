use serde::Serialize;

use crate::commands::common::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusItem {
    online: bool,
    remote_configured: bool,
    signed_in: bool,
    is_syncing: bool,
    last_sync_time: Option<String>,
    pending_operations: usize,
    error: Option<String>,
}

pub fn run_status(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let status = context.service.sync_status();
    let item = StatusItem {
        online: context.service.is_online(),
        remote_configured: context.remote_configured,
        signed_in: context.signed_in,
        is_syncing: status.is_syncing,
        last_sync_time: status.last_sync_time.map(|at| at.to_rfc3339()),
        pending_operations: status.pending_operations,
        error: status.error,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Online:             {}", if item.online { "yes" } else { "no" });
    println!(
        "Remote:             {}",
        if item.remote_configured {
            "configured"
        } else {
            "not configured"
        }
    );
    println!(
        "Session:            {}",
        if item.signed_in { "signed in" } else { "signed out" }
    );
    println!(
        "Last sync:          {}",
        item.last_sync_time.as_deref().unwrap_or("never")
    );
    println!("Pending operations: {}", item.pending_operations);
    if let Some(error) = &item.error {
        println!("Last error:         {error}");
    }
    Ok(())
}
