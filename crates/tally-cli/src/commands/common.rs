//! Shared command plumbing: context construction and input parsing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tally_core::config::{EngineSettings, RemoteSettings, Session};
use tally_core::connectivity::Connectivity;
use tally_core::engine::SyncEngine;
use tally_core::models::{FlowKind, SavingsGoal};
use tally_core::remote::{HttpRemoteClient, RemoteBackend};
use tally_core::retry::RetryPolicy;
use tally_core::service::DataService;
use tally_core::store::LocalStore;
use tally_core::Category;

use crate::error::CliError;

/// Everything a command needs, constructed once per invocation.
pub struct AppContext {
    pub service: DataService<HttpRemoteClient>,
    pub remote_configured: bool,
    pub signed_in: bool,
}

/// Open the local store and wire up the sync stack from the environment.
pub async fn open_context(data_dir: &Path) -> Result<AppContext, CliError> {
    build_context(data_dir, RemoteSettings::from_env(), Session::from_env()).await
}

pub(crate) async fn build_context(
    data_dir: &Path,
    settings: Option<RemoteSettings>,
    session: Option<Session>,
) -> Result<AppContext, CliError> {
    let store = Arc::new(LocalStore::open(data_dir)?);
    let connectivity = Connectivity::new(false);

    let remote_configured = settings.is_some();
    let settings = match settings {
        Some(settings) => settings,
        // Local-only mode: an unreachable placeholder keeps every call on
        // the offline path
        None => RemoteSettings::new("http://localhost:1", "unconfigured")
            .map_err(tally_core::Error::InvalidInput)?,
    };

    // One probe attempt at startup; a CLI invocation should not sit in a
    // retry loop before its first byte of output
    let remote = HttpRemoteClient::new(settings)?
        .with_probe_retry(RetryPolicy::fixed(1, Duration::ZERO));

    let signed_in = remote_configured && session.is_some();
    if signed_in {
        remote.set_session(session);
        if remote.probe_availability().await {
            connectivity.set_online(true);
        }
    }

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&store),
        remote.clone(),
        connectivity.clone(),
        EngineSettings::default(),
    ));
    let service = DataService::new(store, remote, engine, connectivity);

    Ok(AppContext {
        service,
        remote_configured,
        signed_in,
    })
}

/// Parse a positive decimal amount.
pub fn parse_amount(raw: &str) -> Result<f64, CliError> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidAmount(raw.to_string()))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CliError::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

/// Parse an optional `YYYY-MM-DD` date, defaulting to today.
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate, CliError> {
    match raw {
        None => Ok(chrono::Utc::now().date_naive()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CliError::InvalidDate(raw.to_string())),
    }
}

/// Join description parts, rejecting empty input.
pub fn resolve_description(parts: &[String]) -> Result<String, CliError> {
    let description = parts.join(" ").trim().to_string();
    if description.is_empty() {
        return Err(CliError::EmptyDescription);
    }
    Ok(description)
}

/// Find a category by name (case-insensitive), creating it on first use.
pub async fn find_or_create_category(
    context: &AppContext,
    name: &str,
    kind: FlowKind,
) -> Result<String, CliError> {
    let categories: Vec<Category> = context.service.fetch_all().await?;
    if let Some(existing) = categories
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(name))
    {
        return Ok(existing.id.clone());
    }

    let created = context
        .service
        .create_online(Category::new(name, kind))
        .await?;
    Ok(created.id)
}

/// Resolve a savings goal by exact name (case-insensitive) or id prefix.
pub async fn resolve_goal(context: &AppContext, query: &str) -> Result<SavingsGoal, CliError> {
    let goals: Vec<SavingsGoal> = context.service.fetch_all().await?;

    if let Some(goal) = goals
        .iter()
        .find(|goal| goal.name.eq_ignore_ascii_case(query))
    {
        return Ok(goal.clone());
    }

    let matching: Vec<&SavingsGoal> = goals
        .iter()
        .filter(|goal| goal.id.starts_with(query))
        .collect();

    match matching.len() {
        0 => Err(CliError::GoalNotFound(query.to_string())),
        1 => Ok(matching[0].clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|goal| goal.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousGoal(format!(
                "Goal '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}
