//! PostgREST-style HTTP client for the remote store

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::rows;
use super::{ApplyOutcome, RemoteBackend, RemoteError};
use crate::config::{RemoteSettings, Session};
use crate::models::{Collection, MutationKind, PendingMutation};
use crate::retry::RetryPolicy;
use crate::util::compact_text;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote store client speaking the hosted backend's REST dialect.
///
/// Every write is scoped to the authenticated owner; the server enforces
/// row-level security, the owner filter here is defense against
/// cross-tenant writes from a confused client.
#[derive(Clone)]
pub struct HttpRemoteClient {
    base_url: String,
    api_key: String,
    session: Arc<RwLock<Option<Session>>>,
    client: reqwest::Client,
    probe_retry: RetryPolicy,
}

impl HttpRemoteClient {
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(RemoteError::Http)?;

        Ok(Self {
            base_url: settings.base_url,
            api_key: settings.api_key,
            session: Arc::new(RwLock::new(None)),
            client,
            probe_retry: RetryPolicy::fixed(3, Duration::from_millis(500)),
        })
    }

    /// Override the availability-probe retry schedule.
    #[must_use]
    pub const fn with_probe_retry(mut self, policy: RetryPolicy) -> Self {
        self.probe_retry = policy;
        self
    }

    /// Install or clear the authenticated session.
    pub fn set_session(&self, session: Option<Session>) {
        if let Ok(mut slot) = self.session.write() {
            *slot = session;
        }
    }

    fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|slot| slot.clone())
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.as_str())
    }

    fn authed(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn probe_once(&self) -> bool {
        let Some(session) = self.session() else {
            return false;
        };

        let result = self
            .authed(
                self.client.get(self.collection_url(Collection::Categories)),
                &session,
            )
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await;

        matches!(result, Ok(response) if response.status().is_success())
    }

    async fn insert(
        &self,
        session: &Session,
        collection: Collection,
        payload: Value,
    ) -> Result<String, RemoteError> {
        let row = rows::entity_to_row(collection, payload, &session.user_id)?;
        let response = self
            .authed(self.client.post(self.collection_url(collection)), session)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let inserted = parse_rows(response).await?;
        let first = inserted
            .first()
            .ok_or_else(|| RemoteError::InvalidPayload("insert returned no rows".into()))?;
        rows::row_id(first)
    }

    async fn update_row(
        &self,
        session: &Session,
        collection: Collection,
        payload: Value,
    ) -> Result<(), RemoteError> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| RemoteError::InvalidPayload("update payload is missing an id".into()))?;

        let row = rows::entity_to_row(collection, payload, &session.user_id)?;
        let response = self
            .authed(self.client.patch(self.collection_url(collection)), session)
            .query(&owner_filter(&id, session))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let updated = parse_rows(response).await?;
        if updated.is_empty() {
            // Missing or not owned; the caller needs the authoritative state
            return Err(RemoteError::Api("update matched no rows".into()));
        }
        Ok(())
    }

    async fn delete_row(
        &self,
        session: &Session,
        collection: Collection,
        id: &str,
    ) -> Result<(), RemoteError> {
        let response = self
            .authed(self.client.delete(self.collection_url(collection)), session)
            .query(&owner_filter(id, session))
            .send()
            .await?;

        // An already-absent row still counts as deleted (idempotent retry)
        check_status(response).await
    }

    async fn apply_inner(&self, mutation: &PendingMutation) -> Result<Option<String>, RemoteError> {
        let session = self.session().ok_or(RemoteError::NoSession)?;

        match mutation.kind {
            MutationKind::Create => self
                .insert(&session, mutation.collection, mutation.payload.clone())
                .await
                .map(Some),
            MutationKind::Update => self
                .update_row(&session, mutation.collection, mutation.payload.clone())
                .await
                .map(|()| None),
            MutationKind::Delete => {
                let id = mutation.target_id().ok_or_else(|| {
                    RemoteError::InvalidPayload("delete payload is missing an id".into())
                })?;
                self.delete_row(&session, mutation.collection, id)
                    .await
                    .map(|()| None)
            }
        }
    }
}

impl RemoteBackend for HttpRemoteClient {
    fn has_session(&self) -> bool {
        self.session.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn probe_availability(&self) -> impl Future<Output = bool> + Send {
        let client = self.clone();
        async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                if client.probe_once().await {
                    return true;
                }
                match client.probe_retry.delay_for(attempt) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return false,
                }
            }
        }
    }

    fn fetch_all(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send {
        let client = self.clone();
        async move {
            let session = client.session().ok_or(RemoteError::NoSession)?;
            let response = client
                .authed(client.client.get(client.collection_url(collection)), &session)
                .query(&[
                    ("select", "*".to_string()),
                    ("user_id", format!("eq.{}", session.user_id)),
                ])
                .send()
                .await?;

            let raw = parse_rows(response).await?;
            raw.into_iter()
                .map(|row| rows::row_to_entity(collection, row))
                .collect()
        }
    }

    fn apply(&self, mutation: PendingMutation) -> impl Future<Output = ApplyOutcome> + Send {
        let client = self.clone();
        async move {
            match client.apply_inner(&mutation).await {
                Ok(new_id) => ApplyOutcome::success(mutation, new_id),
                Err(e) => {
                    tracing::warn!(
                        kind = mutation.kind.as_str(),
                        collection = %mutation.collection,
                        error = %e,
                        "remote operation failed"
                    );
                    ApplyOutcome::failure(mutation, e.to_string())
                }
            }
        }
    }
}

fn owner_filter(id: &str, session: &Session) -> Vec<(&'static str, String)> {
    vec![
        ("id", format!("eq.{id}")),
        ("user_id", format!("eq.{}", session.user_id)),
    ]
}

async fn parse_rows(response: reqwest::Response) -> Result<Vec<Value>, RemoteError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Api(parse_api_error(status, &body)));
    }
    response.json::<Vec<Value>>().await.map_err(RemoteError::Http)
}

async fn check_status(response: reqwest::Response) -> Result<(), RemoteError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Api(parse_api_error(status, &body)));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
