//! The trigger + webhook HTTP server.
//!
//! Two authenticated endpoints drive the engine: `POST /trigger` (the
//! periodic external scheduler, bearer-token auth) and
//! `POST /webhooks/email` (provider callbacks, signature-verified). A
//! liveness probe rounds out the surface.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use cadence_common::Signal;
use cadence_dispatch::{Engine, ProviderEvent};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{config::ServerConfig, error::ServerError, signature};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Engine, config: ServerConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }
}

/// The engine's HTTP server.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer").finish_non_exhaustive()
    }
}

impl ApiServer {
    /// Bind the configured listen address and build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(config: ServerConfig, engine: Engine) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| ServerError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "api server bound successfully"
        );

        let state = AppState::new(engine, config);
        let router = Router::new()
            .route("/health/live", get(liveness_handler))
            .route("/trigger", post(trigger_handler))
            .route("/webhooks/email", post(webhook_handler))
            .with_state(state)
            // A trigger run paces itself between batches, so the ceiling is generous.
            .layer(TimeoutLayer::new(Duration::from_secs(300)));

        Ok(Self { listener, router })
    }

    /// The locally bound address (useful when the port was 0).
    ///
    /// # Errors
    /// Returns an error if the listener's address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), ServerError> {
        tracing::info!("api server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("api server received shutdown signal");
            })
            .await
            .map_err(|e| ServerError::ServerError(e.to_string()))?;

        tracing::info!("api server stopped");
        Ok(())
    }
}

/// Liveness probe handler
async fn liveness_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

fn bearer_authorized(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| presented == token)
}

/// Trigger handler: process due scheduled campaigns and due drip steps.
///
/// This is the only externally-scheduled entry point into the engine; a
/// cron-style caller hits it with the shared bearer token.
async fn trigger_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_authorized(&headers, &state.config.trigger_token) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let summary = state.engine.process_due(Utc::now()).await;
    tracing::info!(
        campaigns_sent = summary.campaigns_sent,
        campaigns_started = summary.campaigns_started,
        sent = summary.sent,
        drip_sent = summary.drip.sent,
        failures = summary.failed + summary.drip.failed,
        "trigger run complete"
    );
    Json(summary).into_response()
}

/// The provider's webhook payload.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookData {
    email_id: Option<String>,
    #[serde(default)]
    click: Option<WebhookClick>,
}

#[derive(Debug, Deserialize)]
struct WebhookClick {
    link: Option<String>,
}

enum SignatureCheck {
    Accepted,
    Rejected(&'static str),
}

fn check_signature(config: &ServerConfig, headers: &HeaderMap, body: &str) -> SignatureCheck {
    let Some(secret) = &config.webhook_signing_secret else {
        if config.production {
            // Fail closed: unverifiable traffic never reaches the engine.
            return SignatureCheck::Rejected("webhook signing secret not configured");
        }
        return SignatureCheck::Accepted;
    };

    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    let (Some(msg_id), Some(timestamp), Some(signature)) = (
        header("svix-id"),
        header("svix-timestamp"),
        header("svix-signature"),
    ) else {
        return SignatureCheck::Rejected("missing signature headers");
    };

    if signature::verify(secret, msg_id, timestamp, signature, body) {
        SignatureCheck::Accepted
    } else {
        SignatureCheck::Rejected("signature mismatch")
    }
}

/// Webhook handler: reconcile one provider event.
///
/// Unknown events and unknown recipients are acknowledged with success —
/// the provider's stream includes traffic unrelated to campaign mail, and
/// an erroring response would only cause redelivery storms. Malformed or
/// unverifiable requests are rejected explicitly.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match check_signature(&state.config, &headers, &body) {
        SignatureCheck::Accepted => {}
        SignatureCheck::Rejected(reason) => {
            cadence_common::webhook!(level = WARN, "webhook rejected: {}", reason);
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(error) => {
            cadence_common::webhook!(level = WARN, "malformed webhook payload: {}", error);
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "malformed payload" })),
            )
                .into_response();
        }
    };

    let Some(provider_id) = payload.data.email_id else {
        // Nothing to correlate; acknowledge and move on.
        return Json(serde_json::json!({ "received": true })).into_response();
    };

    let event = ProviderEvent {
        event_type: payload.event_type,
        provider_id,
        metadata: payload.data.click.and_then(|click| click.link),
    };

    match state.engine.reconciler().ingest(&event, Utc::now()).await {
        Ok(outcome) => {
            tracing::debug!(outcome = ?outcome, "webhook event processed");
            Json(serde_json::json!({ "received": true })).into_response()
        }
        Err(error) => {
            tracing::error!(error = %error, "webhook event could not be persisted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "storage failure" })),
            )
                .into_response()
        }
    }
}
