//! Plugin routing.
//!
//! Every plugin is mounted on its own path. A delivery is validated and
//! authenticated before the plugin sees it; plugin failures are logged with
//! the plugin name, event kind and delivery id and answered with a generic
//! 500.

use crate::error::{HookError, HookResult};
use crate::middleware::LoggingLayer;
use crate::shutdown::ShutdownCoordinator;
use crate::webhook;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use bytes::Bytes;
use hookwarden_common_config::ConfigAgent;
use hookwarden_common_log::spans::plugin_span;
use hookwarden_common_secret::TokenGenerator;
use hookwarden_plugin::{Clients, Outcome, Plugin, PluginContext, PluginHelp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};
use tracing::{info, warn, Instrument};

/// GitHub caps webhook payloads at 25 MB.
pub const DEFAULT_BODY_LIMIT: usize = 25 * 1024 * 1024;

const RESERVED_PATHS: &[&str] = &["/help", "/healthz"];

/// Router construction error.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("path {0} is registered twice")]
    DuplicatePath(String),

    #[error("path {0} is reserved")]
    ReservedPath(String),

    #[error("path {0} must start with '/'")]
    InvalidPath(String),
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct RouterState {
    /// Live HMAC secret deliveries are verified against.
    pub hmac: TokenGenerator,
    /// Source of the configuration snapshot handed to each request.
    pub config: Arc<ConfigAgent>,
    pub clients: Clients,
    pub shutdown: ShutdownCoordinator,
}

#[derive(Clone)]
struct Registered {
    path: String,
    plugin: Arc<dyn Plugin>,
}

/// Builder for the webhook [`Router`].
pub struct PluginRouter {
    state: RouterState,
    plugins: Vec<Registered>,
    body_limit: usize,
}

impl PluginRouter {
    pub fn new(state: RouterState) -> Self {
        Self {
            state,
            plugins: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Mount `plugin` on `path`.
    pub fn register(mut self, path: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Registered {
            path: path.into(),
            plugin: Arc::new(plugin),
        });
        self
    }

    /// Largest accepted payload.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Build the router. The set of plugins is fixed from here on.
    pub fn build(self) -> Result<Router, RouterError> {
        let mut seen = BTreeSet::new();
        for registered in &self.plugins {
            let path = registered.path.as_str();
            if !path.starts_with('/') {
                return Err(RouterError::InvalidPath(path.to_string()));
            }
            if RESERVED_PATHS.contains(&path) {
                return Err(RouterError::ReservedPath(path.to_string()));
            }
            if !seen.insert(path) {
                return Err(RouterError::DuplicatePath(path.to_string()));
            }
        }

        self.warn_unknown_plugins();

        let registry: Arc<[Registered]> = self.plugins.clone().into();
        let help_registry = Arc::clone(&registry);

        let mut router = Router::new()
            .route(
                "/help",
                get(move |State(state): State<RouterState>| help(state, Arc::clone(&help_registry)))
                    .post(move |State(state): State<RouterState>| help(state, Arc::clone(&registry))),
            )
            .route("/healthz", get(healthz));

        for registered in self.plugins {
            info!(path = %registered.path, plugin = registered.plugin.name(), "Plugin registered");
            let plugin = registered.plugin;
            router = router.route(
                &registered.path,
                any(
                    move |State(state): State<RouterState>, method: Method, headers: HeaderMap, body: Bytes| {
                        dispatch(state, Arc::clone(&plugin), method, headers, body)
                    },
                ),
            );
        }

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CatchPanicLayer::new())
            .layer(LoggingLayer::new());

        Ok(router
            .fallback(fallback)
            .layer(DefaultBodyLimit::max(self.body_limit))
            .layer(middleware)
            .with_state(self.state))
    }

    fn warn_unknown_plugins(&self) {
        let registered: BTreeSet<&str> = self.plugins.iter().map(|r| r.plugin.name()).collect();
        let config = self.state.config.config();
        for (key, names) in &config.plugins {
            for name in names.iter().filter(|n| !registered.contains(n.as_str())) {
                warn!(key = %key, plugin = %name, "Configured plugin has no registered handler");
            }
        }
    }
}

/// Successful delivery response.
#[derive(Debug, Serialize)]
struct DeliveryResponse {
    plugin: &'static str,
    delivery: String,
    #[serde(flatten)]
    outcome: Outcome,
}

async fn dispatch(
    state: RouterState,
    plugin: Arc<dyn Plugin>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> HookResult<Json<DeliveryResponse>> {
    if state.shutdown.is_shutting_down() {
        return Err(HookError::ShuttingDown);
    }

    let event = webhook::validate(&method, &headers, body, &state.hmac)?;
    let ctx = PluginContext::new(state.clients.clone(), state.config.config());
    let span = plugin_span(plugin.name(), event.kind.as_str(), &event.delivery);

    let outcome = plugin
        .handle(&event, &ctx)
        .instrument(span.clone())
        .await
        .map_err(|source| HookError::Handler {
            plugin: plugin.name(),
            event: event.kind.to_string(),
            delivery: event.delivery.clone(),
            source,
        })?;

    let repo = event.repository().map(|r| r.full_name()).unwrap_or_default();
    span.in_scope(|| match &outcome {
        Outcome::Handled => info!(repo = %repo, "Delivery handled"),
        Outcome::Ignored { reason } => info!(repo = %repo, reason = %reason, "Delivery ignored"),
    });

    Ok(Json(DeliveryResponse {
        plugin: plugin.name(),
        delivery: event.delivery,
        outcome,
    }))
}

#[derive(Debug, Serialize)]
struct HelpEntry {
    path: String,
    name: &'static str,
    #[serde(flatten)]
    help: PluginHelp,
}

#[derive(Debug, Serialize)]
struct HelpResponse {
    plugins: Vec<HelpEntry>,
}

async fn help(state: RouterState, registry: Arc<[Registered]>) -> Json<HelpResponse> {
    let config = state.config.config();
    let plugins = registry
        .iter()
        .map(|r| HelpEntry {
            path: r.path.clone(),
            name: r.plugin.name(),
            help: r.plugin.help(&config),
        })
        .collect();

    Json(HelpResponse { plugins })
}

async fn healthz(State(state): State<RouterState>) -> impl IntoResponse {
    if state.shutdown.is_shutting_down() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "shutting_down" })),
        )
    } else {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    }
}

async fn fallback(uri: Uri) -> HookError {
    HookError::NotFound(uri.path().to_string())
}
