//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::access::context::RequestContext;
use crate::access::decision::{AccessResult, DenialReason, Surface};
use crate::casa::verifier::VerificationError;
use crate::http::server::AppState;
use crate::http::soap;
use crate::subscription::types::SubscriptionId;

#[derive(Debug, Serialize)]
struct AccessResponse<'a> {
    item: &'a str,
    kind: &'static str,
    #[serde(flatten)]
    result: AccessResult,
    active_subscription: Option<SubscriptionId>,
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Issue,
    Article,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn issue_access(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<RequestContext>>,
    Path(localidentifier): Path<String>,
) -> Response {
    decide(&state, &ctx, Lookup::Issue, &localidentifier, Surface::Page).await
}

pub async fn article_access(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<RequestContext>>,
    Path(localidentifier): Path<String>,
) -> Response {
    decide(&state, &ctx, Lookup::Article, &localidentifier, Surface::Page).await
}

pub async fn raw_issue_access(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<RequestContext>>,
    Path(localidentifier): Path<String>,
) -> Response {
    decide(&state, &ctx, Lookup::Issue, &localidentifier, Surface::RawDatastream).await
}

async fn decide(
    state: &AppState,
    ctx: &RequestContext,
    lookup: Lookup,
    localidentifier: &str,
    surface: Surface,
) -> Response {
    let engine = state.engine();
    let loaded = match lookup {
        Lookup::Issue => engine.load_issue(localidentifier).await,
        Lookup::Article => engine.load_article(localidentifier).await,
    };
    let (item, journal) = match loaded {
        Ok(Some(found)) => found,
        Ok(None) => return error(StatusCode::NOT_FOUND, "Content not found"),
        Err(e) => {
            tracing::error!(item = localidentifier, error = %e, "Content lookup failed");
            return error(StatusCode::SERVICE_UNAVAILABLE, "Repository unavailable, retry later");
        }
    };

    let result = engine.can_access(&item, &journal, ctx, surface, Utc::now().date_naive());
    let status = match (result.granted, result.denial) {
        (true, _) => StatusCode::OK,
        (false, Some(DenialReason::RepositoryUnavailable)) => StatusCode::SERVICE_UNAVAILABLE,
        (false, _) => StatusCode::FORBIDDEN,
    };
    let justification = result.justification;
    let body = AccessResponse {
        item: item.localidentifier(),
        kind: item.kind(),
        result,
        active_subscription: ctx.active_subscription(),
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(justification) = justification {
        response.extensions_mut().insert(justification);
    }
    response
}

/// `GET /webservices/casa?casa_token=...`. The token was verified once by the
/// request context middleware; this only renders the outcome.
pub async fn casa_verify(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<RequestContext>>,
) -> Response {
    if state.engine().casa().is_none() {
        return soap::fault(StatusCode::NOT_FOUND, "CASA verification disabled");
    }
    let outcome = match ctx.casa() {
        Some(outcome) => *outcome,
        None => Err(VerificationError::MalformedToken),
    };
    match outcome {
        Ok(subscription) => soap::subscription_verified(subscription),
        Err(err) => {
            let status = match err {
                VerificationError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::FORBIDDEN,
            };
            soap::fault(status, err.public_message())
        }
    }
}

pub async fn restrictions(
    State(state): State<AppState>,
    Path(journal_code): Path<String>,
) -> Response {
    let engine = state.engine();
    match engine.restrictions(&journal_code, Utc::now().date_naive()).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => error(StatusCode::NOT_FOUND, "Journal not found"),
        Err(e) => {
            tracing::error!(journal = %journal_code, error = %e, "Restrictions lookup failed");
            error(StatusCode::SERVICE_UNAVAILABLE, "Repository unavailable, retry later")
        }
    }
}

fn error(status: StatusCode, message: &'static str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
