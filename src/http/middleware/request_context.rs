//! Request context middleware.
//! Builds the [`RequestContext`] once per request and persists header referers.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use url::form_urlencoded;

use crate::access::context::{RequestContext, RequestInfo, UserIdentity};
use crate::access::decision::Justification;
use crate::config::{EngineConfig, IdentityConfig, RefererConfig};
use crate::http::server::AppState;
use crate::security::client_ip::resolve_client_ip;
use crate::security::referer::{select_candidate, RefererSource};
use crate::subscription::resolver::MatchSource;
use crate::subscription::types::UserId;

pub const REMOTE_USER: &str = "x-remote-user";
pub const REMOTE_USER_STAFF: &str = "x-remote-user-staff";
pub const REMOTE_USER_ACTIVE: &str = "x-remote-user-active";

pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let engine = state.engine();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let info = request_info(engine.config(), req.headers(), req.uri().query(), peer);

    let ctx = Arc::new(engine.build_context(info, Utc::now()).await);
    req.extensions_mut().insert(ctx.clone());

    let mut response = next.run(req).await;

    let granted_by_referer = matches!(
        response.extensions().get::<Justification>(),
        Some(Justification::Subscription { source: MatchSource::Referer, .. })
    );
    if let (true, Some((referer, RefererSource::Header))) = (granted_by_referer, ctx.referer()) {
        if let Some(cookie) = referer_cookie(&engine.config().referer, referer) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// Collect the raw request facts the engine needs.
pub fn request_info(
    config: &EngineConfig,
    headers: &HeaderMap,
    query: Option<&str>,
    peer: Option<IpAddr>,
) -> RequestInfo {
    let user = identity(headers, &config.identity);
    let ip = resolve_client_ip(headers, peer, user.as_ref(), &config.client_ip);

    let cookie = cookie_value(headers, &config.referer.cookie_name);
    let referer_header = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
    let referer = select_candidate(cookie.as_deref(), referer_header);

    let mut ticket = None;
    let mut casa_token = None;
    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "ticket" => ticket = Some(value.into_owned()),
            "casa_token" => casa_token = Some(value.into_owned()),
            _ => {}
        }
    }

    RequestInfo { user, ip, referer, casa_token, ticket }
}

/// Identity asserted by the authenticating gateway, when trusted.
pub fn identity(headers: &HeaderMap, config: &IdentityConfig) -> Option<UserIdentity> {
    if !config.trust_headers {
        return None;
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
    let id = header(REMOTE_USER)?.parse::<u64>().ok()?;
    let flag = |name: &str, default: bool| match header(name) {
        Some(v) => v.eq_ignore_ascii_case("true") || v == "1",
        None => default,
    };
    Some(UserIdentity {
        id: UserId(id),
        is_staff: flag(REMOTE_USER_STAFF, false),
        is_active: flag(REMOTE_USER_ACTIVE, true),
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            form_urlencoded::parse(format!("v={}", value).as_bytes())
                .next()
                .map(|(_, decoded)| decoded.into_owned())
        })
}

fn referer_cookie(config: &RefererConfig, referer: &str) -> Option<HeaderValue> {
    let encoded: String = form_urlencoded::byte_serialize(referer.as_bytes()).collect();
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        config.cookie_name, encoded, config.cookie_max_age_secs
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trusted() -> IdentityConfig {
        IdentityConfig { trust_headers: true }
    }

    #[test]
    fn test_identity_requires_trust() {
        let mut headers = HeaderMap::new();
        headers.insert(REMOTE_USER, HeaderValue::from_static("42"));
        assert_eq!(identity(&headers, &IdentityConfig::default()), None);

        let user = identity(&headers, &trusted()).unwrap();
        assert_eq!(user.id, UserId(42));
        assert!(!user.is_staff);
        assert!(user.is_active);

        headers.insert(REMOTE_USER_STAFF, HeaderValue::from_static("true"));
        headers.insert(REMOTE_USER_ACTIVE, HeaderValue::from_static("0"));
        let user = identity(&headers, &trusted()).unwrap();
        assert!(user.is_staff);
        assert!(!user.is_active);
    }

    #[test]
    fn test_non_numeric_user_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(REMOTE_USER, HeaderValue::from_static("alice"));
        assert_eq!(identity(&headers, &trusted()), None);
    }

    #[test]
    fn test_referer_cookie_round_trip() {
        let config = RefererConfig::default();
        let referer = "https://proxy.example.edu/login?url=a b;c";
        let set = referer_cookie(&config, referer).unwrap();
        let pair = set.to_str().unwrap().split(';').next().unwrap().to_string();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; {}", pair)).unwrap(),
        );
        assert_eq!(cookie_value(&headers, &config.cookie_name).as_deref(), Some(referer));
    }

    #[test]
    fn test_request_info_reads_query_and_referer() {
        let config = EngineConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("https://library.example.org/"));
        let info = request_info(
            &config,
            &headers,
            Some("ticket=abc&casa_token=n%3Am%3As&x=1"),
            Some("203.0.113.9".parse().unwrap()),
        );
        assert_eq!(info.ticket.as_deref(), Some("abc"));
        assert_eq!(info.casa_token.as_deref(), Some("n:m:s"));
        assert_eq!(info.ip, Some("203.0.113.9".parse().unwrap()));
        assert_eq!(
            info.referer,
            Some(("https://library.example.org/".to_string(), RefererSource::Header))
        );
    }
}
