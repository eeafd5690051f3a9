//! Route prefixes and the root endpoint.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use regex::Regex;
use serde::Serialize;

/// Overrides must be a single alphanumeric path segment.
static OVERRIDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap());

pub const ROOT_MESSAGE: &str = "Core API running.";

/// Prefix an extension's routes are nested under.
///
/// A configured override wins when it is a valid segment; an invalid one is
/// reported and the extension name is used instead.
pub fn route_prefix(name: &str, overrides: &BTreeMap<String, String>) -> String {
    let Some(candidate) = overrides.get(name) else {
        return name.to_string();
    };

    if is_valid_override(candidate) {
        tracing::info!(extension = name, prefix = %candidate, "Route prefix overridden");
        candidate.clone()
    } else {
        tracing::warn!(
            extension = name,
            prefix = %candidate,
            "Invalid route override, only A-Z, a-z and 0-9 are allowed; using extension name"
        );
        name.to_string()
    }
}

pub fn is_valid_override(prefix: &str) -> bool {
    OVERRIDE_PATTERN.is_match(prefix)
}

/// Format an uptime as `[d.]hh:mm:ss.fffffff`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let ticks = uptime.subsec_nanos() / 100;

    if days > 0 {
        format!("{days}.{hours:02}:{minutes:02}:{seconds:02}.{ticks:07}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{ticks:07}")
    }
}

/// Identity reported by `GET /`.
#[derive(Debug, Clone)]
pub struct RootInfo {
    pub api_name: String,
    pub version: String,
    pub started: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub api_name: String,
    pub version: String,
    pub running_time: String,
    pub message: &'static str,
}

async fn root(State(info): State<Arc<RootInfo>>) -> Json<RootResponse> {
    Json(RootResponse {
        api_name: info.api_name.clone(),
        version: info.version.clone(),
        running_time: format_uptime(info.started.elapsed()),
        message: ROOT_MESSAGE,
    })
}

/// Router serving `GET /`.
pub fn root_router(info: RootInfo) -> Router {
    Router::new()
        .route("/", get(root))
        .with_state(Arc::new(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tower::ServiceExt;

    #[rstest]
    #[case("custom", true)]
    #[case("Api2", true)]
    #[case("with-dash", false)]
    #[case("with/slash", false)]
    #[case("", false)]
    #[case("ünïcode", false)]
    fn test_override_validation(#[case] prefix: &str, #[case] valid: bool) {
        assert_eq!(is_valid_override(prefix), valid);
    }

    #[test]
    fn test_route_prefix_resolution() {
        let overrides = BTreeMap::from([
            ("greeter".to_string(), "hello".to_string()),
            ("billing".to_string(), "bad/prefix".to_string()),
        ]);

        assert_eq!(route_prefix("greeter", &overrides), "hello");
        assert_eq!(route_prefix("billing", &overrides), "billing");
        assert_eq!(route_prefix("other", &overrides), "other");
    }

    #[rstest]
    #[case(Duration::ZERO, "00:00:00.0000000")]
    #[case(Duration::from_millis(61_500), "00:01:01.5000000")]
    #[case(Duration::from_secs(90_061), "1.01:01:01.0000000")]
    fn test_format_uptime(#[case] uptime: Duration, #[case] expected: &str) {
        assert_eq!(format_uptime(uptime), expected);
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = root_router(RootInfo {
            api_name: "Demo".into(),
            version: "1.2.3".into(),
            started: Instant::now(),
        });

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["apiName"], "Demo");
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["message"], "Core API running.");
        assert!(json["runningTime"].as_str().unwrap().starts_with("00:00:"));
    }
}
