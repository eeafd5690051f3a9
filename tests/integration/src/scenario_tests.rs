//! End-to-end scenarios: builtin extensions go through resolution and are
//! hosted on a router, which is then exercised in-process.
//!
//! Each module covers one stage of the host's lifecycle.

use std::time::Instant;

use exthost_contract::axum::Router;
use exthost_contract::axum::body::{Body, to_bytes};
use exthost_contract::axum::http::{Request, StatusCode};
use exthost_core::{LoadedExtension, RejectionReason, Stage};
use exthost_server::{HostedApp, Resolution, Settings, build_app, load_and_resolve};
use exthost_test_utils::{FakeExtension, TestHost};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

fn settings_for(host: &TestHost) -> Settings {
    Settings::default().with_base_dir(host.root())
}

fn builtins(fakes: Vec<FakeExtension>) -> Vec<LoadedExtension> {
    fakes
        .into_iter()
        .map(|fake| LoadedExtension::builtin(fake.boxed()))
        .collect()
}

fn names(resolution: &Resolution) -> Vec<&str> {
    resolution.extensions.iter().map(|e| e.name()).collect()
}

fn reasons_for<'a>(resolution: &'a Resolution, name: &'a str) -> Vec<&'a RejectionReason> {
    resolution
        .context
        .rejections_for(name)
        .map(|r| &r.reason)
        .collect()
}

async fn host_app(host: &TestHost, candidates: Vec<LoadedExtension>) -> HostedApp {
    let settings = settings_for(host);
    let resolution = load_and_resolve(&settings, candidates);
    build_app(&settings, resolution.extensions, Instant::now()).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

// ============================================================================
// Resolution
// ============================================================================

mod s1_resolution {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s1_1_dependency_loads_before_dependent() {
        let host = TestHost::new();
        let resolution = load_and_resolve(
            &settings_for(&host),
            builtins(vec![
                FakeExtension::new("y", "1.0.0").depends_on("x", ">=1.0"),
                FakeExtension::new("x", "1.0.0"),
            ]),
        );

        assert_eq!(names(&resolution), vec!["x", "y"]);
        assert!(resolution.context.rejections().is_empty());
    }

    #[test]
    fn s1_2_incompatible_version_excludes_dependent() {
        let host = TestHost::new();
        let resolution = load_and_resolve(
            &settings_for(&host),
            builtins(vec![
                FakeExtension::new("x", "1.0.0"),
                FakeExtension::new("y", "1.0.0").depends_on("x", ">=2.0"),
            ]),
        );

        assert_eq!(names(&resolution), vec!["x"]);
        let rejection = &resolution.context.rejections()[0];
        assert_eq!(rejection.stage, Stage::Declarative);
        assert!(
            rejection.to_string().contains("incompatible"),
            "unexpected rejection: {rejection}"
        );
    }

    #[test]
    fn s1_3_cycle_rejects_everything() {
        let host = TestHost::new();
        let resolution = load_and_resolve(
            &settings_for(&host),
            builtins(vec![
                FakeExtension::new("a", "1.0.0").depends_on("b", "1.0"),
                FakeExtension::new("b", "1.0.0").depends_on("a", "1.0"),
                FakeExtension::new("c", "1.0.0"),
            ]),
        );

        assert!(resolution.extensions.is_empty());
        let cycle = RejectionReason::DependencyCycle {
            participants: vec!["a".into(), "b".into()],
        };
        assert_eq!(reasons_for(&resolution, "a"), vec![&cycle]);
        assert_eq!(reasons_for(&resolution, "b"), vec![&cycle]);
        assert_eq!(
            reasons_for(&resolution, "c"),
            vec![&RejectionReason::BatchAborted {
                participants: vec!["a".into(), "b".into()],
            }]
        );
    }

    #[test]
    fn s1_4_declined_hook_cascades_to_dependents() {
        let host = TestHost::new();
        let resolution = load_and_resolve(
            &settings_for(&host),
            builtins(vec![
                FakeExtension::new("x", "1.0.0"),
                FakeExtension::new("y", "1.0.0")
                    .depends_on("x", ">=1.0")
                    .declining(),
                FakeExtension::new("z", "1.0.0").depends_on("y", ">=1.0"),
            ]),
        );

        assert_eq!(names(&resolution), vec!["x"]);
        assert_eq!(
            reasons_for(&resolution, "y"),
            vec![&RejectionReason::ValidationDeclined]
        );
        assert_eq!(
            reasons_for(&resolution, "z"),
            vec![&RejectionReason::DependencyRemoved {
                dependency: "y".into()
            }]
        );
    }

    #[test]
    fn s1_5_hook_sees_versions_of_declared_survivors() {
        let host = TestHost::new();
        let audit = FakeExtension::new("audit", "1.0.0").depends_on("core", "1.0");
        let recorded = audit.validation_calls();

        load_and_resolve(
            &settings_for(&host),
            builtins(vec![
                FakeExtension::new("core", "1.4.0"),
                FakeExtension::new("broken", "1.0.0").depends_on("missing", "1.0"),
                audit,
            ]),
        );

        let seen = recorded.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let versions: Vec<_> = seen[0].iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(versions, vec![("audit", "1.0.0"), ("core", "1.4.0")]);
    }
}

// ============================================================================
// Hosting
// ============================================================================

mod s2_hosting {
    use super::*;
    use pretty_assertions::assert_eq;
    use exthost_sample_extension::GreeterExtension;
    use serde_json::json;

    #[tokio::test]
    async fn s2_1_root_reports_api_identity() {
        let host = TestHost::new();
        let app = host_app(&host, Vec::new()).await;

        let (status, body) = get(&app.router, "/").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["apiName"], "CoreAPI");
        assert_eq!(json["message"], "Core API running.");
    }

    #[tokio::test]
    async fn s2_2_sample_extension_serves_and_writes_config() {
        let host = TestHost::new();
        let app = host_app(
            &host,
            vec![LoadedExtension::builtin(Box::new(GreeterExtension))],
        )
        .await;

        host.assert_file_exists("config/greeter.json");
        assert_eq!(
            host.read_extension_config("greeter"),
            json!({"greeting": "Hello", "punctuation": "!"})
        );

        assert_eq!(
            get(&app.router, "/greeter/hello").await,
            (StatusCode::OK, "Hello, world!".to_string())
        );
        assert_eq!(
            get(&app.router, "/greeter/hello/sam").await,
            (StatusCode::OK, "Hello, sam!".to_string())
        );
    }

    #[tokio::test]
    async fn s2_3_operator_config_is_respected() {
        let host = TestHost::new();
        host.write_extension_config("greeter", &json!({"greeting": "Hej", "punctuation": "."}));

        let app = host_app(
            &host,
            vec![LoadedExtension::builtin(Box::new(GreeterExtension))],
        )
        .await;

        assert_eq!(
            get(&app.router, "/greeter/hello").await.1,
            "Hej, world."
        );
    }

    #[tokio::test]
    async fn s2_4_rejected_extensions_are_not_routed() {
        let host = TestHost::new();
        let app = host_app(
            &host,
            builtins(vec![
                FakeExtension::new("core", "1.0.0").with_route("/ping", "core"),
                FakeExtension::new("orphan", "1.0.0")
                    .depends_on("ghost", "1.0")
                    .with_route("/ping", "orphan"),
            ]),
        )
        .await;

        assert_eq!(app.extensions.len(), 1);
        assert_eq!(get(&app.router, "/core/ping").await.1, "core");
        assert_eq!(get(&app.router, "/orphan/ping").await.0, StatusCode::NOT_FOUND);
        host.assert_file_missing("config/orphan.json");
    }

    #[tokio::test]
    async fn s2_5_panicking_handler_returns_error_body() {
        let host = TestHost::new();
        let app = host_app(
            &host,
            builtins(vec![
                FakeExtension::new("flaky", "1.0.0").with_panicking_route("/explode"),
            ]),
        )
        .await;

        let (status, body) = get(&app.router, "/flaky/explode").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["path"], "/flaky/explode");

        // The host keeps serving afterwards.
        assert_eq!(get(&app.router, "/").await.0, StatusCode::OK);
    }
}
