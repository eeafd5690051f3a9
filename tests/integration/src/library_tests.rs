//! Tests that load the sample extension as a real dynamic library.
//!
//! The cdylib is built alongside this crate because the crate depends on
//! `exthost-sample-extension`. If it cannot be found next to the test binary
//! it is built with the same cargo that runs the tests.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use exthost_contract::axum::Router;
use exthost_contract::axum::body::{Body, to_bytes};
use exthost_contract::axum::http::Request;
use exthost_contract::{CONTRACT_VERSION, ExtensionConfig, ServiceCollection};
use exthost_core::{Error, ExtensionLoader, Origin, RejectionReason};
use exthost_server::{Settings, build_app, load_and_resolve, serve};
use exthost_test_utils::TestHost;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

const CRATE_STEM: &str = "exthost_sample_extension";

fn is_sample_library(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(&format!("{DLL_PREFIX}{CRATE_STEM}"))
        && path.extension().is_some_and(|ext| ext == DLL_EXTENSION)
}

/// Newest sample library in `dirs`, by modification time.
fn newest_sample_library(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_sample_library(path))
        .max_by_key(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
}

fn sample_library() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap().to_path_buf();
    let profile = deps.parent().unwrap().to_path_buf();
    let dirs = [deps, profile];

    if let Some(found) = newest_sample_library(&dirs) {
        return found;
    }

    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut build = Command::new(cargo);
    build.args(["build", "-p", "exthost-sample-extension"]);
    if !cfg!(debug_assertions) {
        build.arg("--release");
    }
    let status = build.status().unwrap();
    assert!(status.success(), "building the sample extension failed");

    newest_sample_library(&dirs).unwrap_or_else(|| {
        panic!("no {DLL_PREFIX}{CRATE_STEM}*.{DLL_EXTENSION} under {dirs:?}")
    })
}

/// Copy the sample library into the host's extensions directory as
/// `<stem>.<ext>` and return the copy's path.
fn install(host: &TestHost, stem: &str) -> PathBuf {
    let target = host
        .create_extensions_dir()
        .join(format!("{stem}.{DLL_EXTENSION}"));
    fs::copy(sample_library(), &target).unwrap();
    target
}

fn settings_for(host: &TestHost) -> Settings {
    Settings::default().with_base_dir(host.root())
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    })
    .await
    .unwrap()
}

async fn body_of(router: Router, uri: &str) -> String {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_library_is_served_then_shut_down() {
    let host = TestHost::new();
    let path = install(&host, "greeter");
    let settings = settings_for(&host);

    let resolution = load_and_resolve(&settings, Vec::new());
    assert!(resolution.failures.is_empty(), "{:?}", resolution.failures);
    assert_eq!(resolution.extensions.len(), 1);
    assert_eq!(resolution.extensions[0].name(), "greeter");
    assert_eq!(resolution.extensions[0].origin(), &Origin::Library(path));

    let app = build_app(&settings, resolution.extensions, Instant::now()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, app, Duration::from_secs(5), async move {
        let _ = stopped.await;
    }));

    let named = http_get(addr, "/greeter/hello/sam").await;
    assert!(named.starts_with("HTTP/1.1 200"), "{named}");
    assert!(named.ends_with("Hello, sam!"), "{named}");

    let plain = http_get(addr, "/greeter/hello").await;
    assert!(plain.ends_with("Hello, world!"), "{plain}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    // First start wrote the library's default configuration.
    assert_eq!(
        host.read_extension_config("greeter"),
        json!({"greeting": "Hello", "punctuation": "!"})
    );
}

#[tokio::test]
async fn test_two_copies_load_independently_and_first_wins() {
    let host = TestHost::new();
    let first = install(&host, "greeter-a");
    let second = install(&host, "greeter-b");

    let report = ExtensionLoader::new(host.extensions_dir()).load_all();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let origins: Vec<_> = report.extensions.iter().map(|e| e.origin().clone()).collect();
    assert_eq!(
        origins,
        vec![Origin::Library(first.clone()), Origin::Library(second)]
    );

    // Each copy runs its own code against its own services.
    for loaded in &report.extensions {
        let mut services = ServiceCollection::new();
        let config = ExtensionConfig::empty("greeter");
        loaded.extension().register_services(&mut services, &config);
        let routes = loaded
            .extension()
            .register_routes(Router::new(), &config, &Arc::new(services));
        assert_eq!(body_of(routes, "/hello/copy").await, "Hello, copy!");
    }
    drop(report);

    let resolution = load_and_resolve(&settings_for(&host), Vec::new());
    assert_eq!(resolution.extensions.len(), 1);
    assert_eq!(resolution.extensions[0].origin(), &Origin::Library(first));
    let reasons: Vec<_> = resolution
        .context
        .rejections_for("greeter")
        .map(|r| &r.reason)
        .collect();
    assert_eq!(reasons, vec![&RejectionReason::DuplicateName]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_library_built_against_other_contract_is_refused() {
    let host = TestHost::new();
    let mut bytes = fs::read(sample_library()).unwrap();

    // Rewrite the exported contract version in place, keeping its length.
    let exported = format!("{CONTRACT_VERSION}\0").into_bytes();
    let replacement = if exported[0] == b'9' { b'8' } else { b'9' };
    let mut patched = 0;
    let mut at = 0;
    while let Some(offset) = bytes[at..]
        .windows(exported.len())
        .position(|window| window == exported.as_slice())
    {
        bytes[at + offset] = replacement;
        at += offset + exported.len();
        patched += 1;
    }
    assert!(patched > 0, "contract version not found in the library");

    let dir = host.create_extensions_dir();
    let path = dir.join(format!("greeter.{DLL_EXTENSION}"));
    fs::write(&path, &bytes).unwrap();

    let report = ExtensionLoader::new(&dir).load_all();

    assert!(report.extensions.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, path);
    match &report.failures[0].error {
        Error::ContractMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, CONTRACT_VERSION);
            assert_ne!(found, CONTRACT_VERSION);
            assert_eq!(found.len(), CONTRACT_VERSION.len());
        }
        other => panic!("expected a contract mismatch, got {other}"),
    }
}
