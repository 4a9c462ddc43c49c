//! Bundle orchestration integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use pagewright::backend::error::{BundleError, ServerError};
use pagewright::backend::registry::Route;
use pagewright::backend::server::Server;
use serde_json::json;
use tokio::net::TcpListener;

use crate::common::*;

#[tokio::test]
async fn test_gate_holds_requests_during_first_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let (bundler, release) = MockBundler::gated(40);
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .bundler(Arc::new(bundler))
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"));
    let router = server.prepare().await.unwrap();
    let bundling = server.bundling_state().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let while_bundling = async {
        while !bundling.is_blocking() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let response = get(&router, "/").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(get(&router, "/ping").await.status(), StatusCode::OK);
        assert_eq!(body_text(get(&router, "/bundle-status").await).await, "40");
        release.notify_one();
    };
    let (started, ()) = tokio::join!(server.start_on(listener), while_bundling);
    started.unwrap();

    assert!(bundling.completed_once());
    assert_eq!(get(&router, "/").await.status(), StatusCode::OK);
    assert_eq!(body_text(get(&router, "/bundle-status").await).await, "100");
    assert!(server.local_addr().is_some());
    server.stop().await;
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn test_compile_errors_abort_start() {
    let dir = tempfile::tempdir().unwrap();
    let bundler = MockBundler {
        errors: vec!["ERROR in ./app/entry.js".to_string()],
        ..MockBundler::new()
    };
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .bundler(Arc::new(bundler))
        .build()
        .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let result = server.start_on(listener).await;
    assert!(matches!(
        result,
        Err(ServerError::Bundle(BundleError::Compile { .. }))
    ));
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn test_manual_bundle_switches_to_production() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.dev = true;
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .bundler(Arc::new(MockBundler::new()))
        .build()
        .unwrap();

    server.bundle().await.unwrap();
    assert!(!server.config().dev);
    assert!(server.bundling_state().completed_once());
    assert!(dir.path().join("public/css/app.css").exists());
}

#[tokio::test]
async fn test_start_without_bundle_serves_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .bundler(Arc::new(MockBundler::new()))
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    server.start_without_bundle_on(listener).await.unwrap();
    assert!(server.bundling_state().completed_once());
    assert!(!server.bundling_state().is_bundling());
    server.stop().await;
}

#[tokio::test]
async fn test_dev_start_broadcasts_bundle_stats() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.dev = true;
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .bundler(Arc::new(MockBundler::new()))
        .build()
        .unwrap();
    let mut events = server.realtime().subscribe();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    server.start_on(listener).await.unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event.event, "bundle.stats");
    assert_eq!(event.data["errors"], json!([]));
    assert!(server.bundling_state().completed_once());
    server.stop().await;
}

#[tokio::test]
async fn test_dev_bundle_is_held_until_first_watch_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.dev = true;
    let (bundler, release) = MockBundler::gated(30);
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .bundler(Arc::new(bundler))
        .build()
        .unwrap();
    let router = server.prepare().await.unwrap();
    let bundle_path = server.bundle_path();
    let bundle_file = server.bundle_path_absolute();
    std::fs::create_dir_all(bundle_file.parent().unwrap()).unwrap();
    std::fs::write(&bundle_file, "console.log('stale');").unwrap();
    let bundling = server.bundling_state().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let while_watching = async {
        while !bundling.is_blocking() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let response = get(&router, &bundle_path).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
        release.notify_one();
    };
    let (started, ()) = tokio::join!(server.start_on(listener), while_watching);
    started.unwrap();

    let response = get(&router, &bundle_path).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("stale"));
    server.stop().await;
}

#[tokio::test]
async fn test_bundle_after_start_gates_the_first_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.bundle_after_server_start = true;
    let (bundler, release) = MockBundler::gated(10);
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .bundler(Arc::new(bundler))
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Connected before the server starts; answered as soon as it serves.
    let first_request = async {
        let response = get_over_tcp(addr, "/").await;
        release.notify_one();
        response
    };
    let (started, response) = tokio::join!(server.start_on(listener), first_request);
    started.unwrap();

    assert!(response.starts_with("HTTP/1.1 503"), "{response}");
    assert!(server.bundling_state().completed_once());
    let response = get_over_tcp(addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    server.stop().await;
}

#[tokio::test]
async fn test_progress_hook_receives_bundler_progress() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .bundler(Arc::new(MockBundler {
            progress: 65,
            ..MockBundler::new()
        }))
        .on_bundle_progress(Arc::new(move |percentage| sink.lock().unwrap().push(percentage)))
        .build()
        .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    server.start_on(listener).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![65]);
    server.stop().await;
}
