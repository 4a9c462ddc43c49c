//! Artifact generation integration tests

use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use pagewright::backend::artifacts::ArtifactGenerator;
use pagewright::backend::registry::{
    socket_listener, Registry, Route, SocketClass, SocketListener,
};
use pagewright::backend::server::Server;
use pretty_assertions::assert_eq;

use crate::common::*;

fn read(dir: &std::path::Path, file: &str) -> String {
    std::fs::read_to_string(dir.join("app/generated").join(file)).unwrap()
}

#[tokio::test]
async fn test_prepare_writes_bootstrap_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home").title("Home"))
        .add_component("components/nav", "nav", true)
        .add_socket_event("user.get", socket_listener(|_, data| async move { Ok(data) }))
        .inject_to_entry("window.injected = true;");
    server.prepare().await.unwrap();

    let nonce = read(dir.path(), "nonce.js");
    assert!(nonce.contains(server.nonce()));
    let router_map = read(dir.path(), "router.map.js");
    assert!(router_map.contains("'/'"));
    assert!(router_map.contains("pages/home"));
    assert!(read(dir.path(), "component.map.js").contains("'nav'"));
    assert!(read(dir.path(), "socket.map.js").contains("'user.get'"));
    let entry = read(dir.path(), "entry.js");
    assert!(entry.contains("window.injected = true;"));
    assert!(entry.find("nonce").unwrap() < entry.find("window.injected").unwrap());
    for file in ["postcss.config.js", "tsconfig.json"] {
        assert!(dir.path().join("app/generated").join(file).exists(), "{file}");
    }
    assert!(dir.path().join("app/res/text.json").exists());
    assert!(dir.path().join("app/pages/home.tsx").exists());
}

/// Chat room keeping its own message log.
struct ChatRoom {
    messages: Mutex<Vec<String>>,
}

impl SocketClass for ChatRoom {
    fn name(&self) -> &str {
        "chat"
    }

    fn events(self: Arc<Self>) -> Vec<(String, SocketListener)> {
        let room = self;
        vec![(
            "chat.send".to_string(),
            socket_listener(move |_, data| {
                room.messages.lock().unwrap().push(data.to_string());
                async move { Ok(data) }
            }),
        )]
    }
}

#[tokio::test]
async fn test_socket_class_events_reach_the_socket_map() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let mut registry = Registry::new();
    registry.add_socket_class(Arc::new(ChatRoom {
        messages: Mutex::new(Vec::new()),
    }));

    let artifacts = ArtifactGenerator::new(&config, &registry, "nonce")
        .generate()
        .await
        .unwrap();
    assert!(artifacts.files["socket.map.js"].contains("'chat.send'"));
    assert_eq!(registry.socket_classes().len(), 1);
}

#[tokio::test]
async fn test_maps_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let mut registry = Registry::new();
    registry
        .add_route(Route::get("/").component("pages/home"))
        .add_route(Route::get("/about").component("pages/about"))
        .add_component("components/nav", "nav", false);

    let first = ArtifactGenerator::new(&config, &registry, "nonce")
        .generate()
        .await
        .unwrap();
    let second = ArtifactGenerator::new(&config, &registry, "nonce")
        .generate()
        .await
        .unwrap();

    for file in ["router.map.js", "component.map.js"] {
        assert_eq!(first.files[file], second.files[file]);
        assert_eq!(read(dir.path(), file), second.files[file]);
    }
}

#[tokio::test]
async fn test_missing_component_is_not_served() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.create_missing_components = false;
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .build()
        .unwrap();
    std::fs::create_dir_all(dir.path().join("app/pages")).unwrap();
    std::fs::write(dir.path().join("app/pages/home.jsx"), "").unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"))
        .add_route(Route::get("/missing").component("pages/missing"));
    let router = server.prepare().await.unwrap();

    assert_eq!(get(&router, "/").await.status(), StatusCode::OK);
    assert_eq!(get(&router, "/missing").await.status(), StatusCode::NOT_FOUND);
    assert!(!read(dir.path(), "router.map.js").contains("pages/missing"));
}

#[tokio::test]
async fn test_locale_text_from_dictionaries() {
    let dir = tempfile::tempdir().unwrap();
    let res = dir.path().join("app/res");
    std::fs::create_dir_all(&res).unwrap();
    std::fs::write(res.join("text.json"), r#"{"hello": "Hello $0", "bye": "Bye"}"#).unwrap();
    std::fs::write(res.join("text_cs-CZ.json"), r#"{"hello": "Ahoj $0"}"#).unwrap();
    let mut config = test_config(dir.path());
    config.locale.accepted = vec!["cs-CZ".to_string()];
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .build()
        .unwrap();
    server.prepare().await.unwrap();

    assert_eq!(server.locale_text("cs-CZ", "hello", &["Jano"]), "Ahoj Jano");
    assert_eq!(server.locale_text("cs-CZ", "bye", &[]), "Bye");
    assert_eq!(server.locale_text("en-US", "hello", &["Ann"]), "Hello Ann");
    assert_eq!(server.locale_text("en-US", "unknown", &[]), "unknown");
}
