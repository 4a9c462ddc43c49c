//! Plugin registration integration tests

use std::sync::Arc;

use axum::http::StatusCode;
use pagewright::backend::error::RegistryError;
use pagewright::backend::registry::{Plugin, Registry, Route};
use pagewright::backend::server::Server;
use pretty_assertions::assert_eq;

use crate::common::*;

struct Greeter;

impl Plugin for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn version(&self) -> &str {
        "1.2.0"
    }

    fn entry_injections(&self) -> Vec<String> {
        vec!["window.greeter = true;".to_string()]
    }

    fn register(&self, registry: &mut Registry) -> Result<(), RegistryError> {
        registry.add_route(Route::get("/hello").component("pages/hello").title("Hello"));
        Ok(())
    }
}

struct Broken;

impl Plugin for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn entry_injections(&self) -> Vec<String> {
        vec!["window.broken = true;".to_string()]
    }

    fn register(&self, _registry: &mut Registry) -> Result<(), RegistryError> {
        Err(RegistryError::InvalidArgument("missing api key".to_string()))
    }
}

#[tokio::test]
async fn test_failing_plugin_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_plugin(Arc::new(Broken))
        .add_plugin(Arc::new(Greeter));
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/hello").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Hello");

    let entry = std::fs::read_to_string(dir.path().join("app/generated/entry.js")).unwrap();
    assert!(entry.contains("window.greeter = true;"));
    assert!(!entry.contains("window.broken"));
}

#[tokio::test]
async fn test_plugin_lookup_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .build()
        .unwrap();
    server.registry_mut().add_plugin(Arc::new(Greeter));

    let plugin = server.plugin_by_name("greeter").unwrap();
    assert_eq!(plugin.version(), "1.2.0");
    assert!(server.plugin_by_name("analytics").is_none());
}
