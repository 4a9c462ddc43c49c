//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Temporary app directories and configs
//! - A JSON layout exposing the render payload
//! - A scripted bundler engine
//! - Request and cookie helpers, in-process and over TCP

pub mod bundler;
pub mod http;

pub use bundler::*;
pub use http::*;

use std::path::Path;
use std::sync::Arc;

use pagewright::backend::error::HttpError;
use pagewright::backend::middleware::render::{Layout, PageContext, RenderPayload};
use pagewright::shared::config::CookieOptions;
use pagewright::shared::AppConfig;

/// Secret signing session cookies in tests.
pub const TEST_SECRET: &str = "test-secret";

/// Renders the payload as JSON, so tests can inspect the page data.
pub struct JsonLayout;

impl Layout for JsonLayout {
    fn name(&self) -> &str {
        "json"
    }

    fn render(&self, _page: &PageContext, payload: &RenderPayload) -> Result<String, HttpError> {
        Ok(serde_json::to_string(payload)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

pub fn json_layout() -> Arc<dyn Layout> {
    Arc::new(JsonLayout)
}

/// Config rooted in `dir`, rendering with [`JsonLayout`].
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        app_dir: dir.join("app"),
        static_dir: dir.join("public"),
        source_styles_dir: Some(dir.join("styles")),
        layout: "json".to_string(),
        logging: false,
        create_missing_components: true,
        cookies: CookieOptions {
            secret: Some(TEST_SECRET.to_string()),
            ..CookieOptions::default()
        },
        ..AppConfig::default()
    }
}
