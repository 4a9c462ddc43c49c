/**
 * Layout Rendering
 *
 * A `Layout` turns the page payload into the document that boots the client
 * bundle. The render-helper stage puts a [`Renderer`] into the request
 * extensions; route execution and the error boundary render through it.
 *
 * # Payload
 *
 * ```json
 * {
 *   "title": "Home",
 *   "data": {"user": null, "dev": false, "timestamp": 0, "version": "1.0.0",
 *            "locale": "en-US", "envVars": {}}
 * }
 * ```
 */
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::error::HttpError;
use crate::shared::config::deep_merge;

/// Page payload rendered by a layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPayload {
    pub title: String,
    pub data: Value,
}

impl RenderPayload {
    pub fn new(title: impl Into<String>, data: Value) -> Self {
        Self {
            title: title.into(),
            data,
        }
    }

    /// Deep-merges `extra` (`{title?, data?}`) into the payload.
    pub fn merge(&mut self, extra: Value) -> Result<(), HttpError> {
        if extra.is_null() {
            return Ok(());
        }
        let mut merged = serde_json::to_value(&*self)?;
        deep_merge(&mut merged, extra);
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    pub fn locale(&self) -> Option<&str> {
        self.data.get("locale").and_then(Value::as_str)
    }
}

/// Static page data shared by every render
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// URL of the client bundle.
    pub bundle_path: String,
    /// URL of the aggregated stylesheet.
    pub styles_path: String,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    /// Nonce allowing inline scripts.
    pub nonce: String,
    /// Element ids of components rendered automatically.
    pub auto_components: Vec<String>,
}

/// Outer page shell
pub trait Layout: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, page: &PageContext, payload: &RenderPayload) -> Result<String, HttpError>;

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }
}

/// HTML shell loading the client bundle
#[derive(Debug, Clone, Default)]
pub struct DefaultLayout;

impl Layout for DefaultLayout {
    fn name(&self) -> &str {
        "default"
    }

    fn render(&self, page: &PageContext, payload: &RenderPayload) -> Result<String, HttpError> {
        let initial_data = serde_json::to_string(&payload.data)?;
        let mut html = String::with_capacity(1024);
        html.push_str("<!DOCTYPE html>\n");
        html.push_str(&format!(
            "<html lang=\"{}\">\n<head>\n",
            escape_html(payload.locale().unwrap_or("en"))
        ));
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&payload.title)));
        html.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(&page.styles_path)
        ));
        for style in &page.styles {
            html.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_html(style)));
        }
        html.push_str("</head>\n<body>\n");
        html.push_str("<div id=\"container\"></div>\n");
        for element_id in &page.auto_components {
            html.push_str(&format!("<div id=\"{}\"></div>\n", escape_html(element_id)));
        }
        html.push_str(&format!(
            "<script nonce=\"{}\">window.__initialData = {};</script>\n",
            page.nonce,
            escape_script(&initial_data)
        ));
        for script in &page.scripts {
            html.push_str(&format!(
                "<script nonce=\"{}\" src=\"{}\"></script>\n",
                page.nonce,
                escape_html(script)
            ));
        }
        html.push_str(&format!(
            "<script nonce=\"{}\" src=\"{}\"></script>\n",
            page.nonce,
            escape_html(&page.bundle_path)
        ));
        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Keeps serialized JSON from closing the surrounding script element.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Layout renderer injected into every request
#[derive(Clone)]
pub struct Renderer {
    page: Arc<PageContext>,
    default_layout: Arc<dyn Layout>,
}

impl Renderer {
    pub fn new(page: Arc<PageContext>, default_layout: Arc<dyn Layout>) -> Self {
        Self {
            page,
            default_layout,
        }
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn default_layout(&self) -> Arc<dyn Layout> {
        self.default_layout.clone()
    }

    /// Renders `payload` through `layout`, or the default layout.
    pub fn render(&self, layout: Option<&Arc<dyn Layout>>, payload: &RenderPayload) -> Response {
        let layout = layout.unwrap_or(&self.default_layout);
        match layout.render(&self.page, payload) {
            Ok(body) => {
                let mut response = body.into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(layout.content_type()),
                );
                response
            }
            Err(e) => e.into_response(),
        }
    }
}

pub async fn render_helper_middleware(
    State(renderer): State<Renderer>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(renderer);
    next.run(request).await
}
