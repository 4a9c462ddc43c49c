//! Request pipeline integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::IntoResponse,
};
use pagewright::backend::auth::{MemorySessionStore, Session, SessionStore};
use pagewright::backend::error::{HttpError, ServerError};
use pagewright::backend::middleware::middleware_fn;
use pagewright::backend::middleware::render::{Layout, PageContext, RenderPayload};
use pagewright::backend::registry::{
    auth_hook, before_hook, legacy_route_callback, route_callback, title_hook, Route,
    RouteOutcome,
};
use pagewright::backend::server::Server;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::*;

fn server(dir: &std::path::Path) -> Server {
    Server::builder()
        .config(test_config(dir))
        .layout(json_layout())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_ping_answers_pong() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/ping").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "pong");
}

#[tokio::test]
async fn test_home_renders_page_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home").title("Home"));
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "session_id").is_some());
    let payload = body_json(response).await;
    assert_eq!(payload["title"], "Home");
    assert_eq!(payload["data"]["user"], json!(null));
    assert_eq!(payload["data"]["dev"], json!(false));
    assert_eq!(payload["data"]["locale"], "en-US");
    assert_eq!(payload["data"]["envVars"], json!({}));
    assert!(payload["data"]["timestamp"].is_u64());
}

#[tokio::test]
async fn test_secure_route_requires_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .session_store("memory", store.clone())
        .auth(auth_hook(|session| async move {
            if let Some(id) = session.get("userId") {
                session.set_user(json!({ "id": id }));
            }
            Ok(())
        }))
        .build()
        .unwrap();
    server.registry_mut().add_route(
        Route::get("/secure")
            .component("pages/secure")
            .title("Secure")
            .require_auth(true),
    );
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/secure").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let known = Session::new("known-session");
    known.set("userId", json!(7));
    store.save(&known).await;
    let cookie = session_cookie("known-session", TEST_SECRET);
    let response = get_with_cookie(&router, "/secure", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "session_id").is_none());
    let payload = body_json(response).await;
    assert_eq!(payload["data"]["user"], json!({ "id": 7 }));
}

#[tokio::test]
async fn test_untouched_sessions_are_not_stored() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .session_store("memory", store.clone())
        .build()
        .unwrap();
    server.registry_mut().add_route(
        Route::get("/visit").callback(route_callback(|request| async move {
            request.session.set("visited", json!(true));
            Ok(RouteOutcome::respond("ok"))
        })),
    );
    let router = server.prepare().await.unwrap();

    for _ in 0..50 {
        assert_eq!(get(&router, "/ping").await.status(), StatusCode::OK);
        assert_eq!(get(&router, "/nope").await.status(), StatusCode::NOT_FOUND);
    }
    assert!(store.is_empty());

    let response = get(&router, "/visit").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_forged_session_cookie_gets_fresh_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"));
    let router = server.prepare().await.unwrap();

    let cookie = session_cookie("known-session", "other-secret");
    let response = get_with_cookie(&router, "/", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "session_id").is_some());
}

#[tokio::test]
async fn test_callback_only_route_answers() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_route(Route::get("/x"))
        .add_route_callback(
            Method::GET,
            "/x",
            route_callback(|_| async { Ok(RouteOutcome::respond("X")) }),
        );
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/x").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "X");
}

#[tokio::test]
async fn test_callback_map_skips_component_routes() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home").title("Home"))
        .add_route_callback(
            Method::GET,
            "/",
            route_callback(|_| async { Ok(RouteOutcome::respond("FROM-MAP")) }),
        );
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["title"], "Home");
}

#[tokio::test]
async fn test_render_outcome_overrides_title() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server.registry_mut().add_route(
        Route::get("/promise")
            .title("Original")
            .callback(route_callback(|_| async {
                Ok(RouteOutcome::render(json!({ "title": "T", "data": { "extra": 1 } })))
            })),
    );
    let router = server.prepare().await.unwrap();

    let payload = body_json(get(&router, "/promise").await).await;
    assert_eq!(payload["title"], "T");
    assert_eq!(payload["data"]["extra"], 1);
    assert_eq!(payload["data"]["user"], json!(null));
}

#[tokio::test]
async fn test_legacy_callback_completes_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server.registry_mut().add_route(Route::get("/legacy").callback(
        legacy_route_callback(|request, completion| {
            let name = request.query.get("name").cloned().unwrap_or_default();
            tokio::spawn(async move {
                completion.render(json!({ "title": name }));
            });
        }),
    ));
    let router = server.prepare().await.unwrap();

    let payload = body_json(get(&router, "/legacy?name=Legacy").await).await;
    assert_eq!(payload["title"], "Legacy");
}

#[tokio::test]
async fn test_route_params_and_title_hook() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::builder()
        .config(test_config(dir.path()))
        .layout(json_layout())
        .title(title_hook(|request| async move {
            Ok(request.param("id").map(|id| format!("User {id}")))
        }))
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/users/:id").component("pages/user").title("User"))
        .add_route(Route::get("/users/:name/posts").component("pages/posts").title("Posts"));
    let router = server.prepare().await.unwrap();

    let payload = body_json(get(&router, "/users/42").await).await;
    assert_eq!(payload["title"], "User 42");
    let payload = body_json(get(&router, "/users/ann%20lee").await).await;
    assert_eq!(payload["title"], "User ann lee");
    let payload = body_json(get(&router, "/users/ann/posts").await).await;
    assert_eq!(payload["title"], "Posts");
}

#[tokio::test]
async fn test_unmatched_runs_post_route_middlewares_then_404() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server.registry_mut().add_middleware(
        middleware_fn(|request, next| async move {
            if request.uri().path() == "/old" {
                return StatusCode::GONE.into_response();
            }
            next.run(request).await
        }),
        true,
    );
    let router = server.prepare().await.unwrap();

    assert_eq!(get(&router, "/old").await.status(), StatusCode::GONE);
    assert_eq!(get(&router, "/nothing").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pre_route_middlewares_run_in_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_middleware(
            middleware_fn(|mut request, next| async move {
                request
                    .headers_mut()
                    .insert("x-order", header::HeaderValue::from_static("first"));
                next.run(request).await
            }),
            false,
        )
        .add_middleware(
            middleware_fn(|request, next| async move {
                let order = request
                    .headers()
                    .get("x-order")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let mut response = next.run(request).await;
                response
                    .headers_mut()
                    .insert("x-seen", header::HeaderValue::from_str(&order).unwrap());
                response
            }),
            false,
        )
        .add_route(Route::get("/").component("pages/home"));
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/").await;
    assert_eq!(response.headers()["x-seen"], "first");
}

#[tokio::test]
async fn test_before_hooks_abort_on_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server
        .registry_mut()
        .add_before_hook(
            "/admin",
            before_hook(|_| async { Err(HttpError::new(StatusCode::FORBIDDEN, "Admins only")) }),
        )
        .add_route(Route::get("/admin").component("pages/admin"))
        .add_route(Route::get("/").component("pages/home"));
    let router = server.prepare().await.unwrap();

    assert_eq!(get(&router, "/admin").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(get(&router, "/").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_errors_render_json_for_api_clients() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server.registry_mut().add_route(Route::get("/api/item").callback(route_callback(
        |_| async { Err(HttpError::not_found("Item not found")) },
    )));
    let router = server.prepare().await.unwrap();

    let request = Request::get("/api/item")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "error": "Item not found", "status": 404 }));

    let response = get(&router, "/api/item").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = body_json(response).await;
    assert_eq!(payload["title"], "Item not found");
    assert_eq!(payload["data"]["error"]["status"], 404);
}

/// Plain text layout for error pages.
struct ErrorTextLayout;

impl Layout for ErrorTextLayout {
    fn name(&self) -> &str {
        "errors"
    }

    fn render(&self, _page: &PageContext, payload: &RenderPayload) -> Result<String, HttpError> {
        Ok(format!("failed: {}", payload.title))
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }
}

#[tokio::test]
async fn test_error_layout_renders_error_pages() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.error.layout = Some("errors".to_string());
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .layout(Arc::new(ErrorTextLayout))
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home").title("Home"))
        .add_route(Route::get("/api/item").callback(route_callback(|_| async {
            Err(HttpError::not_found("Item not found"))
        })));
    let router = server.prepare().await.unwrap();

    let response = get(&router, "/api/item").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(body_text(response).await, "failed: Item not found");

    let payload = body_json(get(&router, "/").await).await;
    assert_eq!(payload["title"], "Home");
}

#[tokio::test]
async fn test_unknown_error_layout_fails_preparation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.error.layout = Some("missing".to_string());
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .build()
        .unwrap();

    let result = server.prepare().await;
    assert!(matches!(result, Err(ServerError::Configuration(_))));
}

#[tokio::test]
async fn test_locale_from_accept_language() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.locale.accepted = vec!["cs-CZ".to_string()];
    let mut server = Server::builder()
        .config(config)
        .layout(json_layout())
        .build()
        .unwrap();
    server
        .registry_mut()
        .add_route(Route::get("/").component("pages/home"));
    let router = server.prepare().await.unwrap();

    let request = Request::get("/")
        .header(header::ACCEPT_LANGUAGE, "cs;q=0.9, de;q=0.8")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(set_cookie(&response, "locale").as_deref(), Some("locale=cs-CZ"));
    let payload = body_json(response).await;
    assert_eq!(payload["data"]["locale"], "cs-CZ");

    let response = get_with_cookie(&router, "/", "locale=cs-CZ").await;
    assert!(set_cookie(&response, "locale").is_none());
}

#[tokio::test]
async fn test_post_body_reaches_callback() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = server(dir.path());
    server.registry_mut().add_route(Route::post("/echo").callback(route_callback(
        |request| async move {
            let body = request.json()?;
            Ok(RouteOutcome::respond(axum::Json(body)))
        },
    )));
    let router = server.prepare().await.unwrap();

    let request = Request::post("/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"hello":"world"}"#))
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "hello": "world" }));
}
