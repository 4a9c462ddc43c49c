/**
 * Locale Middleware
 *
 * Resolves the locale of the request, in order:
 *
 * 1. the `locale` cookie, when it names an accepted locale
 * 2. the `Accept-Language` header, matched exactly or by language subtag
 * 3. the default locale
 *
 * The resolved locale is stored as a [`Locale`] extension. When the cookie
 * is missing or names a locale that is not accepted, it is (re)set.
 */
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::backend::middleware::cookies::{set_cookie_value, RequestCookies};
use crate::backend::server::state::AppState;
use crate::shared::config::LocaleConfig;

pub const LOCALE_COOKIE_NAME: &str = "locale";

/// Locale of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns the locale of the request and whether the cookie already holds it.
pub fn resolve_locale(
    config: &LocaleConfig,
    cookie: Option<&str>,
    accept_language: Option<&str>,
) -> (String, bool) {
    if let Some(cookie) = cookie {
        if config.accepted.iter().any(|l| l == cookie) {
            return (cookie.to_string(), true);
        }
    }
    let locale = accept_language
        .and_then(|header| match_accept_language(&config.accepted, header))
        .unwrap_or_else(|| config.default.clone());
    (locale, false)
}

fn match_accept_language(accepted: &[String], header: &str) -> Option<String> {
    let mut candidates: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let quality = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((tag, quality))
        })
        .collect();
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (tag, _) in &candidates {
        if let Some(exact) = accepted.iter().find(|l| l.eq_ignore_ascii_case(tag)) {
            return Some(exact.clone());
        }
        let language = primary_subtag(tag);
        if let Some(partial) = accepted
            .iter()
            .find(|l| primary_subtag(l).eq_ignore_ascii_case(language))
        {
            return Some(partial.clone());
        }
    }
    None
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

pub async fn locale_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie = request
        .extensions()
        .get::<RequestCookies>()
        .and_then(|cookies| cookies.get(LOCALE_COOKIE_NAME))
        .map(str::to_string);
    let accept_language = request
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let (locale, cookie_current) =
        resolve_locale(&state.config.locale, cookie.as_deref(), accept_language);

    request.extensions_mut().insert(Locale(locale.clone()));
    let mut response = next.run(request).await;
    if !cookie_current {
        if let Ok(value) = HeaderValue::from_str(&set_cookie_value(LOCALE_COOKIE_NAME, &locale, None)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
