/**
 * Cookie Middleware
 *
 * `cookies_middleware` parses the `Cookie` header once per request into
 * [`RequestCookies`]. `cookie_policy_middleware` rewrites every `Set-Cookie`
 * header of the response so that it follows the configured policy:
 * `HttpOnly` always, `Secure`, `Domain` and `SameSite` when configured, and
 * `Path=/` when the cookie sets no path.
 */
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::backend::logging::log_warn;
use crate::shared::config::CookieOptions;

/// Cookies sent with the request
#[derive(Debug, Clone, Default)]
pub struct RequestCookies(HashMap<String, String>);

impl RequestCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parses `Cookie` header values. The first occurrence of a name wins.
pub fn parse_cookies<'a>(values: impl IntoIterator<Item = &'a str>) -> RequestCookies {
    let mut cookies = HashMap::new();
    for value in values {
        for pair in value.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    RequestCookies(cookies)
}

pub async fn cookies_middleware(mut request: Request, next: Next) -> Response {
    let cookies = parse_cookies(
        request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    );
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

/// `Set-Cookie` value with only name, value and path. The policy stage adds
/// the remaining attributes.
pub fn set_cookie_value(name: &str, value: &str, max_age_secs: Option<u64>) -> String {
    match max_age_secs {
        Some(max_age) => format!("{name}={value}; Path=/; Max-Age={max_age}"),
        None => format!("{name}={value}; Path=/"),
    }
}

/// Cookie attributes applied to every `Set-Cookie` header
#[derive(Debug, Clone, Default)]
pub struct CookiePolicy {
    pub secure: bool,
    pub domain: Option<String>,
    pub same_site: Option<String>,
}

impl From<&CookieOptions> for CookiePolicy {
    fn from(options: &CookieOptions) -> Self {
        Self {
            secure: options.secure.unwrap_or(false),
            domain: options.domain.clone(),
            same_site: options.same_site.clone(),
        }
    }
}

impl CookiePolicy {
    /// Adds the policy attributes missing from `cookie`.
    pub fn apply(&self, cookie: &str) -> String {
        let attributes: Vec<String> = cookie
            .split(';')
            .skip(1)
            .map(|a| a.trim().to_ascii_lowercase())
            .collect();
        let has = |name: &str| {
            attributes
                .iter()
                .any(|a| a == name || a.starts_with(&format!("{name}=")))
        };

        let mut result = cookie.trim_end_matches(';').to_string();
        if !has("path") {
            result.push_str("; Path=/");
        }
        if !has("httponly") {
            result.push_str("; HttpOnly");
        }
        if self.secure && !has("secure") {
            result.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            if !has("domain") {
                result.push_str(&format!("; Domain={domain}"));
            }
        }
        if let Some(same_site) = &self.same_site {
            if !has("samesite") {
                result.push_str(&format!("; SameSite={}", capitalize(same_site)));
            }
        }
        result
    }
}

fn capitalize(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub async fn cookie_policy_middleware(
    State(policy): State<Arc<CookiePolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| policy.apply(value))
        .collect();
    if cookies.is_empty() {
        return response;
    }

    let headers = response.headers_mut();
    headers.remove(header::SET_COOKIE);
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => log_warn!("[Cookies] Dropping invalid cookie: {}", e),
        }
    }
    response
}
