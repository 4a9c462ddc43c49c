//! Route path specs.
//!
//! A spec is a path pattern made of literal segments, `:name` parameters and
//! an optional trailing splat (`*` or `*name`). The same spec matches routes
//! and scopes before-execution hooks. Captured values are percent-decoded.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::backend::error::RegistryError;

/// Spec matching every request path.
pub const WILDCARD_SPEC: &str = "*";

const DEFAULT_SPLAT_NAME: &str = "wildcard";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Splat(String),
}

/// Parsed route path spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    raw: String,
    segments: Vec<Segment>,
}

impl PathSpec {
    pub fn parse(spec: &str) -> Result<Self, RegistryError> {
        if spec == WILDCARD_SPEC {
            return Ok(Self {
                raw: spec.to_string(),
                segments: vec![Segment::Splat(DEFAULT_SPLAT_NAME.to_string())],
            });
        }
        if !spec.starts_with('/') {
            return Err(RegistryError::InvalidArgument(format!(
                "route spec '{spec}' must start with '/'"
            )));
        }

        let parts: Vec<&str> = split_path(spec).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RegistryError::InvalidArgument(format!(
                        "route spec '{spec}' has an unnamed parameter"
                    )));
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if index + 1 != parts.len() {
                    return Err(RegistryError::InvalidArgument(format!(
                        "splat must be the last segment of route spec '{spec}'"
                    )));
                }
                let name = if name.is_empty() { DEFAULT_SPLAT_NAME } else { name };
                Segment::Splat(name.to_string())
            } else {
                Segment::Literal((*part).to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: spec.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw == WILDCARD_SPEC
    }

    /// Matches a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut params = HashMap::new();
        let mut index = 0;

        for segment in &self.segments {
            match segment {
                Segment::Splat(name) => {
                    let rest = parts[index.min(parts.len())..].join("/");
                    params.insert(name.clone(), decode(&rest).into_owned());
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index)?;
                    params.insert(name.clone(), decode(value).into_owned());
                }
            }
            index += 1;
        }

        (index == parts.len()).then_some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

/// Percent-decoded `value`, or `value` itself when it doesn't decode to UTF-8.
fn decode(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}
