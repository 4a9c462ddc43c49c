//! Deserializers for numeric and boolean config fields.
//!
//! Env-substituted values arrive as strings, so these fields accept both the
//! native JSON value and its string form (`8080` or `"8080"`).

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer, Error};

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum StringOr<T> {
    String(String),
    Value(T),
}

impl<T> StringOr<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn into_value<E: Error>(self) -> Result<T, E> {
        match self {
            Self::String(raw) => raw
                .trim()
                .parse()
                .map_err(|e| E::custom(format!("invalid value '{raw}': {e}"))),
            Self::Value(value) => Ok(value),
        }
    }
}

/// Deserializes `T` from its JSON value or its string form.
pub fn string_or<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    StringOr::<T>::deserialize(deserializer)?.into_value()
}

/// Like [`string_or`], for optional fields.
pub fn option_string_or<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    Option::<StringOr<T>>::deserialize(deserializer)?
        .map(StringOr::into_value)
        .transpose()
}
