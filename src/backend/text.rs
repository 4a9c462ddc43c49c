//! Locale dictionaries.
//!
//! Dictionaries are the JSON files of the `res` directory (`text.json` for
//! the default locale, `text_<locale>.json` otherwise), flat maps of text
//! keys to strings. Lookups fall back to the default dictionary, then to the
//! key itself. Placeholders `$0`, `$1`, ... are replaced by the arguments.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::backend::logging::log_warn;
use crate::shared::AppConfig;

#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    default_locale: String,
    dictionaries: HashMap<String, Map<String, Value>>,
}

impl Dictionaries {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            dictionaries: HashMap::new(),
        }
    }

    /// Loads the dictionaries of the default and all accepted locales. Unreadable files are
    /// skipped with a warning.
    pub fn load(config: &AppConfig) -> Self {
        let mut dictionaries = Self::new(config.locale.default.clone());
        let res_dir = config.res_dir();
        for locale in config.locales() {
            let path = res_dir.join(config.locale_file_name(&locale));
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(dictionary) => dictionaries.add_dictionary(locale, dictionary),
                Err(e) => log_warn!("Cannot load dictionary {}: {}", path.display(), e),
            }
        }
        dictionaries
    }

    pub fn add_dictionary(&mut self, locale: impl Into<String>, dictionary: Value) {
        let locale = locale.into();
        match dictionary {
            Value::Object(map) => {
                self.dictionaries.entry(locale).or_default().extend(map);
            }
            _ => log_warn!("Dictionary of {} is not an object. Skipping.", locale),
        }
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.dictionaries.contains_key(locale)
    }

    /// Text of `key` in `locale` with the placeholders replaced by `args`.
    pub fn get(&self, locale: &str, key: &str, args: &[&str]) -> String {
        let text = self
            .lookup(locale, key)
            .or_else(|| self.lookup(&self.default_locale, key))
            .unwrap_or(key);
        substitute(text, args)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        self.dictionaries
            .get(locale)
            .and_then(|dictionary| dictionary.get(key))
            .and_then(Value::as_str)
    }
}

fn substitute(text: &str, args: &[&str]) -> String {
    let mut result = text.to_string();
    // Highest index first, so `$1` never eats the prefix of `$10`.
    for (index, arg) in args.iter().enumerate().rev() {
        result = result.replace(&format!("${index}"), arg);
    }
    result
}
