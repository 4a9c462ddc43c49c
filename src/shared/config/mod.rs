//! Application configuration module
//!
//! Provides the configuration surface of the server. A configuration is
//! assembled from three layers, deep-merged in this order:
//!
//! 1. built-in defaults ([`AppConfig::default`])
//! 2. the declarative config file (`rsconfig.json` or `rsconfig.toml`), with
//!    `$env:NAME|default` strings substituted from the environment
//! 3. the overrides passed by the embedding program
//!
//! Keys use camelCase so existing declarative files keep working.

pub mod env;
pub mod merge;
pub mod scalar;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component as PathComponent, Path, PathBuf};
use thiserror::Error;

use scalar::{option_string_or, string_or};

pub use env::{substitute_env, CONFIG_ENV_PREFIX};
pub use merge::deep_merge;

/// Default location of the declarative config file.
pub const DEFAULT_CONFIG_FILE: &str = "./rsconfig.json";

/// Name of the directory (inside the app directory) holding generated sources.
pub const GENERATED_DIR: &str = "generated";

/// Name of the aggregated stylesheet written into the style directory.
pub const STYLES_FILENAME: &str = "app.css";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Port the HTTP listener binds to.
    #[serde(deserialize_with = "string_or")]
    pub port: u16,
    /// Directory served as static files.
    pub static_dir: PathBuf,
    /// Development mode (watch bundling, verbose logging).
    #[serde(deserialize_with = "string_or")]
    pub dev: bool,
    /// Bundle directory inside the static directory.
    pub js_dir: String,
    /// Style directory inside the static directory.
    pub css_dir: String,
    /// File name of the client bundle.
    pub filename: String,
    /// Directory of the front-end application sources.
    pub app_dir: PathBuf,
    /// Optional user entry file, relative to the app directory.
    pub entry_file: Option<String>,
    /// Name of the registered layout used for every page.
    pub layout: String,
    /// Name of the registered session store.
    pub session: String,
    /// Legacy secret used when `cookies.secret` is not set.
    pub cookie_secret: Option<String>,
    pub cookies: CookieOptions,
    /// Extra script URLs rendered by the layout.
    pub scripts: Vec<String>,
    /// Extra stylesheet URLs rendered by the layout.
    pub styles: Vec<String>,
    /// Stylesheets merged into the aggregated stylesheet.
    pub merge_styles: Vec<PathBuf>,
    pub socket: SocketOptions,
    /// Render the bundle path without the leading slash.
    #[serde(deserialize_with = "string_or")]
    pub bundle_path_relative: bool,
    /// Options of the style prefixer, written to the generated postcss config.
    pub autoprefixer: Value,
    /// Scaffold placeholder components for missing files.
    #[serde(deserialize_with = "string_or")]
    pub create_missing_components: bool,
    /// Extension of scaffolded component files.
    pub generated_components_extension: String,
    /// Import specifier of the client runtime module.
    pub client_module: String,
    /// Directory with the source stylesheets. Defaults to the style directory.
    pub source_styles_dir: Option<PathBuf>,
    /// Connect the client socket right after the application starts.
    #[serde(deserialize_with = "string_or")]
    pub connect_socket_automatically: bool,
    pub locale: LocaleConfig,
    /// Global logging switch.
    #[serde(deserialize_with = "string_or")]
    pub logging: bool,
    /// Open the HTTP listener before the first bundle completes.
    #[serde(deserialize_with = "string_or")]
    pub bundle_after_server_start: bool,
    /// Overrides deep-merged onto the generated tsconfig compiler options.
    pub ts_compiler_options: Value,
    /// Values exposed to every page as `data.envVars`.
    pub env_vars: Map<String, Value>,
    /// Application version exposed to pages. Defaults to the crate version.
    pub version: Option<String>,
    pub bundler: BundlerOptions,
    /// Maximum accepted request body size in bytes.
    #[serde(deserialize_with = "string_or")]
    pub body_limit: usize,
    /// Declarative routes.
    pub routes: Vec<RouteEntry>,
    /// Declarative components.
    pub components: Vec<ComponentEntry>,
    /// Declarative plugins, resolved through the registered plugin factories.
    pub plugins: Vec<PluginEntry>,
    /// Custom error page component.
    pub error_page: Option<String>,
    pub error: ErrorOptions,
    /// Component provider override.
    pub component_provider: Option<String>,
    /// Component error handler override.
    pub component_error_handler: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from("./public"),
            dev: false,
            js_dir: "js".to_string(),
            css_dir: "css".to_string(),
            filename: "bundle.js".to_string(),
            app_dir: PathBuf::from("./app"),
            entry_file: None,
            layout: "default".to_string(),
            session: "memory".to_string(),
            cookie_secret: None,
            cookies: CookieOptions::default(),
            scripts: Vec::new(),
            styles: Vec::new(),
            merge_styles: Vec::new(),
            socket: SocketOptions::default(),
            bundle_path_relative: false,
            autoprefixer: Value::Object(Map::new()),
            create_missing_components: false,
            generated_components_extension: "tsx".to_string(),
            client_module: "pagewright-client".to_string(),
            source_styles_dir: None,
            connect_socket_automatically: true,
            locale: LocaleConfig::default(),
            logging: true,
            bundle_after_server_start: false,
            ts_compiler_options: Value::Object(Map::new()),
            env_vars: Map::new(),
            version: None,
            bundler: BundlerOptions::default(),
            body_limit: 10 * 1024 * 1024,
            routes: Vec::new(),
            components: Vec::new(),
            plugins: Vec::new(),
            error_page: None,
            error: ErrorOptions::default(),
            component_provider: None,
            component_error_handler: None,
        }
    }
}

/// Cookie policy applied to every cookie the server sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieOptions {
    /// Secret used to sign the session cookie.
    pub secret: Option<String>,
    #[serde(deserialize_with = "option_string_or")]
    pub secure: Option<bool>,
    /// Deprecated. Cookies are always `HttpOnly`.
    #[serde(deserialize_with = "option_string_or")]
    pub http_only: Option<bool>,
    pub domain: Option<String>,
    pub same_site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocketOptions {
    /// Path of the realtime endpoint.
    pub path: String,
    /// Maximum size of an inbound socket message in bytes.
    #[serde(deserialize_with = "string_or")]
    pub message_max_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            path: "/socket".to_string(),
            message_max_size: 100 * (1 << 20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocaleConfig {
    pub default: String,
    pub accepted: Vec<String>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: "en-US".to_string(),
            accepted: Vec::new(),
        }
    }
}

/// Options of the external bundler process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundlerOptions {
    /// Program and arguments of a one-shot build.
    pub command: Vec<String>,
    /// Arguments appended to `command` in watch mode.
    pub watch_args: Vec<String>,
    /// Output line fragment announcing a finished (re)build.
    pub rebuild_marker: String,
    /// Aggregation window of watch rebuilds in milliseconds.
    #[serde(deserialize_with = "string_or")]
    pub aggregate_timeout_ms: u64,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_string(), "webpack".to_string()],
            watch_args: vec!["--watch".to_string()],
            rebuild_marker: "compiled".to_string(),
            aggregate_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorOptions {
    /// Custom error page component. Takes precedence over `errorPage`.
    pub page: Option<String>,
    /// Registered layout rendering error pages.
    pub layout: Option<String>,
}

/// Declarative route entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    #[serde(default = "default_method")]
    pub method: String,
    pub route: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "string_or")]
    pub require_auth: bool,
    #[serde(default)]
    pub layout: Option<String>,
    /// Key of a registered route callback.
    #[serde(default)]
    pub callback: Option<String>,
}

fn default_method() -> String {
    "get".to_string()
}

/// Declarative component entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub path: String,
    pub element_id: String,
    #[serde(default, deserialize_with = "string_or")]
    pub auto: bool,
}

/// Declarative plugin entry: `"name"` or `["name", options]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginEntry {
    Name(String),
    WithOptions(Vec<Value>),
}

impl PluginEntry {
    /// Splits the entry into the plugin name and its options.
    pub fn resolve(&self) -> Result<(String, Option<Value>), ConfigError> {
        match self {
            Self::Name(name) => Ok((name.clone(), None)),
            Self::WithOptions(parts) => {
                let mut parts = parts.iter();
                let name = match parts.next() {
                    Some(Value::String(name)) => name.clone(),
                    Some(other) => {
                        return Err(ConfigError::Invalid(format!(
                            "plugin name must be a string, got {other}"
                        )))
                    }
                    None => {
                        return Err(ConfigError::Invalid(
                            "plugin specified as array must contain at least the name".to_string(),
                        ))
                    }
                };
                Ok((name, parts.next().cloned()))
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Loads the configuration from the defaults, the declarative file and
    /// `overrides`.
    ///
    /// An explicit `file` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// used when present. Warnings produced by env substitution are returned
    /// next to the config so the caller can log them.
    pub fn load(file: Option<&Path>, overrides: Value) -> Result<(Self, Vec<String>), ConfigError> {
        let mut warnings = Vec::new();
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let file_value = match file {
            Some(path) => Some(read_config_file(path)?),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Some(read_config_file(default_path)?)
                } else {
                    None
                }
            }
        };
        if let Some(value) = file_value {
            deep_merge(&mut merged, substitute_env(value, &mut warnings));
        }
        deep_merge(&mut merged, overrides);

        let mut config: Self =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        warnings.extend(config.normalize());
        config.validate()?;
        Ok((config, warnings))
    }

    /// Fills derived defaults and returns warnings about the ones that should
    /// be set explicitly.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.cookies.secret.is_none() {
            match &self.cookie_secret {
                Some(secret) => self.cookies.secret = Some(secret.clone()),
                None => {
                    warnings.push(
                        "Using default cookie secret. It's a random string which changes every server start. It should be overridden in config."
                            .to_string(),
                    );
                    self.cookies.secret = Some(uuid::Uuid::new_v4().simple().to_string());
                }
            }
        }
        if self.cookies.http_only.is_some() {
            warnings.push(
                "Using httpOnly option of the cookies is deprecated. The option is always true."
                    .to_string(),
            );
        }
        if !self.locale.accepted.contains(&self.locale.default) {
            self.locale.accepted.insert(0, self.locale.default.clone());
        }
        if self.source_styles_dir.is_none() {
            warnings.push(
                "Using default sourceStylesDir. It's in the static directory and all sources are accessible over http."
                    .to_string(),
            );
            self.source_styles_dir = Some(self.styles_dir());
        }
        warnings
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.is_empty() {
            return Err(ConfigError::Invalid("filename cannot be empty".to_string()));
        }
        if self.locale.default.is_empty() {
            return Err(ConfigError::Invalid("default locale cannot be empty".to_string()));
        }
        if !self.socket.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "socket path '{}' must start with '/'",
                self.socket.path
            )));
        }
        if !self.ts_compiler_options.is_object() {
            return Err(ConfigError::Invalid("tsCompilerOptions must be an object".to_string()));
        }
        Ok(())
    }

    pub fn app_dir_absolute(&self) -> PathBuf {
        absolutize(&self.app_dir)
    }

    pub fn static_dir_absolute(&self) -> PathBuf {
        absolutize(&self.static_dir)
    }

    /// Directory receiving the generated bootstrap files.
    pub fn generated_dir(&self) -> PathBuf {
        self.app_dir_absolute().join(GENERATED_DIR)
    }

    /// Directory holding the locale dictionaries.
    pub fn res_dir(&self) -> PathBuf {
        self.app_dir_absolute().join("res")
    }

    /// Output directory of the aggregated stylesheet.
    pub fn styles_dir(&self) -> PathBuf {
        self.static_dir_absolute().join(&self.css_dir)
    }

    /// Directory the bundler writes the client bundle into.
    pub fn bundle_dir(&self) -> PathBuf {
        self.static_dir_absolute().join(&self.js_dir)
    }

    /// Bundle path in the website structure.
    pub fn bundle_path(&self) -> String {
        let prefix = if self.bundle_path_relative { "" } else { "/" };
        format!("{prefix}{}/{}", self.js_dir, self.filename)
    }

    pub fn bundle_path_absolute(&self) -> PathBuf {
        self.bundle_dir().join(&self.filename)
    }

    /// URL of the aggregated stylesheet.
    pub fn styles_path(&self) -> String {
        format!("/{}/{}", self.css_dir, STYLES_FILENAME)
    }

    /// Default locale followed by the other accepted locales.
    pub fn locales(&self) -> Vec<String> {
        let mut locales = vec![self.locale.default.clone()];
        for locale in &self.locale.accepted {
            if !locales.contains(locale) {
                locales.push(locale.clone());
            }
        }
        locales
    }

    pub fn is_locale_default(&self, locale: &str) -> bool {
        locale == self.locale.default
    }

    /// Dictionary file name of the locale.
    pub fn locale_file_name(&self, locale: &str) -> String {
        if self.is_locale_default(locale) {
            "text.json".to_string()
        } else {
            format!("text_{locale}.json")
        }
    }

    /// Version exposed to pages.
    pub fn app_version(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }
}

fn read_config_file(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::to_value(value).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Resolves `path` against the working directory and drops `.`/`..` components.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
