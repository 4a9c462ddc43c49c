//! Rendering of the generated bootstrap files.
//!
//! Everything here is a pure function of an [`ArtifactPlan`]; writing the
//! files is left to the generator.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::backend::error::ArtifactError;
use crate::shared::config::deep_merge;

pub const NONCE_FILE: &str = "nonce.js";
pub const ENTRY_FILE: &str = "entry.js";
pub const ROUTER_MAP_FILE: &str = "router.map.js";
pub const COMPONENT_MAP_FILE: &str = "component.map.js";
pub const SOCKET_MAP_FILE: &str = "socket.map.js";
pub const POSTCSS_CONFIG_FILE: &str = "postcss.config.js";
pub const TSCONFIG_FILE: &str = "tsconfig.json";

/// Route entry of the client routing map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    /// Import identifier, see [`content_key`].
    pub key: String,
    /// Import path relative to the generated directory.
    pub import_path: String,
    pub spec: String,
    pub title: String,
    /// Hash of the layout identifier.
    pub layout: Option<String>,
}

/// Component entry of the client component map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPlan {
    pub key: String,
    pub import_path: String,
    pub element_id: String,
}

/// Inputs of the entry file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPlan {
    /// Import specifier of the client runtime.
    pub client_module: String,
    /// Custom error page; the runtime's error page otherwise.
    pub error_page: Option<String>,
    /// User entry file imported for its side effects.
    pub entry_file: Option<String>,
    pub component_provider: Option<String>,
    pub component_error_handler: Option<String>,
    pub default_locale: String,
    pub accepted_locales: Vec<String>,
    /// Dictionary file of every accepted locale except the default one.
    pub locale_files: Vec<(String, String)>,
    pub connect_socket: bool,
    pub injections: Vec<String>,
}

/// Everything the generated files are rendered from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPlan {
    pub nonce: String,
    pub routes: Vec<RoutePlan>,
    pub components: Vec<ComponentPlan>,
    pub socket_events: Vec<String>,
    pub entry: EntryPlan,
    pub autoprefixer: Value,
    pub ts_compiler_options: Value,
}

/// Import identifier derived from `input`: `__<32 hex chars>__`.
pub fn content_key(input: &str) -> String {
    format!("__{}__", short_hash(input))
}

pub fn short_hash(input: &str) -> String {
    let digest = hex::encode(Sha256::digest(input.as_bytes()));
    digest[..32].to_string()
}

/// Single-quoted JavaScript string literal.
pub fn js_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

/// Renders all generated files, keyed by file name.
pub fn render(plan: &ArtifactPlan) -> Result<BTreeMap<String, String>, ArtifactError> {
    let mut files = BTreeMap::new();
    files.insert(NONCE_FILE.to_string(), render_nonce(&plan.nonce));
    files.insert(ROUTER_MAP_FILE.to_string(), render_router_map(&plan.routes));
    files.insert(
        COMPONENT_MAP_FILE.to_string(),
        render_component_map(&plan.components),
    );
    files.insert(
        SOCKET_MAP_FILE.to_string(),
        render_socket_map(&plan.socket_events),
    );
    files.insert(ENTRY_FILE.to_string(), render_entry(&plan.entry));
    files.insert(
        POSTCSS_CONFIG_FILE.to_string(),
        render_postcss_config(&plan.autoprefixer)?,
    );
    files.insert(
        TSCONFIG_FILE.to_string(),
        render_tsconfig(&plan.ts_compiler_options)?,
    );
    Ok(files)
}

pub fn render_nonce(nonce: &str) -> String {
    format!("__webpack_nonce__ = {}", js_string(nonce))
}

pub fn render_router_map(routes: &[RoutePlan]) -> String {
    let imports: Vec<String> = routes
        .iter()
        .map(|r| format!("import {} from {};", r.key, js_string(&r.import_path)))
        .collect();
    let entries: Vec<String> = routes
        .iter()
        .map(|r| {
            let layout = r
                .layout
                .as_deref()
                .map(js_string)
                .unwrap_or_else(|| "null".to_string());
            format!(
                "{{spec: {}, component: {}, title: {}, layout: {}}}",
                js_string(&r.spec),
                r.key,
                js_string(&r.title),
                layout
            )
        })
        .collect();
    format!("{}\nexport default [{}];", imports.join("\n"), entries.join(","))
}

pub fn render_component_map(components: &[ComponentPlan]) -> String {
    let imports: Vec<String> = components
        .iter()
        .map(|c| format!("import {} from {}", c.key, js_string(&c.import_path)))
        .collect();
    let entries: Vec<String> = components
        .iter()
        .map(|c| format!("{{elementId: {}, component: {}}}", js_string(&c.element_id), c.key))
        .collect();
    format!("{}\nexport default [{}];", imports.join("\n"), entries.join(","))
}

pub fn render_socket_map(events: &[String]) -> String {
    let events: Vec<String> = events.iter().map(|e| js_string(e)).collect();
    format!("export default [{}];", events.join(","))
}

pub fn render_entry(entry: &EntryPlan) -> String {
    let module = js_string(&entry.client_module);
    let error_page_import = match &entry.error_page {
        Some(path) => format!("import ErrorPage from {};", js_string(path)),
        None => format!("import {{ ErrorPage }} from {module}"),
    };
    let entry_file_import = entry
        .entry_file
        .as_deref()
        .map(|path| format!("import {};", js_string(path.strip_suffix(".js").unwrap_or(path))))
        .unwrap_or_default();
    let provider_import = entry
        .component_provider
        .as_deref()
        .map(|path| format!("import ComponentProvider from {}", js_string(path)))
        .unwrap_or_default();
    let error_handler_import = entry
        .component_error_handler
        .as_deref()
        .map(|path| format!("import ErrorHandler from {}", js_string(path)))
        .unwrap_or_default();
    let locale_dictionaries: Vec<String> = entry
        .locale_files
        .iter()
        .map(|(locale, file)| {
            format!(
                "Text.addDictionary({}, require({}));",
                js_string(locale),
                js_string(&format!("../res/{file}"))
            )
        })
        .collect();
    let provider_registration = if entry.component_provider.is_some() {
        "Application.registerComponentProvider(ComponentProvider);"
    } else {
        ""
    };
    let error_handler_registration = if entry.component_error_handler.is_some() {
        "Application.registerErrorhandler(ErrorHandler);"
    } else {
        ""
    };
    let accepted: Vec<String> = entry.accepted_locales.iter().map(|l| js_string(l)).collect();
    let socket_connect = if entry.connect_socket { "Socket.connect();" } else { "" };

    format!(
        "import './nonce';
import Application, {{ Socket, Text }} from {module};
{error_page_import}
{entry_file_import}
import routingMap from './router.map';
import socketEvents from './socket.map';
import components from './component.map';
{provider_import}
{error_handler_import}

// Default dictionary.
import defaultDictionary from '../res/text.json';
Text.addDictionary(defaultDictionary);
// Dictionaries of the accepted locales.
{locale_dictionaries}
// Locale of the client: cookie first, then the browser language.
let dictionary = 'default';
if (Application.getCookie(Application.LOCALE_COOKIE_NAME)) {{
\tdictionary = Application.getCookie(Application.LOCALE_COOKIE_NAME);
}} else if (navigator && navigator.language) {{
\tdictionary = navigator.language;
}}
Application.setLocale(dictionary);
{provider_registration}
{error_handler_registration}

Application
\t.registerRoutingMap(routingMap)
\t.registerComponents(components)
\t.registerErrorPage(ErrorPage)
\t.registerLocales({default_locale}, [{accepted}])
\t.start();
Socket.registerEvents(socketEvents);
{socket_connect}
// Injected code
{injections}
",
        locale_dictionaries = locale_dictionaries.join("\n"),
        default_locale = js_string(&entry.default_locale),
        accepted = accepted.join(", "),
        injections = entry.injections.join("\n"),
    )
}

pub fn render_postcss_config(autoprefixer: &Value) -> Result<String, ArtifactError> {
    Ok(format!(
        "module.exports={{plugins:[['autoprefixer',{}]]}};",
        serde_json::to_string(autoprefixer)?
    ))
}

/// Compiler options every generated tsconfig starts from.
pub fn default_tsconfig() -> Value {
    json!({
        "compilerOptions": {
            "allowJs": true,
            "allowSyntheticDefaultImports": true,
            "esModuleInterop": true,
            "jsx": "react",
            "module": "esnext",
            "moduleResolution": "node",
            "skipLibCheck": true,
            "sourceMap": true,
            "strict": false,
            "target": "es2017"
        },
        "include": ["../**/*"]
    })
}

pub fn render_tsconfig(compiler_options: &Value) -> Result<String, ArtifactError> {
    let mut tsconfig = default_tsconfig();
    if let Some(options) = tsconfig.get_mut("compilerOptions") {
        deep_merge(options, compiler_options.clone());
    }
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    tsconfig.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
