/**
 * Plugins
 *
 * A plugin bundles registrations under a name. During preparation the server
 * calls `register` once per plugin, then collects its entry injections,
 * stylesheets and middlewares. A failing plugin is logged and skipped.
 *
 * Declarative plugin entries (`"name"` or `["name", options]`) are resolved
 * through factories registered on the server builder.
 */
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use super::Registry;
use crate::backend::error::RegistryError;
use crate::backend::middleware::MiddlewareEntry;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Code fragments appended to the generated entry file.
    fn entry_injections(&self) -> Vec<String> {
        Vec::new()
    }

    /// Stylesheets merged into the aggregated stylesheet.
    fn styles(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn middlewares(&self) -> Vec<MiddlewareEntry> {
        Vec::new()
    }

    /// Registers routes, components or socket events.
    fn register(&self, _registry: &mut Registry) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Builds a plugin from its declarative options.
pub type PluginFactory =
    Arc<dyn Fn(Option<Value>) -> Result<Arc<dyn Plugin>, String> + Send + Sync>;

/// Named plugin factories
#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: HashMap<String, PluginFactory>,
}

impl PluginFactories {
    pub fn insert(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Instantiates the plugin `name`.
    pub fn create(&self, name: &str, options: Option<Value>) -> Result<Arc<dyn Plugin>, String> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| format!("Couldn't find plugin factory {name}."))?;
        factory(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Analytics {
        id: String,
    }

    impl Plugin for Analytics {
        fn name(&self) -> &str {
            "analytics"
        }

        fn entry_injections(&self) -> Vec<String> {
            vec![format!("window.analyticsId = '{}';", self.id)]
        }
    }

    #[test]
    fn test_factory_creates_plugin_with_options() {
        let mut factories = PluginFactories::default();
        factories.insert(
            "analytics",
            Arc::new(|options: Option<Value>| {
                let id = options
                    .and_then(|o| o.get("id").and_then(Value::as_str).map(str::to_string))
                    .ok_or_else(|| "missing id".to_string())?;
                Ok(Arc::new(Analytics { id }) as Arc<dyn Plugin>)
            }),
        );

        let plugin = factories.create("analytics", Some(json!({"id": "UA-1"}))).unwrap();
        assert_eq!(plugin.name(), "analytics");
        assert_eq!(plugin.version(), "0.0.0");
        assert_eq!(plugin.entry_injections(), vec!["window.analyticsId = 'UA-1';"]);
        assert!(factories.create("analytics", None).is_err());
    }

    #[test]
    fn test_unknown_factory() {
        let factories = PluginFactories::default();
        assert!(factories.create("missing", None).is_err());
    }
}
