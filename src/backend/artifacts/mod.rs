//! Artifact Generator
//!
//! Turns a registry snapshot into the bootstrap files the front-end bundler
//! consumes, written into `<appDir>/generated/`:
//!
//! - `nonce.js`, `entry.js`
//! - `router.map.js`, `component.map.js`, `socket.map.js`
//! - `postcss.config.js`, `tsconfig.json`
//! - extension files registered with `Registry::add_generated_file`
//!
//! Generation runs in three steps. Planning checks the component files
//! (scaffolding placeholders when `createMissingComponents` is set) and
//! decides which routes are served. Rendering ([`templates::render`]) is
//! pure. Writing applies the result to the file system.

pub mod scaffold;
pub mod templates;

use std::collections::{BTreeMap, HashMap};
use std::path::{Component as PathComponent, Path, PathBuf};

use crate::backend::error::ArtifactError;
use crate::backend::logging::{log_info, log_warn};
use crate::backend::registry::{GeneratedContent, PathSpec, Registry, Route};
use crate::backend::routes::service::is_service_path;
use crate::shared::config::absolutize;
use crate::shared::AppConfig;

use scaffold::{component_exists, ScaffoldKind};
use templates::{content_key, short_hash, ArtifactPlan, ComponentPlan, EntryPlan, RoutePlan};

/// Result of a generator run
#[derive(Debug, Clone)]
pub struct GeneratedArtifacts {
    /// Routes to serve over HTTP, in registration order.
    pub routes: Vec<Route>,
    /// Rendered files keyed by file name.
    pub files: BTreeMap<String, String>,
}

pub struct ArtifactGenerator<'a> {
    config: &'a AppConfig,
    registry: &'a Registry,
    nonce: &'a str,
    app_dir: PathBuf,
    generated_dir: PathBuf,
}

impl<'a> ArtifactGenerator<'a> {
    pub fn new(config: &'a AppConfig, registry: &'a Registry, nonce: &'a str) -> Self {
        Self {
            config,
            registry,
            nonce,
            app_dir: config.app_dir_absolute(),
            generated_dir: config.generated_dir(),
        }
    }

    pub async fn generate(&self) -> Result<GeneratedArtifacts, ArtifactError> {
        self.ensure_directories().await?;
        self.ensure_dictionaries().await?;

        let (routes, route_plans) = self.plan_routes().await?;
        let plan = ArtifactPlan {
            nonce: self.nonce.to_string(),
            routes: route_plans,
            components: self.plan_components().await?,
            socket_events: self
                .registry
                .socket_events()
                .iter()
                .map(|e| e.event.clone())
                .collect(),
            entry: self.plan_entry(),
            autoprefixer: self.config.autoprefixer.clone(),
            ts_compiler_options: self.config.ts_compiler_options.clone(),
        };
        let files = templates::render(&plan)?;

        for (filename, content) in &files {
            log_info!("[Artifacts] Creating {}", filename);
            self.write(filename, content).await?;
        }
        self.write_extension_files().await?;

        Ok(GeneratedArtifacts { routes, files })
    }

    async fn ensure_directories(&self) -> Result<(), ArtifactError> {
        if !self.app_dir.exists() {
            log_warn!("App directory {} doesn't exist. Creating.", self.app_dir.display());
        }
        for dir in [
            self.app_dir.clone(),
            self.generated_dir.clone(),
            self.config.styles_dir(),
            self.config.res_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ArtifactError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Creates an empty dictionary for the default and every accepted locale
    /// without one.
    async fn ensure_dictionaries(&self) -> Result<(), ArtifactError> {
        let res_dir = self.config.res_dir();
        for locale in self.config.locales() {
            let file_name = self.config.locale_file_name(&locale);
            let path = res_dir.join(&file_name);
            if path.exists() {
                continue;
            }
            log_info!("[Artifacts] Creating text file {}", file_name);
            tokio::fs::write(&path, "{}")
                .await
                .map_err(|e| ArtifactError::io(&path, e))?;
        }
        Ok(())
    }

    /// Decides which routes are served and builds the routing map entries.
    async fn plan_routes(&self) -> Result<(Vec<Route>, Vec<RoutePlan>), ArtifactError> {
        let mut served = Vec::new();
        let mut plans: Vec<RoutePlan> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for route in self.registry.routes() {
            if let Err(e) = PathSpec::parse(&route.spec) {
                log_warn!("Skipping route {}: {}", route.spec, e);
                continue;
            }
            if is_service_path(&route.spec) {
                log_warn!("Route {} is reserved for the service routes. Skipping.", route.spec);
                continue;
            }

            let Some(component) = &route.component else {
                if self.registry.resolve_callback(route).is_some() {
                    served.push(route.clone());
                } else {
                    log_warn!("Content component for {} not set.", route.spec);
                }
                continue;
            };

            let module_path = self.module_path(component);
            if !self.ensure_component(&module_path, ScaffoldKind::Page, "Page").await? {
                continue;
            }

            let plan = RoutePlan {
                key: content_key(&format!("{}{}", route.method.as_str().to_lowercase(), route.spec)),
                import_path: relative_import(&self.generated_dir, &module_path),
                spec: route.spec.clone(),
                title: route.title.clone(),
                layout: route.layout.as_ref().map(|l| short_hash(&l.identifier())),
            };
            // Same method and spec: the later route wins, the first position stays.
            match positions.get(&plan.key) {
                Some(&index) => plans[index] = plan,
                None => {
                    positions.insert(plan.key.clone(), plans.len());
                    plans.push(plan);
                }
            }
            served.push(route.clone());
        }
        Ok((served, plans))
    }

    async fn plan_components(&self) -> Result<Vec<ComponentPlan>, ArtifactError> {
        let mut plans = Vec::new();
        for component in self.registry.components() {
            let module_path = self.module_path(&component.path);
            if !self
                .ensure_component(&module_path, ScaffoldKind::Component, "Component")
                .await?
            {
                continue;
            }
            plans.push(ComponentPlan {
                key: content_key(&format!("{}{}", module_path.display(), component.element_id)),
                import_path: relative_import(&self.generated_dir, &module_path),
                element_id: component.element_id.clone(),
            });
        }
        Ok(plans)
    }

    /// True when the component exists or a placeholder was scaffolded.
    async fn ensure_component(
        &self,
        module_path: &Path,
        kind: ScaffoldKind,
        label: &str,
    ) -> Result<bool, ArtifactError> {
        if component_exists(module_path) {
            return Ok(true);
        }
        let create = self.config.create_missing_components;
        log_warn!(
            "{} {} doesn't exist. {}",
            label,
            module_path.display(),
            if create { "GENERATING" } else { "SKIPPING" }
        );
        if !create {
            return Ok(false);
        }
        scaffold::scaffold(
            module_path,
            kind,
            &self.config.client_module,
            &self.config.generated_components_extension,
        )
        .await?;
        Ok(true)
    }

    fn plan_entry(&self) -> EntryPlan {
        let config = self.config;
        let import_of = |path: &str| relative_import(&self.generated_dir, &self.module_path(path));
        let existing_import = |path: Option<&str>, label: &str| {
            let path = path?;
            if component_exists(&self.module_path(path)) {
                Some(import_of(path))
            } else {
                log_warn!("{} {} doesn't exist.", label, path);
                None
            }
        };

        EntryPlan {
            client_module: config.client_module.clone(),
            error_page: self.registry.error_page().map(&import_of),
            entry_file: config.entry_file.as_deref().map(&import_of),
            component_provider: existing_import(self.registry.component_provider(), "Provider"),
            component_error_handler: existing_import(
                self.registry.component_error_handler(),
                "Error handler",
            ),
            default_locale: config.locale.default.clone(),
            accepted_locales: config.locales(),
            locale_files: config
                .locales()
                .iter()
                .filter(|l| !config.is_locale_default(l))
                .map(|l| (l.clone(), config.locale_file_name(l)))
                .collect(),
            connect_socket: config.connect_socket_automatically,
            injections: self.registry.entry_injections().to_vec(),
        }
    }

    async fn write_extension_files(&self) -> Result<(), ArtifactError> {
        for file in self.registry.generated_files() {
            let content = match &file.content {
                GeneratedContent::Static(content) => content.clone(),
                GeneratedContent::Lazy(content) => {
                    content().await.map_err(|message| ArtifactError::Generated {
                        filename: file.filename.clone(),
                        message,
                    })?
                }
            };
            log_info!("[Artifacts] Creating {}", file.filename);
            self.write(&file.filename, &content).await?;
        }
        Ok(())
    }

    async fn write(&self, filename: &str, content: &str) -> Result<(), ArtifactError> {
        let path = self.generated_dir.join(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ArtifactError::io(&path, e))
    }

    /// Absolute path of a component given relative to the app directory.
    fn module_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            absolutize(path)
        } else {
            absolutize(&self.app_dir.join(path))
        }
    }
}

/// Import path of `target` from a module in `from_dir`, always starting with
/// `./` or `../`.
pub fn relative_import(from_dir: &Path, target: &Path) -> String {
    let from: Vec<PathComponent> = from_dir.components().collect();
    let to: Vec<PathComponent> = target.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}
