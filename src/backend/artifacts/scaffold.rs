//! Component lookup and placeholder scaffolding.

use std::path::{Path, PathBuf};

use crate::backend::error::ArtifactError;

/// Extensions tried for component paths given without one.
pub const COMPONENT_EXTENSIONS: [&str; 4] = ["js", "jsx", "ts", "tsx"];

/// Base class of a scaffolded placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldKind {
    Page,
    Component,
}

impl ScaffoldKind {
    pub fn base_class(self) -> &'static str {
        match self {
            Self::Page => "Page",
            Self::Component => "Component",
        }
    }
}

/// True when `path` names a component file.
///
/// A path with an extension must exist as is. Otherwise every known
/// extension is tried, then the `index` file of a directory of that name.
pub fn component_exists(path: &Path) -> bool {
    if path.extension().is_some() {
        return path.is_file();
    }
    exists_with_extension(path) || exists_with_extension(&path.join("index"))
}

fn exists_with_extension(path: &Path) -> bool {
    COMPONENT_EXTENSIONS
        .iter()
        .any(|ext| with_extension(path, ext).is_file())
}

/// Appends `.ext` without replacing dots already in the file name.
fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let mut file = path.as_os_str().to_os_string();
    file.push(".");
    file.push(ext);
    PathBuf::from(file)
}

/// Class name of a scaffolded component, e.g. `user-list` → `User_listPage`.
pub fn create_class_name(file_name: &str, suffix: &str) -> String {
    let mut chars = file_name.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!("{}{suffix}", capitalized.replace(['.', '-'], "_"))
}

/// Source of a placeholder component.
pub fn scaffold_source(kind: ScaffoldKind, client_module: &str, file_name: &str) -> String {
    let base = kind.base_class();
    format!(
        "import {{ {base} }} from '{client_module}';\n\nexport default class {} extends {base} {{}}\n",
        create_class_name(file_name, base)
    )
}

/// Writes a placeholder for the missing component at `path` and returns the
/// written file.
pub async fn scaffold(
    path: &Path,
    kind: ScaffoldKind,
    client_module: &str,
    extension: &str,
) -> Result<PathBuf, ArtifactError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArtifactError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = with_extension(path, extension);
    tokio::fs::write(&file, scaffold_source(kind, client_module, &file_name))
        .await
        .map_err(|e| ArtifactError::io(&file, e))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_class_name() {
        assert_eq!(create_class_name("home", "Page"), "HomePage");
        assert_eq!(create_class_name("user-list", "Page"), "User_listPage");
        assert_eq!(create_class_name("nav.bar", "Component"), "Nav_barComponent");
    }

    #[test]
    fn test_scaffold_source() {
        assert_eq!(
            scaffold_source(ScaffoldKind::Page, "pagewright-client", "home"),
            "import { Page } from 'pagewright-client';\n\nexport default class HomePage extends Page {}\n"
        );
    }

    #[test]
    fn test_component_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.tsx"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("nav")).unwrap();
        std::fs::write(dir.path().join("nav/index.js"), "").unwrap();

        assert!(component_exists(&dir.path().join("home")));
        assert!(component_exists(&dir.path().join("home.tsx")));
        assert!(!component_exists(&dir.path().join("home.js")));
        assert!(component_exists(&dir.path().join("nav")));
        assert!(!component_exists(&dir.path().join("missing")));
    }

    #[tokio::test]
    async fn test_scaffold_writes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages/about");
        let file = scaffold(&path, ScaffoldKind::Page, "pagewright-client", "tsx")
            .await
            .unwrap();

        assert_eq!(file, dir.path().join("pages/about.tsx"));
        assert!(component_exists(&path));
        let source = std::fs::read_to_string(file).unwrap();
        assert!(source.contains("class AboutPage extends Page"));
    }
}
