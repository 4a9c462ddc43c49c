/**
 * Style Compilation
 *
 * The style preprocessor is an external collaborator behind
 * [`StyleCompiler`]. [`ConcatStyleCompiler`] concatenates plain `.css`
 * sources into the aggregated stylesheet.
 *
 * Every compilation deletes the previous aggregate first and removes the
 * preprocessor's temporary files (`rs-tmp`, `cs-tmp`) afterwards.
 */
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::backend::error::BundleError;
use crate::backend::logging::log_info;
use crate::shared::config::STYLES_FILENAME;

/// Markers of temporary files left in the style directory.
pub const TEMP_FILE_MARKERS: [&str; 2] = ["rs-tmp", "cs-tmp"];

#[async_trait]
pub trait StyleCompiler: Send + Sync {
    /// Compiles `sources` (files or directories) into `output`.
    async fn compile(&self, sources: &[PathBuf], output: &Path) -> Result<(), BundleError>;
}

/// Concatenates `.css` files in source order; directories contribute their
/// files sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ConcatStyleCompiler;

#[async_trait]
impl StyleCompiler for ConcatStyleCompiler {
    async fn compile(&self, sources: &[PathBuf], output: &Path) -> Result<(), BundleError> {
        let mut files = Vec::new();
        for source in sources {
            if source.is_dir() {
                collect_css(source, output, &mut files)?;
            } else if source.is_file() {
                files.push(source.clone());
            }
        }
        let mut css = String::new();
        for file in files {
            let content = tokio::fs::read_to_string(&file).await?;
            css.push_str(&format!("/* {} */\n", file.display()));
            css.push_str(&content);
            if !content.ends_with('\n') {
                css.push('\n');
            }
        }
        tokio::fs::write(output, css).await?;
        Ok(())
    }
}

fn collect_css(dir: &Path, output: &Path, files: &mut Vec<PathBuf>) -> Result<(), BundleError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_css(&path, output, files)?;
        } else if path != output
            && path.extension().is_some_and(|ext| ext == "css")
            && !is_temp_file(&path)
        {
            files.push(path);
        }
    }
    Ok(())
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .is_some_and(|name| TEMP_FILE_MARKERS.iter().any(|marker| name.contains(marker)))
}

/// Inputs of the aggregated stylesheet
#[derive(Debug, Clone, Default)]
pub struct StyleSources {
    /// `mergeStyles`, then plugin styles, then the source style directory.
    pub sources: Vec<PathBuf>,
    /// Directory receiving the aggregate.
    pub output_dir: PathBuf,
}

impl StyleSources {
    pub fn output(&self) -> PathBuf {
        self.output_dir.join(STYLES_FILENAME)
    }
}

/// Rebuilds the aggregated stylesheet.
pub async fn compile_styles(
    compiler: &dyn StyleCompiler,
    sources: &StyleSources,
) -> Result<(), BundleError> {
    let output = sources.output();
    log_info!("[Bundler] Compiling styles into {}", output.display());
    if output.exists() {
        tokio::fs::remove_file(&output).await?;
    }
    tokio::fs::create_dir_all(&sources.output_dir).await?;
    compiler.compile(&sources.sources, &output).await?;
    remove_temp_files(&sources.output_dir).await
}

async fn remove_temp_files(dir: &Path) -> Result<(), BundleError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && is_temp_file(&path) {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}
