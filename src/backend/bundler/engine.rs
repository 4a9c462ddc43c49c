/**
 * Bundler Engines
 *
 * The module bundler is an external collaborator behind [`BundlerEngine`].
 * [`CommandBundler`] drives a bundler process (`npx webpack` by default)
 * and reads its console output:
 *
 * - `NN%` anywhere in a line reports progress
 * - lines starting with `ERROR` / `WARNING` are compile errors / warnings
 * - a line containing the rebuild marker ends a compilation in watch mode
 *
 * The process learns the generated entry, the output location and the
 * aggregation window through `PAGEWRIGHT_*` environment variables.
 * `NODE_ENV` follows the mode of the call: `production` for one-shot
 * builds, `development` for watch mode.
 */
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::artifacts::templates::ENTRY_FILE;
use crate::backend::error::BundleError;
use crate::backend::logging::log_info;
use crate::shared::AppConfig;

/// Result of one compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleStats {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl BundleStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Progress callback, 0 to 100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Running watch mode
///
/// Every compilation sends one result. The channel closes when watching
/// stops; dropping the handle stops it.
pub struct WatchHandle {
    pub events: mpsc::Receiver<Result<BundleStats, BundleError>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn new(events: mpsc::Receiver<Result<BundleStats, BundleError>>, task: JoinHandle<()>) -> Self {
        Self { events, task }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait BundlerEngine: Send + Sync {
    /// Runs one compilation to completion.
    async fn run(&self, progress: ProgressFn) -> Result<BundleStats, BundleError>;

    /// Starts watch mode, aggregating file changes for `aggregate_timeout`.
    async fn watch(
        &self,
        progress: ProgressFn,
        aggregate_timeout: Duration,
    ) -> Result<WatchHandle, BundleError>;
}

/// Classified line of bundler output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Progress(u8),
    Error(String),
    Warning(String),
    /// End of a compilation.
    Compiled,
    Other,
}

pub fn parse_output_line(line: &str, rebuild_marker: &str) -> OutputLine {
    let line = line.trim();
    if line.starts_with("ERROR") {
        return OutputLine::Error(line.to_string());
    }
    if line.starts_with("WARNING") {
        return OutputLine::Warning(line.to_string());
    }
    if !rebuild_marker.is_empty() && line.contains(rebuild_marker) {
        return OutputLine::Compiled;
    }
    match parse_percentage(line) {
        Some(percentage) => OutputLine::Progress(percentage),
        None => OutputLine::Other,
    }
}

fn parse_percentage(line: &str) -> Option<u8> {
    let end = line.find('%')?;
    let digits: String = line[..end]
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() || digits.len() > 3 {
        return None;
    }
    digits.parse::<u8>().ok().filter(|p| *p <= 100)
}

/// Collects the lines of one compilation.
#[derive(Debug, Default)]
struct Compilation {
    stats: BundleStats,
    started: Option<Instant>,
}

impl Compilation {
    fn feed(&mut self, line: OutputLine, progress: &ProgressFn) {
        self.started.get_or_insert_with(Instant::now);
        match line {
            OutputLine::Progress(percentage) => progress(percentage),
            OutputLine::Error(error) => self.stats.errors.push(error),
            OutputLine::Warning(warning) => self.stats.warnings.push(warning),
            OutputLine::Compiled | OutputLine::Other => {}
        }
    }

    fn finish(&mut self) -> BundleStats {
        let mut stats = std::mem::take(&mut self.stats);
        stats.duration_ms = self
            .started
            .take()
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);
        stats
    }
}

/// Bundler driven as an external process
#[derive(Debug, Clone)]
pub struct CommandBundler {
    command: Vec<String>,
    watch_args: Vec<String>,
    rebuild_marker: String,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl CommandBundler {
    pub fn new(command: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            command,
            watch_args: Vec::new(),
            rebuild_marker: String::new(),
            working_dir,
            env: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut bundler = Self::new(
            config.bundler.command.clone(),
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        );
        bundler.watch_args = config.bundler.watch_args.clone();
        bundler.rebuild_marker = config.bundler.rebuild_marker.clone();
        bundler.env = vec![
            (
                "PAGEWRIGHT_ENTRY".to_string(),
                config.generated_dir().join(ENTRY_FILE).display().to_string(),
            ),
            (
                "PAGEWRIGHT_OUTPUT_DIR".to_string(),
                config.bundle_dir().display().to_string(),
            ),
            ("PAGEWRIGHT_FILENAME".to_string(), config.filename.clone()),
        ];
        bundler
    }

    fn spawn(&self, extra_args: &[String], extra_env: &[(String, String)]) -> Result<Child, BundleError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| BundleError::Engine("Bundler command is empty".to_string()))?;
        let mut command = Command::new(program);
        command
            .args(args)
            .args(extra_args)
            .current_dir(&self.working_dir)
            .envs(self.env.iter().cloned())
            .envs(extra_env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        log_info!("[Bundler] Running {}", self.command.join(" "));
        command
            .spawn()
            .map_err(|e| BundleError::Engine(format!("Cannot start {program}: {e}")))
    }
}

/// Forwards the lines of stdout and stderr into one channel.
fn merge_output(child: &mut Child) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, tx);
    }
    rx
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[async_trait]
impl BundlerEngine for CommandBundler {
    async fn run(&self, progress: ProgressFn) -> Result<BundleStats, BundleError> {
        let env = [("NODE_ENV".to_string(), "production".to_string())];
        let mut child = self.spawn(&[], &env)?;
        let mut lines = merge_output(&mut child);
        let mut compilation = Compilation::default();
        while let Some(line) = lines.recv().await {
            compilation.feed(parse_output_line(&line, ""), &progress);
        }
        let status = child.wait().await?;
        let mut stats = compilation.finish();
        if !status.success() && stats.errors.is_empty() {
            stats.errors.push(format!("Bundler exited with {status}"));
        }
        Ok(stats)
    }

    async fn watch(
        &self,
        progress: ProgressFn,
        aggregate_timeout: Duration,
    ) -> Result<WatchHandle, BundleError> {
        let env = [
            ("NODE_ENV".to_string(), "development".to_string()),
            (
                "PAGEWRIGHT_AGGREGATE_TIMEOUT".to_string(),
                aggregate_timeout.as_millis().to_string(),
            ),
        ];
        let mut child = self.spawn(&self.watch_args, &env)?;
        let mut lines = merge_output(&mut child);
        let marker = self.rebuild_marker.clone();
        let (tx, rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            // Owned by the task so that aborting it kills the process.
            let mut child = child;
            let mut compilation = Compilation::default();
            while let Some(line) = lines.recv().await {
                let line = parse_output_line(&line, &marker);
                let compiled = line == OutputLine::Compiled;
                compilation.feed(line, &progress);
                if compiled && tx.send(Ok(compilation.finish())).await.is_err() {
                    break;
                }
            }
            let _ = child.kill().await;
        });
        Ok(WatchHandle::new(rx, task))
    }
}
