use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{expand_path, CatalogConfig};
use crate::error::CatalogError;
use crate::merge::overlay_non_empty;
use crate::types::{ImportCandidate, ImportTask};
use crate::{log_debug, log_warn};

// --- Contracts ---

/// Produces candidate field sets for a task. May do network I/O.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, task: &ImportTask) -> Result<Vec<ImportCandidate>, CatalogError>;
}

/// Produces the tasks that seed an import run.
pub trait TaskSource: Send + Sync {
    fn name(&self) -> &str;

    fn tasks(&self) -> Result<Vec<ImportTask>, CatalogError>;
}

/// What a registered source can do. Either half may be absent.
#[derive(Clone, Default)]
pub struct SourceCapabilities {
    pub tasks: Option<Arc<dyn TaskSource>>,
    pub search: Option<Arc<dyn CandidateSource>>,
}

// --- Registry ---

/// Explicit name to capability mapping, built by the caller before a run.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, SourceCapabilities>,
}

/// Enabled sources in configuration order.
#[derive(Clone, Default)]
pub struct EnabledSources {
    pub tasks: Vec<Arc<dyn TaskSource>>,
    pub search: Vec<Arc<dyn CandidateSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capabilities` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, capabilities: SourceCapabilities) {
        self.sources.insert(name.to_string(), capabilities);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Resolve `names` against the registry.
    ///
    /// Names that are not registered are reported and ignored. Fails with
    /// `NoSources` when nothing enabled can produce tasks.
    pub fn enabled(&self, names: &[String]) -> Result<EnabledSources, CatalogError> {
        let mut enabled = EnabledSources::default();
        for name in names {
            let Some(capabilities) = self.sources.get(name) else {
                log_warn!("Plugin not found: {}", name);
                continue;
            };
            if let Some(tasks) = &capabilities.tasks {
                enabled.tasks.push(Arc::clone(tasks));
            }
            if let Some(search) = &capabilities.search {
                enabled.search.push(Arc::clone(search));
            }
        }

        if enabled.tasks.is_empty() {
            return Err(CatalogError::NoSources);
        }
        Ok(enabled)
    }
}

/// Registry with every built-in source, configured from `config.sources`.
pub fn builtin_registry(config: &CatalogConfig) -> Result<SourceRegistry, CatalogError> {
    let mut registry = SourceRegistry::new();

    let settings = config.sources.get(FileSource::NAME).cloned().unwrap_or_default();
    let file = Arc::new(FileSource::from_settings(&settings)?);
    registry.register(
        FileSource::NAME,
        SourceCapabilities {
            tasks: Some(file.clone()),
            search: Some(file),
        },
    );

    Ok(registry)
}

// --- Multi-source lookup ---

/// The lookup handed to the worker pool.
///
/// Candidate 0 is always the task itself, labelled `base`. Each search
/// source's candidates follow, overlaid on the task's fields and labelled
/// with the source name. A failing source is reported and skipped.
pub struct CandidateProvider {
    searchers: Vec<Arc<dyn CandidateSource>>,
}

impl CandidateProvider {
    pub fn new(searchers: Vec<Arc<dyn CandidateSource>>) -> Self {
        Self { searchers }
    }
}

#[async_trait]
impl CandidateSource for CandidateProvider {
    fn name(&self) -> &str {
        "provider"
    }

    async fn lookup(&self, task: &ImportTask) -> Result<Vec<ImportCandidate>, CatalogError> {
        let mut candidates = vec![ImportCandidate::base(task)];

        for searcher in &self.searchers {
            match searcher.lookup(task).await {
                Ok(found) => {
                    log_debug!(
                        "{} returned {} candidate(s) for {}",
                        searcher.name(),
                        found.len(),
                        task_label(task)
                    );
                    candidates.extend(found.into_iter().map(|candidate| ImportCandidate {
                        fields: overlay_non_empty(&task.fields, &candidate.fields, &[]),
                        achievements: candidate.achievements.or_else(|| task.achievements.clone()),
                        source: searcher.name().to_string(),
                    }));
                }
                Err(e) => log_warn!("{} search failed for {}: {}", searcher.name(), task_label(task), e),
            }
        }

        Ok(candidates)
    }
}

/// Title if present, otherwise the identity key, for log lines.
pub fn task_label(task: &ImportTask) -> String {
    match (task.title(), task.identity()) {
        (Some(title), _) => format!("\"{}\"", title),
        (None, Some(identity)) => identity,
        (None, None) => "<untitled task>".to_string(),
    }
}

// --- Task selection ---

/// Gather tasks from every source for one run.
///
/// Without `force`, tasks whose identity is already in `existing` are dropped.
/// With `force`, only those tasks are kept. A failing source is reported and
/// the rest still contribute.
pub fn select_tasks(
    sources: &[Arc<dyn TaskSource>],
    existing: &HashSet<String>,
    force: bool,
) -> Vec<ImportTask> {
    let mut selected = Vec::new();
    for source in sources {
        let tasks = match source.tasks() {
            Ok(tasks) => tasks,
            Err(e) => {
                log_warn!("{} import failed: {}", source.name(), e);
                continue;
            }
        };
        let before = selected.len();
        selected.extend(tasks.into_iter().filter(|task| {
            let known = task
                .identity()
                .map(|key| existing.contains(&key))
                .unwrap_or(false);
            known == force
        }));
        log_debug!("{} contributed {} task(s)", source.name(), selected.len() - before);
    }
    selected
}

// --- Built-in file source ---

/// Reads tasks and metadata from local YAML or JSON files.
///
/// Settings keys: `tasks` (a list of entries to import) and `metadata`
/// (entries matched against tasks by normalized title). Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    tasks_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
}

impl FileSource {
    pub const NAME: &'static str = "file";

    pub fn new(tasks_path: Option<PathBuf>, metadata_path: Option<PathBuf>) -> Self {
        Self {
            tasks_path,
            metadata_path,
        }
    }

    pub fn from_settings(settings: &toml::Table) -> Result<Self, CatalogError> {
        let path_setting = |key: &str| -> Result<Option<PathBuf>, CatalogError> {
            match settings.get(key) {
                None => Ok(None),
                Some(toml::Value::String(s)) => Ok(Some(expand_path(s))),
                Some(other) => Err(CatalogError::InvalidConfig(format!(
                    "  - sources.file.{} must be a string, got {}",
                    key,
                    other.type_str()
                ))),
            }
        };
        Ok(Self::new(path_setting("tasks")?, path_setting("metadata")?))
    }
}

impl TaskSource for FileSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tasks(&self) -> Result<Vec<ImportTask>, CatalogError> {
        let Some(path) = &self.tasks_path else {
            return Ok(Vec::new());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.clone(),
            source: e,
        })?;
        read_entries(path, &contents)
    }
}

#[async_trait]
impl CandidateSource for FileSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn lookup(&self, task: &ImportTask) -> Result<Vec<ImportCandidate>, CatalogError> {
        let (Some(path), Some(title)) = (&self.metadata_path, task.title()) else {
            return Ok(Vec::new());
        };

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::source_failure(Self::NAME, format!("{}: {}", path.display(), e)))?;
        let wanted = normalize_title(title);

        Ok(read_entries(path, &contents)?
            .into_iter()
            .filter(|entry| entry.title().map(normalize_title).as_deref() == Some(wanted.as_str()))
            .map(|entry| ImportCandidate {
                fields: entry.fields,
                achievements: entry.achievements,
                source: Self::NAME.to_string(),
            })
            .collect())
    }
}

/// Parse a list of entries, as JSON when the extension says so and YAML otherwise.
pub fn read_entries(path: &Path, contents: &str) -> Result<Vec<ImportTask>, CatalogError> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let parsed = if is_json {
        serde_json::from_str::<Option<Vec<ImportTask>>>(contents).map_err(|e| e.to_string())
    } else {
        serde_yaml_ng::from_str::<Option<Vec<ImportTask>>>(contents).map_err(|e| e.to_string())
    };

    parsed
        .map(Option::unwrap_or_default)
        .map_err(|message| CatalogError::Parse {
            path: path.to_path_buf(),
            message,
        })
}

/// Lowercase alphanumerics only: "The Witcher 3: Wild Hunt" -> "thewitcher3wildhunt".
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// --- Test double ---

/// In-memory source with fixed answers, keyed by task identity.
///
/// Lookups for unknown identities return no candidates.
#[derive(Default)]
pub struct StaticSource {
    name: String,
    tasks: Vec<ImportTask>,
    tasks_error: Option<String>,
    candidates: HashMap<String, Vec<ImportCandidate>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    lookups: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<ImportTask>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_failing_tasks(mut self, message: &str) -> Self {
        self.tasks_error = Some(message.to_string());
        self
    }

    pub fn with_candidates(mut self, identity: &str, candidates: Vec<ImportCandidate>) -> Self {
        self.candidates.insert(identity.to_string(), candidates);
        self
    }

    pub fn with_failing_lookup(mut self, identity: &str) -> Self {
        self.failing.insert(identity.to_string());
        self
    }

    pub fn with_panicking_lookup(mut self, identity: &str) -> Self {
        self.panicking.insert(identity.to_string());
        self
    }

    /// Number of lookups started so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl TaskSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tasks(&self) -> Result<Vec<ImportTask>, CatalogError> {
        match &self.tasks_error {
            Some(message) => Err(CatalogError::source_failure(&self.name, message)),
            None => Ok(self.tasks.clone()),
        }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, task: &ImportTask) -> Result<Vec<ImportCandidate>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let identity = task.identity().unwrap_or_default();
        if self.panicking.contains(&identity) {
            panic!("StaticSource: scripted panic for {}", identity);
        }
        if self.failing.contains(&identity) {
            return Err(CatalogError::source_failure(
                &self.name,
                format!("scripted failure for {}", identity),
            ));
        }
        Ok(self.candidates.get(&identity).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_keeps_lowercase_alphanumerics() {
        assert_eq!(normalize_title("The Witcher 3: Wild Hunt"), "thewitcher3wildhunt");
        assert_eq!(normalize_title("  "), "");
    }

    #[test]
    fn read_entries_picks_format_by_extension() {
        let json = r#"[{"title": "Game A", "path": "steam://1"}]"#;
        let tasks = read_entries(Path::new("games.json"), json).unwrap();
        assert_eq!(tasks[0].title(), Some("Game A"));

        let yaml = "- title: Game B\n  release_date: 2006\n";
        let tasks = read_entries(Path::new("games.yaml"), yaml).unwrap();
        assert_eq!(tasks[0].title(), Some("Game B"));
    }

    #[test]
    fn read_entries_treats_empty_document_as_no_entries() {
        assert!(read_entries(Path::new("games.yaml"), "").unwrap().is_empty());
    }
}
