use std::path::PathBuf;

/// Errors raised by the catalog, its collaborators, and the import pipeline.
///
/// Categories:
/// - Fatal: configuration or storage problems, propagate out of a run
/// - Item-scoped: report, abandon the current item, keep going
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    // Fatal
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Config validation failed:\n{0}")]
    InvalidConfig(String),

    #[error("No import sources configured. Enable a source and configure its settings.")]
    NoSources,

    #[error("Unknown source '{0}'")]
    UnknownSource(String),

    #[error("{0}")]
    Lock(String),

    #[error("Terminal I/O failed: {0}")]
    Terminal(#[from] std::io::Error),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Import worker pool failed: {0}")]
    Worker(String),

    // Item-scoped
    #[error("title is required")]
    MissingTitle,

    #[error("Game {0} not found")]
    GameNotFound(u64),

    #[error("{source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error(transparent)]
    Edit(#[from] EditError),
}

impl CatalogError {
    /// Returns true if the error should end the whole run rather than one item.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CatalogError::MissingTitle
                | CatalogError::GameNotFound(_)
                | CatalogError::Source { .. }
                | CatalogError::Edit(_)
        )
    }

    pub fn source_failure(source_name: &str, message: impl std::fmt::Display) -> Self {
        CatalogError::Source {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Structural problems with a field set returned from the edit form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Edited file must be a YAML list")]
    NotAList,

    #[error("Entry {0} must be a mapping")]
    EntryNotMapping(usize),

    #[error("Edited list has {found} entries, expected {expected}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Edited entry must keep {field} = {expected}")]
    IdentityMismatch { field: String, expected: String },

    #[error("Could not parse edited file: {0}")]
    Malformed(String),

    #[error("Editor failed: {0}")]
    Editor(String),
}

/// Misconfigured option menu. Raised when the menu is built, never while reading input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("No unambiguous letter for option '{0}'")]
    NoUnambiguousLetter(String),

    #[error("Option menu must contain at least one option")]
    Empty,

    #[error("Default '{0}' is not one of the menu options")]
    UnknownDefault(String),
}
