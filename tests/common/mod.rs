#![allow(dead_code)]

use std::sync::Arc;

use playdex::editor::ScriptedEditor;
use playdex::importer::{ImportHooks, ImportSettings, ImportSummary, Importer};
use playdex::library::YamlLibrary;
use playdex::prompt::ScriptedTerminal;
use playdex::source::CandidateSource;
use playdex::types::{Achievement, FieldValue, Fields, ImportCandidate, ImportTask};

/// Builds a `Fields` map from `(name, value)` pairs.
pub fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Creates an `ImportTask` with a title and a `path` identity.
pub fn make_task(title: &str, path: &str) -> ImportTask {
    ImportTask::new(fields(&[("title", title.into()), ("path", path.into())]))
}

/// Creates an `ImportTask` from arbitrary field pairs.
pub fn task_with(pairs: &[(&str, FieldValue)]) -> ImportTask {
    ImportTask::new(fields(pairs))
}

/// Creates a candidate labelled with `source`.
pub fn candidate(source: &str, pairs: &[(&str, FieldValue)]) -> ImportCandidate {
    ImportCandidate::new(fields(pairs), source)
}

pub fn achievement(api_name: &str, achieved: bool) -> Achievement {
    Achievement {
        api_name: api_name.to_string(),
        name: Some(format!("{} name", api_name)),
        achieved,
        unlock_time: if achieved { 1_700_000_000 } else { 0 },
        ..Default::default()
    }
}

/// A multi-thread runtime for driving the blocking importer from a plain `#[test]`.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Settings with one worker so results arrive in task order.
pub fn sequential_settings() -> ImportSettings {
    ImportSettings {
        threads: 1,
        ..ImportSettings::default()
    }
}

/// Runs one import over `tasks` with scripted I/O and returns the summary.
pub fn run_import(
    library: &mut YamlLibrary,
    terminal: &mut ScriptedTerminal,
    editor: &mut ScriptedEditor,
    lookup: Arc<dyn CandidateSource>,
    settings: ImportSettings,
    tasks: Vec<ImportTask>,
) -> ImportSummary {
    let rt = runtime();
    Importer::new(library, terminal, editor, lookup, settings)
        .run(rt.handle(), tasks)
        .unwrap()
}

/// Same as `run_import` with hooks attached.
pub fn run_import_with_hooks(
    library: &mut YamlLibrary,
    terminal: &mut ScriptedTerminal,
    editor: &mut ScriptedEditor,
    lookup: Arc<dyn CandidateSource>,
    settings: ImportSettings,
    tasks: Vec<ImportTask>,
    hooks: ImportHooks<'_>,
) -> ImportSummary {
    let rt = runtime();
    Importer::new(library, terminal, editor, lookup, settings)
        .with_hooks(hooks)
        .run(rt.handle(), tasks)
        .unwrap()
}
