use std::sync::Arc;

use tokio::runtime::Handle;

use crate::decision::{DecisionProtocol, ExistingRecordDecision, NewRecordDecision};
use crate::editor::FieldEditor;
use crate::error::CatalogError;
use crate::library::Library;
use crate::merge::{diff, overlay_non_empty, sanitize};
use crate::pool::{spawn_pool, PoolSettings, WorkerMessage};
use crate::prompt::Terminal;
use crate::source::{task_label, CandidateSource};
use crate::types::{
    Achievement, Game, ImportCandidate, ImportTask, GAME_FIELDS, IDENTITY_FIELD, TITLE_FIELD,
};
use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Number of lookup workers.
    pub threads: usize,
    pub queue_capacity: usize,
    /// Review updates to stored records instead of applying them silently.
    pub prompt_existing: bool,
    pub max_edit_attempts: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            threads: 2,
            queue_capacity: 64,
            prompt_existing: false,
            max_edit_attempts: 3,
        }
    }
}

/// Optional callbacks fired by a run.
#[derive(Default)]
pub struct ImportHooks<'h> {
    /// After a new record is created.
    pub on_imported: Option<Box<dyn FnMut(&Game) + 'h>>,
    /// When a task matches a stored record, before anything is merged.
    pub on_existing: Option<Box<dyn FnMut(&Game) + 'h>>,
    /// After each result is processed.
    pub tick: Option<Box<dyn FnMut() + 'h>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HaltReason {
    #[default]
    Completed,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    /// Results that neither created nor updated a record.
    pub skipped: usize,
    pub halt_reason: HaltReason,
}

enum Flow {
    Continue,
    Quit,
}

/// Reconciles looked-up tasks against the library, one result at a time.
///
/// All decisions, prompts and storage writes happen on the thread calling
/// [`Importer::run`]. Only candidate lookups run on the runtime.
pub struct Importer<'a> {
    library: &'a mut dyn Library,
    terminal: &'a mut dyn Terminal,
    editor: &'a mut dyn FieldEditor,
    lookup: Arc<dyn CandidateSource>,
    settings: ImportSettings,
    hooks: ImportHooks<'a>,
}

impl<'a> Importer<'a> {
    pub fn new(
        library: &'a mut dyn Library,
        terminal: &'a mut dyn Terminal,
        editor: &'a mut dyn FieldEditor,
        lookup: Arc<dyn CandidateSource>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            library,
            terminal,
            editor,
            lookup,
            settings,
            hooks: ImportHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: ImportHooks<'a>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Look up every task on `runtime` and reconcile the results as they arrive.
    ///
    /// Blocks the calling thread, which must not be a runtime worker. Returns
    /// early on Quit without waiting for lookups still in flight.
    pub fn run<I>(&mut self, runtime: &Handle, tasks: I) -> Result<ImportSummary, CatalogError>
    where
        I: IntoIterator<Item = ImportTask>,
        I::IntoIter: Send + 'static,
    {
        let settings = PoolSettings {
            workers: self.settings.threads.max(1),
            capacity: self.settings.queue_capacity.max(1),
        };
        let mut pool = spawn_pool(runtime, tasks, Arc::clone(&self.lookup), settings);
        let mut summary = ImportSummary::default();
        let mut finished = 0;

        while finished < pool.workers() {
            let Some(message) = pool.recv_blocking() else {
                return Err(CatalogError::Worker(format!(
                    "result queue closed after {} of {} workers finished",
                    finished,
                    pool.workers()
                )));
            };

            let (task, candidates) = match message {
                WorkerMessage::Finished { worker } => {
                    finished += 1;
                    log_debug!("Worker {} finished ({}/{})", worker, finished, pool.workers());
                    continue;
                }
                WorkerMessage::Looked { task, candidates } => (task, candidates),
            };

            match self.process(&task, candidates, &mut summary) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => {
                    log_info!(
                        "Import stopped by operator ({} created, {} updated)",
                        summary.created,
                        summary.updated
                    );
                    pool.abandon();
                    summary.halt_reason = HaltReason::Quit;
                    return Ok(summary);
                }
                Err(e) if !e.is_fatal() => {
                    log_warn!("Skipping {}: {}", task_label(&task), e);
                    summary.skipped += 1;
                }
                Err(e) => {
                    pool.abandon();
                    return Err(e);
                }
            }

            if let Some(tick) = self.hooks.tick.as_mut() {
                tick();
            }
        }

        Ok(summary)
    }

    fn process(
        &mut self,
        task: &ImportTask,
        candidates: Vec<ImportCandidate>,
        summary: &mut ImportSummary,
    ) -> Result<Flow, CatalogError> {
        let existing = match task.identity() {
            Some(key) => self.library.get_by_identity(&key)?,
            None => None,
        };

        match existing {
            Some(game) => {
                if let Some(on_existing) = self.hooks.on_existing.as_mut() {
                    on_existing(&game);
                }
                self.reconcile_existing(task, &game, candidates, summary)
            }
            None => self.reconcile_new(task, candidates, summary),
        }
    }

    fn reconcile_new(
        &mut self,
        task: &ImportTask,
        candidates: Vec<ImportCandidate>,
        summary: &mut ImportSummary,
    ) -> Result<Flow, CatalogError> {
        if candidates.is_empty() {
            log_debug!("No candidates for {}; skipping", task_label(task));
            summary.skipped += 1;
            return Ok(Flow::Continue);
        }

        let decision = DecisionProtocol::new(
            &mut *self.terminal,
            &mut *self.editor,
            self.settings.max_edit_attempts,
        )
        .decide_new(task, &candidates)?;

        match decision {
            NewRecordDecision::Accept(candidate) => {
                let game = self.library.insert(&candidate.fields)?;
                summary.created += 1;
                log_debug!("Created game {} \"{}\"", game.id, game.title());
                self.store_achievements(&game, candidate.achievements.as_deref())?;
                if let Some(on_imported) = self.hooks.on_imported.as_mut() {
                    on_imported(&game);
                }
                Ok(Flow::Continue)
            }
            NewRecordDecision::Skip => {
                summary.skipped += 1;
                Ok(Flow::Continue)
            }
            NewRecordDecision::Quit => Ok(Flow::Quit),
        }
    }

    fn reconcile_existing(
        &mut self,
        task: &ImportTask,
        game: &Game,
        candidates: Vec<ImportCandidate>,
        summary: &mut ImportSummary,
    ) -> Result<Flow, CatalogError> {
        let candidates = if candidates.is_empty() {
            vec![ImportCandidate::base(task)]
        } else {
            candidates
        };

        if !self.settings.prompt_existing {
            let candidate = &candidates[0];
            let current = game.schema_fields();
            let merged = overlay_non_empty(
                &current,
                &sanitize(&candidate.fields, &GAME_FIELDS),
                &[IDENTITY_FIELD, TITLE_FIELD],
            );
            let updates = diff(&current, &merged, &GAME_FIELDS);
            if updates.is_empty() {
                summary.skipped += 1;
            } else {
                self.library.update(game.id, &updates)?;
                summary.updated += 1;
                log_debug!("Updated {} field(s) of \"{}\"", updates.len(), game.title());
            }
            self.store_achievements(game, candidate.achievements.as_deref())?;
            return Ok(Flow::Continue);
        }

        let decision = DecisionProtocol::new(
            &mut *self.terminal,
            &mut *self.editor,
            self.settings.max_edit_attempts,
        )
        .decide_existing(game, &candidates)?;

        match decision {
            ExistingRecordDecision::Apply {
                updates,
                achievements,
            } => {
                self.library.update(game.id, &updates)?;
                summary.updated += 1;
                self.store_achievements(game, achievements.as_deref())?;
                Ok(Flow::Continue)
            }
            ExistingRecordDecision::Cancel => {
                summary.skipped += 1;
                Ok(Flow::Continue)
            }
            ExistingRecordDecision::Quit => Ok(Flow::Quit),
        }
    }

    fn store_achievements(
        &mut self,
        game: &Game,
        achievements: Option<&[Achievement]>,
    ) -> Result<(), CatalogError> {
        match achievements {
            Some(achievements) if !achievements.is_empty() => {
                self.library.upsert_achievements(game.id, achievements)
            }
            _ => Ok(()),
        }
    }
}
