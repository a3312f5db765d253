use crate::error::{CatalogError, EditError};
use crate::editor::FieldEditor;
use crate::merge::{describe_changes, diff, overlay_non_empty, render_fields, sanitize, summarize};
use crate::prompt::{confirm, Menu, Picked, Terminal};
use crate::types::{
    field, Achievement, FieldValue, Fields, Game, ImportCandidate, ImportTask, GAME_FIELDS,
    IDENTITY_FIELD,
};
use crate::{log_debug, log_warn};

/// Outcome for a task with no stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum NewRecordDecision {
    /// Create a record from this candidate. Its fields are already sanitized.
    Accept(ImportCandidate),
    Skip,
    Quit,
}

/// Outcome for a task that matches a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingRecordDecision {
    /// Write `updates` (only the differing fields) and upsert `achievements`.
    Apply {
        updates: Fields,
        achievements: Option<Vec<Achievement>>,
    },
    Cancel,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewAction {
    Accept,
    MoreCandidates,
    Skip,
    Edit,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickAction {
    Skip,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExistingAction {
    Apply,
    Edit,
    Cancel,
}

enum Review {
    Decided(NewRecordDecision),
    MoreCandidates,
}

/// Presents candidates to the operator and turns their answers into decisions.
pub struct DecisionProtocol<'a> {
    terminal: &'a mut dyn Terminal,
    editor: &'a mut dyn FieldEditor,
    max_edit_attempts: usize,
}

impl<'a> DecisionProtocol<'a> {
    pub fn new(
        terminal: &'a mut dyn Terminal,
        editor: &'a mut dyn FieldEditor,
        max_edit_attempts: usize,
    ) -> Self {
        Self {
            terminal,
            editor,
            max_edit_attempts: max_edit_attempts.max(1),
        }
    }

    // --- New records ---

    pub fn decide_new(
        &mut self,
        task: &ImportTask,
        candidates: &[ImportCandidate],
    ) -> Result<NewRecordDecision, CatalogError> {
        self.terminal.say(&format!(
            "Finding metadata for game \"{}\".",
            task.title().unwrap_or("<untitled>")
        ));
        self.terminal.say("Incoming:");
        self.terminal.say(&format!("  {}", summarize(&task.fields)));

        if candidates.is_empty() {
            self.terminal.say("No candidates found.");
            return Ok(NewRecordDecision::Skip);
        }

        let base = sanitize(&task.fields, &GAME_FIELDS);
        let multiple = candidates.len() > 1;
        let mut previous: Option<usize> = None;

        loop {
            let index = if multiple {
                self.list_candidates(candidates);
                match self.pick_candidate(candidates.len(), previous)? {
                    Picked::Number(index) => index,
                    Picked::Option(PickAction::Skip) => return Ok(NewRecordDecision::Skip),
                    Picked::Option(PickAction::Quit) => return Ok(NewRecordDecision::Quit),
                }
            } else {
                0
            };
            previous = Some(index + 1);

            match self.review_new(&base, &candidates[index], multiple)? {
                Review::Decided(decision) => return Ok(decision),
                Review::MoreCandidates => continue,
            }
        }
    }

    fn list_candidates(&mut self, candidates: &[ImportCandidate]) {
        self.terminal.say("Candidates:");
        for (index, candidate) in candidates.iter().enumerate() {
            let mut line = format!("  {}. {}", index + 1, summarize(&candidate.fields));
            if !candidate.is_base() {
                line.push_str(&format!(" [{}]", candidate.source));
            }
            self.terminal.say(&line);
        }
    }

    fn pick_candidate(
        &mut self,
        count: usize,
        previous: Option<usize>,
    ) -> Result<Picked<PickAction>, CatalogError> {
        let menu = Menu::new(&[("Skip", PickAction::Skip), ("Quit", PickAction::Quit)])?;
        Ok(menu.ask_with_numbers(&mut *self.terminal, count, previous)?)
    }

    fn review_new(
        &mut self,
        base: &Fields,
        candidate: &ImportCandidate,
        multiple: bool,
    ) -> Result<Review, CatalogError> {
        let menu = if multiple {
            Menu::new(&[
                ("Accept", ReviewAction::Accept),
                ("More candidates", ReviewAction::MoreCandidates),
                ("Skip", ReviewAction::Skip),
                ("Edit", ReviewAction::Edit),
                ("Quit", ReviewAction::Quit),
            ])?
        } else {
            Menu::new(&[
                ("Accept", ReviewAction::Accept),
                ("Skip", ReviewAction::Skip),
                ("Edit", ReviewAction::Edit),
                ("Quit", ReviewAction::Quit),
            ])?
        };

        let proposed = overlay_non_empty(base, &sanitize(&candidate.fields, &GAME_FIELDS), &[]);
        let mut failures = 0;

        loop {
            self.show_changes(base, &proposed);
            match menu.ask(&mut *self.terminal)? {
                ReviewAction::Accept => {
                    return Ok(Review::Decided(NewRecordDecision::Accept(ImportCandidate {
                        fields: proposed,
                        achievements: candidate.achievements.clone(),
                        source: candidate.source.clone(),
                    })))
                }
                ReviewAction::MoreCandidates => return Ok(Review::MoreCandidates),
                ReviewAction::Skip => return Ok(Review::Decided(NewRecordDecision::Skip)),
                ReviewAction::Quit => return Ok(Review::Decided(NewRecordDecision::Quit)),
                ReviewAction::Edit => match self.edit_new(&proposed) {
                    Ok(Some(edited)) => {
                        return Ok(Review::Decided(NewRecordDecision::Accept(ImportCandidate {
                            fields: edited,
                            achievements: candidate.achievements.clone(),
                            source: candidate.source.clone(),
                        })))
                    }
                    Ok(None) => failures = 0,
                    Err(CatalogError::Edit(e)) => {
                        failures += 1;
                        self.terminal.say(&format!("Edit failed: {}", e));
                        if failures >= self.max_edit_attempts {
                            log_warn!("Giving up after {} failed edits; skipping", failures);
                            return Ok(Review::Decided(NewRecordDecision::Skip));
                        }
                    }
                    Err(e) => return Err(e),
                },
            }
        }
    }

    /// `Ok(None)` when the edit changed nothing or the operator declined it.
    fn edit_new(&mut self, proposed: &Fields) -> Result<Option<Fields>, CatalogError> {
        let edited = self.edit_single(proposed)?;
        let changes = describe_changes(proposed, &edited, &GAME_FIELDS);
        if changes.is_empty() {
            self.terminal.say("No changes to apply.");
            return Ok(None);
        }

        self.terminal.say("Edited changes:");
        for line in &changes {
            self.terminal.say(&format!("  {}", line));
        }
        if confirm(&mut *self.terminal, "Apply edited changes? (Y/n)", true)? {
            Ok(Some(edited))
        } else {
            Ok(None)
        }
    }

    // --- Existing records ---

    pub fn decide_existing(
        &mut self,
        existing: &Game,
        candidates: &[ImportCandidate],
    ) -> Result<ExistingRecordDecision, CatalogError> {
        let current = existing.schema_fields();
        let proposals: Vec<Fields> = candidates
            .iter()
            .map(|candidate| propose_update(&current, candidate))
            .collect();

        if proposals
            .iter()
            .all(|proposed| diff(&current, proposed, &GAME_FIELDS).is_empty())
        {
            log_debug!("No changes for \"{}\"; nothing to review", existing.title());
            return Ok(ExistingRecordDecision::Cancel);
        }

        self.terminal.say("Current entry:");
        self.show_fields(&current, None);

        let index = if candidates.len() == 1 {
            self.terminal.say("Fetched entry:");
            self.show_fields(&candidates[0].fields, candidates[0].achievements.as_deref());
            0
        } else {
            self.terminal.say("Fetched entries:");
            for (index, candidate) in candidates.iter().enumerate() {
                self.terminal
                    .say(&format!("  {}. [{}]", index + 1, candidate.source));
                self.show_fields(&candidate.fields, candidate.achievements.as_deref());
            }
            match self.pick_candidate(candidates.len(), None)? {
                Picked::Number(index) => index,
                Picked::Option(PickAction::Skip) => return Ok(ExistingRecordDecision::Cancel),
                Picked::Option(PickAction::Quit) => return Ok(ExistingRecordDecision::Quit),
            }
        };

        let candidate = &candidates[index];
        let identity = field(&current, IDENTITY_FIELD).clone();
        let mut proposed = proposals[index].clone();
        let menu = Menu::new(&[
            ("Apply", ExistingAction::Apply),
            ("continue Editing", ExistingAction::Edit),
            ("Cancel", ExistingAction::Cancel),
        ])?
        .with_default("continue Editing")?;

        loop {
            let updates = diff(&current, &proposed, &GAME_FIELDS);
            if updates.is_empty() {
                self.terminal.say("No changes.");
                return Ok(ExistingRecordDecision::Cancel);
            }
            self.terminal.say("Changes:");
            for line in describe_changes(&current, &proposed, &GAME_FIELDS) {
                self.terminal.say(&format!("  {}", line));
            }

            match menu.ask(&mut *self.terminal)? {
                ExistingAction::Apply => {
                    return Ok(ExistingRecordDecision::Apply {
                        updates,
                        achievements: candidate.achievements.clone(),
                    })
                }
                ExistingAction::Cancel => return Ok(ExistingRecordDecision::Cancel),
                ExistingAction::Edit => match self.edit_existing(&proposed, &identity)? {
                    Some(edited) => proposed = edited,
                    None => return Ok(ExistingRecordDecision::Cancel),
                },
            }
        }
    }

    /// Edit until the result keeps the stored identity, or the operator gives up.
    fn edit_existing(
        &mut self,
        proposed: &Fields,
        identity: &FieldValue,
    ) -> Result<Option<Fields>, CatalogError> {
        let mut failures = 0;
        loop {
            let attempt = self.edit_single(proposed).and_then(|edited| {
                if field(&edited, IDENTITY_FIELD) == identity {
                    Ok(edited)
                } else {
                    Err(CatalogError::Edit(EditError::IdentityMismatch {
                        field: IDENTITY_FIELD.to_string(),
                        expected: identity.to_string(),
                    }))
                }
            });

            match attempt {
                Ok(edited) => return Ok(Some(edited)),
                Err(CatalogError::Edit(e)) => {
                    failures += 1;
                    self.terminal.say(&format!("Edit failed: {}", e));
                    if failures >= self.max_edit_attempts {
                        log_warn!("Giving up after {} failed edits; cancelling", failures);
                        return Ok(None);
                    }
                    if !confirm(&mut *self.terminal, "Edit again? (Y/n)", true)? {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    // --- Shared ---

    /// Open one entry in the editor and return it restricted to the schema.
    fn edit_single(&mut self, entry: &Fields) -> Result<Fields, CatalogError> {
        let mut edited = self.editor.edit(std::slice::from_ref(entry))?;
        if edited.len() != 1 {
            return Err(EditError::ArityMismatch {
                expected: 1,
                found: edited.len(),
            }
            .into());
        }
        Ok(sanitize(&edited.remove(0), &GAME_FIELDS))
    }

    fn show_changes(&mut self, before: &Fields, after: &Fields) {
        let changes = describe_changes(before, after, &GAME_FIELDS);
        if changes.is_empty() {
            self.terminal.say("No changes.");
            return;
        }
        self.terminal.say("Changes:");
        for line in changes {
            self.terminal.say(&format!("  {}", line));
        }
    }

    fn show_fields(&mut self, fields: &Fields, achievements: Option<&[Achievement]>) {
        for line in render_fields(&sanitize(fields, &GAME_FIELDS), "    ") {
            self.terminal.say(&line);
        }
        if let Some(achievements) = achievements {
            self.terminal
                .say(&format!("    achievements: [{} achievements]", achievements.len()));
        }
    }
}

/// Stored fields overlaid with the candidate's non-empty schema fields, identity pinned.
fn propose_update(current: &Fields, candidate: &ImportCandidate) -> Fields {
    let mut proposed = overlay_non_empty(
        current,
        &sanitize(&candidate.fields, &GAME_FIELDS),
        &[IDENTITY_FIELD],
    );
    proposed.insert(
        IDENTITY_FIELD.to_string(),
        field(current, IDENTITY_FIELD).clone(),
    );
    proposed
}
