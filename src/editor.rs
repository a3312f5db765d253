use std::collections::VecDeque;
use std::fs;
use std::process::Command;

use crate::error::EditError;
use crate::types::{FieldValue, Fields};

/// Round trip a list of field sets through an operator-editable form.
pub trait FieldEditor {
    fn edit(&mut self, entries: &[Fields]) -> Result<Vec<Fields>, EditError>;
}

/// Opens entries as a YAML list in the operator's editor.
///
/// The command comes from `$VISUAL`, then `$EDITOR`, then `vi`.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: Vec<String>,
}

impl ExternalEditor {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn from_env() -> Self {
        let command = std::env::var("VISUAL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                std::env::var("EDITOR")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| "vi".to_string());
        Self::new(&command)
    }
}

impl FieldEditor for ExternalEditor {
    fn edit(&mut self, entries: &[Fields]) -> Result<Vec<Fields>, EditError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| EditError::Editor("no editor command configured".to_string()))?;

        let temp_file = tempfile::Builder::new()
            .prefix("playdex-edit-")
            .suffix(".yaml")
            .tempfile()
            .map_err(|e| EditError::Editor(format!("failed to create temp file: {}", e)))?;

        fs::write(temp_file.path(), render_entries(entries)?)
            .map_err(|e| EditError::Editor(format!("failed to write temp file: {}", e)))?;

        let status = Command::new(program)
            .args(args)
            .arg(temp_file.path())
            .status()
            .map_err(|e| EditError::Editor(format!("failed to launch '{}': {}", program, e)))?;
        if !status.success() {
            return Err(EditError::Editor(format!(
                "'{}' exited with {}",
                program, status
            )));
        }

        let contents = fs::read_to_string(temp_file.path())
            .map_err(|e| EditError::Editor(format!("failed to read edited file: {}", e)))?;
        parse_entries(&contents)
    }
}

/// Serialize entries as a YAML list of mappings.
pub fn render_entries(entries: &[Fields]) -> Result<String, EditError> {
    serde_yaml_ng::to_string(entries).map_err(|e| EditError::Malformed(e.to_string()))
}

/// Parse an edited YAML document back into field sets.
///
/// An empty document is an empty list. Every entry must be a mapping of
/// string keys to scalar values.
pub fn parse_entries(contents: &str) -> Result<Vec<Fields>, EditError> {
    let document: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(contents).map_err(|e| EditError::Malformed(e.to_string()))?;

    let items = match document {
        serde_yaml_ng::Value::Null => return Ok(Vec::new()),
        serde_yaml_ng::Value::Sequence(items) => items,
        _ => return Err(EditError::NotAList),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_yaml_ng::Value::Mapping(mapping) => mapping_to_fields(mapping),
            _ => Err(EditError::EntryNotMapping(index + 1)),
        })
        .collect()
}

fn mapping_to_fields(mapping: serde_yaml_ng::Mapping) -> Result<Fields, EditError> {
    let mut fields = Fields::new();
    for (key, value) in mapping {
        let key = match key {
            serde_yaml_ng::Value::String(s) => s,
            other => {
                return Err(EditError::Malformed(format!(
                    "field names must be strings, got {:?}",
                    other
                )))
            }
        };
        if matches!(
            value,
            serde_yaml_ng::Value::Sequence(_)
                | serde_yaml_ng::Value::Mapping(_)
                | serde_yaml_ng::Value::Tagged(_)
        ) {
            return Err(EditError::Malformed(format!(
                "field '{}' must be a single value",
                key
            )));
        }
        let value: FieldValue = serde_yaml_ng::from_value(value)
            .map_err(|e| EditError::Malformed(format!("field '{}': {}", key, e)))?;
        fields.insert(key, value);
    }
    Ok(fields)
}

/// Scripted editor for tests.
///
/// Each call returns the next queued result and records what it was asked to open.
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    results: VecDeque<Result<Vec<Fields>, EditError>>,
    opened: Vec<Vec<Fields>>,
}

impl ScriptedEditor {
    pub fn new(results: Vec<Result<Vec<Fields>, EditError>>) -> Self {
        Self {
            results: results.into(),
            opened: Vec::new(),
        }
    }

    pub fn opened(&self) -> &[Vec<Fields>] {
        &self.opened
    }
}

impl FieldEditor for ScriptedEditor {
    fn edit(&mut self, entries: &[Fields]) -> Result<Vec<Fields>, EditError> {
        self.opened.push(entries.to_vec());
        self.results.pop_front().unwrap_or_else(|| {
            Err(EditError::Editor(
                "ScriptedEditor: no more results in script".to_string(),
            ))
        })
    }
}
