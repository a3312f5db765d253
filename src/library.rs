use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::CatalogError;
use crate::merge::sanitize;
use crate::types::{field, Achievement, FieldValue, Fields, Game, GAME_FIELDS, TITLE_FIELD};

pub const EXPECTED_SCHEMA_VERSION: u32 = 1;

/// Record storage used by the import pipeline and the CLI.
pub trait Library {
    fn get(&self, id: u64) -> Result<Option<Game>, CatalogError>;

    fn get_by_identity(&self, key: &str) -> Result<Option<Game>, CatalogError>;

    /// Store a new game. Fields are restricted to the schema; a title is required.
    fn insert(&mut self, fields: &Fields) -> Result<Game, CatalogError>;

    /// Set the given schema fields on game `id`. `Null` clears a field.
    ///
    /// Returns `Ok(None)` for an unknown id.
    fn update(&mut self, id: u64, fields: &Fields) -> Result<Option<Game>, CatalogError>;

    /// Insert or replace achievements of game `id`, keyed by `api_name`.
    fn upsert_achievements(
        &mut self,
        id: u64,
        achievements: &[Achievement],
    ) -> Result<(), CatalogError>;

    fn list_all(&self) -> Result<Vec<Game>, CatalogError>;

    fn achievements(&self, id: u64) -> Result<Vec<Achievement>, CatalogError>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredAchievement {
    pub game_id: u64,
    #[serde(flatten)]
    pub achievement: Achievement,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LibraryFile {
    pub schema_version: u32,
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub achievements: Vec<StoredAchievement>,
}

impl Default for LibraryFile {
    fn default() -> Self {
        Self {
            schema_version: EXPECTED_SCHEMA_VERSION,
            next_id: 0,
            games: Vec::new(),
            achievements: Vec::new(),
        }
    }
}

/// A library kept in one YAML file, rewritten atomically after every change.
#[derive(Debug)]
pub struct YamlLibrary {
    path: Option<PathBuf>,
    data: LibraryFile,
}

impl YamlLibrary {
    /// Open the library at `path`. A missing file is an empty library.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let data = if path.exists() {
            load(path)?
        } else {
            LibraryFile::default()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            data,
        })
    }

    /// A library that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: LibraryFile::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self) -> Result<(), CatalogError> {
        match &self.path {
            Some(path) => save(path, &self.data),
            None => Ok(()),
        }
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.data.games.iter().position(|game| game.id == id)
    }
}

impl Library for YamlLibrary {
    fn get(&self, id: u64) -> Result<Option<Game>, CatalogError> {
        Ok(self.data.games.iter().find(|game| game.id == id).cloned())
    }

    fn get_by_identity(&self, key: &str) -> Result<Option<Game>, CatalogError> {
        Ok(self
            .data
            .games
            .iter()
            .find(|game| game.identity().as_deref() == Some(key))
            .cloned())
    }

    fn insert(&mut self, fields: &Fields) -> Result<Game, CatalogError> {
        let mut fields = sanitize(fields, &GAME_FIELDS);
        fields.retain(|_, value| *value != FieldValue::Null);
        if field(&fields, TITLE_FIELD).is_empty() {
            return Err(CatalogError::MissingTitle);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let id = self.data.next_id + 1;
        let game = Game {
            id,
            added: now.clone(),
            updated: now,
            fields,
        };
        self.data.next_id = id;
        self.data.games.push(game.clone());
        self.persist()?;
        Ok(game)
    }

    fn update(&mut self, id: u64, fields: &Fields) -> Result<Option<Game>, CatalogError> {
        let Some(index) = self.position(id) else {
            return Ok(None);
        };

        let game = &mut self.data.games[index];
        let mut changed = false;
        for (name, value) in sanitize(fields, &GAME_FIELDS) {
            if *field(&game.fields, &name) == value {
                continue;
            }
            changed = true;
            if value == FieldValue::Null {
                game.fields.remove(&name);
            } else {
                game.fields.insert(name, value);
            }
        }

        if !changed {
            return Ok(Some(game.clone()));
        }
        game.updated = chrono::Utc::now().to_rfc3339();
        let updated = game.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    fn upsert_achievements(
        &mut self,
        id: u64,
        achievements: &[Achievement],
    ) -> Result<(), CatalogError> {
        if self.position(id).is_none() {
            return Err(CatalogError::GameNotFound(id));
        }
        if achievements.is_empty() {
            return Ok(());
        }

        for achievement in achievements {
            let existing = self
                .data
                .achievements
                .iter_mut()
                .find(|row| row.game_id == id && row.achievement.api_name == achievement.api_name);
            match existing {
                Some(row) => row.achievement = achievement.clone(),
                None => self.data.achievements.push(StoredAchievement {
                    game_id: id,
                    achievement: achievement.clone(),
                }),
            }
        }
        self.persist()
    }

    fn list_all(&self) -> Result<Vec<Game>, CatalogError> {
        Ok(self.data.games.clone())
    }

    fn achievements(&self, id: u64) -> Result<Vec<Achievement>, CatalogError> {
        if self.position(id).is_none() {
            return Err(CatalogError::GameNotFound(id));
        }
        Ok(self
            .data
            .achievements
            .iter()
            .filter(|row| row.game_id == id)
            .map(|row| row.achievement.clone())
            .collect())
    }
}

/// Load a library file, rejecting unknown schema versions.
pub fn load(path: &Path) -> Result<LibraryFile, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|e| CatalogError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    if contents.trim().is_empty() {
        return Ok(LibraryFile::default());
    }

    let data: LibraryFile =
        serde_yaml_ng::from_str(&contents).map_err(|e| CatalogError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if data.schema_version != EXPECTED_SCHEMA_VERSION {
        return Err(CatalogError::Parse {
            path: path.to_path_buf(),
            message: format!(
                "unsupported schema_version {} (expected {})",
                data.schema_version, EXPECTED_SCHEMA_VERSION
            ),
        });
    }

    Ok(data)
}

/// Save a library file using write-temp-rename.
///
/// The temp file lives in the target's directory and is synced before the
/// rename, so readers see either the old file or the new one.
pub fn save(path: &Path, data: &LibraryFile) -> Result<(), CatalogError> {
    let write_error = |message: String| CatalogError::Write {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| write_error(format!("failed to create {}: {}", parent.display(), e)))?;

    let yaml = serde_yaml_ng::to_string(data)
        .map_err(|e| write_error(format!("failed to serialize library: {}", e)))?;

    let temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| write_error(format!("failed to create temp file: {}", e)))?;
    fs::write(temp_file.path(), &yaml)
        .map_err(|e| write_error(format!("failed to write temp file: {}", e)))?;

    // sync to disk before rename
    let file = fs::File::open(temp_file.path())
        .map_err(|e| write_error(format!("failed to open temp file for sync: {}", e)))?;
    file.sync_all()
        .map_err(|e| write_error(format!("failed to sync temp file: {}", e)))?;

    temp_file
        .persist(path)
        .map_err(|e| write_error(format!("failed to rename temp file: {}", e)))?;

    Ok(())
}
