mod common;

use common::{achievement, fields};
use playdex::error::CatalogError;
use playdex::library::{Library, YamlLibrary};
use playdex::types::FieldValue;

// --- insert ---

#[test]
fn insert_assigns_sequential_ids_and_timestamps() {
    let mut library = YamlLibrary::in_memory();

    let a = library.insert(&fields(&[("title", "Game A".into())])).unwrap();
    let b = library.insert(&fields(&[("title", "Game B".into())])).unwrap();

    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert!(chrono::DateTime::parse_from_rfc3339(&a.added).is_ok());
    assert_eq!(a.added, a.updated);
}

#[test]
fn insert_requires_a_title() {
    let mut library = YamlLibrary::in_memory();

    let missing = library.insert(&fields(&[("path", "steam://1".into())]));
    let empty = library.insert(&fields(&[("title", "".into())]));

    assert!(matches!(missing, Err(CatalogError::MissingTitle)));
    assert!(matches!(empty, Err(CatalogError::MissingTitle)));
    assert!(library.list_all().unwrap().is_empty());
}

#[test]
fn insert_drops_unknown_fields_and_nulls() {
    let mut library = YamlLibrary::in_memory();

    let game = library
        .insert(&fields(&[
            ("title", "Game A".into()),
            ("genre", FieldValue::Null),
            ("rating", FieldValue::Integer(9)),
        ]))
        .unwrap();

    assert_eq!(game.fields, fields(&[("title", "Game A".into())]));
}

// --- lookup ---

#[test]
fn get_by_identity_matches_path() {
    let mut library = YamlLibrary::in_memory();
    let game = library
        .insert(&fields(&[("title", "Game A".into()), ("path", "steam://1".into())]))
        .unwrap();

    assert_eq!(library.get_by_identity("steam://1").unwrap(), Some(game));
    assert_eq!(library.get_by_identity("steam://2").unwrap(), None);
}

// --- update ---

#[test]
fn update_sets_and_clears_fields() {
    let mut library = YamlLibrary::in_memory();
    let game = library
        .insert(&fields(&[("title", "Game A".into()), ("genre", "Action".into())]))
        .unwrap();

    let updated = library
        .update(
            game.id,
            &fields(&[("genre", FieldValue::Null), ("developer", "Studio".into())]),
        )
        .unwrap()
        .unwrap();

    assert!(!updated.fields.contains_key("genre"));
    assert_eq!(updated.fields["developer"], FieldValue::from("Studio"));
}

#[test]
fn update_without_changes_keeps_timestamp() {
    let mut library = YamlLibrary::in_memory();
    let game = library.insert(&fields(&[("title", "Game A".into())])).unwrap();

    let same = library
        .update(game.id, &fields(&[("title", "Game A".into()), ("rating", FieldValue::Integer(1))]))
        .unwrap()
        .unwrap();

    assert_eq!(same, game);
}

#[test]
fn update_of_unknown_id_returns_none() {
    let mut library = YamlLibrary::in_memory();
    let result = library.update(42, &fields(&[("title", "X".into())])).unwrap();
    assert!(result.is_none());
}

// --- achievements ---

#[test]
fn upsert_replaces_existing_achievement() {
    let mut library = YamlLibrary::in_memory();
    let game = library.insert(&fields(&[("title", "Game A".into())])).unwrap();

    library
        .upsert_achievements(game.id, &[achievement("WIN", false), achievement("LOSE", false)])
        .unwrap();
    library
        .upsert_achievements(game.id, &[achievement("WIN", true)])
        .unwrap();

    let achievements = library.achievements(game.id).unwrap();
    assert_eq!(achievements.len(), 2);
    let win = achievements.iter().find(|a| a.api_name == "WIN").unwrap();
    assert!(win.achieved);
    assert_eq!(win.unlock_time, 1_700_000_000);
}

#[test]
fn achievements_are_kept_per_game() {
    let mut library = YamlLibrary::in_memory();
    let a = library.insert(&fields(&[("title", "Game A".into())])).unwrap();
    let b = library.insert(&fields(&[("title", "Game B".into())])).unwrap();

    library.upsert_achievements(a.id, &[achievement("WIN", true)]).unwrap();
    library.upsert_achievements(b.id, &[achievement("WIN", false)]).unwrap();

    assert!(library.achievements(a.id).unwrap()[0].achieved);
    assert!(!library.achievements(b.id).unwrap()[0].achieved);
}

#[test]
fn upsert_for_unknown_game_fails() {
    let mut library = YamlLibrary::in_memory();
    let result = library.upsert_achievements(7, &[achievement("WIN", true)]);
    assert!(matches!(result, Err(CatalogError::GameNotFound(7))));
}

// --- persistence ---

#[test]
fn changes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("library.yaml");

    {
        let mut library = YamlLibrary::open(&path).unwrap();
        let game = library
            .insert(&fields(&[
                ("title", "Game A".into()),
                ("path", "steam://1".into()),
                ("release_date", FieldValue::Integer(2006)),
            ]))
            .unwrap();
        library.upsert_achievements(game.id, &[achievement("WIN", true)]).unwrap();
    }

    let library = YamlLibrary::open(&path).unwrap();
    let game = library.get_by_identity("steam://1").unwrap().unwrap();
    assert_eq!(game.fields["release_date"], FieldValue::Integer(2006));
    assert_eq!(library.achievements(game.id).unwrap().len(), 1);
}

#[test]
fn ids_are_not_reused_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.yaml");

    {
        let mut library = YamlLibrary::open(&path).unwrap();
        library.insert(&fields(&[("title", "Game A".into())])).unwrap();
    }

    let mut library = YamlLibrary::open(&path).unwrap();
    let game = library.insert(&fields(&[("title", "Game B".into())])).unwrap();
    assert_eq!(game.id, 2);
}

#[test]
fn open_missing_file_is_empty_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.yaml");

    let library = YamlLibrary::open(&path).unwrap();

    assert!(library.list_all().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.yaml");
    std::fs::write(&path, "schema_version: 99\ngames: []\n").unwrap();

    let err = YamlLibrary::open(&path).unwrap_err();

    assert!(matches!(err, CatalogError::Parse { .. }));
    assert!(err.to_string().contains("unsupported schema_version 99"));
}
