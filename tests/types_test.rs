mod common;

use common::{fields, make_task, task_with};
use playdex::error::{CatalogError, EditError};
use playdex::types::*;

// --- FieldValue ---

#[test]
fn null_and_empty_text_are_empty() {
    assert!(FieldValue::Null.is_empty());
    assert!(FieldValue::from("").is_empty());
    assert!(!FieldValue::from(" ").is_empty());
    assert!(!FieldValue::Integer(0).is_empty());
    assert!(!FieldValue::Bool(false).is_empty());
}

#[test]
fn display_renders_null_as_none() {
    assert_eq!(FieldValue::Null.to_string(), "None");
    assert_eq!(FieldValue::Integer(2006).to_string(), "2006");
    assert_eq!(FieldValue::from("Game A").to_string(), "Game A");
}

#[test]
fn deserializes_plain_scalars() {
    let value: Fields =
        serde_yaml_ng::from_str("a: 1\nb: 1.5\nc: text\nd: true\ne: null\n").unwrap();

    assert_eq!(value["a"], FieldValue::Integer(1));
    assert_eq!(value["b"], FieldValue::Float(1.5));
    assert_eq!(value["c"], FieldValue::from("text"));
    assert_eq!(value["d"], FieldValue::Bool(true));
    assert_eq!(value["e"], FieldValue::Null);
}

#[test]
fn nan_equals_itself() {
    let parsed: Fields = serde_yaml_ng::from_str("release_date: .nan\n").unwrap();

    assert_eq!(parsed["release_date"], FieldValue::Float(f64::NAN));
    assert_ne!(FieldValue::Float(f64::NAN), FieldValue::Float(1.0));
    assert_ne!(FieldValue::Float(1.0), FieldValue::Integer(1));
}

#[test]
fn field_treats_absent_as_null() {
    let f = fields(&[("title", "Game A".into())]);
    assert_eq!(field(&f, "genre"), &FieldValue::Null);
    assert_eq!(field(&f, "title"), &FieldValue::from("Game A"));
}

// --- ImportTask / ImportCandidate ---

#[test]
fn task_identity_ignores_empty_path() {
    assert_eq!(
        make_task("Game A", "steam://1").identity().as_deref(),
        Some("steam://1")
    );
    assert_eq!(task_with(&[("path", "".into())]).identity(), None);
    assert_eq!(task_with(&[("title", "Game A".into())]).identity(), None);
}

#[test]
fn task_title_requires_non_empty_text() {
    assert_eq!(make_task("Game A", "x").title(), Some("Game A"));
    assert_eq!(task_with(&[("title", "".into())]).title(), None);
    assert_eq!(task_with(&[("title", FieldValue::Integer(7))]).title(), None);
}

#[test]
fn base_candidate_copies_task() {
    let mut task = make_task("Game A", "steam://1");
    task.achievements = Some(Vec::new());

    let base = ImportCandidate::base(&task);

    assert!(base.is_base());
    assert_eq!(base.source, BASE_SOURCE);
    assert_eq!(base.fields, task.fields);
    assert_eq!(base.achievements, task.achievements);
}

#[test]
fn task_drops_nested_values_when_deserialized() {
    let task: ImportTask = serde_yaml_ng::from_str(
        "title: Game A\npath: steam://1\ntags: [rpg, indie]\nstore:\n  name: gog\nachievements:\n  - api_name: WIN\n",
    )
    .unwrap();

    assert_eq!(
        task.fields,
        fields(&[("title", "Game A".into()), ("path", "steam://1".into())])
    );
    assert_eq!(task.achievements.as_ref().map(Vec::len), Some(1));
}

// --- Game ---

#[test]
fn schema_fields_list_every_schema_field() {
    let game = Game {
        id: 1,
        fields: fields(&[("title", "Game A".into()), ("genre", "RPG".into())]),
        ..Default::default()
    };

    let schema = game.schema_fields();

    assert_eq!(schema.len(), GAME_FIELDS.len());
    assert_eq!(schema["genre"], FieldValue::from("RPG"));
    assert_eq!(schema["platform"], FieldValue::Null);
}

// --- Errors ---

#[test]
fn item_scoped_errors_are_not_fatal() {
    assert!(!CatalogError::MissingTitle.is_fatal());
    assert!(!CatalogError::GameNotFound(1).is_fatal());
    assert!(!CatalogError::source_failure("meta", "timeout").is_fatal());
    assert!(!CatalogError::from(EditError::NotAList).is_fatal());
}

#[test]
fn configuration_and_io_errors_are_fatal() {
    assert!(CatalogError::NoSources.is_fatal());
    assert!(CatalogError::InvalidConfig("x".to_string()).is_fatal());
    assert!(CatalogError::Terminal(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "eof"
    ))
    .is_fatal());
}

#[test]
fn source_failure_message_names_the_source() {
    assert_eq!(
        CatalogError::source_failure("meta", "timeout").to_string(),
        "meta failed: timeout"
    );
}
