use crate::types::{field, Fields, FieldValue};

/// Restrict a field set to `allowed`, dropping every unrecognized key.
///
/// Unknown keys are filtered, never rejected: untrusted candidate data can
/// not introduce new columns.
pub fn sanitize(fields: &Fields, allowed: &[&str]) -> Fields {
    fields
        .iter()
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Fields from `names` where `before` and `after` disagree, mapped to the `after` value.
///
/// An absent key compares equal to `Null`. Values are compared as opaque
/// scalars: `Integer(2006)` and `Text("2006")` differ.
pub fn diff(before: &Fields, after: &Fields, names: &[&str]) -> Fields {
    names
        .iter()
        .filter(|name| field(before, name) != field(after, name))
        .map(|name| (name.to_string(), field(after, name).clone()))
        .collect()
}

/// Non-empty values of `fields`, skipping the `exclude` keys.
pub fn non_empty_updates(fields: &Fields, exclude: &[&str]) -> Fields {
    fields
        .iter()
        .filter(|(key, value)| !exclude.contains(&key.as_str()) && !value.is_empty())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Overlay `incoming` on `base`: a value replaces the base value only when it is non-empty.
pub fn overlay_non_empty(base: &Fields, incoming: &Fields, exclude: &[&str]) -> Fields {
    let mut merged = base.clone();
    merged.extend(non_empty_updates(incoming, exclude));
    merged
}

/// One `field: old -> new` line per differing field, in `names` order.
pub fn describe_changes(before: &Fields, after: &Fields, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| {
            let old = field(before, name);
            let new = field(after, name);
            (old != new).then(|| format!("{}: {} -> {}", name, old, new))
        })
        .collect()
}

/// `title - platform - release_date`, skipping empty parts.
pub fn summarize(fields: &Fields) -> String {
    ["title", "platform", "release_date"]
        .iter()
        .map(|name| field(fields, name))
        .filter(|value| !value.is_empty())
        .map(FieldValue::to_string)
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Render non-null fields as indented `key: value` lines.
pub fn render_fields(fields: &Fields, indent: &str) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| **value != FieldValue::Null)
        .map(|(key, value)| format!("{}{}: {}", indent, key, value))
        .collect()
}
