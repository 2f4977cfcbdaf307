// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-occurrence override patches: minimal diffs layered over the master
//! event, or an exclusion marker.
//!
//! Patch paths are `/`-delimited with `~0`/`~1` escaping for `~` and `/`
//! in property names, in the style of JSON pointers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::event::MasterEvent;
use crate::occurrence::{OccurrenceId, original_value};

/// Composite properties whose nested structure may be patched field by
/// field. Every other property is overridden as a whole value.
pub(crate) const PATCHABLE_PROPERTIES: &[&str] = &["participants", "links"];

/// A set of path-addressed patches for one occurrence. A `None` value
/// deletes the addressed field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    entries: BTreeMap<String, Option<Value>>,
}

impl PatchSet {
    /// Whether the set contains no patches.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of patched paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over `(path, value)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries
            .iter()
            .map(|(path, value)| (path.as_str(), value.as_ref()))
    }

    /// Whether any patch addresses `base` or a path beneath it.
    pub fn affects(&self, base: &str) -> bool {
        self.entries
            .keys()
            .any(|path| path == base || is_under(base, path))
    }

    pub(crate) fn set(&mut self, path: String, value: Option<Value>) {
        self.entries.insert(path, value);
    }

    /// Removes every patch at or beneath `base`.
    pub(crate) fn clear_under(&mut self, base: &str) {
        self.entries
            .retain(|path, _| path != base && !is_under(base, path));
    }

    /// The patches at or beneath `base`, with `base` stripped from the
    /// returned paths.
    pub(crate) fn entries_under<'a>(
        &'a self,
        base: &'a str,
    ) -> impl Iterator<Item = (&'a str, Option<&'a Value>)> {
        self.entries.iter().filter_map(move |(path, value)| {
            if path == base {
                Some(("", value.as_ref()))
            } else if is_under(base, path) {
                Some((&path[base.len() + 1..], value.as_ref()))
            } else {
                None
            }
        })
    }
}

fn is_under(base: &str, path: &str) -> bool {
    path.len() > base.len() && path.starts_with(base) && path.as_bytes()[base.len()] == b'/'
}

/// The override state of one occurrence. Exclusion and modification are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideEntry {
    /// The occurrence is removed from the series.
    Excluded,
    /// The occurrence diverges from the master by these patches.
    Patched(PatchSet),
}

/// Copy-on-write map from occurrence id to its override entry.
///
/// Cloning is cheap; readers snapshot the map at the start of a resolution
/// and a concurrent edit replaces the shared state instead of mutating it.
#[derive(Debug, Clone, Default)]
pub struct OverrideMap {
    entries: Arc<BTreeMap<OccurrenceId, OverrideEntry>>,
}

impl OverrideMap {
    /// The entry for `id`, if any.
    pub fn entry(&self, id: OccurrenceId) -> Option<&OverrideEntry> {
        self.entries.get(&id)
    }

    /// Whether `id` is excluded from the series.
    pub fn is_excluded(&self, id: OccurrenceId) -> bool {
        matches!(self.entries.get(&id), Some(OverrideEntry::Excluded))
    }

    /// Iterates over entries in occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = (OccurrenceId, &OverrideEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// The number of overridden occurrences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no occurrence is overridden.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces any existing entry with an exclusion marker.
    pub(crate) fn exclude(&mut self, id: OccurrenceId) {
        Arc::make_mut(&mut self.entries).insert(id, OverrideEntry::Excluded);
    }

    pub(crate) fn remove(&mut self, id: OccurrenceId) {
        Arc::make_mut(&mut self.entries).remove(&id);
    }

    pub(crate) fn insert(&mut self, id: OccurrenceId, entry: OverrideEntry) {
        Arc::make_mut(&mut self.entries).insert(id, entry);
    }
}

/// Escapes a property name for use as a path token.
pub fn escape_token(name: &str) -> String {
    name.replace('~', "~0").replace('/', "~1")
}

/// Reverses [`escape_token`].
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn join_path(base: &str, token: &str) -> String {
    if base.is_empty() {
        token.to_string()
    } else {
        format!("{base}/{token}")
    }
}

fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').map(unescape_token).collect()
}

/// Computes the minimal patch set that turns `original` into `modified`.
///
/// When `recurse` is set the diff descends into objects and equal-length
/// arrays, producing one entry per changed leaf; otherwise a single
/// whole-value entry is recorded at `base_path`. Diffing against an
/// already-patched nested value is not supported: patches always describe
/// the distance from the master's value.
pub fn compute_diff(
    original: Option<&Value>,
    modified: Option<&Value>,
    base_path: &str,
    recurse: bool,
) -> BTreeMap<String, Option<Value>> {
    let mut out = BTreeMap::new();
    diff_into(&mut out, original, modified, base_path, recurse);
    out
}

fn diff_into(
    out: &mut BTreeMap<String, Option<Value>>,
    original: Option<&Value>,
    modified: Option<&Value>,
    path: &str,
    recurse: bool,
) {
    match (original, modified) {
        (None, None) => {}
        (Some(original), Some(modified)) if original == modified => {}
        (Some(Value::Object(original)), Some(Value::Object(modified))) if recurse => {
            for key in original.keys() {
                diff_into(
                    out,
                    original.get(key),
                    modified.get(key),
                    &join_path(path, &escape_token(key)),
                    true,
                );
            }
            for key in modified.keys().filter(|key| !original.contains_key(*key)) {
                diff_into(
                    out,
                    None,
                    modified.get(key),
                    &join_path(path, &escape_token(key)),
                    true,
                );
            }
        }
        (Some(Value::Array(original)), Some(Value::Array(modified)))
            if recurse && original.len() == modified.len() =>
        {
            for (index, (a, b)) in original.iter().zip(modified).enumerate() {
                diff_into(out, Some(a), Some(b), &join_path(path, &index.to_string()), true);
            }
        }
        (_, Some(modified)) => {
            out.insert(path.to_string(), Some(modified.clone()));
        }
        (Some(_), None) => {
            out.insert(path.to_string(), None);
        }
    }
}

/// Deep-sets (or deletes, for `None`) the field addressed by `relative`
/// inside a clone of `base`. An empty path replaces the whole value.
pub fn apply_patch(
    base: Option<Value>,
    relative: &str,
    patch: Option<&Value>,
) -> Option<Value> {
    if relative.is_empty() {
        return patch.cloned();
    }
    let mut root = base.unwrap_or(Value::Null);
    set_at_path(&mut root, &split_path(relative), patch);
    Some(root)
}

fn set_at_path(target: &mut Value, tokens: &[String], patch: Option<&Value>) {
    let Some((token, rest)) = tokens.split_first() else {
        return;
    };
    if rest.is_empty() {
        match target {
            Value::Object(map) => match patch {
                Some(value) => {
                    map.insert(token.clone(), value.clone());
                }
                None => {
                    map.remove(token);
                }
            },
            Value::Array(items) => {
                if let Ok(index) = token.parse::<usize>() {
                    match patch {
                        Some(value) if index < items.len() => items[index] = value.clone(),
                        None if index < items.len() => {
                            items.remove(index);
                        }
                        _ => {}
                    }
                }
            }
            other => {
                // Patching into a scalar turns it into an object.
                let mut map = serde_json::Map::new();
                if let Some(value) = patch {
                    map.insert(token.clone(), value.clone());
                }
                *other = Value::Object(map);
            }
        }
        return;
    }
    match target {
        Value::Object(map) => {
            let child = map.entry(token.clone()).or_insert(Value::Null);
            set_at_path(child, rest, patch);
        }
        Value::Array(items) => {
            if let Ok(index) = token.parse::<usize>() {
                if let Some(child) = items.get_mut(index) {
                    set_at_path(child, rest, patch);
                }
            }
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert(token.clone(), Value::Null);
            *other = Value::Object(map);
            set_at_path(other, tokens, patch);
        }
    }
}

/// Stores the diff between the occurrence's original value for `property`
/// and `value` under `id`, replacing any earlier patches for the same
/// property. An empty diff removes the per-occurrence entry entirely when
/// the occurrence's generation date still matches the rule.
pub(crate) fn set_occurrence_property(
    master: &mut MasterEvent,
    id: OccurrenceId,
    property: &str,
    value: Option<&Value>,
) {
    let original = original_value(master, id, property);
    let base = escape_token(property);
    let recurse = PATCHABLE_PROPERTIES.contains(&property);
    let diff = compute_diff(original.as_ref(), value, &base, recurse);

    let excluded = master.overrides().is_excluded(id);
    if excluded && diff.is_empty() {
        // A no-op modification must not lift an exclusion.
        return;
    }
    let mut patch = match master.overrides().entry(id) {
        Some(OverrideEntry::Patched(patch)) => patch.clone(),
        // A real modification of an excluded occurrence replaces the marker.
        Some(OverrideEntry::Excluded) | None => PatchSet::default(),
    };
    patch.clear_under(&base);
    for (path, patched) in diff {
        patch.set(path, patched);
    }

    if patch.is_empty() && occurrence_matches_rule(master, id) {
        tracing::debug!(occurrence = %id, "override became empty, removing entry");
        master.overrides_mut().remove(id);
    } else {
        master.overrides_mut().insert(id, OverrideEntry::Patched(patch));
    }
}

fn occurrence_matches_rule(master: &MasterEvent, id: OccurrenceId) -> bool {
    let Some(rule) = master.rule() else {
        return id.timestamp() == master.start();
    };
    let civil = id
        .timestamp()
        .to_zoned(master.resolved_time_zone())
        .datetime();
    rule.generates(master.civil_start(), civil)
}
