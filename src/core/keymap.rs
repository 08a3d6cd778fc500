// src/core/keymap.rs

use crate::core::menu::{AlternativeKey, Item};
use std::collections::HashSet;

/// A deterministic mapping of single-character keys to item indices.
///
/// Rebuilt on every render rather than cached: item conditions may have
/// changed which items are visible since the last keypress.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    /// `(key, item index)` pairs in assignment order. Keys are unique under
    /// case-insensitive comparison; an item may own more than one key when an
    /// explicit alternative key doubles as an alias.
    entries: Vec<(char, usize)>,
}

impl KeyMap {
    /// Case-insensitive lookup of the item bound to `key`.
    pub fn lookup(&self, key: char) -> Option<usize> {
        self.entries
            .iter()
            .find(|(k, _)| fold(*k) == fold(key))
            .map(|(_, idx)| *idx)
    }

    /// The display key for an item: the first key assigned to it.
    pub fn key_for(&self, index: usize) -> Option<char> {
        self.entries
            .iter()
            .find(|(_, idx)| *idx == index)
            .map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(char, usize)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold(key: char) -> char {
    key.to_lowercase().next().unwrap_or(key)
}

/// Assigns single-character keys to items.
///
/// Primary pass: every item claims its preferred key (the explicit `key`, or
/// the lowercased first character of its label). Explicit keys are honored
/// before derived ones so an explicit key always wins a collision against a
/// derived one; among equals the first claimer in input order wins and later
/// items are deferred.
///
/// Fallback pass, over deferred items in input order: an explicit alternative
/// key is tried first; failing that the item's own label is scanned from its
/// second character (case preserved, uniqueness checked case-insensitively);
/// failing that the alphabet `a..=z`. Items with a disabled alternative key
/// get no fallback. An item the alphabet cannot accommodate stays keyless and
/// unreachable, which is an accepted degraded state.
///
/// Items that kept their preferred key but carry an explicit alternative also
/// claim that alternative as an alias when it is still unused; an
/// already-keyed item never enters the label/alphabet scan.
pub fn assign(items: &[&Item]) -> KeyMap {
    let mut entries: Vec<(char, usize)> = Vec::new();
    let mut claimed: HashSet<char> = HashSet::new();
    let mut unassigned: HashSet<usize> = HashSet::new();

    let mut claim = |claimed: &mut HashSet<char>, entries: &mut Vec<(char, usize)>, key: char, idx: usize| -> bool {
        if claimed.insert(fold(key)) {
            entries.push((key, idx));
            true
        } else {
            false
        }
    };

    // Primary pass, explicit keys first.
    for (idx, item) in items.iter().enumerate() {
        if let Some(key) = item.base().key
            && !claim(&mut claimed, &mut entries, key, idx)
        {
            unassigned.insert(idx);
        }
    }
    for (idx, item) in items.iter().enumerate() {
        if item.base().key.is_some() {
            continue;
        }
        let assigned = item
            .label()
            .chars()
            .next()
            .map(fold)
            .is_some_and(|key| claim(&mut claimed, &mut entries, key, idx));
        if !assigned {
            unassigned.insert(idx);
        }
    }

    // Fallback pass in input order.
    for (idx, item) in items.iter().enumerate() {
        let deferred = unassigned.contains(&idx);
        let alternative = item.base().alternative_key.clone();

        if !deferred {
            // Alias claim only; the item already has its key.
            if let AlternativeKey::Explicit(alt) = alternative {
                claim(&mut claimed, &mut entries, alt, idx);
            }
            continue;
        }
        if alternative == AlternativeKey::Disabled {
            continue;
        }
        if let AlternativeKey::Explicit(alt) = alternative
            && claim(&mut claimed, &mut entries, alt, idx)
        {
            continue;
        }
        let from_label = item
            .label()
            .chars()
            .skip(1)
            .filter(|c| !c.is_whitespace())
            .find(|&c| claim(&mut claimed, &mut entries, c, idx));
        if from_label.is_none() {
            let _ = ('a'..='z').find(|&c| claim(&mut claimed, &mut entries, c, idx));
        }
    }

    KeyMap { entries }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::menu::Action;

    fn items(actions: &[Action]) -> Vec<Item> {
        actions.iter().map(|a| Item::Action(a.clone())).collect()
    }

    fn refs(owned: &[Item]) -> Vec<&Item> {
        owned.iter().collect()
    }

    #[test]
    fn test_first_letter_assignment() {
        let owned = items(&[Action::new("Build"), Action::new("Test")]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('b'), Some(0));
        assert_eq!(map.lookup('t'), Some(1));
    }

    #[test]
    fn test_duplicate_first_letter_falls_back_to_label() {
        // Two items named "Build": one gets `b`, the other a distinct key
        // from its own label.
        let owned = items(&[Action::new("Build"), Action::new("Build")]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('b'), Some(0));
        assert_eq!(map.lookup('u'), Some(1));
    }

    #[test]
    fn test_explicit_key_wins_collision_against_derived() {
        // "Launch" would derive `l`, but the later item's explicit `l` wins.
        let owned = items(&[Action::new("Launch"), Action::new("Logs").key('l')]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('l'), Some(1));
        // "Launch" falls back to its second label character.
        assert_eq!(map.lookup('a'), Some(0));
    }

    #[test]
    fn test_alphabet_fallback_when_label_is_exhausted() {
        let owned = items(&[
            Action::new("ab"),
            Action::new("ab"),
            // Label only offers `a` and `b`, both taken; first free letter is `c`.
            Action::new("ab"),
        ]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('a'), Some(0));
        assert_eq!(map.lookup('b'), Some(1));
        assert_eq!(map.lookup('c'), Some(2));
    }

    #[test]
    fn test_disabled_alternative_key_gets_no_fallback() {
        let owned = items(&[
            Action::new("Build"),
            Action::new("Build").alternative_key(crate::core::menu::AlternativeKey::Disabled),
        ]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('b'), Some(0));
        assert_eq!(map.len(), 1);
        assert_eq!(map.key_for(1), None);
    }

    #[test]
    fn test_explicit_alternative_tried_first_on_collision() {
        let owned = items(&[
            Action::new("Deploy"),
            Action::new("Destroy").alternative_key(crate::core::menu::AlternativeKey::Explicit('x')),
        ]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('d'), Some(0));
        assert_eq!(map.lookup('x'), Some(1));
    }

    #[test]
    fn test_no_two_items_share_a_key() {
        let owned = items(&[
            Action::new("alpha"),
            Action::new("alpha"),
            Action::new("alpha"),
            Action::new("Apple").key('a'),
        ]);
        let map = assign(&refs(&owned));
        let mut seen = std::collections::HashSet::new();
        for (key, _) in map.iter() {
            assert!(seen.insert(key.to_ascii_lowercase()), "key '{key}' assigned twice");
        }
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let owned = items(&[
            Action::new("Build"),
            Action::new("Build"),
            Action::new("Bench").key('e'),
        ]);
        let item_refs = refs(&owned);
        let first: Vec<_> = assign(&item_refs).iter().cloned().collect();
        let second: Vec<_> = assign(&item_refs).iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_case_insensitive_claims_preserve_case() {
        // Second "Redo" scans its label: `e` and `d` are free... `e` claimed
        // first; third falls back further, comparing case-insensitively.
        let owned = items(&[Action::new("Redo"), Action::new("REDO")]);
        let map = assign(&refs(&owned));
        assert_eq!(map.lookup('r'), Some(0));
        // The fallback claim keeps the label's own case.
        assert_eq!(map.key_for(1), Some('E'));
        assert_eq!(map.lookup('e'), Some(1));
    }
}
