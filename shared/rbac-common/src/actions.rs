//! Action vocabulary.
//!
//! Module catalogs and grants both store their actions as a single
//! `;`-delimited string (`"read;update;create"`). Tokens are compared
//! case-insensitively, so parsing lower-cases the whole input before
//! splitting.

use std::collections::BTreeSet;

/// Separator between action tokens in stored and submitted action lists.
pub const ACTION_DELIMITER: char = ';';

/// Split a delimited action list into lower-cased tokens.
///
/// Order is preserved and duplicates are kept. An empty input yields a
/// single empty token, callers that care must filter it themselves.
pub fn parse_actions(actions: &str) -> Vec<String> {
    actions
        .to_lowercase()
        .split(ACTION_DELIMITER)
        .map(str::to_owned)
        .collect()
}

/// Join tokens back into the stored form.
pub fn join_actions<I, S>(actions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let separator = ACTION_DELIMITER.to_string();
    actions
        .into_iter()
        .map(|a| a.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

/// Parsed action catalog used for membership checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet(BTreeSet<String>);

impl ActionSet {
    /// Parse a delimited action list into a set.
    pub fn parse(actions: &str) -> Self {
        Self(parse_actions(actions).into_iter().collect())
    }

    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// First requested token that is not part of this set.
    pub fn first_missing<'a>(&self, requested: &'a [String]) -> Option<&'a str> {
        requested
            .iter()
            .map(String::as_str)
            .find(|action| !self.contains(action))
    }

    /// Requested tokens that are also in this set, in request order.
    ///
    /// Empty tokens never survive.
    pub fn intersect<'a>(&'a self, requested: &'a [String]) -> impl Iterator<Item = &'a str> {
        requested
            .iter()
            .map(String::as_str)
            .filter(move |action| !action.is_empty() && self.contains(action))
    }
}
