//! Relabeling rules for the flat projection
//!
//! Rules are compiled once from configuration and attached to messages
//! as shared state. At flatten time each produced key is checked against
//! the rules in order; the first match wins. `Rename` rewrites the key
//! through the pattern's replacement string (capture groups allowed),
//! `Remove` drops the key.

use regex::Regex;

use crate::{ProtocolError, Result};

/// What a matching rule does to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelabelAction {
    /// Rewrite the key using the replacement string
    Rename,
    /// Drop the key from the projection
    Remove,
}

/// One compiled relabeling rule
#[derive(Debug, Clone)]
pub struct RelabelRule {
    pub regex: Regex,
    pub replacement: String,
    pub action: RelabelAction,
}

impl PartialEq for RelabelRule {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str()
            && self.replacement == other.replacement
            && self.action == other.action
    }
}

impl Eq for RelabelRule {}

impl RelabelRule {
    /// Compile a rename rule
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not compile or the replacement is
    /// empty (a rename to nothing is a removal, and must be declared as
    /// one).
    pub fn rename(pattern: &str, replacement: &str) -> Result<Self> {
        if replacement.is_empty() {
            return Err(ProtocolError::EmptyReplacement {
                pattern: pattern.to_string(),
            });
        }
        Ok(Self {
            regex: compile(pattern)?,
            replacement: replacement.to_string(),
            action: RelabelAction::Rename,
        })
    }

    /// Compile a remove rule
    pub fn remove(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: compile(pattern)?,
            replacement: String::new(),
            action: RelabelAction::Remove,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ProtocolError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// An ordered, compiled rule set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelabelRules {
    pub rules: Vec<RelabelRule>,
}

impl RelabelRules {
    pub fn new(rules: Vec<RelabelRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the rules to one key
    ///
    /// Returns `Some(key)` with the (possibly rewritten) key to keep, or
    /// `None` when a remove rule matched. The first matching rule wins.
    ///
    /// # Errors
    ///
    /// Fails when a rename resolves to an empty key (possible when the
    /// replacement is built entirely from capture groups).
    pub fn apply(&self, key: &str) -> Result<Option<String>> {
        for rule in &self.rules {
            if rule.regex.is_match(key) {
                return match rule.action {
                    RelabelAction::Remove => Ok(None),
                    RelabelAction::Rename => {
                        let rewritten =
                            rule.regex.replace(key, rule.replacement.as_str()).into_owned();
                        if rewritten.is_empty() {
                            Err(ProtocolError::EmptyKey {
                                original: key.to_string(),
                            })
                        } else {
                            Ok(Some(rewritten))
                        }
                    }
                };
            }
        }
        Ok(Some(key.to_string()))
    }
}
