//! Ordered catalog of nudge rules.
//!
//! Declaration order matters: it is the tie-break order when two triggered
//! rules share a priority. Catalogs can be built in code, taken from
//! [`Catalog::builtin`], or loaded from a TOML file of `[[rules]]` tables.

mod builtin;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::rules::{NudgeRule, RepeatKey, Trigger};

/// Validated, ordered set of rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    rules: Vec<NudgeRule>,
}

/// Wrapper for serializing catalogs to TOML
#[derive(Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    rules: Vec<NudgeRule>,
}

impl Catalog {
    /// Build a catalog, rejecting empty or duplicate ids and zero-sized
    /// buckets.
    pub fn new(rules: Vec<NudgeRule>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(ValidationError::EmptyId { index });
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(ValidationError::DuplicateId(rule.id.clone()));
            }
            validate_trigger(&rule.id, &rule.trigger)?;
            validate_repeat_key(&rule.id, rule.repeat_key.as_ref())?;
        }
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The catalog shipped with the chat app.
    pub fn builtin() -> Self {
        Self {
            rules: builtin::builtin_rules(),
        }
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::new(file.rules)?)
    }

    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML. Fails if any rule uses an in-process closure.
    pub fn to_toml_string(&self) -> Result<String> {
        if let Some(rule) = self.rules.iter().find(|r| !r.is_serializable()) {
            return Err(ValidationError::InvalidValue {
                rule: rule.id.clone(),
                field: "trigger".to_string(),
                message: "closure triggers and repeat keys cannot be exported".to_string(),
            }
            .into());
        }
        let file = CatalogFile {
            rules: self.rules.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    pub fn get(&self, id: &str) -> Option<&NudgeRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NudgeRule> {
        self.rules.iter()
    }

    pub fn rules(&self) -> &[NudgeRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate_trigger(rule: &str, trigger: &Trigger) -> Result<(), ValidationError> {
    match trigger {
        Trigger::MessageCountEvery { every: 0 } | Trigger::SessionWindow { every: 0, .. } => Err(ValidationError::InvalidValue {
            rule: rule.to_string(),
            field: "trigger.every".to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Trigger::All { of } | Trigger::Any { of } => {
            of.iter().try_for_each(|t| validate_trigger(rule, t))
        }
        Trigger::Not { trigger } => validate_trigger(rule, trigger),
        _ => Ok(()),
    }
}

fn validate_repeat_key(rule: &str, key: Option<&RepeatKey>) -> Result<(), ValidationError> {
    let zero_field = match key {
        Some(RepeatKey::IdleBucket { minutes: 0 }) | Some(RepeatKey::SessionBucket { minutes: 0 }) => {
            Some("repeat_key.minutes")
        }
        Some(RepeatKey::MessageBucket { every: 0 }) => Some("repeat_key.every"),
        _ => None,
    };
    match zero_field {
        Some(field) => Err(ValidationError::InvalidValue {
            rule: rule.to_string(),
            field: field.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        None => Ok(()),
    }
}
