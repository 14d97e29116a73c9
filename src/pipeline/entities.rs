//! Bilingual named-entity recognition for the entity-assisted strategy.
//!
//! The production recognizer combines a lexicon of analyte surface forms
//! with Cyrillic/Latin morphological cues. It is deliberately recall-biased:
//! candidates are only promoted to measurements after they match a biomarker
//! pattern in the extraction engine.
//!
//! The recognizer is optional at the engine level. A missing lexicon file is
//! startup-fatal for this component only — the engine runs line-pattern
//! extraction alone when no recognizer is installed.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PipelineError;

/// Rough entity category, in the spirit of general-purpose NER labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityCategory {
    /// Lexicon hit or chemical-suffix noun ("креатинин", "creatinine").
    Chemical,
    /// Uppercase short form ("АЛТ", "LDL-C", "TSH").
    Abbreviation,
}

/// One candidate analyte mention.
///
/// `token_index` refers to the whitespace tokenization of the full document
/// text — the same token space the extraction engine searches for values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub token_index: usize,
    pub token_len: usize,
    pub category: EntityCategory,
}

/// Named-entity recognizer abstraction. Implementations must be safe for
/// concurrent read-only use after construction.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Vec<Entity>;
}

/// Lexicon- and morphology-based bilingual recognizer.
#[derive(Debug)]
pub struct LexiconEntityRecognizer {
    terms: HashSet<String>,
}

/// Strip leading/trailing punctuation, keep inner dashes ("LDL-C:").
fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Uppercase short form: 2–6 chars, at least one letter, no lowercase.
fn is_abbreviation(token: &str) -> bool {
    let n = token.chars().count();
    if !(2..=6).contains(&n) {
        return false;
    }
    let mut has_letter = false;
    for c in token.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_alphabetic() {
            has_letter = true;
        } else if !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }
    has_letter
}

/// Chemical-like noun by suffix, both languages. Length floor keeps common
/// short words ("ол", "ase") from qualifying on their own.
fn has_chemical_suffix(lower: &str) -> bool {
    const SUFFIXES: &[&str] = &[
        "ин", "аза", "оза", "ол", "ид", "ase", "ose", "ine", "ol", "in",
    ];
    lower.chars().count() >= 5 && SUFFIXES.iter().any(|s| lower.ends_with(s))
}

impl LexiconEntityRecognizer {
    /// Recognizer over the lexicon bundled with the crate.
    pub fn bundled() -> Self {
        Self::parse(include_str!("../../resources/analyte_lexicon.txt"))
    }

    /// Recognizer from the configured lexicon: the file named by
    /// `LABEXTRACT_LEXICON` when set, the bundled lexicon otherwise.
    pub fn from_env() -> Result<Self, PipelineError> {
        match crate::config::lexicon_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::bundled()),
        }
    }

    /// Recognizer over an external lexicon file. A missing or unreadable
    /// file disables the entity-assisted strategy at the caller's discretion.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::EntityModel(format!("cannot read lexicon {}: {e}", path.display()))
        })?;
        let recognizer = Self::parse(&content);
        if recognizer.terms.is_empty() {
            return Err(PipelineError::EntityModel(format!(
                "lexicon {} contains no terms",
                path.display()
            )));
        }
        Ok(recognizer)
    }

    fn parse(content: &str) -> Self {
        let terms: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        debug!(terms = terms.len(), "analyte lexicon loaded");
        Self { terms }
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

impl EntityRecognizer for LexiconEntityRecognizer {
    fn recognize(&self, text: &str) -> Vec<Entity> {
        let raw: Vec<&str> = text.split_whitespace().collect();
        let cleaned: Vec<String> = raw
            .iter()
            .map(|t| clean_token(t).to_lowercase())
            .collect();

        let mut entities = Vec::new();
        let mut i = 0;
        while i < raw.len() {
            // Bigram lexicon terms first ("total cholesterol", "мочевая кислота")
            if i + 1 < raw.len() {
                let bigram = format!("{} {}", cleaned[i], cleaned[i + 1]);
                if self.terms.contains(&bigram) {
                    entities.push(Entity {
                        text: format!("{} {}", raw[i], raw[i + 1]),
                        token_index: i,
                        token_len: 2,
                        category: EntityCategory::Chemical,
                    });
                    i += 2;
                    continue;
                }
            }

            let token = &cleaned[i];
            if !token.is_empty() {
                if self.terms.contains(token) {
                    entities.push(Entity {
                        text: raw[i].to_string(),
                        token_index: i,
                        token_len: 1,
                        category: EntityCategory::Chemical,
                    });
                } else if is_abbreviation(clean_token(raw[i])) {
                    entities.push(Entity {
                        text: raw[i].to_string(),
                        token_index: i,
                        token_len: 1,
                        category: EntityCategory::Abbreviation,
                    });
                } else if has_chemical_suffix(token) {
                    entities.push(Entity {
                        text: raw[i].to_string(),
                        token_index: i,
                        token_len: 1,
                        category: EntityCategory::Chemical,
                    });
                }
            }
            i += 1;
        }
        entities
    }
}
