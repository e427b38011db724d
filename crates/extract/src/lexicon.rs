use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::nlp::{EntityLabel, normalize_entity_label};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub label: EntityLabel,
    pub identifier: Option<String>,
}

/// Dictionary of trait and gene terms for the rule-based recognizer.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    /// Maps normalized term -> entry
    terms: HashMap<String, LexiconEntry>,
    max_words: usize,
}

fn punctuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.,!?;:']").unwrap())
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a term: lowercase, drop punctuation, collapse whitespace
    pub fn normalize(name: &str) -> String {
        let lowered = name.to_lowercase();
        let stripped = punctuation_regex().replace_all(lowered.trim(), "");
        whitespace_regex().replace_all(stripped.trim(), " ").to_string()
    }

    pub fn insert(&mut self, term: &str, label: EntityLabel, identifier: Option<&str>) {
        let normalized = Self::normalize(term);
        if normalized.is_empty() {
            return;
        }
        self.max_words = self.max_words.max(normalized.split(' ').count());
        self.terms.insert(
            normalized,
            LexiconEntry {
                label,
                identifier: identifier.map(str::to_string),
            },
        );
    }

    pub fn get(&self, phrase: &str) -> Option<&LexiconEntry> {
        self.terms.get(&Self::normalize(phrase))
    }

    /// Longest term in words; bounds the recognizer's match window.
    pub fn max_words(&self) -> usize {
        self.max_words
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Load `term<TAB>label[<TAB>identifier]` lines; `#` starts a comment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut lexicon = Self::new();
        lexicon.extend_from_file(path)?;
        Ok(lexicon)
    }

    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lexicon: {:?}", path))?;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let term = fields.next().unwrap_or_default();
            let label = fields
                .next()
                .with_context(|| format!("{:?} line {}: missing label column", path, line_no + 1))?;
            let identifier = fields.next().filter(|s| !s.is_empty());
            self.insert(term, normalize_entity_label(label), identifier);
        }

        tracing::debug!(path = ?path, terms = self.len(), "Loaded lexicon");
        Ok(())
    }
}
