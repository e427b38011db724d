use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::nlp::{Entity, NlpEngine, ParsedText, Token};

/// Replays parses produced upstream, keyed by the exact passage text.
///
/// Text without a stored parse (table cells, captions) goes to the fallback engine.
pub struct PreparsedEngine {
    parses: HashMap<String, ParsedText>,
    fallback: Arc<dyn NlpEngine>,
}

impl PreparsedEngine {
    pub fn new(fallback: Arc<dyn NlpEngine>) -> Self {
        Self {
            parses: HashMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, mut parsed: ParsedText) -> Result<()> {
        parsed
            .link()
            .with_context(|| format!("Invalid pre-parsed payload for {:?}", preview(&parsed.text)))?;
        self.parses.insert(parsed.text.clone(), parsed);
        Ok(())
    }

    /// Accepts a serialized [`ParsedText`] (e.g. a passage's `parse` infon).
    pub fn insert_json(&mut self, value: &serde_json::Value) -> Result<()> {
        let parsed: ParsedText =
            serde_json::from_value(value.clone()).context("Failed to parse pre-parsed payload")?;
        self.insert(parsed)
    }

    pub fn len(&self) -> usize {
        self.parses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parses.is_empty()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

impl NlpEngine for PreparsedEngine {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        match self.parses.get(text) {
            Some(parsed) => parsed.tokens.clone(),
            None => self.fallback.tokenize(text),
        }
    }

    fn tag(&self, tokens: &mut [Token]) {
        self.fallback.tag(tokens)
    }

    fn parse(&self, tokens: &mut [Token]) {
        self.fallback.parse(tokens)
    }

    fn recognize_entities(&self, text: &str, tokens: &[Token]) -> Vec<Entity> {
        match self.parses.get(text) {
            Some(parsed) => parsed.entities.clone(),
            None => self.fallback.recognize_entities(text, tokens),
        }
    }

    fn analyze(&self, text: &str) -> Result<ParsedText> {
        match self.parses.get(text) {
            Some(parsed) => Ok(parsed.clone()),
            None => self.fallback.analyze(text),
        }
    }
}
