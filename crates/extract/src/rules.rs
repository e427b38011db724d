//! Regex and dictionary driven engine used when no external NLP engine is wired in.

use regex::Regex;
use std::sync::OnceLock;

use crate::lexicon::Lexicon;
use crate::nlp::{Entity, EntityLabel, NlpEngine, Token, sentence_ranges};
use crate::pvalue;

const SUBORDINATORS: &[&str] = &[
    "because", "although", "though", "whereas", "while", "since", "unless", "if",
];

const COMPARATORS: &[&str] = &["=", "<", ">", "≤", "≥", ":", "of"];

const P_VALUE_HEADS: &[&str] = &["p", "pvalue", "p-value", "p-val", "pval"];

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"\d+(?:\.\d+)?\s?[×xX*]\s?10\s?\^?\s?[-−–]\s?\d+(?:\(\d\))?",
            r"|\d+(?:\.\d+)?[eE][-−–]?\d+",
            r"|\d+(?:\.\d+)?",
            r"|[\p{L}\p{N}]+(?:['\-][\p{L}\p{N}]+)*",
            r"|\S",
        ))
        .unwrap()
    })
}

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    lexicon: Lexicon,
}

impl RuleEngine {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Longest lexicon term starting at `start`, as (token count, entity).
    fn match_lexicon(&self, text: &str, tokens: &[Token], start: usize) -> Option<(usize, Entity)> {
        if self.lexicon.is_empty() || tokens[start].is_punct() {
            return None;
        }
        // Tokenization may split a dictionary word ("T-cell" vs "T cell"), so allow slack.
        let window = (self.lexicon.max_words() * 2).min(tokens.len() - start);

        for len in (1..=window).rev() {
            let span = &tokens[start..start + len];
            if span[len - 1].is_punct() {
                continue;
            }
            let phrase = span.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
            let Some(entry) = self.lexicon.get(&phrase) else {
                continue;
            };

            let char_start = span[0].char_offset;
            let char_end = span[len - 1].char_offset + span[len - 1].text.chars().count();
            let surface: String = text.chars().skip(char_start).take(char_end - char_start).collect();
            let mut entity = Entity::new(entry.label, &surface, char_start, (start, start + len));
            entity.identifier = entry.identifier.clone();
            return Some((len, entity));
        }
        None
    }

    fn preceded_by_p(tokens: &[Token], idx: usize) -> bool {
        let mut j = idx;
        let mut skipped = 0;
        while j > 0 && skipped < 2 && COMPARATORS.contains(&tokens[j - 1].lowercase_text.as_str()) {
            j -= 1;
            skipped += 1;
        }
        j > 0 && skipped > 0 && P_VALUE_HEADS.contains(&tokens[j - 1].lowercase_text.as_str())
    }
}

impl NlpEngine for RuleEngine {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut byte_pos = 0;
        let mut char_pos = 0;

        for m in token_regex().find_iter(text) {
            char_pos += text[byte_pos..m.start()].chars().count();
            byte_pos = m.start();
            tokens.push(Token::new(tokens.len(), m.as_str(), char_pos));
        }
        tokens
    }

    fn tag(&self, tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            token.pos = if token.text.chars().all(|c| !c.is_alphanumeric()) {
                "PUNCT"
            } else if pvalue::is_integer(&token.text) || pvalue::is_p_value(&token.text) {
                "NUM"
            } else if SUBORDINATORS.contains(&token.lowercase_text.as_str()) {
                "SCONJ"
            } else {
                "X"
            }
            .to_string();
        }
    }

    /// No statistical parser is bundled: each token is attached to its right
    /// neighbour, so dependency distance reduces to token distance.
    fn parse(&self, tokens: &mut [Token]) {
        for (start, end) in sentence_ranges(tokens) {
            for i in start..end {
                if i + 1 < end {
                    tokens[i].head = i + 1;
                    tokens[i].dep = if tokens[i].pos == "SCONJ" { "mark" } else { "dep" }.to_string();
                } else {
                    tokens[i].head = i;
                    tokens[i].dep = "ROOT".to_string();
                }
            }
        }
    }

    fn recognize_entities(&self, text: &str, tokens: &[Token]) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            if let Some((len, entity)) = self.match_lexicon(text, tokens, i) {
                entities.push(entity);
                i += len;
                continue;
            }

            let token = &tokens[i];
            if pvalue::is_rsid_token(&token.text) {
                entities.push(Entity::new(EntityLabel::Marker, &token.text, token.char_offset, (i, i + 1)));
            } else if token.pos == "NUM" && pvalue::is_p_value(&token.text) {
                let scientific = token.text.contains(['×', 'x', 'X', '*', 'e', 'E']);
                if scientific || Self::preceded_by_p(tokens, i) {
                    entities.push(Entity::new(EntityLabel::PValue, &token.text, token.char_offset, (i, i + 1)));
                }
            }
            i += 1;
        }
        entities
    }
}
