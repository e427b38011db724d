//! Token graph adapter: the boundary between an NLP engine and the miners.
//!
//! Engines produce ordered tokens with dependency heads plus entity spans.
//! Everything downstream works on [`ParsedText`] only.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use crate::pvalue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Position in the whole parsed text, not the sentence.
    pub index: usize,
    pub text: String,
    #[serde(default)]
    pub lowercase_text: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default, alias = "dependency_label")]
    pub dep: String,
    /// Head token index; a root points at itself.
    #[serde(alias = "head_index")]
    pub head: usize,
    pub char_offset: usize,
    #[serde(skip)]
    pub children: Vec<usize>,
}

impl Token {
    pub fn new(index: usize, text: &str, char_offset: usize) -> Self {
        Self {
            index,
            text: text.to_string(),
            lowercase_text: text.to_lowercase(),
            pos: String::new(),
            dep: String::new(),
            head: index,
            char_offset,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.head == self.index
    }

    pub fn is_punct(&self) -> bool {
        self.pos == "PUNCT" || self.text.chars().all(|c| c.is_ascii_punctuation())
    }

    /// Marks the start of a subordinate clause (`because`, `although`, ...).
    pub fn is_subordinating(&self) -> bool {
        self.pos == "SCONJ" || self.dep == "mark"
    }
}

/// Normalized entity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Marker,
    PValue,
    Trait,
    Gene,
    Other,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Marker => "RSID",
            EntityLabel::PValue => "PVAL",
            EntityLabel::Trait => "TRAIT",
            EntityLabel::Gene => "GENE",
            EntityLabel::Other => "OTHER",
        }
    }
}

fn get_label_map() -> &'static HashMap<&'static str, EntityLabel> {
    static LABEL_MAP: OnceLock<HashMap<&'static str, EntityLabel>> = OnceLock::new();
    LABEL_MAP.get_or_init(|| {
        let mut m = HashMap::new();

        m.insert("RSID", EntityLabel::Marker);
        m.insert("MARKER", EntityLabel::Marker);
        m.insert("SNP", EntityLabel::Marker);

        m.insert("PVAL", EntityLabel::PValue);
        m.insert("PVALUE", EntityLabel::PValue);
        m.insert("SIGNIFICANCE", EntityLabel::PValue);

        // Phenotype ontologies
        m.insert("TRAIT", EntityLabel::Trait);
        m.insert("PHENOTYPE", EntityLabel::Trait);
        m.insert("DISEASE", EntityLabel::Trait);
        m.insert("MESH", EntityLabel::Trait);
        m.insert("HPO", EntityLabel::Trait);
        m.insert("EFO", EntityLabel::Trait);
        m.insert("MONDO", EntityLabel::Trait);

        m.insert("GENE", EntityLabel::Gene);
        m.insert("GGP", EntityLabel::Gene);

        m
    })
}

/// Map an engine-specific label to an [`EntityLabel`].
///
/// BIO prefixes and ontology suffixes (`MESH_DISEASE`) are tolerated.
pub fn normalize_entity_label(label: &str) -> EntityLabel {
    let upper = label.to_uppercase();
    let clean = upper.trim_start_matches("B-").trim_start_matches("I-");
    let map = get_label_map();
    map.get(clean)
        .or_else(|| clean.split(['_', ':']).next().and_then(|head| map.get(head)))
        .copied()
        .unwrap_or(EntityLabel::Other)
}

/// An entity mention. Offsets are in characters; `token_span` is half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntitySpan", into = "EntitySpan")]
pub struct Entity {
    pub label: EntityLabel,
    pub raw_label: String,
    pub text: String,
    pub start_offset: usize,
    pub length: usize,
    pub token_span: (usize, usize),
    /// Ontology or database identifier, when the engine supplies one.
    pub identifier: Option<String>,
}

/// Wire shape of an entity as engines emit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntitySpan {
    label: String,
    start_token: usize,
    end_token: usize,
    char_start: usize,
    char_end: usize,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
}

impl From<EntitySpan> for Entity {
    fn from(span: EntitySpan) -> Self {
        Entity {
            label: normalize_entity_label(&span.label),
            raw_label: span.label,
            text: span.text,
            start_offset: span.char_start,
            length: span.char_end.saturating_sub(span.char_start),
            token_span: (span.start_token, span.end_token),
            identifier: span.identifier,
        }
    }
}

impl From<Entity> for EntitySpan {
    fn from(entity: Entity) -> Self {
        EntitySpan {
            label: if entity.raw_label.is_empty() {
                entity.label.as_str().to_string()
            } else {
                entity.raw_label
            },
            start_token: entity.token_span.0,
            end_token: entity.token_span.1,
            char_start: entity.start_offset,
            char_end: entity.start_offset + entity.length,
            text: entity.text,
            identifier: entity.identifier,
        }
    }
}

impl Entity {
    pub fn new(label: EntityLabel, text: &str, start_offset: usize, token_span: (usize, usize)) -> Self {
        Self {
            label,
            raw_label: label.as_str().to_string(),
            text: text.to_string(),
            start_offset,
            length: text.chars().count(),
            token_span,
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn tokens(&self) -> Range<usize> {
        self.token_span.0..self.token_span.1
    }
}

/// What role an entity can play in an association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraitClassification {
    pub is_trait: bool,
    pub is_marker: bool,
    pub is_significance: bool,
    pub is_gene: bool,
}

pub fn classify(entity: &Entity) -> TraitClassification {
    let unlabeled = entity.label == EntityLabel::Other;
    TraitClassification {
        is_trait: entity.label == EntityLabel::Trait,
        is_marker: entity.label == EntityLabel::Marker
            || (unlabeled && pvalue::is_rsid_token(&entity.text)),
        is_significance: entity.label == EntityLabel::PValue,
        is_gene: entity.label == EntityLabel::Gene,
    }
}

/// Tokens, sentence boundaries and entities of one passage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedText {
    pub text: String,
    pub tokens: Vec<Token>,
    /// Half-open token ranges.
    #[serde(default)]
    pub sentences: Vec<(usize, usize)>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(skip)]
    classes: Vec<TraitClassification>,
}

impl ParsedText {
    pub fn new(text: &str, tokens: Vec<Token>, entities: Vec<Entity>) -> Result<Self> {
        let mut parsed = Self {
            text: text.to_string(),
            tokens,
            sentences: Vec::new(),
            entities,
            classes: Vec::new(),
        };
        parsed.link()?;
        Ok(parsed)
    }

    /// Validate heads and derive children, sentences and entity classes.
    ///
    /// Must run after deserializing a pre-parsed payload.
    pub fn link(&mut self) -> Result<()> {
        let n = self.tokens.len();
        for (i, token) in self.tokens.iter_mut().enumerate() {
            if token.index != i {
                bail!("token {} is stored at position {}", token.index, i);
            }
            if token.head >= n {
                bail!("token {} has head {} outside {} tokens", i, token.head, n);
            }
            if token.lowercase_text.is_empty() {
                token.lowercase_text = token.text.to_lowercase();
            }
            token.children.clear();
        }
        for i in 0..n {
            let head = self.tokens[i].head;
            if head != i {
                self.tokens[head].children.push(i);
            }
        }

        for entity in &self.entities {
            let (start, end) = entity.token_span;
            if start >= end || end > n {
                bail!("entity '{}' has invalid token span {:?}", entity.text, entity.token_span);
            }
        }

        if self.sentences.is_empty() {
            self.sentences = sentence_ranges(&self.tokens);
        }
        let mut previous_end = 0;
        for &(start, end) in &self.sentences {
            if start >= end || end > n {
                bail!("sentence {:?} is outside {} tokens", (start, end), n);
            }
            if start < previous_end {
                bail!("sentence {:?} overlaps or precedes the previous sentence", (start, end));
            }
            previous_end = end;
        }
        self.classes = self.entities.iter().map(classify).collect();
        Ok(())
    }

    pub fn classification(&self, entity_idx: usize) -> TraitClassification {
        self.classes
            .get(entity_idx)
            .copied()
            .unwrap_or_else(|| classify(&self.entities[entity_idx]))
    }

    pub fn sentences(&self) -> impl Iterator<Item = Sentence<'_>> {
        self.sentences.iter().map(move |&(start, end)| Sentence::new(self, start..end))
    }
}

/// Token ranges split after sentence-final punctuation.
pub fn sentence_ranges(tokens: &[Token]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if matches!(token.text.as_str(), "." | "!" | "?") {
            ranges.push((start, i + 1));
            start = i + 1;
        }
    }
    if start < tokens.len() {
        ranges.push((start, tokens.len()));
    }
    ranges
}

/// A sentence view over a [`ParsedText`].
pub struct Sentence<'a> {
    pub doc: &'a ParsedText,
    pub range: Range<usize>,
    /// Indices into `doc.entities` of entities inside this sentence, in document order.
    pub entities: Vec<usize>,
}

impl<'a> Sentence<'a> {
    pub fn new(doc: &'a ParsedText, range: Range<usize>) -> Self {
        let mut entities: Vec<usize> = doc
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| range.contains(&e.token_span.0) && e.token_span.1 <= range.end)
            .map(|(i, _)| i)
            .collect();
        entities.sort_by_key(|&i| (doc.entities[i].token_span.0, i));
        Self { doc, range, entities }
    }

    pub fn tokens(&self) -> &'a [Token] {
        &self.doc.tokens[self.range.clone()]
    }

    pub fn contains(&self, token_idx: usize) -> bool {
        self.range.contains(&token_idx)
    }

    pub fn entity(&self, entity_idx: usize) -> &'a Entity {
        &self.doc.entities[entity_idx]
    }

    /// Entities of this sentence matching a classification predicate.
    pub fn entities_where(&self, pred: impl Fn(TraitClassification) -> bool) -> Vec<usize> {
        self.entities
            .iter()
            .copied()
            .filter(|&i| pred(self.doc.classification(i)))
            .collect()
    }

    /// The span token whose head lies outside the span.
    pub fn root_of(&self, entity_idx: usize) -> usize {
        let span = self.entity(entity_idx).tokens();
        span.clone()
            .find(|&i| {
                let head = self.doc.tokens[i].head;
                head == i || !span.contains(&head)
            })
            .unwrap_or(span.start)
    }

    /// Token indices in the subtree rooted at `token_idx`, restricted to this sentence.
    pub fn subtree(&self, token_idx: usize) -> Vec<usize> {
        let mut nodes = vec![token_idx];
        let mut i = 0;
        while i < nodes.len() {
            let current = nodes[i];
            for &child in &self.doc.tokens[current].children {
                if self.contains(child) && !nodes.contains(&child) {
                    nodes.push(child);
                }
            }
            i += 1;
        }
        nodes
    }

    /// Walk up the head chain from `token_idx`, stopping at the sentence root
    /// or at the head of a subordinate clause.
    pub fn clause_head(&self, token_idx: usize) -> usize {
        let mut current = token_idx;
        let mut steps = 0;
        loop {
            let token = &self.doc.tokens[current];
            if token.is_root() || !self.contains(token.head) || steps > self.range.len() {
                return current;
            }
            if token.is_subordinating() {
                return current;
            }
            current = token.head;
            steps += 1;
            if self.opens_subordinate_clause(current) {
                return current;
            }
        }
    }

    fn opens_subordinate_clause(&self, token_idx: usize) -> bool {
        let token = &self.doc.tokens[token_idx];
        token.is_subordinating()
            || token
                .children
                .iter()
                .any(|&c| self.contains(c) && self.doc.tokens[c].is_subordinating())
    }
}

/// An injected tokenizer/tagger/parser/recognizer.
///
/// Engines are expensive to build and are shared read-only across workers.
pub trait NlpEngine: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn tag(&self, tokens: &mut [Token]);

    fn parse(&self, tokens: &mut [Token]);

    fn recognize_entities(&self, text: &str, tokens: &[Token]) -> Vec<Entity>;

    fn analyze(&self, text: &str) -> Result<ParsedText> {
        let mut tokens = self.tokenize(text);
        self.tag(&mut tokens);
        self.parse(&mut tokens);
        let entities = self.recognize_entities(text, &tokens);
        ParsedText::new(text, tokens, entities)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build tokens from words with explicit heads; offsets assume single spaces.
    pub(crate) fn tokens_with_heads(words: &[(&str, usize)]) -> Vec<Token> {
        let mut offset = 0;
        words
            .iter()
            .enumerate()
            .map(|(i, &(word, head))| {
                let mut token = Token::new(i, word, offset);
                token.head = head;
                offset += word.chars().count() + 1;
                token
            })
            .collect()
    }

    #[test]
    fn test_normalize_labels() {
        assert_eq!(normalize_entity_label("RSID"), EntityLabel::Marker);
        assert_eq!(normalize_entity_label("PVAL"), EntityLabel::PValue);
        assert_eq!(normalize_entity_label("MESH_DISEASE"), EntityLabel::Trait);
        assert_eq!(normalize_entity_label("B-GENE"), EntityLabel::Gene);
        assert_eq!(normalize_entity_label("CHEMICAL"), EntityLabel::Other);
    }

    #[test]
    fn test_children_and_subtree() {
        // obesity <- associated -> with -> rs1
        let tokens = tokens_with_heads(&[("obesity", 1), ("associated", 1), ("with", 1), ("rs1", 2)]);
        let parsed = ParsedText::new("obesity associated with rs1", tokens, vec![]).unwrap();
        assert_eq!(parsed.tokens[1].children, vec![0, 2]);

        let sentence = parsed.sentences().next().unwrap();
        let mut subtree = sentence.subtree(2);
        subtree.sort_unstable();
        assert_eq!(subtree, vec![2, 3]);
    }

    #[test]
    fn test_invalid_head_is_rejected() {
        let tokens = tokens_with_heads(&[("a", 0), ("b", 7)]);
        assert!(ParsedText::new("a b", tokens, vec![]).is_err());
    }

    #[test]
    fn test_bad_sentence_ranges_are_rejected() {
        let words = [("obesity", 1), ("rs1", 1), ("1e-9", 1)];
        for sentences in [vec![(0, 9)], vec![(2, 2)], vec![(1, 3), (0, 1)], vec![(0, 2), (1, 3)]] {
            let mut parsed = ParsedText {
                tokens: tokens_with_heads(&words),
                sentences: sentences.clone(),
                ..Default::default()
            };
            assert!(parsed.link().is_err(), "accepted {:?}", sentences);
        }

        let mut parsed = ParsedText {
            tokens: tokens_with_heads(&words),
            sentences: vec![(0, 1), (1, 3)],
            ..Default::default()
        };
        assert!(parsed.link().is_ok());
    }

    #[test]
    fn test_root_of_multi_token_entity() {
        // body <- index (root)
        let tokens = tokens_with_heads(&[("body", 1), ("mass", 2), ("index", 2)]);
        let entity = Entity::new(EntityLabel::Trait, "body mass index", 0, (0, 3));
        let parsed = ParsedText::new("body mass index", tokens, vec![entity]).unwrap();
        let sentence = parsed.sentences().next().unwrap();
        assert_eq!(sentence.root_of(0), 2);
    }

    #[test]
    fn test_clause_head_stops_at_subordinate_clause() {
        // "because" marks the clause headed by "increased"
        let mut tokens = tokens_with_heads(&[
            ("risk", 1),
            ("rose", 1),
            ("because", 4),
            ("obesity", 4),
            ("increased", 1),
        ]);
        tokens[2].pos = "SCONJ".to_string();
        let parsed = ParsedText::new("risk rose because obesity increased", tokens, vec![]).unwrap();
        let sentence = parsed.sentences().next().unwrap();
        assert_eq!(sentence.clause_head(3), 4);
        assert_eq!(sentence.clause_head(0), 1);
    }

    #[test]
    fn test_entity_wire_shape() {
        let json = r#"{"label":"RSID","start_token":3,"end_token":4,"char_start":20,"char_end":29,"text":"rs1801133"}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.label, EntityLabel::Marker);
        assert_eq!(entity.length, 9);
        assert!(classify(&entity).is_marker);
    }
}
