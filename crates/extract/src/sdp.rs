//! Shortest-dependency-path association of phenotypes, markers and p-values.
//!
//! For each phenotype mention in a sentence the closest marker is chosen by
//! path length through the dependency graph, then the closest p-value to that
//! marker. Candidates further than `max_distance` edges are ignored, and on a
//! tie the candidate earliest in the sentence wins.

use std::collections::HashSet;

use crate::graph::DependencyGraph;
use crate::nlp::{ParsedText, Sentence};
use crate::schema::MarkerRecord;

pub const MAX_SDP_DISTANCE: usize = 4;

/// Indices into `ParsedText::entities` of one accepted triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub phenotype: usize,
    pub marker: usize,
    pub significance: usize,
}

impl Association {
    pub fn record(&self, doc: &ParsedText) -> MarkerRecord {
        MarkerRecord {
            rs_identifier: Some(doc.entities[self.marker].text.clone()),
            misc_p_val: Some(doc.entities[self.significance].text.clone()),
            phenotype: Some(doc.entities[self.phenotype].text.clone()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Associator {
    max_distance: usize,
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(MAX_SDP_DISTANCE)
    }
}

impl Associator {
    pub fn new(max_distance: usize) -> Self {
        Self { max_distance }
    }

    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    pub fn associate(&self, doc: &ParsedText) -> Vec<Association> {
        doc.sentences()
            .flat_map(|sentence| self.associate_sentence(&sentence))
            .collect()
    }

    pub fn associate_sentence(&self, sentence: &Sentence) -> Vec<Association> {
        let traits = sentence.entities_where(|c| c.is_trait);
        let markers = sentence.entities_where(|c| c.is_marker);
        let p_values = sentence.entities_where(|c| c.is_significance);

        if traits.is_empty() || markers.is_empty() || p_values.is_empty() {
            return Vec::new();
        }

        let graph = DependencyGraph::from_sentence(sentence);
        let contiguous = contiguous_pairs(sentence, &traits, &p_values);
        let mut associations = Vec::new();

        for &phenotype in &traits {
            if !self.is_eligible(sentence, phenotype, &markers, &p_values) {
                tracing::trace!(
                    phenotype = %sentence.entity(phenotype).text,
                    "No marker or p-value reachable from phenotype"
                );
                continue;
            }

            let Some(marker) = self.closest(sentence, &graph, phenotype, &markers) else {
                continue;
            };

            let significance = match contiguous.iter().find(|(t, _)| *t == phenotype) {
                Some(&(_, p)) => Some(p),
                None => self.closest(sentence, &graph, marker, &p_values),
            };

            if let Some(significance) = significance {
                associations.push(Association {
                    phenotype,
                    marker,
                    significance,
                });
            }
        }

        associations
    }

    /// A phenotype qualifies when a marker or p-value token lies in its own
    /// subtree, or in the subtree of its clause head.
    fn is_eligible(&self, sentence: &Sentence, phenotype: usize, markers: &[usize], p_values: &[usize]) -> bool {
        let targets: HashSet<usize> = markers
            .iter()
            .chain(p_values)
            .flat_map(|&e| sentence.entity(e).tokens())
            .collect();

        let root = sentence.root_of(phenotype);
        if sentence.subtree(root).iter().any(|t| targets.contains(t)) {
            return true;
        }

        let anchor = sentence.clause_head(root);
        anchor != root && sentence.subtree(anchor).iter().any(|t| targets.contains(t))
    }

    /// Nearest candidate within `max_distance`; ties keep the earlier candidate.
    fn closest(&self, sentence: &Sentence, graph: &DependencyGraph, from: usize, candidates: &[usize]) -> Option<usize> {
        let tokens = &sentence.doc.tokens;
        let source = DependencyGraph::node_key(&tokens[sentence.root_of(from)]);
        let mut best: Option<(usize, usize)> = None;

        for &candidate in candidates {
            let target = DependencyGraph::node_key(&tokens[sentence.root_of(candidate)]);
            let Some(distance) = graph.shortest_path_len(&source, &target) else {
                continue;
            };
            if distance <= self.max_distance && best.is_none_or(|(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }

        best.map(|(candidate, _)| candidate)
    }
}

/// Trait entities directly followed by a p-value entity, allowing one
/// punctuation token in between (`obesity (P=...)` style).
pub fn contiguous_pairs(sentence: &Sentence, traits: &[usize], p_values: &[usize]) -> Vec<(usize, usize)> {
    let tokens = &sentence.doc.tokens;
    let mut pairs = Vec::new();

    for &t in traits {
        let end = sentence.entity(t).token_span.1;
        let next = p_values.iter().copied().find(|&p| {
            let start = sentence.entity(p).token_span.0;
            start == end || (start == end + 1 && tokens[end].is_punct())
        });
        if let Some(p) = next {
            pairs.push((t, p));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::tests::tokens_with_heads;
    use crate::nlp::{Entity, EntityLabel};

    /// A chain sentence: token i is attached to token i + 1, the last is the root.
    fn chain(words: &[&str]) -> Vec<crate::nlp::Token> {
        let n = words.len();
        let heads: Vec<(&str, usize)> = words
            .iter()
            .enumerate()
            .map(|(i, &w)| (w, if i + 1 < n { i + 1 } else { i }))
            .collect();
        tokens_with_heads(&heads)
    }

    fn entity(tokens: &[crate::nlp::Token], label: EntityLabel, idx: usize) -> Entity {
        Entity::new(label, &tokens[idx].text, tokens[idx].char_offset, (idx, idx + 1))
    }

    fn parsed(words: &[&str], spans: &[(EntityLabel, usize)]) -> ParsedText {
        let tokens = chain(words);
        let entities = spans.iter().map(|&(l, i)| entity(&tokens, l, i)).collect();
        ParsedText::new(&words.join(" "), tokens, entities).unwrap()
    }

    #[test]
    fn test_distance_four_is_accepted() {
        // obesity -a-b-c- rs1 - p
        let doc = parsed(
            &["obesity", "a", "b", "c", "rs1", "1e-8"],
            &[(EntityLabel::Trait, 0), (EntityLabel::Marker, 4), (EntityLabel::PValue, 5)],
        );
        let found = Associator::default().associate(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].marker, 1);
    }

    #[test]
    fn test_distance_five_is_rejected() {
        let doc = parsed(
            &["obesity", "a", "b", "c", "d", "rs1", "1e-8"],
            &[(EntityLabel::Trait, 0), (EntityLabel::Marker, 5), (EntityLabel::PValue, 6)],
        );
        assert!(Associator::default().associate(&doc).is_empty());
    }

    #[test]
    fn test_equal_distance_keeps_first_marker() {
        // rs1 and rs2 both attach to obesity, one edge away
        let tokens = tokens_with_heads(&[
            ("rs1", 1),
            ("obesity", 1),
            ("rs2", 1),
            ("1e-8", 1),
        ]);
        let entities = vec![
            entity(&tokens, EntityLabel::Marker, 0),
            entity(&tokens, EntityLabel::Trait, 1),
            entity(&tokens, EntityLabel::Marker, 2),
            entity(&tokens, EntityLabel::PValue, 3),
        ];
        let doc = ParsedText::new("rs1 obesity rs2 1e-8", tokens, entities).unwrap();

        for _ in 0..3 {
            let found = Associator::default().associate(&doc);
            assert_eq!(found.len(), 1);
            assert_eq!(doc.entities[found[0].marker].text, "rs1");
        }
    }

    #[test]
    fn test_incomplete_sentence_is_skipped() {
        let doc = parsed(
            &["obesity", "rs1"],
            &[(EntityLabel::Trait, 0), (EntityLabel::Marker, 1)],
        );
        assert!(Associator::default().associate(&doc).is_empty());
    }

    #[test]
    fn test_contiguous_p_value_short_circuits_search() {
        // 0.01 is closer to rs1, but 1e-8 directly follows the phenotype
        let doc = parsed(
            &["0.01", "rs1", "with", "obesity", "(", "1e-8", ")"],
            &[
                (EntityLabel::PValue, 0),
                (EntityLabel::Marker, 1),
                (EntityLabel::Trait, 3),
                (EntityLabel::PValue, 5),
            ],
        );
        let sentence = doc.sentences().next().unwrap();
        let pairs = contiguous_pairs(&sentence, &[2], &[0, 3]);
        assert_eq!(pairs, vec![(2, 3)]);

        let found = Associator::default().associate(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].marker, 1);
        assert_eq!(found[0].significance, 3);
    }

    #[test]
    fn test_unreachable_phenotype_is_dropped() {
        // obesity is its own root, nothing in reach
        let tokens = tokens_with_heads(&[("obesity", 0), ("rs1", 2), ("1e-8", 2)]);
        let entities = vec![
            entity(&tokens, EntityLabel::Trait, 0),
            entity(&tokens, EntityLabel::Marker, 1),
            entity(&tokens, EntityLabel::PValue, 2),
        ];
        let doc = ParsedText::new("obesity rs1 1e-8", tokens, entities).unwrap();
        assert!(Associator::default().associate(&doc).is_empty());
    }
}
