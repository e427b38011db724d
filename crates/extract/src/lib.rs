pub mod annotate;
pub mod graph;
pub mod lexicon;
pub mod nlp;
pub mod preparsed;
pub mod pvalue;
pub mod rules;
pub mod schema;
pub mod sdp;

pub use annotate::{ASSOCIATION_RELATION, AnnotationContext, AnnotationSet, dedup_relations};
pub use graph::DependencyGraph;
pub use lexicon::Lexicon;
pub use nlp::{Entity, EntityLabel, NlpEngine, ParsedText, Sentence, Token, TraitClassification, classify};
pub use preparsed::PreparsedEngine;
pub use rules::RuleEngine;
pub use schema::{Annotation, AnnotationType, Location, MarkerRecord, Relation, RelationNode};
pub use sdp::{Association, Associator, MAX_SDP_DISTANCE};

use anyhow::{Context, Result};

/// Records, annotations and relations mined from one text passage.
#[derive(Debug, Clone, Default)]
pub struct PassageResult {
    pub records: Vec<MarkerRecord>,
    pub annotations: Vec<Annotation>,
    pub relations: Vec<Relation>,
}

/// Mines genotype/phenotype/significance associations from free text.
#[derive(Debug, Clone, Default)]
pub struct TextMiner {
    associator: Associator,
    max_p_value: Option<f64>,
}

impl TextMiner {
    pub fn new(associator: Associator) -> Self {
        Self {
            associator,
            max_p_value: None,
        }
    }

    /// Drop associations whose p-value reads above `max`. Unreadable values are kept.
    pub fn with_max_p_value(mut self, max: Option<f64>) -> Self {
        self.max_p_value = max;
        self
    }

    pub fn passes_threshold(&self, p_value: &str) -> bool {
        match (self.max_p_value, pvalue::parse_p_value(p_value)) {
            (Some(max), Some(value)) => value <= max,
            _ => true,
        }
    }

    /// Run the engine over a passage and mine the result.
    pub fn mine_passage(
        &self,
        engine: &dyn NlpEngine,
        text: &str,
        passage_offset: usize,
        ctx: &mut AnnotationContext,
    ) -> Result<PassageResult> {
        let parsed = engine
            .analyze(text)
            .context("Failed to analyze passage text")?;
        Ok(self.mine_parsed(&parsed, passage_offset, ctx))
    }

    /// Annotate every relevant entity, then link associated triples.
    pub fn mine_parsed(&self, parsed: &ParsedText, passage_offset: usize, ctx: &mut AnnotationContext) -> PassageResult {
        let mut set = AnnotationSet::new();

        let ids: Vec<Option<String>> = parsed
            .entities
            .iter()
            .enumerate()
            .map(|(i, entity)| {
                let kind = annotation_type(parsed.classification(i))?;
                let identifier = match kind {
                    AnnotationType::Trait | AnnotationType::Gene => {
                        entity.identifier.as_deref().unwrap_or(&entity.text)
                    }
                    _ => &entity.text,
                };
                let location = Location::text(passage_offset + entity.start_offset, entity.length);
                Some(set.register(ctx, kind, &entity.text, identifier, location))
            })
            .collect();

        let mut records = Vec::new();
        for association in self.associator.associate(parsed) {
            let record = association.record(parsed);
            if !record.misc_p_val.as_deref().is_some_and(|p| self.passes_threshold(p)) {
                tracing::debug!(p_value = ?record.misc_p_val, "Association above significance threshold");
                continue;
            }

            let refs = [association.phenotype, association.marker, association.significance]
                .map(|i| ids[i].as_deref());
            if let [Some(t), Some(m), Some(p)] = refs {
                set.relate(ctx, ASSOCIATION_RELATION, &[t, m, p]);
            }
            records.push(record);
        }

        let (annotations, relations) = set.into_parts();
        tracing::debug!(
            entities = parsed.entities.len(),
            annotations = annotations.len(),
            relations = relations.len(),
            "Mined passage"
        );

        PassageResult {
            records,
            annotations,
            relations,
        }
    }
}

/// Annotation type for an entity, `None` for entities that are not annotated.
pub fn annotation_type(class: TraitClassification) -> Option<AnnotationType> {
    if class.is_trait {
        Some(AnnotationType::Trait)
    } else if class.is_marker {
        Some(AnnotationType::GeneticVariant)
    } else if class.is_significance {
        Some(AnnotationType::Significance)
    } else if class.is_gene {
        Some(AnnotationType::Gene)
    } else {
        None
    }
}
