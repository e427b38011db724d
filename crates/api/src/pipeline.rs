//! Per-document mining: text passages, then tables, written back into the document.

use anyhow::{Context, Result};
use extract::{
    ASSOCIATION_RELATION, AnnotationContext, Associator, Lexicon, NlpEngine, PreparsedEngine, RuleEngine, TextMiner,
    dedup_relations,
};
use ingest::{Document, Passage, TableElement};
use serde::Serialize;
use std::sync::Arc;
use tables::{ColumnClassifier, TableMiner};

use crate::config::{AppConfig, LexiconConfig, OperationMode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    /// Complete marker records, text and tables together.
    pub records: usize,
    pub relations: usize,
    pub tables: usize,
    pub tables_unclassified: usize,
    pub tables_failed: usize,
}

/// Rule engine over every configured lexicon file.
pub fn build_engine(config: &LexiconConfig) -> Result<Arc<dyn NlpEngine>> {
    let mut lexicon = Lexicon::new();
    for path in &config.paths {
        lexicon
            .extend_from_file(path)
            .with_context(|| format!("Failed to load lexicon {:?}", path))?;
    }
    tracing::info!(terms = lexicon.len(), files = config.paths.len(), "Built rule engine");
    Ok(Arc::new(RuleEngine::new(lexicon)))
}

pub struct Pipeline {
    engine: Arc<dyn NlpEngine>,
    text_miner: TextMiner,
    table_miner: TableMiner,
    mode: OperationMode,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn NlpEngine>, config: &AppConfig) -> Self {
        let association = &config.association;
        Self {
            engine,
            text_miner: TextMiner::new(Associator::new(association.max_distance))
                .with_max_p_value(association.max_p_value),
            table_miner: TableMiner::new(ColumnClassifier::new(association.column_threshold))
                .with_max_p_value(association.max_p_value),
            mode: config.mode,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = build_engine(&config.lexicon)?;
        Ok(Self::new(engine, config))
    }

    /// Replays `infons.parse` payloads when a document carries them.
    fn document_engine(&self, doc: &Document) -> Option<PreparsedEngine> {
        let payloads: Vec<&serde_json::Value> = doc.passages.iter().filter_map(Passage::parse_payload).collect();
        if payloads.is_empty() {
            return None;
        }

        let mut engine = PreparsedEngine::new(self.engine.clone());
        for payload in payloads {
            if let Err(e) = engine.insert_json(payload) {
                tracing::warn!(document_id = %doc.id, error = %e, "Ignoring pre-parsed payload");
            }
        }
        Some(engine)
    }

    /// Mine one document in place with a fresh id context.
    pub fn process_document(&self, doc: &mut Document) -> DocumentSummary {
        let mut ctx = AnnotationContext::new();
        let mut summary = DocumentSummary {
            document_id: doc.id.clone(),
            ..Default::default()
        };

        clear_mined_output(doc);
        let preparsed = self.document_engine(doc);
        let engine: &dyn NlpEngine = match &preparsed {
            Some(engine) => engine,
            None => self.engine.as_ref(),
        };

        if self.mode.mines_text() {
            self.mine_text(engine, doc, &mut ctx, &mut summary);
        }
        if self.mode.mines_tables() {
            self.mine_tables(engine, doc, &mut ctx, &mut summary);
        }

        for passage in &mut doc.passages {
            dedup_relations(&mut passage.relations);
        }
        dedup_relations(&mut doc.relations);
        summary.relations = doc.relations.len();

        tracing::info!(
            document_id = %doc.id,
            records = summary.records,
            relations = summary.relations,
            tables = summary.tables,
            "Processed document"
        );
        summary
    }

    fn mine_text(&self, engine: &dyn NlpEngine, doc: &mut Document, ctx: &mut AnnotationContext, summary: &mut DocumentSummary) {
        let indices: Vec<usize> = doc.text_passages().map(|(i, _)| i).collect();

        for i in indices {
            let passage = &mut doc.passages[i];
            if passage.text.trim().is_empty() {
                continue;
            }
            let result = match self.text_miner.mine_passage(engine, &passage.text, passage.offset, ctx) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(document_id = %doc.id, passage = i, error = %e, "Failed to mine passage");
                    continue;
                }
            };

            summary.records += result.records.len();
            passage.annotations.extend(result.annotations);
            passage.relations.extend(result.relations.iter().cloned());
            doc.relations.extend(result.relations);
        }
    }

    fn mine_tables(&self, engine: &dyn NlpEngine, doc: &mut Document, ctx: &mut AnnotationContext, summary: &mut DocumentSummary) {
        for (table_id, indices) in doc.table_groups() {
            summary.tables += 1;
            let passages: Vec<&Passage> = indices.iter().map(|&i| &doc.passages[i]).collect();

            let result = match self.table_miner.mine_table(engine, &table_id, &passages, ctx) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(document_id = %doc.id, table_id = %table_id, error = %e, "Failed to build table");
                    summary.tables_failed += 1;
                    continue;
                }
            };

            if result.table_type.is_none() {
                summary.tables_unclassified += 1;
                continue;
            }
            summary.records += result.records.iter().filter(|r| r.record.is_complete()).count();

            let Some(content) = indices
                .iter()
                .copied()
                .find(|&i| doc.passages[i].table_element() == Some(TableElement::Content))
            else {
                continue;
            };
            let passage = &mut doc.passages[content];
            passage.annotations.extend(result.annotations);
            passage.relations.extend(result.relations.iter().cloned());
            doc.relations.extend(result.relations);
        }
    }
}

/// Drop annotations and association relations left by an earlier run, so
/// re-mining a document replaces its output instead of duplicating it.
fn clear_mined_output(doc: &mut Document) {
    let stale = doc.passages.iter().map(|p| p.annotations.len()).sum::<usize>();
    if stale > 0 {
        tracing::debug!(document_id = %doc.id, annotations = stale, "Replacing earlier annotations");
    }
    for passage in &mut doc.passages {
        passage.annotations.clear();
        passage.relations.retain(|r| r.relation_type != ASSOCIATION_RELATION);
    }
    doc.relations.retain(|r| r.relation_type != ASSOCIATION_RELATION);
}
