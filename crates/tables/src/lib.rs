pub mod columns;
pub mod error;
pub mod model;
pub mod resolver;
pub mod rows;

pub use columns::{ColumnClassifier, ColumnType, ColumnTypes, DOMINANCE_THRESHOLD};
pub use error::TableError;
pub use model::{Column, Section, Table, TextBlock};
pub use resolver::{SignalSource, TableFlags, TableType};
pub use rows::{RecordSources, RowExtractor, RowRecord};

use extract::{
    ASSOCIATION_RELATION, Annotation, AnnotationContext, AnnotationSet, AnnotationType, Location, NlpEngine,
    Relation, classify,
};
use ingest::{Passage, TableElement};
use std::collections::BTreeSet;

/// Outcome of mining one table. An unclassifiable table has no type and no annotations.
#[derive(Debug, Clone, Default)]
pub struct TableResult {
    pub table_id: String,
    pub table_type: Option<TableType>,
    pub records: Vec<RowRecord>,
    pub annotations: Vec<Annotation>,
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Default)]
pub struct TableMiner {
    classifier: ColumnClassifier,
    max_p_value: Option<f64>,
}

impl TableMiner {
    pub fn new(classifier: ColumnClassifier) -> Self {
        Self {
            classifier,
            max_p_value: None,
        }
    }

    pub fn with_max_p_value(mut self, max: Option<f64>) -> Self {
        self.max_p_value = max;
        self
    }

    fn passes_threshold(&self, p_value: &str) -> bool {
        match (self.max_p_value, extract::pvalue::parse_p_value(p_value)) {
            (Some(max), Some(value)) => value <= max,
            _ => true,
        }
    }

    pub fn mine_table(
        &self,
        engine: &dyn NlpEngine,
        table_id: &str,
        passages: &[&Passage],
        ctx: &mut AnnotationContext,
    ) -> Result<TableResult, TableError> {
        let mut table = Table::build(engine, table_id, passages)?;
        let unclassified = TableResult {
            table_id: table_id.to_string(),
            ..Default::default()
        };

        let Some(types) = self.classifier.classify(&table) else {
            return Ok(unclassified);
        };
        let Some(table_type) = resolver::resolve(&table).table_type() else {
            tracing::debug!(table_id = %table_id, "Table type is unresolved");
            return Ok(unclassified);
        };
        let table_type = resolver::refine(table_type, &types);
        table.set_column_types(types.clone());

        let headline = default_phenotype(&table);
        let records = RowExtractor::new(&table, &types)
            .with_default_phenotype(headline.as_ref().map(|(text, _)| text.clone()))
            .extract();

        let headline_element = headline.map_or(TableElement::Title, |(_, element)| element);
        let mut set = AnnotationSet::new();
        for row in &records {
            self.annotate(&mut set, ctx, row, headline_element);
        }
        let (annotations, relations) = set.into_parts();

        tracing::info!(
            table_id = %table_id,
            table_type = ?table_type,
            records = records.len(),
            relations = relations.len(),
            "Mined table"
        );

        Ok(TableResult {
            table_id: table_id.to_string(),
            table_type: Some(table_type),
            records,
            annotations,
            relations,
        })
    }

    /// Annotate a complete record at its source cells and link the triple.
    ///
    /// A phenotype without a source cell came from the title or caption and
    /// is located on that element.
    fn annotate(&self, set: &mut AnnotationSet, ctx: &mut AnnotationContext, row: &RowRecord, headline: TableElement) {
        let record = &row.record;
        let (Some(marker), Some(phenotype), Some(p_value)) =
            (record.rs_identifier.as_deref(), record.phenotype.as_deref(), record.significance())
        else {
            return;
        };
        if !self.passes_threshold(p_value) {
            return;
        }

        let location = |cell: Option<&str>, text: &str| {
            let length = text.chars().count();
            match cell {
                Some(cell_id) => Location::cell(TableElement::Content.as_str(), cell_id, length),
                None => Location {
                    table_element: Some(headline.as_str().to_string()),
                    ..Location::text(0, length)
                },
            }
        };

        let t = set.register(
            ctx,
            AnnotationType::Trait,
            phenotype,
            phenotype,
            location(row.sources.phenotype.as_deref(), phenotype),
        );
        let m = set.register(
            ctx,
            AnnotationType::GeneticVariant,
            marker,
            marker,
            location(row.sources.rs_identifier.as_deref(), marker),
        );
        let p = set.register(
            ctx,
            AnnotationType::Significance,
            p_value,
            p_value,
            location(row.sources.significance(record), p_value),
        );
        set.relate(ctx, ASSOCIATION_RELATION, &[&t, &m, &p]);
    }
}

/// The trait named by the title or caption when they name exactly one,
/// with the element it was first found in.
pub fn default_phenotype(table: &Table) -> Option<(String, TableElement)> {
    let mut traits: BTreeSet<&str> = BTreeSet::new();
    let mut first: Option<TableElement> = None;

    for (element, block) in table.headline_blocks() {
        for entity in block.entities.iter().filter(|e| classify(e).is_trait) {
            traits.insert(entity.text.as_str());
            first.get_or_insert(element);
        }
    }

    match (traits.len(), first) {
        (1, Some(element)) => traits.into_iter().next().map(|text| (text.to_string(), element)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{engine, table_doc};

    fn mine(doc: &ingest::Document, ctx: &mut AnnotationContext) -> TableResult {
        let passages: Vec<&Passage> = doc.passages.iter().collect();
        TableMiner::default().mine_table(&engine(), "1", &passages, ctx).unwrap()
    }

    #[test]
    fn test_trait_and_marker_table() {
        let doc = table_doc(
            "Table 1. Association results",
            &["Phenotype", "SNP", "P value"],
            &[("", vec![vec!["Obesity", "rs1801133", "2e-8"], vec!["", "rs9939609", "1e-6"]])],
        );
        let mut ctx = AnnotationContext::new();
        let result = mine(&doc, &mut ctx);

        assert_eq!(result.table_type, Some(TableType::TraitAndMarkerList));
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.relations.len(), 2);

        // carried phenotype merges into one annotation
        let traits: Vec<&Annotation> = result
            .annotations
            .iter()
            .filter(|a| a.annotation_type == AnnotationType::Trait)
            .collect();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits[0].locations, vec![Location::cell("table_content", "1.2.1", 7)]);

        let marker = result.annotations.iter().find(|a| a.text == "rs9939609").unwrap();
        assert_eq!(marker.id, "M1");
        assert_eq!(marker.locations[0].table_cell_id.as_deref(), Some("1.3.2"));
    }

    #[test]
    fn test_title_trait_fills_phenotype() {
        let doc = table_doc(
            "Table 2. SNPs associated with obesity",
            &["SNP", "P value"],
            &[("", vec![vec!["rs1", "1e-8"]])],
        );
        let mut ctx = AnnotationContext::new();
        let result = mine(&doc, &mut ctx);

        assert_eq!(result.table_type, Some(TableType::TraitList));
        assert_eq!(result.records[0].record.phenotype.as_deref(), Some("obesity"));
        assert_eq!(result.relations.len(), 1);

        let phenotype = &result.annotations[0];
        assert_eq!(phenotype.identifier, "obesity");
        assert_eq!(phenotype.locations[0].table_element.as_deref(), Some("table_title"));
        assert_eq!(phenotype.locations[0].table_cell_id, None);
    }

    #[test]
    fn test_unclassifiable_table_has_no_annotations() {
        let doc = table_doc(
            "Table 3. Baseline characteristics",
            &["Variable", "Mean"],
            &[("", vec![vec!["Age", "54.2"]])],
        );
        let mut ctx = AnnotationContext::new();
        let result = mine(&doc, &mut ctx);
        assert_eq!(result.table_type, None);
        assert!(result.annotations.is_empty());
        assert_eq!(ctx, AnnotationContext::new());
    }

    #[test]
    fn test_incomplete_rows_are_not_annotated() {
        let doc = table_doc(
            "Table 4. Variants for asthma",
            &["SNP", "P value"],
            &[(
                "",
                vec![
                    vec!["rs1", "1e-8"],
                    vec!["rs2", "1e-7"],
                    vec!["rs3", "1e-6"],
                    vec!["rs4", "1e-5"],
                    vec!["rs5", "1e-4"],
                    vec!["rs6", ""],
                ],
            )],
        );
        let mut ctx = AnnotationContext::new();
        let result = mine(&doc, &mut ctx);
        assert_eq!(result.records.len(), 6);
        assert_eq!(result.relations.len(), 5);
        assert!(result.annotations.iter().all(|a| a.text != "rs6"));
    }

    #[test]
    fn test_threshold_drops_weak_rows() {
        let doc = table_doc(
            "Table 5. Variants for asthma",
            &["SNP", "P value"],
            &[("", vec![vec!["rs1", "1e-8"], vec!["rs2", "0.04"]])],
        );
        let passages: Vec<&Passage> = doc.passages.iter().collect();
        let mut ctx = AnnotationContext::new();
        let result = TableMiner::default()
            .with_max_p_value(Some(5e-8))
            .mine_table(&engine(), "1", &passages, &mut ctx)
            .unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.relations.len(), 1);
    }
}
