//! Table type resolution from title, caption, footer and header signals.

use extract::{Entity, TraitClassification, classify};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::columns::{ColumnType, ColumnTypes};
use crate::model::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    MarkerList,
    TraitList,
    TraitAndMarkerList,
}

/// Where a flag was first observed, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalSource {
    Title,
    Caption,
    Footer,
    SectionTitle,
    HeaderEntity,
    HeaderKeyword,
}

/// Accumulated content flags. A flag keeps its first source and is never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableFlags {
    pub contains_trait: Option<SignalSource>,
    pub contains_marker: Option<SignalSource>,
    pub contains_significance: Option<SignalSource>,
}

fn marker_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(snps?|markers?|rs ?ids?|variants?)\b").unwrap())
}

fn significance_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)p[- ]?val|\bp\b|\bgee\b|\bfbat\b").unwrap())
}

fn trait_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)phenotype|trait").unwrap())
}

impl TableFlags {
    fn set(flag: &mut Option<SignalSource>, source: SignalSource) {
        if flag.is_none() {
            *flag = Some(source);
        }
    }

    pub fn observe(&mut self, source: SignalSource, class: TraitClassification) {
        if class.is_trait {
            Self::set(&mut self.contains_trait, source);
        }
        if class.is_marker {
            Self::set(&mut self.contains_marker, source);
        }
        if class.is_significance {
            Self::set(&mut self.contains_significance, source);
        }
    }

    pub fn observe_entities<'a>(&mut self, source: SignalSource, entities: impl IntoIterator<Item = &'a Entity>) {
        for entity in entities {
            self.observe(source, classify(entity));
        }
    }

    pub fn observe_keywords(&mut self, header: &str) {
        let source = SignalSource::HeaderKeyword;
        if trait_keyword_regex().is_match(header) {
            Self::set(&mut self.contains_trait, source);
        }
        if marker_keyword_regex().is_match(header) {
            Self::set(&mut self.contains_marker, source);
        }
        if significance_keyword_regex().is_match(header) {
            Self::set(&mut self.contains_significance, source);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.contains_trait.is_some() && self.contains_marker.is_some() && self.contains_significance.is_some()
    }

    pub fn table_type(&self) -> Option<TableType> {
        match (
            self.contains_trait.is_some(),
            self.contains_marker.is_some(),
            self.contains_significance.is_some(),
        ) {
            (true, true, true) => Some(TableType::TraitList),
            (false, true, true) => Some(TableType::MarkerList),
            _ => None,
        }
    }
}

/// Scan a table's text sources in priority order.
pub fn resolve(table: &Table) -> TableFlags {
    let mut flags = TableFlags::default();

    let blocks = [
        (SignalSource::Title, &table.title),
        (SignalSource::Caption, &table.caption),
        (SignalSource::Footer, &table.footer),
    ];
    for (source, block) in blocks {
        if let Some(block) = block {
            flags.observe_entities(source, &block.entities);
        }
    }

    for section in &table.sections {
        flags.observe_entities(SignalSource::SectionTitle, &section.title.entities);
    }

    for column in &table.columns {
        flags.observe_entities(SignalSource::HeaderEntity, column.header_entities.first());
    }

    if !flags.is_complete() {
        for column in &table.columns {
            flags.observe_keywords(&column.header_text);
        }
    }

    tracing::debug!(
        table_id = %table.id,
        trait_source = ?flags.contains_trait,
        marker_source = ?flags.contains_marker,
        significance_source = ?flags.contains_significance,
        "Resolved table flags"
    );
    flags
}

/// A trait list whose columns hold both traits and markers.
pub fn refine(table_type: TableType, columns: &[ColumnTypes]) -> TableType {
    let has = |t: ColumnType| columns.iter().any(|set| set.contains(&t));
    if table_type == TableType::TraitList && has(ColumnType::Trait) && has(ColumnType::Marker) {
        TableType::TraitAndMarkerList
    } else {
        table_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{build, table_doc};
    use extract::{Entity, EntityLabel};

    #[test]
    fn test_first_source_wins() {
        let mut flags = TableFlags::default();
        let trait_class = classify(&Entity::new(EntityLabel::Trait, "obesity", 0, (0, 1)));
        flags.observe(SignalSource::Caption, trait_class);
        flags.observe(SignalSource::Title, trait_class);
        assert_eq!(flags.contains_trait, Some(SignalSource::Caption));
    }

    #[test]
    fn test_title_trait_and_header_keywords_make_trait_list() {
        let table = build(&table_doc(
            "Table 2. Variants associated with obesity",
            &["SNP", "Gene", "P value"],
            &[("", vec![vec!["rs1", "FTO", "1e-8"]])],
        ));
        let flags = resolve(&table);
        assert_eq!(flags.contains_trait, Some(SignalSource::Title));
        assert_eq!(flags.contains_marker, Some(SignalSource::HeaderKeyword));
        assert_eq!(flags.contains_significance, Some(SignalSource::HeaderKeyword));
        assert_eq!(flags.table_type(), Some(TableType::TraitList));
    }

    #[test]
    fn test_caption_footer_and_section_title_in_priority_order() {
        let mut doc = table_doc(
            "Table 5",
            &["Phenotype", "SNP", "P value"],
            &[("Obesity rs7 (P = 1e-6)", vec![vec!["asthma", "rs1", "1e-8"]])],
        );
        let caption: ingest::Passage = serde_json::from_value(serde_json::json!({
            "text": "Associations with asthma",
            "infons": {"section_title_1": "table_caption", "id": "1"}
        }))
        .unwrap();
        let footer: ingest::Passage = serde_json::from_value(serde_json::json!({
            "text": "Lead variant rs99 was replicated",
            "infons": {"section_title_1": "table_footer", "id": "1"}
        }))
        .unwrap();
        doc.passages.insert(1, caption);
        doc.passages.push(footer);

        let flags = resolve(&build(&doc));
        // the section title also names a trait and a marker; earlier sources keep them
        assert_eq!(flags.contains_trait, Some(SignalSource::Caption));
        assert_eq!(flags.contains_marker, Some(SignalSource::Footer));
        assert_eq!(flags.contains_significance, Some(SignalSource::SectionTitle));
        assert_eq!(flags.table_type(), Some(TableType::TraitList));
    }

    #[test]
    fn test_section_title_is_not_replaced_by_headers() {
        let table = build(&table_doc(
            "Table 6",
            &["rs5 genotype", "P value"],
            &[("Variant rs3", vec![vec!["rs1", "1e-8"]])],
        ));
        let flags = resolve(&table);
        assert_eq!(flags.contains_marker, Some(SignalSource::SectionTitle));
        assert_eq!(flags.contains_significance, Some(SignalSource::HeaderKeyword));
    }

    #[test]
    fn test_marker_list_without_trait() {
        let table = build(&table_doc(
            "Table 3. Replication",
            &["SNP", "P value"],
            &[("", vec![vec!["rs1", "1e-8"]])],
        ));
        assert_eq!(resolve(&table).table_type(), Some(TableType::MarkerList));
    }

    #[test]
    fn test_only_first_header_entity_counts() {
        // "Obesity rs12" header: the marker entity is not the first one
        let table = build(&table_doc("Table 4", &["Obesity rs12"], &[("", vec![vec!["x"]])]));
        let flags = resolve(&table);
        assert_eq!(flags.contains_trait, Some(SignalSource::HeaderEntity));
        assert_eq!(flags.contains_marker, None);
        assert_eq!(flags.table_type(), None);
    }

    #[test]
    fn test_refine_needs_both_columns() {
        let trait_col = ColumnTypes::from([ColumnType::Trait]);
        let marker_col = ColumnTypes::from([ColumnType::Marker]);
        let p_col = ColumnTypes::from([ColumnType::Gee, ColumnType::Significance]);

        let both = [trait_col.clone(), marker_col.clone(), p_col.clone()];
        assert_eq!(refine(TableType::TraitList, &both), TableType::TraitAndMarkerList);
        assert_eq!(refine(TableType::MarkerList, &both), TableType::MarkerList);
        assert_eq!(refine(TableType::TraitList, &[marker_col, p_col]), TableType::TraitList);
    }
}
