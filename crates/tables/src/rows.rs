//! Row extraction: marker records from classified table rows.

use extract::MarkerRecord;
use regex::Regex;
use std::sync::OnceLock;

use crate::columns::{ColumnType, ColumnTypes};
use crate::model::Table;

/// Cell ids a record's fields were read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSources {
    pub rs_identifier: Option<String>,
    pub phenotype: Option<String>,
    pub gee_p_val: Option<String>,
    pub fbat_p_val: Option<String>,
    pub misc_p_val: Option<String>,
}

impl RecordSources {
    /// Cell id of the p-value `MarkerRecord::significance` returns.
    pub fn significance(&self, record: &MarkerRecord) -> Option<&str> {
        if record.gee_p_val.is_some() {
            self.gee_p_val.as_deref()
        } else if record.fbat_p_val.is_some() {
            self.fbat_p_val.as_deref()
        } else {
            self.misc_p_val.as_deref()
        }
    }
}

/// A record with its position in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub record: MarkerRecord,
    pub section: usize,
    pub row: usize,
    pub sources: RecordSources,
}

fn sub_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(gee|fbat)\b|p[- ]?val(ue)?s?|\bp\b|[()\[\]:;,_]").unwrap())
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Header text with test names and p-value words removed: "BMI GEE p-value" is "BMI".
pub fn sub_label(header: &str) -> Option<String> {
    let stripped = sub_label_regex().replace_all(header, " ");
    let label = whitespace_regex().replace_all(stripped.trim(), " ");
    let label = label.trim_matches(|c: char| c == '-' || c.is_whitespace());
    (!label.is_empty()).then(|| label.to_string())
}

#[derive(Debug, Clone, Default)]
struct Layout {
    trait_col: Option<usize>,
    marker_col: Option<usize>,
    gee: Vec<usize>,
    fbat: Vec<usize>,
    misc: Vec<usize>,
}

impl Layout {
    fn new(types: &[ColumnTypes]) -> Self {
        let with = |t: ColumnType| -> Vec<usize> {
            types
                .iter()
                .enumerate()
                .filter(|(_, set)| set.contains(&t))
                .map(|(i, _)| i)
                .collect()
        };
        Self {
            trait_col: with(ColumnType::Trait).first().copied(),
            marker_col: with(ColumnType::Marker).first().copied(),
            gee: with(ColumnType::Gee),
            fbat: with(ColumnType::Fbat),
            misc: with(ColumnType::MiscPval),
        }
    }
}

/// Non-blank trimmed text and id of a cell.
type CellValue = (String, String);

pub struct RowExtractor<'a> {
    table: &'a Table,
    layout: Layout,
    default_phenotype: Option<String>,
}

impl<'a> RowExtractor<'a> {
    pub fn new(table: &'a Table, types: &[ColumnTypes]) -> Self {
        Self {
            table,
            layout: Layout::new(types),
            default_phenotype: None,
        }
    }

    /// Phenotype for every row when the table has no trait column.
    pub fn with_default_phenotype(mut self, phenotype: Option<String>) -> Self {
        self.default_phenotype = phenotype;
        self
    }

    fn value(&self, section: usize, row: usize, column: Option<usize>) -> Option<CellValue> {
        let cell = self.table.cell(section, row, column?)?;
        let text = cell.cell_text.trim();
        (!text.is_empty()).then(|| (text.to_string(), cell.cell_id.clone()))
    }

    /// Trait cell of this row, or the nearest non-blank one above it in the same section.
    fn phenotype(&self, section: usize, row: usize) -> Option<CellValue> {
        let column = self.layout.trait_col?;
        (0..=row).rev().find_map(|r| self.value(section, r, Some(column)))
    }

    /// GEE columns with distinct labels, when there is more than one.
    fn labelled_gee(&self) -> Vec<(usize, String)> {
        let mut labelled: Vec<(usize, String)> = Vec::new();
        for &column in &self.layout.gee {
            let Some(label) = sub_label(&self.table.columns[column].header_text) else {
                continue;
            };
            if !labelled.iter().any(|(_, l)| l.eq_ignore_ascii_case(&label)) {
                labelled.push((column, label));
            }
        }
        if labelled.len() > 1 { labelled } else { Vec::new() }
    }

    fn fbat_for_label(&self, label: &str) -> Option<usize> {
        self.layout.fbat.iter().copied().find(|&column| {
            sub_label(&self.table.columns[column].header_text).is_some_and(|l| l.eq_ignore_ascii_case(label))
        })
    }

    pub fn extract(&self) -> Vec<RowRecord> {
        let split = self.labelled_gee();
        let mut records = Vec::new();

        for (s, section) in self.table.sections.iter().enumerate() {
            for r in 0..section.rows.len() {
                let marker = self.value(s, r, self.layout.marker_col);
                let phenotype = self.phenotype(s, r);

                let base = |phenotype: Option<CellValue>, default: Option<&String>| {
                    let mut record = MarkerRecord {
                        rs_identifier: marker.as_ref().map(|(text, _)| text.clone()),
                        ..Default::default()
                    };
                    let mut sources = RecordSources {
                        rs_identifier: marker.as_ref().map(|(_, id)| id.clone()),
                        ..Default::default()
                    };
                    match phenotype {
                        Some((text, id)) => {
                            record.phenotype = Some(text);
                            sources.phenotype = Some(id);
                        }
                        None => record.phenotype = default.cloned(),
                    }
                    (record, sources)
                };

                if split.is_empty() {
                    let (mut record, mut sources) = base(phenotype, self.default_phenotype.as_ref());
                    let first = |columns: &[usize]| self.value(s, r, columns.first().copied());
                    if let Some((text, id)) = first(&self.layout.gee) {
                        record.gee_p_val = Some(text);
                        sources.gee_p_val = Some(id);
                    }
                    if let Some((text, id)) = first(&self.layout.fbat) {
                        record.fbat_p_val = Some(text);
                        sources.fbat_p_val = Some(id);
                    }
                    if let Some((text, id)) = first(&self.layout.misc) {
                        record.misc_p_val = Some(text);
                        sources.misc_p_val = Some(id);
                    }
                    records.push(RowRecord { record, section: s, row: r, sources });
                    continue;
                }

                for (column, label) in &split {
                    let header_id = self.table.columns[*column].header_cell_id.clone();
                    let (mut record, mut sources) = base(Some((label.clone(), header_id)), None);
                    if let Some((text, id)) = self.value(s, r, Some(*column)) {
                        record.gee_p_val = Some(text);
                        sources.gee_p_val = Some(id);
                    }
                    if let Some((text, id)) = self.value(s, r, self.fbat_for_label(label)) {
                        record.fbat_p_val = Some(text);
                        sources.fbat_p_val = Some(id);
                    }
                    records.push(RowRecord { record, section: s, row: r, sources });
                }
            }
        }

        tracing::debug!(
            table_id = %self.table.id,
            records = records.len(),
            split_by_gee_label = !split.is_empty(),
            "Extracted table rows"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnClassifier;
    use crate::model::tests::{build, table_doc};

    fn extract(table: &Table) -> Vec<RowRecord> {
        let types = ColumnClassifier::default().classify(table).unwrap();
        RowExtractor::new(table, &types).extract()
    }

    #[test]
    fn test_carry_forward_within_section() {
        let table = build(&table_doc(
            "T",
            &["Phenotype", "SNP", "P value"],
            &[("", vec![vec!["ObesityRisk", "rs1", "1e-5"], vec!["", "rs2", "1e-6"]])],
        ));
        let records = extract(&table);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.record.phenotype.as_deref() == Some("ObesityRisk")));
        // carried value keeps the cell it came from
        assert_eq!(records[1].sources.phenotype.as_deref(), Some("1.2.1"));
        assert_eq!(records[1].record.misc_p_val.as_deref(), Some("1e-6"));
    }

    #[test]
    fn test_carry_forward_stops_at_section_boundary() {
        let table = build(&table_doc(
            "T",
            &["Phenotype", "SNP", "P value"],
            &[
                ("Stage 1", vec![vec!["Obesity", "rs1", "1e-5"], vec!["Asthma", "rs2", "1e-6"], vec!["Asthma", "rs5", "1e-6"]]),
                ("Stage 2", vec![vec!["", "rs3", "1e-7"]]),
            ],
        ));
        let records = extract(&table);
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].record.phenotype, None);
        assert_eq!(records[3].section, 1);
    }

    #[test]
    fn test_multiple_gee_labels_split_rows() {
        let table = build(&table_doc(
            "T",
            &["SNP", "BMI GEE p-value", "WHR GEE p-value", "BMI FBAT p-value"],
            &[("", vec![vec!["rs1", "1e-5", "0.02", "3e-4"]])],
        ));
        let records = extract(&table);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].record.phenotype.as_deref(), Some("BMI"));
        assert_eq!(records[0].record.gee_p_val.as_deref(), Some("1e-5"));
        assert_eq!(records[0].record.fbat_p_val.as_deref(), Some("3e-4"));

        assert_eq!(records[1].record.phenotype.as_deref(), Some("WHR"));
        assert_eq!(records[1].record.gee_p_val.as_deref(), Some("0.02"));
        assert_eq!(records[1].record.fbat_p_val, None);
        assert!(records.iter().all(|r| r.record.rs_identifier.as_deref() == Some("rs1")));
    }

    #[test]
    fn test_rows_without_p_values_are_kept() {
        let table = build(&table_doc(
            "T",
            &["SNP", "P value"],
            &[(
                "",
                vec![
                    vec!["rs1", "1e-5"],
                    vec!["rs2", "1e-6"],
                    vec!["rs3", "1e-4"],
                    vec!["rs4", "1e-9"],
                    vec!["rs5", "2e-7"],
                    vec!["rs6", ""],
                ],
            )],
        ));
        let records = extract(&table);
        assert_eq!(records.len(), 6);
        assert!(!records[5].record.has_significance());
        assert_eq!(records[5].record.rs_identifier.as_deref(), Some("rs6"));
    }

    #[test]
    fn test_short_rows_skip_missing_cells() {
        let table = build(&table_doc(
            "T",
            &["SNP", "P value"],
            &[(
                "",
                vec![
                    vec!["rs1", "1e-5"],
                    vec!["rs2", "2e-5"],
                    vec!["rs3", "3e-5"],
                    vec!["rs4", "4e-5"],
                    vec!["rs5", "5e-5"],
                    vec!["rs6"],
                ],
            )],
        ));
        let records = extract(&table);
        assert_eq!(records.len(), 6);
        assert_eq!(records[5].record.misc_p_val, None);
    }

    #[test]
    fn test_default_phenotype_without_trait_column() {
        let table = build(&table_doc("T", &["SNP", "P value"], &[("", vec![vec!["rs1", "1e-5"]])]));
        let types = ColumnClassifier::default().classify(&table).unwrap();
        let records = RowExtractor::new(&table, &types)
            .with_default_phenotype(Some("obesity".to_string()))
            .extract();
        assert_eq!(records[0].record.phenotype.as_deref(), Some("obesity"));
        assert_eq!(records[0].sources.phenotype, None);
    }

    #[test]
    fn test_sub_label() {
        assert_eq!(sub_label("BMI GEE p-value").as_deref(), Some("BMI"));
        assert_eq!(sub_label("P (GEE)"), None);
        assert_eq!(sub_label("Waist circumference FBAT").as_deref(), Some("Waist circumference"));
    }
}
