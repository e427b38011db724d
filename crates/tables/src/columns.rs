//! Column role classification from header keywords and cell statistics.
//!
//! Each cell is sorted into a coarse category by regex. A header keyword
//! proposes a role and the column keeps it only when the matching category
//! dominates the column.

use extract::pvalue;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::model::Table;

/// Percentage of rows a category must exceed to dominate a column.
pub const DOMINANCE_THRESHOLD: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Marker,
    Trait,
    Significance,
    Gee,
    Fbat,
    MiscPval,
}

/// Roles of one column. Empty means the column has no role.
pub type ColumnTypes = BTreeSet<ColumnType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellCategory {
    Rsid,
    Integer,
    PValue,
    Blank,
    Other,
}

/// Integer is tested before p-value so row numbers never read as significance.
pub fn categorize(text: &str) -> CellCategory {
    let text = text.trim();
    if text.is_empty() {
        CellCategory::Blank
    } else if pvalue::is_rsid(text) {
        CellCategory::Rsid
    } else if pvalue::is_integer(text) {
        CellCategory::Integer
    } else if pvalue::is_p_value(text) {
        CellCategory::PValue
    } else {
        CellCategory::Other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub rows: usize,
    pub rsid: usize,
    pub integer: usize,
    pub p_value: usize,
    pub blank: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = Self::default();
        for cell in cells {
            counts.rows += 1;
            match categorize(cell) {
                CellCategory::Rsid => counts.rsid += 1,
                CellCategory::Integer => counts.integer += 1,
                CellCategory::PValue => counts.p_value += 1,
                CellCategory::Blank => counts.blank += 1,
                CellCategory::Other => counts.other += 1,
            }
        }
        counts
    }

    fn exceeds(count: usize, total: usize, threshold: usize) -> bool {
        total > 0 && count * 100 > threshold * total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct HeaderKeywords {
    marker: bool,
    gee: bool,
    fbat: bool,
    p_val: bool,
    trait_like: bool,
}

impl HeaderKeywords {
    fn scan(header: &str) -> Self {
        let h = header.to_lowercase();
        Self {
            marker: h.contains("marker") || h.contains("snp"),
            gee: h.contains("gee"),
            fbat: h.contains("fbat"),
            p_val: h.contains("p-val") || h.contains("p value") || h.contains("pvalue"),
            trait_like: h.contains("phenotype") || h.contains("trait"),
        }
    }
}

/// Blank headers and headers of one repeated character (`---`, `***`).
pub fn is_degenerate_header(header: &str) -> bool {
    let mut chars = header.trim().chars().filter(|c| !c.is_whitespace());
    match chars.next() {
        None => true,
        Some(first) => chars.all(|c| c == first),
    }
}

#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    threshold: usize,
}

impl Default for ColumnClassifier {
    fn default() -> Self {
        Self::new(DOMINANCE_THRESHOLD)
    }
}

impl ColumnClassifier {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    fn dominant(&self, count: usize, counts: &CategoryCounts) -> bool {
        CategoryCounts::exceeds(count, counts.rows, self.threshold)
    }

    /// Trait columns keep blank carry-forward cells, so text is measured
    /// against non-blank rows.
    fn trait_confirmed(&self, counts: &CategoryCounts) -> bool {
        CategoryCounts::exceeds(counts.other, counts.rows - counts.blank, self.threshold)
    }

    pub fn classify_column<'a>(&self, header: &str, cells: impl IntoIterator<Item = &'a str>) -> ColumnTypes {
        let mut types = ColumnTypes::new();
        if is_degenerate_header(header) {
            return types;
        }

        let keywords = HeaderKeywords::scan(header);
        let counts = CategoryCounts::from_cells(cells);
        let p_value_dominant = self.dominant(counts.p_value, &counts);

        if keywords.marker && self.dominant(counts.rsid, &counts) {
            types.insert(ColumnType::Marker);
        }
        if keywords.gee && p_value_dominant {
            types.extend([ColumnType::Gee, ColumnType::Significance]);
        }
        if keywords.fbat && p_value_dominant {
            types.extend([ColumnType::Fbat, ColumnType::Significance]);
        }
        if keywords.p_val && !keywords.gee && !keywords.fbat && p_value_dominant {
            types.extend([ColumnType::MiscPval, ColumnType::Significance]);
        }
        if keywords.trait_like && !keywords.p_val && self.trait_confirmed(&counts) {
            types.insert(ColumnType::Trait);
        }

        tracing::trace!(header = %header, ?counts, ?types, "Classified column");
        types
    }

    /// Per-column roles, or `None` when the table lacks a subject column
    /// (trait or marker) or a p-value column.
    pub fn classify(&self, table: &Table) -> Option<Vec<ColumnTypes>> {
        let types: Vec<ColumnTypes> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| self.classify_column(&column.header_text, table.column_cells(i)))
            .collect();

        let has = |t: ColumnType| types.iter().any(|set| set.contains(&t));
        let has_subject = has(ColumnType::Trait) || has(ColumnType::Marker);
        let has_p_value = has(ColumnType::Gee) || has(ColumnType::Fbat) || has(ColumnType::MiscPval);

        if has_subject && has_p_value {
            Some(types)
        } else {
            tracing::debug!(table_id = %table.id, has_subject, has_p_value, "Table is unclassifiable");
            None
        }
    }
}
