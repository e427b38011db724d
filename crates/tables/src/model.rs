//! Table model built from the passages of one BioC table.

use extract::{Entity, NlpEngine};
use ingest::{Cell, Passage, TableElement};

use crate::columns::ColumnTypes;
use crate::error::{Result, TableError};

/// Free text attached to a table with the entities found in it.
#[derive(Debug, Clone, Default)]
pub struct TextBlock {
    pub text: String,
    pub entities: Vec<Entity>,
}

impl TextBlock {
    fn analyze(engine: &dyn NlpEngine, text: &str) -> Self {
        if text.trim().is_empty() {
            return Self {
                text: text.to_string(),
                entities: Vec::new(),
            };
        }
        let entities = match engine.analyze(text) {
            Ok(parsed) => parsed.entities,
            Err(e) => {
                tracing::warn!(error = %e, text = %text, "Failed to analyze table text");
                Vec::new()
            }
        };
        Self {
            text: text.to_string(),
            entities,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub header_text: String,
    pub header_cell_id: String,
    pub header_entities: Vec<Entity>,
    pub inferred_types: ColumnTypes,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub title: TextBlock,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub id: String,
    pub title: Option<TextBlock>,
    pub caption: Option<TextBlock>,
    pub footer: Option<TextBlock>,
    pub columns: Vec<Column>,
    pub sections: Vec<Section>,
}

impl Table {
    /// Build a table from the passages sharing one table id.
    pub fn build(engine: &dyn NlpEngine, table_id: &str, passages: &[&Passage]) -> Result<Self> {
        let missing = |field| TableError::MissingContent {
            table_id: table_id.to_string(),
            field,
        };

        let content = passages
            .iter()
            .find(|p| p.table_element() == Some(TableElement::Content))
            .ok_or_else(|| missing("a table_content passage"))?;
        let headings = content.column_headings.as_ref().ok_or_else(|| missing("column_headings"))?;
        let data = content.data_section.as_ref().ok_or_else(|| missing("data_section"))?;

        if headings.is_empty() {
            return Err(TableError::NoColumns(table_id.to_string()));
        }

        let block = |element: TableElement| {
            passages
                .iter()
                .find(|p| p.table_element() == Some(element))
                .map(|p| TextBlock::analyze(engine, &p.text))
        };

        let columns: Vec<Column> = headings
            .iter()
            .map(|cell| Column {
                header_text: cell.cell_text.clone(),
                header_cell_id: cell.cell_id.clone(),
                header_entities: TextBlock::analyze(engine, &cell.cell_text).entities,
                inferred_types: ColumnTypes::new(),
            })
            .collect();

        let sections: Vec<Section> = data
            .iter()
            .map(|section| Section {
                title: TextBlock::analyze(engine, &section.table_section_title_1),
                rows: section.data_rows.clone(),
            })
            .collect();

        let table = Self {
            id: table_id.to_string(),
            title: block(TableElement::Title),
            caption: block(TableElement::Caption),
            footer: block(TableElement::Footer),
            columns,
            sections,
        };
        table.warn_ragged_rows();

        tracing::debug!(
            table_id = %table.id,
            columns = table.columns.len(),
            sections = table.sections.len(),
            rows = table.row_count(),
            "Built table"
        );
        Ok(table)
    }

    fn warn_ragged_rows(&self) {
        let width = self.columns.len();
        for (s, section) in self.sections.iter().enumerate() {
            for (r, row) in section.rows.iter().enumerate() {
                if row.len().abs_diff(width) > 1 {
                    tracing::warn!(
                        table_id = %self.id,
                        section = s,
                        row = r,
                        cells = row.len(),
                        headers = width,
                        "Row width differs from header width"
                    );
                }
            }
        }
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    /// Text of every cell in a column, one entry per row over all sections.
    /// Rows too short to reach the column read as blank.
    pub fn column_cells(&self, column: usize) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|s| &s.rows)
            .map(|row| row.get(column).map_or("", |cell| cell.cell_text.as_str()))
            .collect()
    }

    pub fn cell(&self, section: usize, row: usize, column: usize) -> Option<&Cell> {
        self.sections.get(section)?.rows.get(row)?.get(column)
    }

    pub fn set_column_types(&mut self, types: Vec<ColumnTypes>) {
        for (column, types) in self.columns.iter_mut().zip(types) {
            column.inferred_types = types;
        }
    }

    /// Title and caption blocks, in that order.
    pub fn headline_blocks(&self) -> impl Iterator<Item = (TableElement, &TextBlock)> {
        let title = self.title.iter().map(|b| (TableElement::Title, b));
        let caption = self.caption.iter().map(|b| (TableElement::Caption, b));
        title.chain(caption)
    }
}
