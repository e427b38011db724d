//! BioC JSON collection model, covering plain text and table passages.

use extract::{Annotation, Relation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Infons = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub infons: Infons,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub infons: Infons,
    #[serde(default)]
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub infons: Infons,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_headings: Option<Vec<Cell>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_section: Option<Vec<DataSection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_id: String,
    #[serde(default)]
    pub cell_text: String,
}

impl Cell {
    pub fn new(cell_id: &str, cell_text: &str) -> Self {
        Self {
            cell_id: cell_id.to_string(),
            cell_text: cell_text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default)]
    pub table_section_title_1: String,
    #[serde(default)]
    pub data_rows: Vec<Vec<Cell>>,
}

/// Role of a passage within a table, from `infons.section_title_1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableElement {
    Title,
    Caption,
    Footer,
    Content,
}

impl TableElement {
    pub fn from_infon(value: &str) -> Option<Self> {
        match value {
            "table_title" => Some(TableElement::Title),
            "table_caption" => Some(TableElement::Caption),
            "table_footer" => Some(TableElement::Footer),
            "table_content" => Some(TableElement::Content),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableElement::Title => "table_title",
            TableElement::Caption => "table_caption",
            TableElement::Footer => "table_footer",
            TableElement::Content => "table_content",
        }
    }
}

impl Passage {
    pub fn text(offset: usize, text: &str) -> Self {
        Self {
            offset,
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn infon_str(&self, key: &str) -> Option<&str> {
        self.infons.get(key).and_then(Value::as_str)
    }

    pub fn table_element(&self) -> Option<TableElement> {
        self.infon_str("section_title_1").and_then(TableElement::from_infon)
    }

    pub fn is_table(&self) -> bool {
        self.table_element().is_some()
    }

    /// Table id shared by all passages of one table.
    pub fn table_id(&self) -> Option<String> {
        match self.infons.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Serialized parse supplied alongside the passage, if any.
    pub fn parse_payload(&self) -> Option<&Value> {
        self.infons.get("parse")
    }
}

impl Document {
    pub fn text_passages(&self) -> impl Iterator<Item = (usize, &Passage)> {
        self.passages.iter().enumerate().filter(|(_, p)| !p.is_table())
    }

    /// Table passage indices grouped by table id, in first-seen order.
    ///
    /// Table passages without an id form a group of their own.
    pub fn table_groups(&self) -> Vec<(String, Vec<usize>)> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, passage) in self.passages.iter().enumerate() {
            if !passage.is_table() {
                continue;
            }
            let id = passage.table_id().unwrap_or_else(|| format!("passage-{}", i));
            match groups.iter_mut().find(|(g, _)| *g == id) {
                Some((_, members)) => members.push(i),
                None => groups.push((id, vec![i])),
            }
        }
        groups
    }
}
