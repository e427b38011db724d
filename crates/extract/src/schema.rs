use serde::{Deserialize, Serialize};

/// One genotype/phenotype/significance finding, from a sentence or a table row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub rs_identifier: Option<String>,
    pub gee_p_val: Option<String>,
    pub fbat_p_val: Option<String>,
    pub misc_p_val: Option<String>,
    pub phenotype: Option<String>,
}

impl MarkerRecord {
    pub fn has_significance(&self) -> bool {
        self.significance().is_some()
    }

    /// First p-value present, in GEE, FBAT, misc order.
    pub fn significance(&self) -> Option<&str> {
        self.gee_p_val
            .as_deref()
            .or(self.fbat_p_val.as_deref())
            .or(self.misc_p_val.as_deref())
    }

    /// A record worth reporting: marker, phenotype and at least one p-value.
    pub fn is_complete(&self) -> bool {
        self.rs_identifier.is_some() && self.phenotype.is_some() && self.has_significance()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Trait,
    GeneticVariant,
    Significance,
    Gene,
}

impl AnnotationType {
    pub fn id_prefix(&self) -> char {
        match self {
            AnnotationType::Trait => 'T',
            AnnotationType::GeneticVariant => 'M',
            AnnotationType::Significance => 'P',
            AnnotationType::Gene => 'G',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub offset: usize,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_cell_id: Option<String>,
}

impl Location {
    pub fn text(offset: usize, length: usize) -> Self {
        Self {
            offset,
            length,
            table_element: None,
            table_cell_id: None,
        }
    }

    pub fn cell(element: &str, cell_id: &str, length: usize) -> Self {
        Self {
            offset: 0,
            length,
            table_element: Some(element.to_string()),
            table_cell_id: Some(cell_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    pub identifier: String,
    pub locations: Vec<Location>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationNode {
    pub refid: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub nodes: Vec<RelationNode>,
}

impl Relation {
    /// Sorted annotation ids this relation links; identity for deduplication.
    pub fn node_key(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.iter().map(|n| n.refid.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
