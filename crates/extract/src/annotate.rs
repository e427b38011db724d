use std::collections::{HashMap, HashSet};

use crate::schema::{Annotation, AnnotationType, Location, Relation, RelationNode};

pub const ASSOCIATION_RELATION: &str = "GWAS_association";

/// Per-document id counters. Create one per document and thread it through
/// every assembly call; never share it across documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationContext {
    pub t: usize,
    pub m: usize,
    pub p: usize,
    pub g: usize,
    pub r: usize,
}

impl AnnotationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, kind: AnnotationType) -> String {
        let counter = match kind {
            AnnotationType::Trait => &mut self.t,
            AnnotationType::GeneticVariant => &mut self.m,
            AnnotationType::Significance => &mut self.p,
            AnnotationType::Gene => &mut self.g,
        };
        let id = format!("{}{}", kind.id_prefix(), counter);
        *counter += 1;
        id
    }

    pub fn next_relation_id(&mut self) -> String {
        let id = format!("R{}", self.r);
        self.r += 1;
        id
    }
}

/// Annotations and relations of one scope (a passage or a table).
///
/// Repeated text of the same type becomes one annotation with several locations.
#[derive(Debug, Default)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
    by_text: HashMap<(AnnotationType, String), usize>,
    relations: Vec<Relation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mention and return the id of the annotation it belongs to.
    pub fn register(
        &mut self,
        ctx: &mut AnnotationContext,
        kind: AnnotationType,
        text: &str,
        identifier: &str,
        location: Location,
    ) -> String {
        let key = (kind, text.to_string());
        if let Some(&idx) = self.by_text.get(&key) {
            let annotation = &mut self.annotations[idx];
            if !annotation.locations.contains(&location) {
                annotation.locations.push(location);
            }
            return annotation.id.clone();
        }

        let id = ctx.next_id(kind);
        self.by_text.insert(key, self.annotations.len());
        self.annotations.push(Annotation {
            id: id.clone(),
            annotation_type: kind,
            identifier: identifier.to_string(),
            locations: vec![location],
            text: text.to_string(),
        });
        id
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.annotations.iter().any(|a| a.id == id)
    }

    /// Link existing annotations. Returns `None` if any id is unknown.
    pub fn relate(&mut self, ctx: &mut AnnotationContext, relation_type: &str, refids: &[&str]) -> Option<Relation> {
        if refids.is_empty() || !refids.iter().all(|id| self.contains_id(id)) {
            return None;
        }
        let relation = Relation {
            id: ctx.next_relation_id(),
            relation_type: relation_type.to_string(),
            nodes: refids
                .iter()
                .map(|id| RelationNode {
                    refid: id.to_string(),
                    role: String::new(),
                })
                .collect(),
        };
        self.relations.push(relation.clone());
        Some(relation)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn into_parts(mut self) -> (Vec<Annotation>, Vec<Relation>) {
        dedup_relations(&mut self.relations);
        (self.annotations, self.relations)
    }
}

/// Drop relations linking the same set of annotations as an earlier one.
pub fn dedup_relations(relations: &mut Vec<Relation>) {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    relations.retain(|relation| {
        let key: Vec<String> = relation.node_key().into_iter().map(str::to_string).collect();
        seen.insert(key)
    });
}
