use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;

use crate::nlp::{Sentence, Token};

/// Undirected dependency graph of one sentence.
///
/// Nodes are keyed by `{lowercased_text}<id{token_index}>` so repeated words
/// stay distinct.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: UnGraph<String, ()>,
    key_to_idx: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_key(token: &Token) -> String {
        format!("{}<id{}>", token.lowercase_text, token.index)
    }

    /// One edge per (head, child) pair inside the sentence.
    pub fn from_sentence(sentence: &Sentence) -> Self {
        let mut graph = Self::new();
        let tokens = &sentence.doc.tokens;

        for token in sentence.tokens() {
            graph.ensure_node(Self::node_key(token));
        }
        for token in sentence.tokens() {
            let head_key = Self::node_key(token);
            for &child in &token.children {
                if sentence.contains(child) {
                    graph.add_edge(&head_key, &Self::node_key(&tokens[child]));
                }
            }
        }

        tracing::trace!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built dependency graph"
        );
        graph
    }

    pub fn ensure_node(&mut self, key: String) -> NodeIndex {
        if let Some(&idx) = self.key_to_idx.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.key_to_idx.insert(key, idx);
        idx
    }

    pub fn add_edge(&mut self, a: &str, b: &str) {
        let a = self.ensure_node(a.to_string());
        let b = self.ensure_node(b.to_string());
        self.graph.update_edge(a, b, ());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_idx.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edge count of the shortest path, `None` when unknown or disconnected.
    pub fn shortest_path_len(&self, source: &str, target: &str) -> Option<usize> {
        let source = *self.key_to_idx.get(source)?;
        let target = *self.key_to_idx.get(target)?;
        let costs = dijkstra(&self.graph, source, Some(target), |_| 1usize);
        costs.get(&target).copied()
    }
}
