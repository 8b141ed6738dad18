//! Constraint graph over `(relation, column)` nodes
//!
//! An undirected edge links two columns that share a declared domain tag
//! and have an observed sample overlap of at least one value; the edge
//! weight is the estimated count of shared distinct values. The enumerator
//! walks this graph to propose equi-joins.
//!
//! Nodes live in a petgraph arena addressed by integer indices, so the
//! cyclic structure carries no owning pointer cycles. The edge set is
//! frozen after construction.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::catalog::Catalog;

/// One `(relation, column_index)` node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnNode {
    /// Relation name
    pub relation: Arc<str>,
    /// Column position within the relation
    pub column: usize,
}

/// Join-compatibility graph over catalog columns
pub struct ConstraintGraph {
    graph: UnGraph<ColumnNode, u64>,
    /// Relation name → index into `offsets`
    relations: HashMap<Arc<str>, usize, RandomState>,
    /// First node index of each relation's column block
    offsets: Vec<usize>,
}

impl ConstraintGraph {
    /// Build the graph from catalog statistics
    pub fn build(catalog: &Catalog) -> ConstraintGraph {
        let mut graph = UnGraph::new_undirected();
        let mut relations: HashMap<Arc<str>, usize, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut offsets = Vec::with_capacity(catalog.relations().len());

        // Nodes are added in catalog order, making indices deterministic.
        let mut flat: Vec<(usize, usize, NodeIndex)> = Vec::new();
        for (rel_idx, relation) in catalog.relations().iter().enumerate() {
            let name: Arc<str> = Arc::from(relation.name.as_str());
            relations.insert(Arc::clone(&name), rel_idx);
            offsets.push(graph.node_count());
            for col_idx in 0..relation.arity() {
                let node = graph.add_node(ColumnNode {
                    relation: Arc::clone(&name),
                    column: col_idx,
                });
                flat.push((rel_idx, col_idx, node));
            }
        }

        for (i, &(rel_a, col_a, node_a)) in flat.iter().enumerate() {
            let domain_a = catalog.relations()[rel_a].columns[col_a].domain;
            let stats_a = &catalog.stats(rel_a).columns[col_a];
            for &(rel_b, col_b, node_b) in flat.iter().skip(i + 1) {
                if catalog.relations()[rel_b].columns[col_b].domain != domain_a {
                    continue;
                }
                let overlap = stats_a.overlap(&catalog.stats(rel_b).columns[col_b]);
                if overlap >= 1 {
                    graph.add_edge(node_a, node_b, overlap);
                }
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "constraint graph built"
        );
        ConstraintGraph {
            graph,
            relations,
            offsets,
        }
    }

    fn node_index(&self, relation: &str, column: usize) -> Option<NodeIndex> {
        let rel_idx = *self.relations.get(relation)?;
        Some(NodeIndex::new(self.offsets[rel_idx] + column))
    }

    /// Join-compatible columns of `(relation, column)`, sorted by
    /// descending weight with a lexicographic `(relation, column)`
    /// tie-break. Deterministic order is a contract: it fixes the
    /// enumerator's candidate stream.
    pub fn neighbors(&self, relation: &str, column: usize) -> Vec<(ColumnNode, u64)> {
        let Some(node) = self.node_index(relation, column) else {
            return Vec::new();
        };
        let mut out: Vec<(ColumnNode, u64)> = self
            .graph
            .edges(node)
            .map(|edge| {
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                (self.graph[other].clone(), *edge.weight())
            })
            .collect();
        out.sort_by(|(a, wa), (b, wb)| {
            wb.cmp(wa)
                .then_with(|| a.relation.cmp(&b.relation))
                .then_with(|| a.column.cmp(&b.column))
        });
        out
    }

    /// Whether any column of `relation` participates in the graph
    pub fn contains(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Number of column nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of join-compatibility edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fixture() -> Catalog {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE a (id INTEGER, label TEXT);
             CREATE TABLE b (ref_id INTEGER, note TEXT);
             CREATE TABLE c (key INTEGER);
             INSERT INTO a VALUES (1, 'one'), (2, 'two'), (3, 'three');
             INSERT INTO b VALUES (2, 'one'), (3, 'zzz'), (4, 'yyy');
             INSERT INTO c VALUES (3), (4), (5);",
        )
        .unwrap();
        Catalog::load(&conn).unwrap()
    }

    #[test]
    fn test_edges_require_same_domain_and_overlap() {
        let catalog = fixture();
        let graph = ConstraintGraph::build(&catalog);

        // a.id overlaps b.ref_id {2,3} and c.key {3}.
        let neighbors = graph.neighbors("a", 0);
        let named: Vec<(String, usize, u64)> = neighbors
            .iter()
            .map(|(n, w)| (n.relation.to_string(), n.column, *w))
            .collect();
        assert_eq!(
            named,
            vec![("b".to_string(), 0, 2), ("c".to_string(), 0, 1)]
        );

        // a.label (text) never joins an integer column.
        assert!(graph
            .neighbors("a", 1)
            .iter()
            .all(|(n, _)| n.relation.as_ref() == "b" && n.column == 1));
    }

    #[test]
    fn test_symmetry() {
        let catalog = fixture();
        let graph = ConstraintGraph::build(&catalog);
        let forward = graph
            .neighbors("a", 0)
            .iter()
            .any(|(n, _)| n.relation.as_ref() == "b" && n.column == 0);
        let backward = graph
            .neighbors("b", 0)
            .iter()
            .any(|(n, _)| n.relation.as_ref() == "a" && n.column == 0);
        assert!(forward && backward);
    }

    #[test]
    fn test_no_self_loops() {
        let catalog = fixture();
        let graph = ConstraintGraph::build(&catalog);
        for relation in catalog.relations() {
            for column in 0..relation.arity() {
                assert!(graph
                    .neighbors(&relation.name, column)
                    .iter()
                    .all(|(n, _)| !(n.relation.as_ref() == relation.name && n.column == column)));
            }
        }
    }

    #[test]
    fn test_contains() {
        let catalog = fixture();
        let graph = ConstraintGraph::build(&catalog);
        assert!(graph.contains("a"));
        assert!(!graph.contains("missing"));
    }

    #[test]
    fn test_neighbor_order_deterministic() {
        let catalog = fixture();
        let g1 = ConstraintGraph::build(&catalog);
        let g2 = ConstraintGraph::build(&catalog);
        assert_eq!(g1.neighbors("a", 0), g2.neighbors("a", 0));
    }
}
