use crate::resolve;
use codemap_extractor::FileRecord;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Bidirectional dependency graph over a set of file records.
///
/// Derived state, never persisted: both edge directions live in one petgraph
/// `DiGraph`, so the reverse relation is exactly the inverse of the forward
/// one at all times. `build` is idempotent: it starts from scratch every time
/// and re-resolves every import against the record set it was handed, so an
/// edge whose target record has disappeared is dropped at build time.
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    path_index: HashMap<String, NodeIndex>,
    forward: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph from the current record set.
    ///
    /// Unresolved imports (external packages, misses) contribute no edge.
    /// Self-imports are ignored. Duplicate imports of one target collapse to
    /// a single edge.
    pub fn build(records: &BTreeMap<String, FileRecord>) -> Self {
        let mut graph = DiGraph::new();
        let mut path_index = HashMap::with_capacity(records.len());

        for path in records.keys() {
            let index = graph.add_node(path.clone());
            path_index.insert(path.clone(), index);
        }

        let mut forward = BTreeMap::new();
        for (path, record) in records {
            let mut targets = BTreeSet::new();
            for import in &record.imports {
                let resolved = resolve::resolve(path, &import.raw_specifier, |candidate| {
                    records.contains_key(candidate)
                });
                if let Some(target) = resolved {
                    if target != *path {
                        targets.insert(target);
                    }
                }
            }

            if let Some(&from) = path_index.get(path) {
                for target in &targets {
                    if let Some(&to) = path_index.get(target) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
            forward.insert(path.clone(), targets.into_iter().collect());
        }

        log::debug!(
            "dependency graph built: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Self {
            graph,
            path_index,
            forward,
        }
    }

    /// Resolved forward edges per file, sorted; every indexed file has an
    /// entry, files with no internal dependencies map to an empty list
    pub fn connections(&self) -> &BTreeMap<String, Vec<String>> {
        &self.forward
    }

    /// Files `path` imports (resolved), sorted
    pub fn dependencies_of(&self, path: &str) -> &[String] {
        self.forward.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Files that import `path`, sorted
    pub fn importers_of(&self, path: &str) -> Vec<String> {
        let Some(&index) = self.path_index.get(path) else {
            return Vec::new();
        };
        let mut importers: Vec<String> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        importers.sort();
        importers
    }

    /// Bounded bidirectional breadth-first neighborhood of `start`.
    ///
    /// Expands imports and importers alike, spending one unit of `max_depth`
    /// per hop. The start file itself is never part of the result, a depth of
    /// zero yields the empty set, and visited tracking makes cycles safe.
    /// Unknown start paths yield the empty set.
    pub fn related_files(&self, start: &str, max_depth: u32) -> BTreeSet<String> {
        let mut related = BTreeSet::new();
        if max_depth == 0 {
            return related;
        }
        let Some(&start_index) = self.path_index.get(start) else {
            return related;
        };

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        visited.insert(start_index);
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::new();
        queue.push_back((start_index, 0));

        while let Some((index, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for direction in [Direction::Outgoing, Direction::Incoming] {
                for neighbor in self.graph.neighbors_directed(index, direction) {
                    if visited.insert(neighbor) {
                        if let Some(path) = self.graph.node_weight(neighbor) {
                            related.insert(path.clone());
                        }
                        queue.push_back((neighbor, depth + 1));
                    }
                }
            }
        }
        related
    }

    /// Whether `path` is a node in the graph
    pub fn contains(&self, path: &str) -> bool {
        self.path_index.contains_key(path)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemap_extractor::{FileKind, ImportRecord};
    use pretty_assertions::assert_eq;

    fn record(path: &str, imports: &[&str]) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            kind: FileKind::Module,
            depth: 4,
            imports: imports
                .iter()
                .map(|s| ImportRecord::new(*s, Vec::new()))
                .collect(),
            exports: Vec::new(),
            declared_symbols: Vec::new(),
            resolved_dependencies: BTreeSet::new(),
            mod_time: 0,
            cached_at: 0,
        }
    }

    fn records(entries: &[(&str, &[&str])]) -> BTreeMap<String, FileRecord> {
        entries
            .iter()
            .map(|(path, imports)| (path.to_string(), record(path, imports)))
            .collect()
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_three_file_scenario() {
        let records = records(&[
            ("a.js", &["./b"] as &[&str]),
            ("b.js", &[]),
            ("c.js", &["./missing"]),
        ]);
        let graph = DependencyGraph::build(&records);

        assert_eq!(graph.dependencies_of("a.js"), &["b.js".to_string()]);
        assert_eq!(graph.dependencies_of("c.js"), &[] as &[String]);
        assert_eq!(graph.importers_of("b.js"), vec!["a.js".to_string()]);
        assert_eq!(graph.related_files("b.js", 1), set(&["a.js"]));
    }

    #[test]
    fn test_symmetry_between_directions() {
        let records = records(&[
            ("a.js", &["./b", "./c"] as &[&str]),
            ("b.js", &["./c"]),
            ("c.js", &[]),
        ]);
        let graph = DependencyGraph::build(&records);

        for (path, _) in &records {
            for dep in graph.dependencies_of(path) {
                assert!(
                    graph.importers_of(dep).contains(path),
                    "{path} -> {dep} has no mirror"
                );
            }
            for importer in graph.importers_of(path) {
                assert!(
                    graph.dependencies_of(&importer).contains(path),
                    "{importer} -> {path} missing forward"
                );
            }
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let records = records(&[("a.js", &["./b"] as &[&str]), ("b.js", &["./a"])]);
        let first = DependencyGraph::build(&records);
        let second = DependencyGraph::build(&records);

        assert_eq!(first.connections(), second.connections());
        assert_eq!(first.edge_count(), second.edge_count());
    }

    #[test]
    fn test_cycles_terminate() {
        let records = records(&[("a.js", &["./b"] as &[&str]), ("b.js", &["./a"])]);
        let graph = DependencyGraph::build(&records);

        assert_eq!(graph.related_files("a.js", 10), set(&["b.js"]));
        assert_eq!(graph.related_files("b.js", 10), set(&["a.js"]));
    }

    #[test]
    fn test_depth_zero_is_empty_and_start_is_excluded() {
        let records = records(&[("a.js", &["./b"] as &[&str]), ("b.js", &[])]);
        let graph = DependencyGraph::build(&records);

        assert!(graph.related_files("a.js", 0).is_empty());
        assert!(!graph.related_files("a.js", 3).contains("a.js"));
    }

    #[test]
    fn test_unknown_start_yields_empty_set() {
        let records = records(&[("a.js", &[] as &[&str])]);
        let graph = DependencyGraph::build(&records);
        assert!(graph.related_files("ghost.js", 2).is_empty());
    }

    #[test]
    fn test_depth_budget_bounds_expansion() {
        // chain: a -> b -> c -> d
        let records = records(&[
            ("a.js", &["./b"] as &[&str]),
            ("b.js", &["./c"]),
            ("c.js", &["./d"]),
            ("d.js", &[]),
        ]);
        let graph = DependencyGraph::build(&records);

        assert_eq!(graph.related_files("a.js", 1), set(&["b.js"]));
        assert_eq!(graph.related_files("a.js", 2), set(&["b.js", "c.js"]));
        assert_eq!(graph.related_files("a.js", 3), set(&["b.js", "c.js", "d.js"]));
        // traversal runs both directions: from the middle outward
        assert_eq!(graph.related_files("c.js", 1), set(&["b.js", "d.js"]));
    }

    #[test]
    fn test_duplicate_imports_collapse() {
        let records = records(&[("a.js", &["./b", "./b", "./b/index"] as &[&str]), ("b/index.js", &[])]);
        let graph = DependencyGraph::build(&records);

        assert_eq!(graph.dependencies_of("a.js"), &["b/index.js".to_string()]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_self_imports_are_ignored() {
        let records = records(&[("a.js", &["./a"] as &[&str])]);
        let graph = DependencyGraph::build(&records);
        assert_eq!(graph.dependencies_of("a.js"), &[] as &[String]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_dangling_targets_contribute_no_edge() {
        let mut all = records(&[("a.js", &["./b"] as &[&str]), ("b.js", &[])]);
        let before = DependencyGraph::build(&all);
        assert_eq!(before.dependencies_of("a.js"), &["b.js".to_string()]);

        // record set without b: same a.js record, edge must vanish
        all.remove("b.js");
        let after = DependencyGraph::build(&all);
        assert_eq!(after.dependencies_of("a.js"), &[] as &[String]);
        assert!(!after.contains("b.js"));
    }

    #[test]
    fn test_every_record_has_a_connections_entry() {
        let records = records(&[("a.js", &["./b"] as &[&str]), ("b.js", &[])]);
        let graph = DependencyGraph::build(&records);
        assert_eq!(graph.connections().len(), 2);
        assert!(graph.connections().contains_key("b.js"));
    }
}
