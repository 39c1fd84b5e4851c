#[derive(Debug)]
pub struct ProximityGraph<T> {
    nodes: Vec<T>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl<T> ProximityGraph<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            parent: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
        }
    }

    pub fn add_node(&mut self, node: T) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.parent.push(index);
        self.rank.push(0);
        index
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }

    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = index;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Connected components as sorted index lists, ordered by their
    /// smallest index.
    fn partition(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root = vec![usize::MAX; self.nodes.len()];
        let mut components: Vec<Vec<usize>> = Vec::new();
        for index in 0..self.nodes.len() {
            let root = self.find(index);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = components.len();
                components.push(Vec::new());
            }
            components[slot_of_root[root]].push(index);
        }
        components
    }

    pub fn into_partition(mut self) -> Vec<Vec<T>> {
        let components = self.partition();
        let mut component_of = vec![0; self.nodes.len()];
        for (component, members) in components.iter().enumerate() {
            for &index in members {
                component_of[index] = component;
            }
        }
        let mut result: Vec<Vec<T>> = components
            .iter()
            .map(|members| Vec::with_capacity(members.len()))
            .collect();
        for (index, node) in self.nodes.into_iter().enumerate() {
            result[component_of[index]].push(node);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_nodes_are_singletons() {
        let mut graph = ProximityGraph::with_capacity(2);
        graph.add_node("a");
        graph.add_node("b");
        assert_eq!(graph.partition(), vec![vec![0], vec![1]]);
    }

    #[test]
    fn edges_merge_transitively() {
        let mut graph = ProximityGraph::with_capacity(2);
        for name in ["a", "b", "c", "d", "e"] {
            graph.add_node(name);
        }
        graph.add_edge(0, 2);
        graph.add_edge(2, 4);
        graph.add_edge(3, 1);
        assert!(graph.connected(0, 4));
        assert!(!graph.connected(0, 1));
        assert_eq!(graph.partition(), vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(graph.into_partition(), vec![vec!["a", "c", "e"], vec!["b", "d"]]);
    }

    #[test]
    fn self_loops_and_repeated_edges_are_harmless() {
        let mut graph = ProximityGraph::with_capacity(2);
        graph.add_node(1);
        graph.add_node(2);
        graph.add_edge(0, 0);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);
        assert_eq!(graph.partition(), vec![vec![0, 1]]);
    }

    #[test]
    fn empty_graph_has_no_components() {
        let mut graph: ProximityGraph<()> = ProximityGraph::with_capacity(0);
        assert!(graph.partition().is_empty());
    }
}
