// ==============================================================================
// Disjoint Sets
// ==============================================================================
//
// A generic union-find over a vertex set that is fixed at construction: path
// compression on `find`, union by size, near-constant amortized operations.
// Used where the crate needs "are these in the same group" queries and class
// reporting -- notably grouping declarations whose generated-file identities
// collide (`Schema::identity_conflicts`). Directed questions like package
// cycles need real graph traversal and do not go through here.

use std::hash::Hash;

use indexmap::IndexMap;

/// Disjoint-set structure over vertices of type `T`.
///
/// Vertices keep their insertion order: `groups` reports each class with its
/// members in that order, and classes ordered by their earliest member.
#[derive(Debug)]
pub struct UnionFind<T> {
    /// Vertex -> dense index, in insertion order.
    vertices: IndexMap<T, usize>,
    /// Parent index per vertex; a root is its own parent.
    parent: Vec<usize>,
    /// Class size per root index; stale for non-roots.
    size: Vec<usize>,
}

impl<T: Hash + Eq + Clone> UnionFind<T> {
    /// Build over a fixed vertex set. Duplicate vertices collapse into one.
    pub fn new(vertices: impl IntoIterator<Item = T>) -> UnionFind<T> {
        let mut indexed = IndexMap::new();
        for vertex in vertices {
            let next = indexed.len();
            indexed.entry(vertex).or_insert(next);
        }
        let count = indexed.len();
        UnionFind {
            vertices: indexed,
            parent: (0..count).collect(),
            size: vec![1; count],
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether `vertex` was part of the construction set.
    pub fn contains(&self, vertex: &T) -> bool {
        self.vertices.contains_key(vertex)
    }

    /// Merge the classes containing `a` and `b`. Returns `true` if the two
    /// were in different classes before the call.
    ///
    /// # Panics
    ///
    /// Panics if either vertex was not in the construction set.
    pub fn union(&mut self, a: &T, b: &T) -> bool {
        let mut root_a = self.find_root(self.index_of(a));
        let mut root_b = self.find_root(self.index_of(b));
        if root_a == root_b {
            return false;
        }
        // Attach the smaller class under the larger one.
        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
        true
    }

    /// The canonical representative of `vertex`'s class.
    ///
    /// # Panics
    ///
    /// Panics if `vertex` was not in the construction set.
    pub fn find(&mut self, vertex: &T) -> &T {
        let root = self.find_root(self.index_of(vertex));
        self.vertices
            .get_index(root)
            .expect("root index is within the vertex set")
            .0
    }

    /// Whether `a` and `b` are currently in the same class.
    ///
    /// # Panics
    ///
    /// Panics if either vertex was not in the construction set.
    pub fn same_set(&mut self, a: &T, b: &T) -> bool {
        self.find_root(self.index_of(a)) == self.find_root(self.index_of(b))
    }

    /// Every class as a list of members. Members appear in insertion order,
    /// and classes are ordered by their earliest member.
    pub fn groups(&mut self) -> Vec<Vec<T>> {
        // Visiting vertices in insertion order means each class's entry is
        // created at its earliest member, so the map's order is the report
        // order.
        let mut by_root: IndexMap<usize, Vec<T>> = IndexMap::new();
        for i in 0..self.parent.len() {
            let root = self.find_root(i);
            let (vertex, _) = self
                .vertices
                .get_index(i)
                .expect("dense indices match the vertex set");
            by_root.entry(root).or_default().push(vertex.clone());
        }
        by_root.into_values().collect()
    }

    fn index_of(&self, vertex: &T) -> usize {
        *self
            .vertices
            .get(vertex)
            .expect("vertex must be part of the construction set")
    }

    /// Find the root of `index`, compressing the path behind it.
    fn find_root(&mut self, index: usize) -> usize {
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
}
