//! Acyclicity-preserving edge insertion over a leveled digraph.
//!
//! `LeveledDag` maintains, for every vertex, a level that is a valid
//! topological labeling of the edges inserted so far (`level(u) < level(v)`
//! for every edge `u -> v`). Levels start unset (`-1`) and are materialized
//! lazily on first contact, so the same structure serves both the extended
//! nesting graph (levels pre-seeded by a containment walk) and the small
//! per-compound ordering graphs built during crossing reduction.

use std::collections::VecDeque;

const UNSET: i32 = -1;

#[derive(Debug, Clone)]
pub struct LeveledDag {
    out: Vec<Vec<usize>>,
    inc: Vec<Vec<usize>>,
    level: Vec<i32>,
    // Scratch reused across try_edge calls.
    visited: Vec<bool>,
    aux_deg: Vec<usize>,
}

impl LeveledDag {
    pub fn new(n: usize) -> Self {
        Self {
            out: vec![Vec::new(); n],
            inc: vec![Vec::new(); n],
            level: vec![UNSET; n],
            visited: vec![false; n],
            aux_deg: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.level.len()
    }

    pub fn is_empty(&self) -> bool {
        self.level.is_empty()
    }

    pub fn level(&self, v: usize) -> i32 {
        self.level[v]
    }

    pub fn set_level(&mut self, v: usize, level: i32) {
        self.level[v] = level;
    }

    pub fn successors(&self, v: usize) -> &[usize] {
        &self.out[v]
    }

    /// Inserts `u -> v` without any check. The caller guarantees the levels
    /// it assigns afterwards are consistent; used for the containment
    /// skeleton whose level seeding happens in one deliberate pass.
    pub fn add_edge_unchecked(&mut self, u: usize, v: usize) {
        self.out[u].push(v);
        self.inc[v].push(u);
    }

    /// Tries to insert `u -> v` while keeping the labeling topological.
    ///
    /// Returns the oriented pair actually inserted: `(u, v)` on success,
    /// `(v, u)` when the requested direction would close a cycle and
    /// `allow_reverse` is set, and `None` when it would close a cycle and
    /// reversal was not requested.
    pub fn try_edge(&mut self, u: usize, v: usize, allow_reverse: bool) -> Option<(usize, usize)> {
        debug_assert_ne!(u, v);
        let n = self.len() as i32;

        if self.level[u] == UNSET {
            if self.level[v] == UNSET {
                self.level[v] = n;
                self.level[u] = n - 1;
            } else {
                self.level[u] = self.level[v] - 1;
            }
        } else if self.level[v] == UNSET {
            self.level[v] = self.level[u] + 1;
        } else if self.level[u] >= self.level[v] {
            let mut successors = Vec::new();
            if self.reachable(v, u, &mut successors) {
                if allow_reverse {
                    self.add_edge_unchecked(v, u);
                    return Some((v, u));
                }
                return None;
            }
            self.level[v] = self.level[u] + 1;
            self.relevel(v, &successors);
        }

        self.add_edge_unchecked(u, v);
        Some((u, v))
    }

    /// Breadth-first search from `v`; returns true iff `u` is reachable.
    /// On a negative answer `successors` holds every vertex reachable from
    /// `v` (including `v` itself), in visit order.
    fn reachable(&mut self, v: usize, u: usize, successors: &mut Vec<usize>) -> bool {
        let mut queue = VecDeque::new();
        self.visited[v] = true;
        queue.push_back(v);

        let mut found = false;
        'bfs: while let Some(w) = queue.pop_front() {
            successors.push(w);
            for &t in &self.out[w] {
                if t == u {
                    found = true;
                    break 'bfs;
                }
                if !self.visited[t] {
                    self.visited[t] = true;
                    queue.push_back(t);
                }
            }
        }

        for &w in successors.iter().chain(queue.iter()) {
            self.visited[w] = false;
        }
        if found {
            successors.clear();
        }
        found
    }

    /// Pushes the level increase at `v` through its successor set `s` with a
    /// Kahn pass restricted to `s`, so every member ends at
    /// `1 + max(level of predecessors)`.
    fn relevel(&mut self, v: usize, s: &[usize]) {
        for &w in s {
            self.visited[w] = true;
            self.aux_deg[w] = 0;
        }
        for &w in s {
            for &p in &self.inc[w] {
                if self.visited[p] {
                    self.aux_deg[w] += 1;
                }
            }
        }

        let mut queue = VecDeque::new();
        for i in 0..self.out[v].len() {
            let t = self.out[v][i];
            self.aux_deg[t] -= 1;
            if self.aux_deg[t] == 0 {
                queue.push_back(t);
            }
        }

        while let Some(w) = queue.pop_front() {
            let mut max_level = 0;
            for &p in &self.inc[w] {
                max_level = max_level.max(self.level[p]);
            }
            self.level[w] = max_level + 1;
            for i in 0..self.out[w].len() {
                let t = self.out[w][i];
                self.aux_deg[t] -= 1;
                if self.aux_deg[t] == 0 {
                    queue.push_back(t);
                }
            }
        }

        for &w in s {
            self.visited[w] = false;
        }
    }

    /// A topological numbering of all vertices (`numbering[v]` = position),
    /// ties broken by ascending vertex index. Panics if a cycle slipped in,
    /// which would mean the labeling invariant was already broken.
    pub fn topological_numbering(&self) -> Vec<usize> {
        let n = self.len();
        let mut in_deg: Vec<usize> = (0..n).map(|v| self.inc[v].len()).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&v| in_deg[v] == 0).collect();
        let mut numbering = vec![0usize; n];
        let mut next = 0usize;

        while let Some(v) = queue.pop_front() {
            numbering[v] = next;
            next += 1;
            for &t in &self.out[v] {
                in_deg[t] -= 1;
                if in_deg[t] == 0 {
                    queue.push_back(t);
                }
            }
        }

        assert_eq!(next, n, "leveled digraph must stay acyclic");
        numbering
    }
}
