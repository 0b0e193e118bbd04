//! Optimal ranking: the capability the layering core delegates to, plus the
//! default network-simplex implementation.
//!
//! The contract: for every constraint `(u, v, length, cost)` the produced
//! ranks satisfy `rank[v] - rank[u] >= length`, and `Σ cost · (rank[v] -
//! rank[u])` is minimal. The constraint matrix of this program is totally
//! unimodular, so the simplex optimum is integral.

use rustc_hash::FxHashMap;

/// One directed rank constraint.
#[derive(Debug, Clone, Copy)]
pub struct RankConstraint {
    pub u: usize,
    pub v: usize,
    pub length: i32,
    pub cost: f64,
}

/// A ranking problem over vertices `0..node_count`.
#[derive(Debug, Clone, Default)]
pub struct RankProblem {
    pub node_count: usize,
    pub constraints: Vec<RankConstraint>,
}

impl RankProblem {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            constraints: Vec::new(),
        }
    }

    pub fn constrain(&mut self, u: usize, v: usize, length: i32, cost: f64) {
        debug_assert!(u < self.node_count && v < self.node_count);
        self.constraints.push(RankConstraint { u, v, length, cost });
    }
}

/// Ranker capability; any implementation honoring the module contract can be
/// plugged into the layering session.
pub trait Ranking {
    fn rank(&self, problem: &RankProblem) -> Vec<i32>;
}

/// Default ranker: longest-path initialization, a feasible tight tree, and
/// network-simplex pivots until no tree edge has a negative cut value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkSimplex;

impl Ranking for NetworkSimplex {
    fn rank(&self, problem: &RankProblem) -> Vec<i32> {
        let n = problem.node_count;
        let mut rank = vec![0i32; n];
        if n == 0 {
            return rank;
        }

        let merged = merge_constraints(problem);
        let state = Simplified::new(n, &merged);
        assert!(state.is_acyclic(), "rank constraints must form a DAG");

        for comp in state.components() {
            if comp.len() > 1 {
                state.solve_component(&comp, &mut rank);
            }
        }
        rank
    }
}

/// Parallel constraints between the same ordered pair collapse to one edge
/// with the maximum length and the summed cost.
fn merge_constraints(problem: &RankProblem) -> Vec<RankConstraint> {
    let mut merged: Vec<RankConstraint> = Vec::new();
    let mut index: FxHashMap<(usize, usize), usize> = FxHashMap::default();
    for c in &problem.constraints {
        match index.get(&(c.u, c.v)) {
            Some(&ix) => {
                merged[ix].length = merged[ix].length.max(c.length);
                merged[ix].cost += c.cost;
            }
            None => {
                index.insert((c.u, c.v), merged.len());
                merged.push(*c);
            }
        }
    }
    merged
}

struct Simplified<'a> {
    n: usize,
    edges: &'a [RankConstraint],
    /// Edge indices incident to each vertex, either direction.
    incident: Vec<Vec<usize>>,
    out: Vec<Vec<usize>>,
}

impl<'a> Simplified<'a> {
    fn new(n: usize, edges: &'a [RankConstraint]) -> Self {
        let mut incident = vec![Vec::new(); n];
        let mut out = vec![Vec::new(); n];
        for (ix, e) in edges.iter().enumerate() {
            incident[e.u].push(ix);
            incident[e.v].push(ix);
            out[e.u].push(ix);
        }
        Self {
            n,
            edges,
            incident,
            out,
        }
    }

    fn is_acyclic(&self) -> bool {
        let mut in_deg = vec![0usize; self.n];
        for e in self.edges {
            in_deg[e.v] += 1;
        }
        let mut queue: Vec<usize> = (0..self.n).filter(|&v| in_deg[v] == 0).collect();
        let mut seen = 0usize;
        while let Some(v) = queue.pop() {
            seen += 1;
            for &ix in &self.out[v] {
                let w = self.edges[ix].v;
                in_deg[w] -= 1;
                if in_deg[w] == 0 {
                    queue.push(w);
                }
            }
        }
        seen == self.n
    }

    fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.n];
        let mut comps = Vec::new();
        for root in 0..self.n {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut comp = vec![root];
            let mut stack = vec![root];
            while let Some(v) = stack.pop() {
                for &ix in &self.incident[v] {
                    let e = &self.edges[ix];
                    let other = if e.u == v { e.v } else { e.u };
                    if !seen[other] {
                        seen[other] = true;
                        comp.push(other);
                        stack.push(other);
                    }
                }
            }
            comp.sort_unstable();
            comps.push(comp);
        }
        comps
    }

    fn slack(&self, rank: &[i32], ix: usize) -> i32 {
        let e = &self.edges[ix];
        rank[e.v] - rank[e.u] - e.length
    }

    fn solve_component(&self, comp: &[usize], rank: &mut [i32]) {
        self.longest_path(comp, rank);
        let mut tree = self.feasible_tree(comp, rank);
        tree.rebuild(self, comp[0]);
        tree.init_cut_values(self);

        while let Some(leave) = tree.leave_edge(comp) {
            let Some(enter) = tree.enter_edge(self, rank, leave) else {
                break;
            };
            tree.exchange(self, comp, rank, leave, enter);
        }

        // Component ranks start at zero; the caller owns any global shift.
        let min = comp.iter().map(|&v| rank[v]).min().unwrap_or(0);
        for &v in comp {
            rank[v] -= min;
        }
    }

    /// Seeds every vertex with the tightest rank reachable from below:
    /// sinks at zero, everything else at `min(rank[w] - length)` over its
    /// out-constraints.
    fn longest_path(&self, comp: &[usize], rank: &mut [i32]) {
        let mut done = vec![false; self.n];

        fn dfs(s: &Simplified<'_>, v: usize, rank: &mut [i32], done: &mut [bool]) -> i32 {
            if done[v] {
                return rank[v];
            }
            done[v] = true;
            let mut best: Option<i32> = None;
            for i in 0..s.out[v].len() {
                let ix = s.out[v][i];
                let e = &s.edges[ix];
                let candidate = dfs(s, e.v, rank, done) - e.length;
                best = Some(match best {
                    Some(b) => b.min(candidate),
                    None => candidate,
                });
            }
            rank[v] = best.unwrap_or(0);
            rank[v]
        }

        for &v in comp {
            dfs(self, v, rank, &mut done);
        }
    }

    /// Grows a spanning tree of tight constraints, shifting the grown part
    /// by the minimum slack whenever it stalls.
    fn feasible_tree(&self, comp: &[usize], rank: &mut [i32]) -> Tree {
        let mut tree = Tree::new(self.n, self.edges.len());
        tree.in_tree[comp[0]] = true;
        let mut size = 1usize;

        loop {
            size = self.grow_tight(&mut tree, comp, rank, size);
            if size >= comp.len() {
                break;
            }

            let mut best: Option<(i32, bool, usize)> = None;
            for (ix, e) in self.edges.iter().enumerate() {
                if tree.in_tree[e.u] == tree.in_tree[e.v] {
                    continue;
                }
                let slack = self.slack(rank, ix);
                if best.is_none_or(|(s, _, _)| slack < s) {
                    best = Some((slack, tree.in_tree[e.u], ix));
                }
            }
            let (slack, tail_inside, _) =
                best.expect("component is connected, a boundary constraint exists");
            let delta = if tail_inside { slack } else { -slack };
            for &v in comp {
                if tree.in_tree[v] {
                    rank[v] += delta;
                }
            }
        }
        tree
    }

    fn grow_tight(&self, tree: &mut Tree, comp: &[usize], rank: &[i32], mut size: usize) -> usize {
        let mut stack: Vec<usize> = comp.iter().copied().filter(|&v| tree.in_tree[v]).collect();
        while let Some(v) = stack.pop() {
            for &ix in &self.incident[v] {
                let e = &self.edges[ix];
                let other = if e.u == v { e.v } else { e.u };
                if tree.in_tree[other] || self.slack(rank, ix) != 0 {
                    continue;
                }
                tree.in_tree[other] = true;
                tree.edge_in_tree[ix] = true;
                size += 1;
                stack.push(other);
            }
        }
        size
    }
}

struct Tree {
    in_tree: Vec<bool>,
    edge_in_tree: Vec<bool>,
    parent: Vec<Option<usize>>,
    parent_edge: Vec<Option<usize>>,
    low: Vec<i32>,
    lim: Vec<i32>,
    /// Cut value of the tree edge above each vertex.
    cut: Vec<f64>,
}

impl Tree {
    fn new(n: usize, m: usize) -> Self {
        Self {
            in_tree: vec![false; n],
            edge_in_tree: vec![false; m],
            parent: vec![None; n],
            parent_edge: vec![None; n],
            low: vec![0; n],
            lim: vec![0; n],
            cut: vec![0.0; n],
        }
    }

    /// Recomputes parent pointers and the low/lim postorder interval
    /// numbering from `root`.
    fn rebuild(&mut self, s: &Simplified<'_>, root: usize) {
        for v in 0..self.parent.len() {
            self.parent[v] = None;
            self.parent_edge[v] = None;
        }
        let mut next_lim = 1i32;
        self.rebuild_from(s, root, None, &mut next_lim);
    }

    fn rebuild_from(
        &mut self,
        s: &Simplified<'_>,
        v: usize,
        from_edge: Option<usize>,
        next_lim: &mut i32,
    ) {
        self.low[v] = *next_lim;
        for i in 0..s.incident[v].len() {
            let ix = s.incident[v][i];
            if !self.edge_in_tree[ix] || Some(ix) == from_edge {
                continue;
            }
            let e = &s.edges[ix];
            let other = if e.u == v { e.v } else { e.u };
            if self.parent[other].is_some() || self.low[other] != 0 {
                continue;
            }
            self.parent[other] = Some(v);
            self.parent_edge[other] = Some(ix);
            self.rebuild_from(s, other, Some(ix), next_lim);
        }
        self.lim[v] = *next_lim;
        *next_lim += 1;
    }

    fn init_cut_values(&mut self, s: &Simplified<'_>) {
        let mut order: Vec<usize> = (0..self.parent.len()).filter(|&v| self.in_tree[v]).collect();
        order.sort_by_key(|&v| self.lim[v]);
        for v in order {
            if self.parent[v].is_some() {
                self.cut[v] = self.calc_cut_value(s, v);
            }
        }
    }

    /// Cut value of the tree edge between `child` and its parent: the total
    /// cost of constraints pointing from the child side to the parent side,
    /// minus those pointing back.
    fn calc_cut_value(&self, s: &Simplified<'_>, child: usize) -> f64 {
        let parent = self.parent[child].expect("child has a tree parent");
        let tree_ix = self.parent_edge[child].expect("child has a tree edge");
        let child_is_tail = s.edges[tree_ix].u == child;

        let mut cut = s.edges[tree_ix].cost;
        for &ix in &s.incident[child] {
            let e = &s.edges[ix];
            let (is_out, other) = if e.u == child {
                (true, e.v)
            } else {
                (false, e.u)
            };
            if other == parent {
                continue;
            }
            let points_to_head = is_out == child_is_tail;
            cut += if points_to_head { e.cost } else { -e.cost };

            if self.parent[other] == Some(child) {
                let other_cut = self.cut[other];
                cut += if points_to_head { -other_cut } else { other_cut };
            }
        }
        cut
    }

    /// A tree edge with negative cut value, reported as its child vertex.
    fn leave_edge(&self, comp: &[usize]) -> Option<usize> {
        comp.iter()
            .copied()
            .find(|&v| self.parent[v].is_some() && self.cut[v] < 0.0)
    }

    /// The minimum-slack constraint reconnecting the two halves split by the
    /// leaving edge, oriented against it. `None` only if the program were
    /// dual-degenerate in a way positive-cost rank problems cannot be.
    fn enter_edge(&self, s: &Simplified<'_>, rank: &[i32], leave: usize) -> Option<usize> {
        let tree_ix = self.parent_edge[leave].expect("leaving edge exists");
        let (v, w) = (s.edges[tree_ix].u, s.edges[tree_ix].v);

        let (tail_low, tail_lim, flip) = if self.lim[v] > self.lim[w] {
            (self.low[w], self.lim[w], true)
        } else {
            (self.low[v], self.lim[v], false)
        };

        let mut best: Option<(i32, usize)> = None;
        for (ix, e) in s.edges.iter().enumerate() {
            if !self.in_tree[e.u] || !self.in_tree[e.v] {
                continue;
            }
            let u_desc = tail_low <= self.lim[e.u] && self.lim[e.u] <= tail_lim;
            let v_desc = tail_low <= self.lim[e.v] && self.lim[e.v] <= tail_lim;
            if flip == u_desc && flip != v_desc {
                let slack = s.slack(rank, ix);
                if best.is_none_or(|(bs, _)| slack < bs) {
                    best = Some((slack, ix));
                }
            }
        }
        best.map(|(_, ix)| ix)
    }

    fn exchange(
        &mut self,
        s: &Simplified<'_>,
        comp: &[usize],
        rank: &mut [i32],
        leave: usize,
        enter: usize,
    ) {
        let leave_ix = self.parent_edge[leave].expect("leaving edge exists");
        self.edge_in_tree[leave_ix] = false;
        self.edge_in_tree[enter] = true;

        for &v in comp {
            self.low[v] = 0;
            self.lim[v] = 0;
        }
        self.rebuild(s, comp[0]);
        self.init_cut_values(s);
        self.update_ranks(s, comp, rank);
    }

    /// Re-derives ranks from the tree: every tree constraint is tight.
    fn update_ranks(&self, s: &Simplified<'_>, comp: &[usize], rank: &mut [i32]) {
        let mut order: Vec<usize> = comp.to_vec();
        order.sort_by_key(|&v| std::cmp::Reverse(self.lim[v]));
        for v in order {
            let Some(parent) = self.parent[v] else {
                continue;
            };
            let ix = self.parent_edge[v].expect("tree edge above v");
            let e = &s.edges[ix];
            rank[v] = if e.u == parent {
                rank[parent] + e.length
            } else {
                rank[parent] - e.length
            };
        }
    }
}
