//! Dominator tree engine over dense node indices.
//!
//! Both [`DominanceInfo`](crate::DominanceInfo) and
//! [`PostDominanceInfo`](crate::PostDominanceInfo) are thin block-typed
//! wrappers around this: the former feeds it the forward CFG rooted at the
//! entry, the latter the reversed CFG rooted at a virtual exit node.
//!
//! Uses the Cooper-Harvey-Kennedy iterative algorithm, which is simpler than
//! Lengauer-Tarjan and fast enough for typical function sizes. The algorithm
//! works on reverse postorder and converges in O(n * d) where d is the loop
//! nesting depth.
//!
//! Reference: Cooper, Harvey, Kennedy, "A Simple, Fast Dominance Algorithm" (2001)

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DomTree {
    /// Immediate dominator per node. `idom[root] == Some(root)`; nodes not
    /// reachable from the root are `None`.
    idom: Vec<Option<usize>>,
    root: usize,
}

impl DomTree {
    /// Build the tree from a reverse postorder (root first) and per-node
    /// predecessor lists. `preds.len()` is the node count.
    pub(crate) fn compute(root: usize, rpo: &[usize], preds: &[Vec<usize>]) -> Self {
        let n = preds.len();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        if n == 0 {
            return DomTree { idom, root };
        }
        debug_assert_eq!(rpo.first(), Some(&root), "reverse postorder must start at the root");

        // Map node → RPO position for O(1) lookup
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &node) in rpo.iter().enumerate() {
            rpo_pos[node] = pos;
        }

        idom[root] = Some(root);

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                // First processed predecessor, then intersect with the rest.
                let mut processed = preds[node].iter().copied().filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom = processed.fold(first, |acc, pred| Self::intersect(pred, acc, &idom, &rpo_pos));

                if idom[node] != Some(new_idom) {
                    idom[node] = Some(new_idom);
                    changed = true;
                }
            }
        }

        DomTree { idom, root }
    }

    /// CHK intersect: walk two fingers upward until they meet.
    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }

    pub(crate) fn root(&self) -> usize {
        self.root
    }

    pub(crate) fn is_reachable(&self, node: usize) -> bool {
        matches!(self.idom.get(node), Some(Some(_)))
    }

    /// Parent in the tree; `None` for the root and unreachable nodes.
    pub(crate) fn parent(&self, node: usize) -> Option<usize> {
        match self.idom.get(node) {
            Some(&Some(dom)) if dom != node => Some(dom),
            _ => None,
        }
    }

    /// Does `a` dominate `b`? Every node dominates itself; an unreachable
    /// node is dominated by nothing else.
    pub(crate) fn dominates(&self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        let mut current = b;
        while let Some(dom) = self.parent(current) {
            if dom == a {
                return true;
            }
            current = dom;
        }
        false
    }

    pub(crate) fn children(&self, node: usize) -> Vec<usize> {
        self.idom
            .iter()
            .enumerate()
            .filter(|&(child, &dom)| dom == Some(node) && child != node)
            .map(|(child, _)| child)
            .collect()
    }

    /// Distance from the root; `None` if unreachable.
    pub(crate) fn depth(&self, node: usize) -> Option<usize> {
        if !self.is_reachable(node) {
            return None;
        }
        let mut depth = 0;
        let mut current = node;
        while let Some(dom) = self.parent(current) {
            depth += 1;
            current = dom;
        }
        Some(depth)
    }

    /// Deepest node dominating both `a` and `b`.
    pub(crate) fn nearest_common(&self, a: usize, b: usize) -> Option<usize> {
        let (mut a, mut b) = (a, b);
        let mut depth_a = self.depth(a)?;
        let mut depth_b = self.depth(b)?;
        while depth_a > depth_b {
            a = self.parent(a)?;
            depth_a -= 1;
        }
        while depth_b > depth_a {
            b = self.parent(b)?;
            depth_b -= 1;
        }
        while a != b {
            a = self.parent(a)?;
            b = self.parent(b)?;
        }
        Some(a)
    }

    /// Attach a new leaf `node` under `parent`.
    pub(crate) fn add_node(&mut self, node: usize, parent: usize) {
        if node >= self.idom.len() {
            self.idom.resize(node + 1, None);
        }
        debug_assert!(self.idom[node].is_none(), "node {node} is already in the tree");
        self.idom[node] = Some(parent);
    }

    /// Re-parent `node` (and with it, its subtree).
    pub(crate) fn set_parent(&mut self, node: usize, parent: usize) {
        debug_assert!(self.is_reachable(node), "re-parenting node {node} outside the tree");
        debug_assert!(!self.dominates(node, parent), "re-parenting {node} under its own descendant {parent}");
        self.idom[node] = Some(parent);
    }

    /// Drop `node`, hoisting its children to its parent.
    pub(crate) fn remove_node(&mut self, node: usize) {
        let Some(parent) = self.parent(node) else {
            if let Some(slot) = self.idom.get_mut(node) {
                *slot = None;
            }
            return;
        };
        for child in self.children(node) {
            self.idom[child] = Some(parent);
        }
        self.idom[node] = None;
    }
}

/// Postorder of an adjacency-list graph from `root`, using an explicit stack.
pub(crate) fn postorder(root: usize, succs: &[Vec<usize>]) -> Vec<usize> {
    let mut visited = vec![false; succs.len()];
    let mut order = Vec::with_capacity(succs.len());
    // Stack entries: (node, index of next successor to explore).
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    visited[root] = true;

    while let Some(&mut (node, ref mut next)) = stack.last_mut() {
        if let Some(&succ) = succs[node].get(*next) {
            *next += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            order.push(node);
            stack.pop();
        }
    }

    order
}
