//! Node and branch numbering for the MNA system.

use std::fmt;

/// A solver node. Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const GROUND: NodeId = NodeId(0);

    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// Extra MNA unknown for a branch current (voltage sources, inductors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Maps nodes and branches onto solution-vector indices.
///
/// Node voltages come first (ground excluded), then branch currents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MnaLayout {
    /// Node count including ground.
    pub num_nodes: usize,
    pub num_branches: usize,
}

impl MnaLayout {
    pub fn new(num_nodes: usize, num_branches: usize) -> Self {
        Self {
            num_nodes: num_nodes.max(1),
            num_branches,
        }
    }

    pub fn size(&self) -> usize {
        (self.num_nodes - 1) + self.num_branches
    }

    /// Number of node-voltage unknowns.
    pub fn node_unknowns(&self) -> usize {
        self.num_nodes - 1
    }

    /// Matrix row of a node, `None` for ground.
    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        if node.is_ground() {
            None
        } else {
            Some(node.0 - 1)
        }
    }

    pub fn branch_index(&self, branch: BranchId) -> usize {
        (self.num_nodes - 1) + branch.0
    }

    /// Whether a solution index holds a branch current.
    pub fn is_branch_row(&self, index: usize) -> bool {
        index >= self.num_nodes - 1
    }

    /// Node voltage read from a solution vector.
    pub fn voltage(&self, x: &[f64], node: NodeId) -> f64 {
        self.node_index(node)
            .and_then(|i| x.get(i).copied())
            .unwrap_or(0.0)
    }

    pub fn branch_current(&self, x: &[f64], branch: BranchId) -> f64 {
        x.get(self.branch_index(branch)).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_indices() {
        let layout = MnaLayout::new(4, 2);
        assert_eq!(layout.size(), 5);
        assert_eq!(layout.node_index(NodeId::GROUND), None);
        assert_eq!(layout.node_index(NodeId(3)), Some(2));
        assert_eq!(layout.branch_index(BranchId(1)), 4);
        assert!(layout.is_branch_row(3));
        assert!(!layout.is_branch_row(2));
    }

    #[test]
    fn test_layout_reads() {
        let layout = MnaLayout::new(3, 1);
        let x = [1.5, 2.5, -0.01];
        assert_eq!(layout.voltage(&x, NodeId::GROUND), 0.0);
        assert_eq!(layout.voltage(&x, NodeId(2)), 2.5);
        assert_eq!(layout.branch_current(&x, BranchId(0)), -0.01);
    }
}
