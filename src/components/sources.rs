//! Independent voltage and current sources.

use super::{Device, StampContext};
use crate::circuit::{BranchId, NodeId};
use crate::solver::MnaMatrix;

/// An ideal DC voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source
///
/// The branch current flows from `+` through the source to `-`, so a
/// source delivering power reports a negative current.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub branch: BranchId,
    /// Driven by DC sweeps and source stepping; callers restore it afterwards.
    value: f64,
}

impl VoltageSource {
    pub fn new(id: String, nodes: [NodeId; 2], value: f64, branch: BranchId) -> Self {
        Self {
            id,
            nodes,
            branch,
            value,
        }
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn voltage(&self) -> f64 {
        self.value
    }
}

impl Device for VoltageSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool {
        let n1 = ctx.row(self.nodes[0]);
        let n2 = ctx.row(self.nodes[1]);
        let br = ctx.layout.branch_index(self.branch);
        matrix.stamp_voltage_source(n1, n2, br, self.value);
        false
    }

    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        ctx.branch_current(self.branch)
    }
}

/// An ideal DC current source.
///
/// Current flows from `+` through the source to `-`; it is added
/// directly to the right-hand side of the MNA equations.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub id: String,
    pub nodes: [NodeId; 2],
    value: f64,
}

impl CurrentSource {
    pub fn new(id: String, nodes: [NodeId; 2], value: f64) -> Self {
        Self { id, nodes, value }
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn current(&self) -> f64 {
        self.value
    }
}

impl Device for CurrentSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool {
        let n1 = ctx.row(self.nodes[0]);
        let n2 = ctx.row(self.nodes[1]);
        matrix.stamp_current_source(n1, n2, self.value);
        false
    }

    fn current(&self, _ctx: &StampContext<'_>) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_drives_stamp() {
        let mut v = VoltageSource::new("V1".into(), [NodeId(1), NodeId(0)], 5.0, BranchId(0));
        assert_eq!(v.voltage(), 5.0);
        v.set_value(1.5);
        assert_eq!(v.voltage(), 1.5);

        let layout = crate::circuit::MnaLayout::new(2, 1);
        let x = [0.0, 0.0];
        let ctx = StampContext::new(layout, &x, super::super::AnalysisMode::Dc, 1e-12);
        let mut m = MnaMatrix::new(2);
        v.stamp(&mut m, &ctx);
        assert_eq!(m.z[1], 1.5);
    }

    #[test]
    fn test_current_source_stamps_rhs_only() {
        let mut i = CurrentSource::new("I1".into(), [NodeId(1), NodeId(2)], 1e-3);
        let layout = crate::circuit::MnaLayout::new(3, 0);
        let x = [0.0, 0.0];
        let ctx = StampContext::new(layout, &x, super::super::AnalysisMode::Dc, 1e-12);
        let mut m = MnaMatrix::new(2);
        i.stamp(&mut m, &ctx);
        assert!(m.a.iter().all(|&v| v == 0.0));
        assert_eq!(m.z, vec![-1e-3, 1e-3]);
    }
}
