//! Linear passive components: Resistor, Capacitor, Inductor.

use super::{AnalysisMode, Device, Integration, StampContext, IC_CONDUCTANCE};
use crate::circuit::{BranchId, NodeId};
use crate::solver::MnaMatrix;

/// A resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    pub fn new(id: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            id,
            nodes,
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Device for Resistor {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool {
        let n1 = ctx.row(self.nodes[0]);
        let n2 = ctx.row(self.nodes[1]);
        matrix.stamp_conductance(n1, n2, self.conductance());
        false
    }

    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        ctx.voltage_across(self.nodes[0], self.nodes[1]) * self.conductance()
    }
}

/// A capacitor.
///
/// In a time step the capacitor is replaced by its companion model: a
/// conductance `G` in parallel with a history current source, so that
/// `i(n) = G * v(n) + I_hist`.
///
/// - Backward Euler: `G = C/dt`, `I_hist = -G * v(n-1)`
/// - Trapezoidal: `G = 2C/dt`, `I_hist = -(G * v(n-1) + i(n-1))`
///
/// At DC the capacitor is open apart from a gmin shunt.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
    /// Voltage imposed at t = 0 under user initial conditions.
    pub initial_voltage: f64,

    /// Voltage across the capacitor at the last accepted point
    pub v_prev: f64,
    /// Current through the capacitor at the last accepted point
    pub i_prev: f64,
}

impl Capacitor {
    pub fn new(id: String, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            id,
            nodes,
            capacitance,
            initial_voltage: 0.0,
            v_prev: 0.0,
            i_prev: 0.0,
        }
    }

    /// Companion conductance and history current for a step.
    pub fn companion(&self, dt: f64, method: Integration) -> (f64, f64) {
        match method {
            Integration::BackwardEuler => {
                let g = self.capacitance / dt;
                (g, -g * self.v_prev)
            }
            Integration::Trapezoidal => {
                let g = 2.0 * self.capacitance / dt;
                (g, -(g * self.v_prev + self.i_prev))
            }
        }
    }

    /// Current through the capacitor for a given voltage under `mode`.
    fn current_at(&self, v: f64, mode: AnalysisMode) -> f64 {
        match mode {
            AnalysisMode::Dc => 0.0,
            AnalysisMode::InitialConditions => IC_CONDUCTANCE * (v - self.initial_voltage),
            AnalysisMode::Transient { dt, method } => {
                let (g, i_hist) = self.companion(dt, method);
                g * v + i_hist
            }
        }
    }
}

impl Device for Capacitor {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool {
        let n1 = ctx.row(self.nodes[0]);
        let n2 = ctx.row(self.nodes[1]);
        match ctx.mode {
            AnalysisMode::Dc => matrix.stamp_conductance(n1, n2, ctx.gmin),
            AnalysisMode::InitialConditions => {
                matrix.stamp_conductance(n1, n2, IC_CONDUCTANCE);
                matrix.stamp_current_source(n1, n2, -IC_CONDUCTANCE * self.initial_voltage);
            }
            AnalysisMode::Transient { dt, method } => {
                let (g, i_hist) = self.companion(dt, method);
                matrix.stamp_conductance(n1, n2, g);
                matrix.stamp_current_source(n1, n2, i_hist);
            }
        }
        false
    }

    /// Current at the last accepted point.
    fn current(&self, _ctx: &StampContext<'_>) -> f64 {
        self.i_prev
    }

    fn accept(&mut self, ctx: &StampContext<'_>) {
        let v = ctx.voltage_across(self.nodes[0], self.nodes[1]);
        self.i_prev = self.current_at(v, ctx.mode);
        self.v_prev = v;
    }

    fn reset(&mut self) {
        self.v_prev = self.initial_voltage;
        self.i_prev = 0.0;
    }
}

/// An inductor.
///
/// The inductor owns a branch-current unknown. Its branch equation is
/// `V+ - V- - R_eq * i = V_hist`:
///
/// - Backward Euler: `R_eq = L/dt`, `V_hist = -R_eq * i(n-1)`
/// - Trapezoidal: `R_eq = 2L/dt`, `V_hist = -(R_eq * i(n-1) + v(n-1))`
///
/// At DC it is a 0 V source (short); under initial conditions its branch
/// current is forced to the initial current.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: BranchId,
    pub initial_current: f64,

    /// Current through the inductor at the last accepted point
    pub i_prev: f64,
    /// Voltage across the inductor at the last accepted point
    pub v_prev: f64,
}

impl Inductor {
    pub fn new(id: String, nodes: [NodeId; 2], inductance: f64, branch: BranchId) -> Self {
        Self {
            id,
            nodes,
            inductance,
            branch,
            initial_current: 0.0,
            i_prev: 0.0,
            v_prev: 0.0,
        }
    }

    /// Companion resistance and history voltage for a step.
    pub fn companion(&self, dt: f64, method: Integration) -> (f64, f64) {
        match method {
            Integration::BackwardEuler => {
                let r = self.inductance / dt;
                (r, -r * self.i_prev)
            }
            Integration::Trapezoidal => {
                let r = 2.0 * self.inductance / dt;
                (r, -(r * self.i_prev + self.v_prev))
            }
        }
    }
}

impl Device for Inductor {
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
        match ctx.mode {
            AnalysisMode::Dc => matrix.stamp_voltage_source(n1, n2, br, 0.0),
            AnalysisMode::InitialConditions => {
                matrix.stamp_branch_current(n1, n2, br);
                matrix.add(br, br, 1.0);
                matrix.add_source(br, self.initial_current);
            }
            AnalysisMode::Transient { dt, method } => {
                let (r_eq, v_hist) = self.companion(dt, method);
                matrix.stamp_voltage_source(n1, n2, br, v_hist);
                matrix.add(br, br, -r_eq);
            }
        }
        false
    }

    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        ctx.branch_current(self.branch)
    }

    fn accept(&mut self, ctx: &StampContext<'_>) {
        self.i_prev = ctx.branch_current(self.branch);
        self.v_prev = ctx.voltage_across(self.nodes[0], self.nodes[1]);
    }

    fn reset(&mut self) {
        self.i_prev = self.initial_current;
        self.v_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::MnaLayout;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_resistor_conductance() {
        let r = Resistor::new("R1".to_string(), [NodeId(1), NodeId(0)], 1000.0);
        assert_abs_diff_eq!(r.conductance(), 0.001, epsilon = 1e-12);
    }

    #[test]
    fn test_capacitor_companion_models() {
        let mut c = Capacitor::new("C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let dt = 1e-5;

        let (g, i_hist) = c.companion(dt, Integration::Trapezoidal);
        assert_abs_diff_eq!(g, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(i_hist, 0.0);

        let layout = MnaLayout::new(2, 0);
        let x = [1.0];
        let mode = AnalysisMode::Transient {
            dt,
            method: Integration::BackwardEuler,
        };
        c.accept(&StampContext::new(layout, &x, mode, 1e-12));
        // BE: i = C/dt * (1 - 0) = 0.1 A
        assert_abs_diff_eq!(c.v_prev, 1.0);
        assert_abs_diff_eq!(c.i_prev, 0.1, epsilon = 1e-12);

        let (g, i_hist) = c.companion(dt, Integration::Trapezoidal);
        assert_abs_diff_eq!(i_hist, -(g * 1.0 + 0.1), epsilon = 1e-12);
    }

    #[test]
    fn test_capacitor_is_open_at_dc() {
        let mut c = Capacitor::new("C1".to_string(), [NodeId(1), NodeId(0)], 1e-6);
        let layout = MnaLayout::new(2, 0);
        let x = [3.0];
        c.accept(&StampContext::new(layout, &x, AnalysisMode::Dc, 1e-12));
        assert_eq!(c.i_prev, 0.0);
        assert_eq!(c.v_prev, 3.0);
    }

    #[test]
    fn test_inductor_companion() {
        let mut l = Inductor::new("L1".to_string(), [NodeId(1), NodeId(0)], 1e-3, BranchId(0));
        l.i_prev = 0.5;
        l.v_prev = 2.0;
        let (r, v_hist) = l.companion(1e-4, Integration::Trapezoidal);
        assert_abs_diff_eq!(r, 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v_hist, -(20.0 * 0.5 + 2.0), epsilon = 1e-12);

        l.reset();
        assert_eq!(l.i_prev, 0.0);
    }
}
