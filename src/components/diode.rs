//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! with an optional reverse breakdown branch below `-BV`:
//!   I = -Is - IBV * (exp(-(V + BV) / (n * Vt)) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current operating point:
//!   I ≈ I0 + G_d * (V - V0)

use super::{junction_vcrit, limited_exp, pnjlim, Device, StampContext};
use crate::circuit::NodeId;
use crate::error::{CircuitError, Result};
use crate::netlist::NetlistElement;
use crate::solver::MnaMatrix;
use crate::THERMAL_VOLTAGE;

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
    /// Reverse breakdown voltage, positive; `None` disables breakdown
    pub bv: Option<f64>,
    /// Current at the breakdown knee
    pub ibv: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            bv: None,
            ibv: 1e-3,
        }
    }
}

impl DiodeParams {
    /// Read `Is`, `N`, `BV` and `IBV` from an element, falling back to defaults.
    pub fn from_element(element: &NetlistElement) -> Result<Self> {
        let defaults = Self::default();
        let params = Self {
            is: element.param("Is").unwrap_or(defaults.is),
            n: element.param("N").unwrap_or(defaults.n),
            bv: element.param("BV"),
            ibv: element.param("IBV").unwrap_or(defaults.ibv),
        };

        let positive = |name: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(CircuitError::invalid_parameter(
                    &element.id,
                    name,
                    format!("must be positive, got {value}"),
                ))
            }
        };
        positive("Is", params.is)?;
        positive("N", params.n)?;
        positive("IBV", params.ibv)?;
        if let Some(bv) = params.bv {
            positive("BV", bv)?;
        }
        Ok(params)
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub id: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub params: DiodeParams,
    /// Junction voltage used for the last linearization
    pub v_op: f64,
    v_crit: f64,
}

impl Diode {
    pub fn new(id: String, nodes: [NodeId; 2], params: DiodeParams) -> Self {
        let v_crit = junction_vcrit(params.n_vt(), params.is);
        Self {
            id,
            nodes,
            params,
            v_op: 0.0,
            v_crit,
        }
    }

    /// Junction current and conductance at `v`.
    pub fn evaluate(&self, v: f64) -> (f64, f64) {
        let n_vt = self.params.n_vt();
        let is = self.params.is;

        match self.params.bv {
            Some(bv) if v < -bv => {
                let (e, de) = limited_exp(-(v + bv) / n_vt);
                let i = -is - self.params.ibv * (e - 1.0);
                let g = self.params.ibv * de / n_vt;
                (i, g)
            }
            _ => {
                let (e, de) = limited_exp(v / n_vt);
                (is * (e - 1.0), is * de / n_vt)
            }
        }
    }

    /// Calculate the diode current at a given voltage.
    pub fn current_at(&self, v: f64) -> f64 {
        self.evaluate(v).0
    }

    /// Get the linearized model at `v_op`.
    /// Returns (conductance G, equivalent current source I_eq)
    /// such that I = G * V + I_eq
    pub fn linearize(&self, v_op: f64, gmin: f64) -> (f64, f64) {
        let (i, g) = self.evaluate(v_op);
        let g = g + gmin;
        let i = i + gmin * v_op;
        (g, i - g * v_op)
    }

    /// Limit the junction voltage step for Newton-Raphson convergence.
    ///
    /// Returns the voltage to linearize around and whether it was changed.
    pub fn limit_voltage_step(&self, v_old: f64, v_new: f64) -> (f64, bool) {
        let n_vt = self.params.n_vt();
        if let Some(bv) = self.params.bv {
            if v_new < (-bv + 10.0 * n_vt).min(0.0) {
                // Mirror the breakdown knee onto a forward junction.
                let (v, limited) = pnjlim(-(v_new + bv), -(v_old + bv), n_vt, self.v_crit);
                return (-(v + bv), limited);
            }
        }
        pnjlim(v_new, v_old, n_vt, self.v_crit)
    }
}

impl Device for Diode {
    fn id(&self) -> &str {
        &self.id
    }

    fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool {
        let anode = ctx.row(self.nodes[0]);
        let cathode = ctx.row(self.nodes[1]);

        let v_new = ctx.voltage_across(self.nodes[0], self.nodes[1]);
        let (v, limited) = self.limit_voltage_step(self.v_op, v_new);
        self.v_op = v;

        let (g, i_eq) = self.linearize(v, ctx.gmin);
        matrix.stamp_conductance(anode, cathode, g);
        matrix.stamp_current_source(anode, cathode, i_eq);
        limited
    }

    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        let v = ctx.voltage_across(self.nodes[0], self.nodes[1]);
        self.current_at(v) + ctx.gmin * v
    }

    fn reset(&mut self) {
        self.v_op = 0.0;
    }
}
