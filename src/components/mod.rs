//! Device models for circuit simulation.
//!
//! This module provides models for all supported elements:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source
//! - Nonlinear: Diode, BJT, MOSFET
//!
//! Every model implements [`Device`]: it stamps its (linearized) companion
//! model into the MNA matrix for the present guess and reports its terminal
//! current once a solution is accepted.

mod bjt;
mod diode;
mod linear;
mod mosfet;
mod sources;

pub use bjt::{Bjt, BjtParams};
pub use diode::{Diode, DiodeParams};
pub use linear::{Capacitor, Inductor, Resistor};
pub use mosfet::{Mosfet, MosfetParams, MosfetRegion};
pub use sources::{CurrentSource, VoltageSource};

use crate::circuit::{BranchId, MnaLayout, NodeId};
use crate::error::{CircuitError, Result};
use crate::netlist::{ElementType, NetlistElement};
use crate::solver::MnaMatrix;

/// Conductance used to pin a capacitor to its initial voltage.
pub const IC_CONDUCTANCE: f64 = 1e9;

/// Integration rule for reactive companion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integration {
    BackwardEuler,
    Trapezoidal,
}

/// What kind of system is being assembled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalysisMode {
    /// Steady state: capacitors open, inductors shorted.
    Dc,
    /// t = 0 with user initial conditions (capacitors at 0 V, inductors at 0 A).
    InitialConditions,
    /// One time step of length `dt`.
    Transient { dt: f64, method: Integration },
}

/// Everything a device needs to stamp itself.
#[derive(Debug, Clone, Copy)]
pub struct StampContext<'a> {
    pub layout: MnaLayout,
    /// Present Newton guess (or accepted solution).
    pub x: &'a [f64],
    pub mode: AnalysisMode,
    /// Junction shunt conductance.
    pub gmin: f64,
}

impl<'a> StampContext<'a> {
    pub fn new(layout: MnaLayout, x: &'a [f64], mode: AnalysisMode, gmin: f64) -> Self {
        Self {
            layout,
            x,
            mode,
            gmin,
        }
    }

    pub fn voltage(&self, node: NodeId) -> f64 {
        self.layout.voltage(self.x, node)
    }

    pub fn voltage_across(&self, a: NodeId, b: NodeId) -> f64 {
        self.voltage(a) - self.voltage(b)
    }

    pub fn branch_current(&self, branch: BranchId) -> f64 {
        self.layout.branch_current(self.x, branch)
    }

    pub fn row(&self, node: NodeId) -> Option<usize> {
        self.layout.node_index(node)
    }
}

/// Uniform stamping interface shared by every element model.
pub trait Device {
    fn id(&self) -> &str;

    /// Terminal nodes in netlist order.
    fn nodes(&self) -> &[NodeId];

    fn is_nonlinear(&self) -> bool {
        false
    }

    /// Stamp the companion model around `ctx.x`.
    ///
    /// Returns true when junction limiting moved the operating point away
    /// from the guess; the iteration must not be declared converged then.
    fn stamp(&mut self, matrix: &mut MnaMatrix, ctx: &StampContext<'_>) -> bool;

    /// Current entering the first terminal and flowing through the device.
    fn current(&self, ctx: &StampContext<'_>) -> f64;

    /// Instantaneous power absorbed by the device.
    fn power(&self, ctx: &StampContext<'_>) -> f64 {
        let nodes = self.nodes();
        ctx.voltage_across(nodes[0], nodes[1]) * self.current(ctx)
    }

    /// Commit reactive history after a solution is accepted.
    fn accept(&mut self, _ctx: &StampContext<'_>) {}

    /// Forget operating points and history.
    fn reset(&mut self) {}
}

/// A circuit device.
#[derive(Debug, Clone)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    Bjt(Bjt),
    Mosfet(Mosfet),
}

impl Component {
    /// Create a device from a netlist element whose node names are resolved.
    pub fn from_element(
        element: &NetlistElement,
        nodes: &[NodeId],
        branch_counter: &mut usize,
    ) -> Result<Self> {
        let required = element.element_type.required_nodes();
        if nodes.len() < required {
            return Err(CircuitError::invalid_element(
                &element.id,
                format!("needs {} nodes, found {}", required, nodes.len()),
            ));
        }
        let id = element.id.clone();
        let pair = [nodes[0], nodes[1]];
        let positive = |what: &str| {
            if element.value > 0.0 && element.value.is_finite() {
                Ok(element.value)
            } else {
                Err(CircuitError::invalid_parameter(
                    &element.id,
                    "value",
                    format!("{what} must be positive, got {}", element.value),
                ))
            }
        };

        let mut next_branch = || {
            let branch = BranchId(*branch_counter);
            *branch_counter += 1;
            branch
        };

        Ok(match element.element_type {
            ElementType::Resistor => Component::Resistor(Resistor::new(id, pair, positive("resistance")?)),
            ElementType::Capacitor => {
                Component::Capacitor(Capacitor::new(id, pair, positive("capacitance")?))
            }
            ElementType::Inductor => {
                let inductance = positive("inductance")?;
                Component::Inductor(Inductor::new(id, pair, inductance, next_branch()))
            }
            ElementType::VoltageSource => {
                Component::VoltageSource(VoltageSource::new(id, pair, element.value, next_branch()))
            }
            ElementType::CurrentSource => {
                Component::CurrentSource(CurrentSource::new(id, pair, element.value))
            }
            ElementType::Diode => Component::Diode(Diode::new(id, pair, DiodeParams::from_element(element)?)),
            ElementType::Bjt => Component::Bjt(Bjt::new(
                id,
                [nodes[0], nodes[1], nodes[2]],
                BjtParams::from_element(element)?,
            )),
            ElementType::Mosfet => Component::Mosfet(Mosfet::new(
                id,
                [nodes[0], nodes[1], nodes[2], nodes[3]],
                MosfetParams::from_element(element)?,
            )),
        })
    }

    pub fn as_device(&self) -> &dyn Device {
        match self {
            Component::Resistor(d) => d,
            Component::Capacitor(d) => d,
            Component::Inductor(d) => d,
            Component::VoltageSource(d) => d,
            Component::CurrentSource(d) => d,
            Component::Diode(d) => d,
            Component::Bjt(d) => d,
            Component::Mosfet(d) => d,
        }
    }

    pub fn as_device_mut(&mut self) -> &mut dyn Device {
        match self {
            Component::Resistor(d) => d,
            Component::Capacitor(d) => d,
            Component::Inductor(d) => d,
            Component::VoltageSource(d) => d,
            Component::CurrentSource(d) => d,
            Component::Diode(d) => d,
            Component::Bjt(d) => d,
            Component::Mosfet(d) => d,
        }
    }

    pub fn id(&self) -> &str {
        self.as_device().id()
    }

    /// Set the value of an independent source; false for other devices.
    pub fn set_source_value(&mut self, value: f64) -> bool {
        match self {
            Component::VoltageSource(v) => {
                v.set_value(value);
                true
            }
            Component::CurrentSource(i) => {
                i.set_value(value);
                true
            }
            _ => false,
        }
    }

    pub fn source_value(&self) -> Option<f64> {
        match self {
            Component::VoltageSource(v) => Some(v.voltage()),
            Component::CurrentSource(i) => Some(i.current()),
            _ => None,
        }
    }
}

/// Exponential that continues linearly past `MAX_EXP_ARG`.
///
/// Returns (value, derivative).
pub(crate) fn limited_exp(arg: f64) -> (f64, f64) {
    const MAX_EXP_ARG: f64 = 80.0;
    if arg > MAX_EXP_ARG {
        let e = MAX_EXP_ARG.exp();
        (e * (1.0 + arg - MAX_EXP_ARG), e)
    } else {
        let e = arg.exp();
        (e, e)
    }
}

/// SPICE `pnjlim`: logarithmic damping of a forward-biased junction voltage.
///
/// Returns the limited voltage and whether it differs from `vnew`.
pub(crate) fn pnjlim(vnew: f64, vold: f64, vt: f64, vcrit: f64) -> (f64, bool) {
    if vnew > vcrit && (vnew - vold).abs() > 2.0 * vt {
        let limited = if vold > 0.0 {
            let arg = 1.0 + (vnew - vold) / vt;
            if arg > 0.0 {
                vold + vt * arg.ln()
            } else {
                vcrit
            }
        } else {
            vt * (vnew / vt).ln()
        };
        (limited, true)
    } else {
        (vnew, false)
    }
}

/// Critical voltage of a junction, above which `pnjlim` engages.
pub(crate) fn junction_vcrit(vt: f64, is: f64) -> f64 {
    vt * (vt / (std::f64::consts::SQRT_2 * is)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::ElementType;

    #[test]
    fn test_pnjlim_passes_small_steps() {
        let (v, limited) = pnjlim(0.61, 0.6, 0.0258, 0.6);
        assert_eq!(v, 0.61);
        assert!(!limited);
    }

    #[test]
    fn test_pnjlim_damps_large_forward_steps() {
        let (v, limited) = pnjlim(5.0, 0.6, 0.0258, 0.6);
        assert!(limited);
        assert!(v > 0.6 && v < 1.0);

        let (v, limited) = pnjlim(5.0, 0.0, 0.0258, 0.6);
        assert!(limited);
        assert!(v < 0.2);
    }

    #[test]
    fn test_limited_exp_is_continuous() {
        let (below, _) = limited_exp(80.0 - 1e-9);
        let (above, _) = limited_exp(80.0 + 1e-9);
        assert!((above - below).abs() / below < 1e-6);
        assert!(limited_exp(1000.0).0.is_finite());
    }

    #[test]
    fn test_from_element_allocates_branches() {
        let nodes = [NodeId(1), NodeId(0)];
        let mut branches = 0;
        let v = NetlistElement::new("V1", ElementType::VoltageSource, ["a", "0"], 5.0);
        let l = NetlistElement::new("L1", ElementType::Inductor, ["a", "0"], 1e-3);
        let r = NetlistElement::new("R1", ElementType::Resistor, ["a", "0"], 1e3);
        Component::from_element(&v, &nodes, &mut branches).unwrap();
        Component::from_element(&r, &nodes, &mut branches).unwrap();
        Component::from_element(&l, &nodes, &mut branches).unwrap();
        assert_eq!(branches, 2);
    }

    #[test]
    fn test_from_element_rejects_bad_values() {
        let nodes = [NodeId(1), NodeId(0)];
        let mut branches = 0;
        let r = NetlistElement::new("R1", ElementType::Resistor, ["a", "0"], 0.0);
        let err = Component::from_element(&r, &nodes, &mut branches).unwrap_err();
        assert!(matches!(err, CircuitError::InvalidParameter { .. }));

        let q = NetlistElement::new("Q1", ElementType::Bjt, ["a", "0"], 0.0);
        let err = Component::from_element(&q, &nodes, &mut branches).unwrap_err();
        assert!(matches!(err, CircuitError::InvalidElement { .. }));
    }
}
