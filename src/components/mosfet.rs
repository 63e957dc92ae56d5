//! Level-1 (square-law) MOSFET model.
//!
//! In device polarity, with `Vov = Vgs - Vth`:
//! - Cutoff:     Vov <= 0          → Id = 0
//! - Linear:     Vds < Vov         → Id = Kp * (2*Vov*Vds - Vds^2) * (1 + λ*Vds)
//! - Saturation: Vds >= Vov        → Id = Kp * Vov^2 * (1 + λ*Vds)
//!
//! Source and drain swap roles when Vds goes negative. The bulk terminal
//! is carried for netlist fidelity but has no effect.

use super::{Device, StampContext};
use crate::catalog::Polarity;
use crate::circuit::NodeId;
use crate::error::{CircuitError, Result};
use crate::netlist::NetlistElement;
use crate::solver::MnaMatrix;

/// Largest gate-source change allowed between two Newton iterations.
const VGS_STEP_LIMIT: f64 = 1.0;

/// Parameters for a MOSFET model.
#[derive(Debug, Clone, PartialEq)]
pub struct MosfetParams {
    pub polarity: Polarity,
    /// Threshold voltage, negative for enhancement P-channel parts
    pub vto: f64,
    /// Transconductance parameter (A/V²)
    pub kp: f64,
    /// Channel-length modulation (1/V)
    pub lambda: f64,
}

impl MosfetParams {
    pub fn defaults(polarity: Polarity) -> Self {
        Self {
            polarity,
            vto: polarity.sign() * 1.0,
            kp: 2e-5,
            lambda: 0.0,
        }
    }

    /// Read `Vto`, `Kp` and `Lambda` plus the channel polarity from an element.
    pub fn from_element(element: &NetlistElement) -> Result<Self> {
        let defaults = Self::defaults(element.polarity.unwrap_or_default());
        let params = Self {
            vto: element.param("Vto").unwrap_or(defaults.vto),
            kp: element.param("Kp").unwrap_or(defaults.kp),
            lambda: element.param("Lambda").unwrap_or(defaults.lambda),
            ..defaults
        };

        if !(params.kp > 0.0 && params.kp.is_finite()) {
            return Err(CircuitError::invalid_parameter(
                &element.id,
                "Kp",
                format!("must be positive, got {}", params.kp),
            ));
        }
        if params.lambda < 0.0 || !params.lambda.is_finite() {
            return Err(CircuitError::invalid_parameter(
                &element.id,
                "Lambda",
                format!("must not be negative, got {}", params.lambda),
            ));
        }
        Ok(params)
    }

    /// Threshold in device polarity.
    pub fn vth(&self) -> f64 {
        self.polarity.sign() * self.vto
    }
}

/// Operating region of the MOSFET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosfetRegion {
    Cutoff,
    Linear,
    Saturation,
}

/// Drain current and its partial derivatives, in device polarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    pub id: f64,
    /// ∂Id/∂Vgs
    pub gm: f64,
    /// ∂Id/∂Vds
    pub gds: f64,
    pub region: MosfetRegion,
}

/// A MOSFET component.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub id: String,
    pub nodes: [NodeId; 4], // [drain, gate, source, bulk]
    pub params: MosfetParams,
    /// Gate-source voltage used for the last linearization
    pub v_gs_op: f64,
    /// Drain-source voltage used for the last linearization
    pub v_ds_op: f64,
}

impl Mosfet {
    pub fn new(id: String, nodes: [NodeId; 4], params: MosfetParams) -> Self {
        Self {
            id,
            nodes,
            params,
            v_gs_op: 0.0,
            v_ds_op: 0.0,
        }
    }

    pub fn drain(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn gate(&self) -> NodeId {
        self.nodes[1]
    }

    pub fn source(&self) -> NodeId {
        self.nodes[2]
    }

    /// Square-law evaluation for `vds >= 0`.
    fn forward(&self, vgs: f64, vds: f64) -> ChannelState {
        let kp = self.params.kp;
        let lambda = self.params.lambda;
        let vov = vgs - self.params.vth();
        let clm = 1.0 + lambda * vds;

        if vov <= 0.0 {
            ChannelState {
                id: 0.0,
                gm: 0.0,
                gds: 0.0,
                region: MosfetRegion::Cutoff,
            }
        } else if vds < vov {
            let shape = 2.0 * vov * vds - vds * vds;
            ChannelState {
                id: kp * shape * clm,
                gm: 2.0 * kp * vds * clm,
                gds: kp * (2.0 * vov - 2.0 * vds) * clm + kp * shape * lambda,
                region: MosfetRegion::Linear,
            }
        } else {
            ChannelState {
                id: kp * vov * vov * clm,
                gm: 2.0 * kp * vov * clm,
                gds: kp * vov * vov * lambda,
                region: MosfetRegion::Saturation,
            }
        }
    }

    /// Evaluate the channel for any sign of `vds` (device polarity).
    ///
    /// For reverse `vds` the physical source is the drain terminal, so the
    /// model runs at (Vgs - Vds, -Vds) and the current is negated.
    pub fn evaluate(&self, vgs: f64, vds: f64) -> ChannelState {
        if vds >= 0.0 {
            return self.forward(vgs, vds);
        }
        let r = self.forward(vgs - vds, -vds);
        ChannelState {
            id: -r.id,
            gm: -r.gm,
            gds: r.gm + r.gds,
            region: r.region,
        }
    }

    pub fn region(&self, vgs: f64, vds: f64) -> MosfetRegion {
        self.evaluate(vgs, vds).region
    }

    /// (Vgs, Vds) in device polarity.
    fn terminal_voltages(&self, ctx: &StampContext<'_>) -> (f64, f64) {
        let s = self.params.polarity.sign();
        let vs = ctx.voltage(self.source());
        (
            s * (ctx.voltage(self.gate()) - vs),
            s * (ctx.voltage(self.drain()) - vs),
        )
    }

    /// Damp the (Vgs, Vds) update; true if anything was changed.
    fn limit(&self, vgs_new: f64, vds_new: f64) -> (f64, f64, bool) {
        let vgs = vgs_new.clamp(self.v_gs_op - VGS_STEP_LIMIT, self.v_gs_op + VGS_STEP_LIMIT);
        let vds = if self.v_ds_op >= 0.0 {
            limvds(vds_new, self.v_ds_op)
        } else {
            -limvds(-vds_new, -self.v_ds_op)
        };
        let limited = vgs != vgs_new || vds != vds_new;
        (vgs, vds, limited)
    }

    /// Drain current (into the drain terminal) at a solution.
    fn drain_current(&self, ctx: &StampContext<'_>) -> f64 {
        let (vgs, vds) = self.terminal_voltages(ctx);
        let s = self.params.polarity.sign();
        s * (self.evaluate(vgs, vds).id + ctx.gmin * vds)
    }
}

/// SPICE drain-source voltage limiting.
fn limvds(vnew: f64, vold: f64) -> f64 {
    if vold >= 3.5 {
        if vnew > vold {
            vnew.min(3.0 * vold + 2.0)
        } else if vnew < 3.5 {
            vnew.max(2.0)
        } else {
            vnew
        }
    } else if vnew > vold {
        vnew.min(4.0)
    } else {
        vnew.max(-0.5)
    }
}

impl Device for Mosfet {
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
        let (vgs_new, vds_new) = self.terminal_voltages(ctx);
        let (vgs, vds, limited) = self.limit(vgs_new, vds_new);
        self.v_gs_op = vgs;
        self.v_ds_op = vds;

        let s = self.params.polarity.sign();
        let ch = self.evaluate(vgs, vds);
        let gm = ch.gm;
        let gds = ch.gds + ctx.gmin;
        let id = s * (ch.id + ctx.gmin * vds);

        // Over (drain, gate, source); the gate draws no current.
        let g_d = [gds, gm, -(gm + gds)];
        let g_s = [-gds, -gm, gm + gds];
        let rows = [
            ctx.row(self.drain()),
            ctx.row(self.gate()),
            ctx.row(self.source()),
        ];
        matrix.stamp_terminal_model(
            rows,
            [s * vds, s * vgs, 0.0],
            [id, 0.0, -id],
            [g_d, [0.0; 3], g_s],
        );
        limited
    }

    /// Drain current.
    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        self.drain_current(ctx)
    }

    /// Vds * Id; the gate carries no current.
    fn power(&self, ctx: &StampContext<'_>) -> f64 {
        ctx.voltage_across(self.drain(), self.source()) * self.drain_current(ctx)
    }

    fn reset(&mut self) {
        self.v_gs_op = 0.0;
        self.v_ds_op = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::ElementType;
    use approx::assert_relative_eq;

    fn nmos() -> Mosfet {
        Mosfet::new(
            "M1".to_string(),
            [NodeId(1), NodeId(2), NodeId(0), NodeId(0)],
            MosfetParams {
                vto: 2.0,
                kp: 0.1,
                ..MosfetParams::defaults(Polarity::N)
            },
        )
    }

    #[test]
    fn test_nmos_cutoff() {
        let m = nmos();
        let ch = m.evaluate(1.5, 5.0);
        assert_eq!(ch.id, 0.0);
        assert_eq!(ch.region, MosfetRegion::Cutoff);
    }

    #[test]
    fn test_nmos_saturation() {
        let m = nmos();
        let ch = m.evaluate(3.0, 5.0);
        assert_eq!(ch.region, MosfetRegion::Saturation);
        assert_relative_eq!(ch.id, 0.1);
        assert_relative_eq!(ch.gm, 0.2);
    }

    #[test]
    fn test_nmos_linear() {
        let m = nmos();
        let ch = m.evaluate(3.0, 0.5);
        assert_eq!(ch.region, MosfetRegion::Linear);
        assert_relative_eq!(ch.id, 0.1 * (2.0 * 1.0 * 0.5 - 0.25));
    }

    #[test]
    fn test_continuous_at_pinch_off() {
        let m = nmos();
        let below = m.evaluate(3.0, 1.0 - 1e-9).id;
        let above = m.evaluate(3.0, 1.0).id;
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn test_reverse_vds_swaps_terminals() {
        let m = nmos();
        // Drain held 1 V below source with the gate 3 V above source.
        let ch = m.evaluate(3.0, -1.0);
        assert!(ch.id < 0.0);
        let mirrored = m.evaluate(4.0, 1.0);
        assert_relative_eq!(ch.id, -mirrored.id);
    }

    #[test]
    fn test_pmos_threshold_polarity() {
        let params = MosfetParams {
            vto: -2.0,
            kp: 0.05,
            ..MosfetParams::defaults(Polarity::P)
        };
        assert_eq!(params.vth(), 2.0);
    }

    #[test]
    fn test_limvds() {
        assert_eq!(limvds(10.0, 0.0), 4.0);
        assert_eq!(limvds(-3.0, 0.0), -0.5);
        assert_eq!(limvds(20.0, 4.0), 14.0);
        assert_eq!(limvds(1.0, 5.0), 2.0);
    }

    #[test]
    fn test_params_from_element() {
        let e = NetlistElement::new("M1", ElementType::Mosfet, ["d", "g", "s", "s"], 0.0)
            .with_polarity(Polarity::P);
        let p = MosfetParams::from_element(&e).unwrap();
        assert_eq!(p.vto, -1.0);
        assert_eq!(p.kp, 2e-5);

        let bad = e.with_param("Kp", 0.0);
        assert!(MosfetParams::from_element(&bad).is_err());
    }
}
