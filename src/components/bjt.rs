//! BJT (Bipolar Junction Transistor) model.
//!
//! Uses the Ebers-Moll transport model for NPN and PNP transistors:
//!
//! ```text
//! If = Is * (exp(Vbe/Vt) - 1)
//! Ir = Is * (exp(Vbc/Vt) - 1)
//! Ic = (If - Ir) * (1 - Vbc/Vaf) - Ir/Br
//! Ib = If/Bf + Ir/Br
//! ```
//!
//! Junction voltages are taken in the device's own polarity, so a PNP is
//! an NPN with every terminal voltage and current negated. No charge
//! storage is modeled.

use super::{junction_vcrit, limited_exp, pnjlim, Device, StampContext};
use crate::catalog::Polarity;
use crate::circuit::NodeId;
use crate::error::{CircuitError, Result};
use crate::netlist::NetlistElement;
use crate::solver::MnaMatrix;
use crate::THERMAL_VOLTAGE;

/// Parameters for a BJT model.
#[derive(Debug, Clone, PartialEq)]
pub struct BjtParams {
    pub polarity: Polarity,
    /// Transport saturation current
    pub is: f64,
    /// Forward current gain (β_F)
    pub beta_f: f64,
    /// Reverse current gain (β_R)
    pub beta_r: f64,
    /// Forward Early voltage; `None` means no output slope
    pub vaf: Option<f64>,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            polarity: Polarity::N,
            is: 1e-14,
            beta_f: 100.0,
            beta_r: 1.0,
            vaf: None,
        }
    }
}

impl BjtParams {
    /// Read `Is`, `Bf`, `Br` and `Vaf` plus the polarity from an element.
    pub fn from_element(element: &NetlistElement) -> Result<Self> {
        let defaults = Self::default();
        let params = Self {
            polarity: element.polarity.unwrap_or_default(),
            is: element.param("Is").unwrap_or(defaults.is),
            beta_f: element.param("Bf").unwrap_or(defaults.beta_f),
            beta_r: element.param("Br").unwrap_or(defaults.beta_r),
            // Vaf = 0 is the SPICE spelling of "infinite".
            vaf: element.param("Vaf").filter(|v| *v != 0.0),
        };

        for (name, value) in [
            ("Is", params.is),
            ("Bf", params.beta_f),
            ("Br", params.beta_r),
            ("Vaf", params.vaf.unwrap_or(1.0)),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(CircuitError::invalid_parameter(
                    &element.id,
                    name,
                    format!("must be positive, got {value}"),
                ));
            }
        }
        Ok(params)
    }
}

/// Core currents and their junction-voltage derivatives, in device polarity.
#[derive(Debug, Clone, Copy, Default)]
struct JunctionState {
    ic: f64,
    ib: f64,
    dic_dvbe: f64,
    dic_dvbc: f64,
    dib_dvbe: f64,
    dib_dvbc: f64,
}

/// A BJT component.
#[derive(Debug, Clone)]
pub struct Bjt {
    pub id: String,
    pub nodes: [NodeId; 3], // [collector, base, emitter]
    pub params: BjtParams,
    /// Base-emitter voltage used for the last linearization
    pub v_be_op: f64,
    /// Base-collector voltage used for the last linearization
    pub v_bc_op: f64,
    v_crit: f64,
}

impl Bjt {
    pub fn new(id: String, nodes: [NodeId; 3], params: BjtParams) -> Self {
        let v_crit = junction_vcrit(THERMAL_VOLTAGE, params.is);
        Self {
            id,
            nodes,
            params,
            v_be_op: 0.0,
            v_bc_op: 0.0,
            v_crit,
        }
    }

    /// Get the collector node.
    pub fn collector(&self) -> NodeId {
        self.nodes[0]
    }

    /// Get the base node.
    pub fn base(&self) -> NodeId {
        self.nodes[1]
    }

    /// Get the emitter node.
    pub fn emitter(&self) -> NodeId {
        self.nodes[2]
    }

    /// Junction voltages (Vbe, Vbc) in device polarity.
    fn junction_voltages(&self, ctx: &StampContext<'_>) -> (f64, f64) {
        let s = self.params.polarity.sign();
        let vb = ctx.voltage(self.base());
        (
            s * (vb - ctx.voltage(self.emitter())),
            s * (vb - ctx.voltage(self.collector())),
        )
    }

    fn evaluate(&self, v_be: f64, v_bc: f64, gmin: f64) -> JunctionState {
        let p = &self.params;
        let vt = THERMAL_VOLTAGE;

        let (ef, def) = limited_exp(v_be / vt);
        let (er, der) = limited_exp(v_bc / vt);
        let i_f = p.is * (ef - 1.0);
        let i_r = p.is * (er - 1.0);
        let g_f = p.is * def / vt;
        let g_r = p.is * der / vt;

        let (early, d_early) = match p.vaf {
            Some(vaf) => (1.0 - v_bc / vaf, -1.0 / vaf),
            None => (1.0, 0.0),
        };

        let transport = i_f - i_r;
        JunctionState {
            ic: transport * early - i_r / p.beta_r - gmin * v_bc,
            ib: i_f / p.beta_f + i_r / p.beta_r + gmin * (v_be + v_bc),
            dic_dvbe: g_f * early,
            dic_dvbc: -g_r * early + transport * d_early - g_r / p.beta_r - gmin,
            dib_dvbe: g_f / p.beta_f + gmin,
            dib_dvbc: g_r / p.beta_r + gmin,
        }
    }

    /// Terminal currents (collector, base, emitter) flowing into the device.
    pub fn terminal_currents(&self, v_be: f64, v_bc: f64, gmin: f64) -> [f64; 3] {
        let s = self.params.polarity.sign();
        let st = self.evaluate(v_be, v_bc, gmin);
        let ic = s * st.ic;
        let ib = s * st.ib;
        [ic, ib, -(ic + ib)]
    }

    /// Collector current (Ic).
    pub fn i_c(&self, v_be: f64, v_bc: f64) -> f64 {
        self.terminal_currents(v_be, v_bc, 0.0)[0]
    }

    /// Base current (Ib).
    pub fn i_b(&self, v_be: f64, v_bc: f64) -> f64 {
        self.terminal_currents(v_be, v_bc, 0.0)[1]
    }
}

impl Device for Bjt {
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
        let (v_be_new, v_bc_new) = self.junction_voltages(ctx);
        let (v_be, be_limited) = pnjlim(v_be_new, self.v_be_op, THERMAL_VOLTAGE, self.v_crit);
        let (v_bc, bc_limited) = pnjlim(v_bc_new, self.v_bc_op, THERMAL_VOLTAGE, self.v_crit);
        self.v_be_op = v_be;
        self.v_bc_op = v_bc;

        let s = self.params.polarity.sign();
        let st = self.evaluate(v_be, v_bc, ctx.gmin);

        // d(terminal current)/d(Vc, Vb, Ve); polarity cancels in the product.
        let row = |d_vbe: f64, d_vbc: f64| [-d_vbc, d_vbe + d_vbc, -d_vbe];
        let g_c = row(st.dic_dvbe, st.dic_dvbc);
        let g_b = row(st.dib_dvbe, st.dib_dvbc);
        let g_e = [
            -(g_c[0] + g_b[0]),
            -(g_c[1] + g_b[1]),
            -(g_c[2] + g_b[2]),
        ];

        let ic = s * st.ic;
        let ib = s * st.ib;

        // Terminal voltages consistent with the limited junction voltages.
        let v_b0 = s * v_be;
        let v0 = [v_b0 - s * v_bc, v_b0, 0.0];

        let rows = self.nodes.map(|n| ctx.row(n));
        matrix.stamp_terminal_model(rows, v0, [ic, ib, -(ic + ib)], [g_c, g_b, g_e]);

        be_limited || bc_limited
    }

    /// Collector current.
    fn current(&self, ctx: &StampContext<'_>) -> f64 {
        let (v_be, v_bc) = self.junction_voltages(ctx);
        self.terminal_currents(v_be, v_bc, ctx.gmin)[0]
    }

    fn power(&self, ctx: &StampContext<'_>) -> f64 {
        let (v_be, v_bc) = self.junction_voltages(ctx);
        let currents = self.terminal_currents(v_be, v_bc, ctx.gmin);
        self.nodes
            .iter()
            .zip(currents)
            .map(|(&n, i)| ctx.voltage(n) * i)
            .sum()
    }

    fn reset(&mut self) {
        self.v_be_op = 0.0;
        self.v_bc_op = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::ElementType;
    use approx::assert_relative_eq;

    fn bjt(polarity: Polarity) -> Bjt {
        Bjt::new(
            "Q1".to_string(),
            [NodeId(1), NodeId(2), NodeId(0)],
            BjtParams {
                polarity,
                ..BjtParams::default()
            },
        )
    }

    #[test]
    fn test_forward_active_gain() {
        let q = bjt(Polarity::N);
        // Vbe = 0.65, Vbc = 0.65 - 5
        let ic = q.i_c(0.65, -4.35);
        let ib = q.i_b(0.65, -4.35);
        assert!(ic > 0.0);
        assert_relative_eq!(ic / ib, 100.0, max_relative = 1e-3);
    }

    #[test]
    fn test_pnp_mirrors_npn() {
        let n = bjt(Polarity::N);
        let p = bjt(Polarity::P);
        let in_ = n.terminal_currents(0.65, -4.0, 0.0);
        let ip = p.terminal_currents(0.65, -4.0, 0.0);
        for k in 0..3 {
            assert_relative_eq!(in_[k], -ip[k]);
        }
    }

    #[test]
    fn test_terminal_currents_sum_to_zero() {
        let q = bjt(Polarity::N);
        let i = q.terminal_currents(0.7, 0.2, 1e-12);
        assert!((i[0] + i[1] + i[2]).abs() < 1e-15);
    }

    #[test]
    fn test_early_effect_raises_ic() {
        let mut q = bjt(Polarity::N);
        let flat = q.i_c(0.65, -4.35);
        q.params.vaf = Some(50.0);
        let sloped = q.i_c(0.65, -4.35);
        assert!(sloped > flat);
    }

    #[test]
    fn test_params_from_element() {
        let e = NetlistElement::new("Q1", ElementType::Bjt, ["c", "b", "e"], 0.0)
            .with_polarity(Polarity::P)
            .with_param("Bf", 200.0)
            .with_param("Vaf", 0.0);
        let p = BjtParams::from_element(&e).unwrap();
        assert_eq!(p.polarity, Polarity::P);
        assert_eq!(p.beta_f, 200.0);
        assert_eq!(p.vaf, None);

        let bad = e.with_param("Bf", 0.0);
        assert!(BjtParams::from_element(&bad).is_err());
    }
}
