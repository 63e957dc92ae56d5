//! Catalog vocabulary: component kinds, semiconductor models and definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::{GridPosition, PinDefinition};

/// What a catalog entry is, electrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    Diode,
    Led,
    Zener,
    Bjt,
    Mosfet,
    Ground,
    Probe,
    Switch,
    OpAmp,
}

impl ComponentKind {
    /// SPICE element-name prefix for this kind.
    pub fn spice_prefix(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "R",
            ComponentKind::Capacitor => "C",
            ComponentKind::Inductor => "L",
            ComponentKind::VoltageSource => "V",
            ComponentKind::CurrentSource => "I",
            ComponentKind::Diode | ComponentKind::Led | ComponentKind::Zener => "D",
            ComponentKind::Bjt => "Q",
            ComponentKind::Mosfet => "M",
            _ => "X",
        }
    }

    pub fn is_diode_like(&self) -> bool {
        matches!(
            self,
            ComponentKind::Diode | ComponentKind::Led | ComponentKind::Zener
        )
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Device polarity: NPN / N-channel versus PNP / P-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    N,
    P,
}

impl Polarity {
    /// +1 for N devices, -1 for P devices.
    pub fn sign(&self) -> f64 {
        match self {
            Polarity::N => 1.0,
            Polarity::P => -1.0,
        }
    }
}

/// Diode part numbers known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiodeModel {
    D1N4148,
    D1N4001,
    D1N5819,
    D1N4733A,
    LedRed,
    LedGreen,
    LedBlue,
}

impl DiodeModel {
    pub const FALLBACK: &'static str = "1N4148";

    pub fn spice_name(&self) -> &'static str {
        match self {
            DiodeModel::D1N4148 => "1N4148",
            DiodeModel::D1N4001 => "1N4001",
            DiodeModel::D1N5819 => "1N5819",
            DiodeModel::D1N4733A => "1N4733A",
            DiodeModel::LedRed => "LED_RED",
            DiodeModel::LedGreen => "LED_GREEN",
            DiodeModel::LedBlue => "LED_BLUE",
        }
    }
}

/// BJT part numbers known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BjtModel {
    Q2N3904,
    Q2N3906,
    BC547,
    BC557,
}

impl BjtModel {
    pub const FALLBACK: &'static str = "2N3904";

    pub fn spice_name(&self) -> &'static str {
        match self {
            BjtModel::Q2N3904 => "2N3904",
            BjtModel::Q2N3906 => "2N3906",
            BjtModel::BC547 => "BC547",
            BjtModel::BC557 => "BC557",
        }
    }
}

/// MOSFET part numbers known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MosfetModel {
    M2N7000,
    BS250,
    IRF540N,
    IRF9540N,
}

impl MosfetModel {
    pub const FALLBACK: &'static str = "2N7000";

    pub fn spice_name(&self) -> &'static str {
        match self {
            MosfetModel::M2N7000 => "2N7000",
            MosfetModel::BS250 => "BS250",
            MosfetModel::IRF540N => "IRF540N",
            MosfetModel::IRF9540N => "IRF9540N",
        }
    }
}

/// Diode / LED / zener model data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiodeSpec {
    pub model: Option<DiodeModel>,
    pub saturation_current: Option<f64>,
    pub emission_coefficient: Option<f64>,
    pub breakdown_voltage: Option<f64>,
    pub breakdown_current: Option<f64>,
}

/// BJT model data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BjtSpec {
    pub model: Option<BjtModel>,
    pub polarity: Polarity,
    /// Forced forward current gain.
    pub beta: Option<f64>,
    pub early_voltage: Option<f64>,
    pub saturation_current: Option<f64>,
}

/// MOSFET model data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MosfetSpec {
    pub model: Option<MosfetModel>,
    pub channel: Polarity,
    pub threshold_voltage: Option<f64>,
    pub transconductance: Option<f64>,
    pub lambda: Option<f64>,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: String,
    pub display_name: String,
    pub kind: ComponentKind,
    pub pins: Vec<PinDefinition>,
    #[serde(default)]
    pub resistance: Option<f64>,
    #[serde(default)]
    pub capacitance: Option<f64>,
    #[serde(default)]
    pub inductance: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub diode: Option<DiodeSpec>,
    #[serde(default)]
    pub bjt: Option<BjtSpec>,
    #[serde(default)]
    pub mosfet: Option<MosfetSpec>,
    #[serde(default)]
    pub max_current: Option<f64>,
    #[serde(default)]
    pub max_power: Option<f64>,
}

impl ComponentDefinition {
    pub fn new(id: impl Into<String>, kind: ComponentKind, pins: Vec<PinDefinition>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            kind,
            pins,
            resistance: None,
            capacitance: None,
            inductance: None,
            voltage: None,
            current: None,
            diode: None,
            bjt: None,
            mosfet: None,
            max_current: None,
            max_power: None,
        }
    }

    /// A definition with pins laid out left to right at (0,0), (1,0), ...
    pub fn with_pin_names(id: impl Into<String>, kind: ComponentKind, names: &[&str]) -> Self {
        let pins = names
            .iter()
            .enumerate()
            .map(|(i, name)| PinDefinition::new(i, *name, GridPosition::new(i as i32, 0)))
            .collect();
        Self::new(id, kind, pins)
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn resistance(mut self, ohms: f64) -> Self {
        self.resistance = Some(ohms);
        self
    }

    pub fn capacitance(mut self, farads: f64) -> Self {
        self.capacitance = Some(farads);
        self
    }

    pub fn inductance(mut self, henries: f64) -> Self {
        self.inductance = Some(henries);
        self
    }

    pub fn voltage(mut self, volts: f64) -> Self {
        self.voltage = Some(volts);
        self
    }

    pub fn current(mut self, amps: f64) -> Self {
        self.current = Some(amps);
        self
    }

    pub fn diode(mut self, spec: DiodeSpec) -> Self {
        self.diode = Some(spec);
        self
    }

    pub fn bjt(mut self, spec: BjtSpec) -> Self {
        self.bjt = Some(spec);
        self
    }

    pub fn mosfet(mut self, spec: MosfetSpec) -> Self {
        self.mosfet = Some(spec);
        self
    }

    pub fn max_current(mut self, amps: f64) -> Self {
        self.max_current = Some(amps);
        self
    }

    pub fn max_power(mut self, watts: f64) -> Self {
        self.max_power = Some(watts);
        self
    }

    /// The catalog's value for the quantity that matters for this kind.
    pub fn default_value(&self) -> Option<f64> {
        match self.kind {
            ComponentKind::Resistor => self.resistance,
            ComponentKind::Capacitor => self.capacitance,
            ComponentKind::Inductor => self.inductance,
            ComponentKind::VoltageSource => self.voltage,
            ComponentKind::CurrentSource => self.current,
            _ => None,
        }
    }
}
