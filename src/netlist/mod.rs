//! Flat circuit description produced from a board.
//!
//! A [`CircuitNetlist`] is what the solver consumes: named nodes, typed
//! elements with their values and model parameters, and the probes the
//! caller wants read back. It is plain data and crosses the UI boundary
//! as JSON.

mod builder;

pub use builder::NetlistBuilder;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Polarity;

/// Name of the ground node in generated netlists.
pub const GROUND_NODE: &str = "0";

/// Electrical element types the solver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    Diode,
    Bjt,
    Mosfet,
}

impl ElementType {
    /// Number of nodes the solver needs for this element.
    pub fn required_nodes(&self) -> usize {
        match self {
            ElementType::Bjt => 3,
            ElementType::Mosfet => 4,
            _ => 2,
        }
    }

    /// Element types whose value must be strictly positive.
    pub fn is_passive(&self) -> bool {
        matches!(
            self,
            ElementType::Resistor | ElementType::Capacitor | ElementType::Inductor
        )
    }

    pub fn is_source(&self) -> bool {
        matches!(self, ElementType::VoltageSource | ElementType::CurrentSource)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One element of the netlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetlistElement {
    /// SPICE-style id, e.g. "R3".
    pub id: String,
    pub element_type: ElementType,
    /// Node names in terminal order (C, B, E for BJTs; D, G, S, B for MOSFETs).
    pub nodes: Vec<String>,
    /// Ohms, farads, henries, volts or amps depending on the type.
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
}

impl NetlistElement {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        element_type: ElementType,
        nodes: impl IntoIterator<Item = S>,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            element_type,
            nodes: nodes.into_iter().map(Into::into).collect(),
            value,
            model: None,
            parameters: BTreeMap::new(),
            polarity: None,
            max_current: None,
            max_power: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn with_max_current(mut self, amps: f64) -> Self {
        self.max_current = Some(amps);
        self
    }

    pub fn with_max_power(mut self, watts: f64) -> Self {
        self.max_power = Some(watts);
        self
    }

    /// Named model parameter, if declared.
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    pub fn has_limits(&self) -> bool {
        self.max_current.is_some() || self.max_power.is_some()
    }
}

/// Quantity a probe reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeKind {
    Voltage,
    Current,
    Power,
}

/// A caller-declared read of the solved circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeDefinition {
    pub id: String,
    pub kind: ProbeKind,
    /// Node name for voltage probes, element id otherwise.
    pub target: String,
    /// Reference node for voltage probes; ground when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ProbeDefinition {
    pub fn voltage(id: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProbeKind::Voltage,
            target: node.into(),
            reference: None,
        }
    }

    pub fn differential(
        id: impl Into<String>,
        node: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::voltage(id, node)
        }
    }

    pub fn current(id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProbeKind::Current,
            target: element.into(),
            reference: None,
        }
    }

    pub fn power(id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProbeKind::Power,
            target: element.into(),
            reference: None,
        }
    }
}

/// A complete flat circuit description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitNetlist {
    pub title: String,
    #[serde(default = "default_ground")]
    pub ground_node: String,
    pub elements: Vec<NetlistElement>,
    #[serde(default)]
    pub probes: Vec<ProbeDefinition>,
}

fn default_ground() -> String {
    GROUND_NODE.to_string()
}

impl Default for CircuitNetlist {
    fn default() -> Self {
        Self::new("untitled")
    }
}

impl CircuitNetlist {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ground_node: default_ground(),
            elements: Vec::new(),
            probes: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: NetlistElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_probe(mut self, probe: ProbeDefinition) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn element(&self, id: &str) -> Option<&NetlistElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut NetlistElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    /// Distinct node names in order of first use.
    pub fn node_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.elements
            .iter()
            .flat_map(|e| e.nodes.iter())
            .filter(|n| seen.insert(n.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// True for the declared ground name and the reserved "0"/"GND" names.
    pub fn is_ground(&self, node: &str) -> bool {
        node == self.ground_node || crate::board::is_ground_name(node)
    }
}
