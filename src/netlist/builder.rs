//! Board → netlist translation.

use tracing::{debug, info_span};

use super::{CircuitNetlist, ElementType, NetlistElement, ProbeDefinition};
use crate::board::{BoardState, PlacedComponent};
use crate::catalog::{
    BjtModel, ComponentCatalog, ComponentDefinition, ComponentKind, DiodeModel, MosfetModel,
};
use crate::error::{CircuitError, Result};

const DEFAULT_RESISTANCE: f64 = 1_000.0;
const DEFAULT_CAPACITANCE: f64 = 1e-6;
const DEFAULT_INDUCTANCE: f64 = 1e-3;
const DEFAULT_VOLTAGE: f64 = 5.0;
const DEFAULT_CURRENT: f64 = 1e-3;

/// Stateless translator from a board to a [`CircuitNetlist`].
///
/// The catalog is injected at construction; the builder never mutates the
/// board.
pub struct NetlistBuilder<'a> {
    catalog: &'a dyn ComponentCatalog,
    title: String,
}

impl<'a> NetlistBuilder<'a> {
    pub fn new(catalog: &'a dyn ComponentCatalog) -> Self {
        Self {
            catalog,
            title: "board".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Convert every placed component into netlist elements.
    pub fn convert(&self, board: &BoardState, probes: &[ProbeDefinition]) -> Result<CircuitNetlist> {
        let _span = info_span!("netlist_build", components = board.component_count()).entered();

        let mut netlist = CircuitNetlist::new(self.title.clone());
        for component in board.components() {
            let definition = self
                .catalog
                .get_definition(&component.definition_id)
                .ok_or_else(|| CircuitError::DefinitionNotFound {
                    definition: component.definition_id.clone(),
                    component: component.id.0,
                })?;

            let nodes = node_names(board, component);
            if let Some(element) = element_for(component, definition, nodes)? {
                debug!(id = %element.id, kind = %definition.kind, "netlist element");
                netlist.elements.push(element);
            }
        }
        netlist.probes.extend_from_slice(probes);

        debug!(
            elements = netlist.elements.len(),
            probes = netlist.probes.len(),
            "netlist built"
        );
        Ok(netlist)
    }
}

/// Node name for every pin, in pin order.
fn node_names(board: &BoardState, component: &PlacedComponent) -> Vec<String> {
    component
        .pins
        .iter()
        .map(|pin| {
            pin.connected_net
                .and_then(|id| board.net(id))
                .map(|net| net.name.clone())
                .unwrap_or_else(|| format!("NC_{}_{}", component.id.0, pin.index))
        })
        .collect()
}

fn require_pins(component: &PlacedComponent, nodes: &[String], required: usize) -> Result<()> {
    if nodes.len() < required {
        return Err(CircuitError::TooFewPins {
            component: component.id.0,
            required,
            found: nodes.len(),
        });
    }
    Ok(())
}

fn element_for(
    component: &PlacedComponent,
    definition: &ComponentDefinition,
    mut nodes: Vec<String>,
) -> Result<Option<NetlistElement>> {
    let kind = definition.kind;
    let id = format!("{}{}", kind.spice_prefix(), component.id.0);

    let value = |fallback: f64| {
        component
            .custom_value
            .or_else(|| definition.default_value())
            .unwrap_or(fallback)
    };

    let element = match kind {
        ComponentKind::Resistor => passive(&id, ElementType::Resistor, component, &nodes, value(DEFAULT_RESISTANCE))?,
        ComponentKind::Capacitor => passive(&id, ElementType::Capacitor, component, &nodes, value(DEFAULT_CAPACITANCE))?,
        ComponentKind::Inductor => passive(&id, ElementType::Inductor, component, &nodes, value(DEFAULT_INDUCTANCE))?,
        ComponentKind::VoltageSource => passive(&id, ElementType::VoltageSource, component, &nodes, value(DEFAULT_VOLTAGE))?,
        ComponentKind::CurrentSource => passive(&id, ElementType::CurrentSource, component, &nodes, value(DEFAULT_CURRENT))?,

        ComponentKind::Diode | ComponentKind::Led | ComponentKind::Zener => {
            require_pins(component, &nodes, 2)?;
            nodes.truncate(2);
            let spec = definition.diode.clone().unwrap_or_default();
            let model = spec
                .model
                .map(|m| m.spice_name())
                .unwrap_or(DiodeModel::FALLBACK);

            let mut element = NetlistElement::new(&id, ElementType::Diode, nodes, 0.0).with_model(model);
            let declared = [
                ("Is", spec.saturation_current),
                ("N", spec.emission_coefficient),
                ("BV", spec.breakdown_voltage),
                ("IBV", spec.breakdown_current),
            ];
            for (name, v) in declared {
                if let Some(v) = v {
                    element = element.with_param(name, v);
                }
            }
            element
        }

        ComponentKind::Bjt => {
            require_pins(component, &nodes, 3)?;
            nodes.truncate(3);
            let spec = definition.bjt.clone().unwrap_or_default();
            let model = spec.model.map(|m| m.spice_name()).unwrap_or(BjtModel::FALLBACK);

            let mut element = NetlistElement::new(&id, ElementType::Bjt, nodes, 0.0)
                .with_model(model)
                .with_polarity(spec.polarity);
            let declared = [
                ("Bf", spec.beta),
                ("Vaf", spec.early_voltage),
                ("Is", spec.saturation_current),
            ];
            for (name, v) in declared {
                if let Some(v) = v {
                    element = element.with_param(name, v);
                }
            }
            element
        }

        ComponentKind::Mosfet => {
            require_pins(component, &nodes, 3)?;
            nodes.truncate(3);
            // Discrete parts have the body tied to the source.
            let source = nodes[2].clone();
            nodes.push(source);

            let spec = definition.mosfet.clone().unwrap_or_default();
            let model = spec
                .model
                .map(|m| m.spice_name())
                .unwrap_or(MosfetModel::FALLBACK);

            let mut element = NetlistElement::new(&id, ElementType::Mosfet, nodes, 0.0)
                .with_model(model)
                .with_polarity(spec.channel);
            let declared = [
                ("Vto", spec.threshold_voltage),
                ("Kp", spec.transconductance),
                ("Lambda", spec.lambda),
            ];
            for (name, v) in declared {
                if let Some(v) = v {
                    element = element.with_param(name, v);
                }
            }
            element
        }

        ComponentKind::Ground | ComponentKind::Probe => return Ok(None),

        ComponentKind::Switch | ComponentKind::OpAmp => {
            return Err(CircuitError::UnsupportedKind {
                kind: kind.to_string(),
                component: component.id.0,
            });
        }
    };

    let element = NetlistElement {
        max_current: definition.max_current,
        max_power: definition.max_power,
        ..element
    };
    Ok(Some(element))
}

fn passive(
    id: &str,
    element_type: ElementType,
    component: &PlacedComponent,
    nodes: &[String],
    value: f64,
) -> Result<NetlistElement> {
    require_pins(component, nodes, 2)?;
    Ok(NetlistElement::new(id, element_type, nodes[..2].iter().cloned(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{GridPosition, InstanceId, Rotation};
    use crate::catalog::{Catalog, Polarity};
    use crate::netlist::ProbeKind;

    fn place(
        board: &mut BoardState,
        catalog: &Catalog,
        def: &str,
        x: i32,
        custom: Option<f64>,
    ) -> InstanceId {
        let pins = catalog.get_definition(def).unwrap().pins.clone();
        board
            .place_component(def, GridPosition::new(x, 0), Rotation::Deg0, &pins, custom)
            .unwrap()
            .id
    }

    fn connect(board: &mut BoardState, name: &str, pins: &[(InstanceId, usize)]) {
        let net = match board.net_by_name(name) {
            Some(n) => n.id,
            None => board.create_net(name).unwrap().id,
        };
        for (c, p) in pins {
            board.connect_pin_to_net(net, *c, *p).unwrap();
        }
    }

    #[test]
    fn test_divider_conversion() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        let v = place(&mut board, &catalog, "battery_5v", 0, None);
        let r1 = place(&mut board, &catalog, "resistor_1k", 3, None);
        let r2 = place(&mut board, &catalog, "resistor_2k", 6, None);
        let g = place(&mut board, &catalog, "ground", 9, None);
        connect(&mut board, "VIN", &[(v, 0), (r1, 0)]);
        connect(&mut board, "VOUT", &[(r1, 1), (r2, 0)]);
        connect(&mut board, "0", &[(v, 1), (r2, 1), (g, 0)]);

        let probes = [ProbeDefinition::voltage("vout", "VOUT")];
        let netlist = NetlistBuilder::new(&catalog).convert(&board, &probes).unwrap();

        assert_eq!(netlist.elements.len(), 3);
        let ids: Vec<&str> = netlist.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["V0", "R1", "R2"]);
        assert_eq!(netlist.element("V0").unwrap().nodes, vec!["VIN", "0"]);
        assert_eq!(netlist.element("R2").unwrap().value, 2_000.0);
        assert_eq!(netlist.element("R1").unwrap().max_power, Some(0.25));
        assert_eq!(netlist.probes.len(), 1);
        assert_eq!(netlist.probes[0].kind, ProbeKind::Voltage);
    }

    #[test]
    fn test_unconnected_pins_get_unique_nodes() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        place(&mut board, &catalog, "resistor_1k", 0, None);
        place(&mut board, &catalog, "resistor_1k", 3, None);

        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();
        assert_eq!(netlist.elements[0].nodes, vec!["NC_0_0", "NC_0_1"]);
        assert_eq!(netlist.elements[1].nodes, vec!["NC_1_0", "NC_1_1"]);
        assert_eq!(netlist.node_names().len(), 4);
    }

    #[test]
    fn test_custom_value_overrides_catalog() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        place(&mut board, &catalog, "resistor_1k", 0, Some(470.0));
        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();
        assert_eq!(netlist.elements[0].value, 470.0);
    }

    #[test]
    fn test_last_resort_default_value() {
        let catalog = Catalog::new().with(ComponentDefinition::with_pin_names(
            "bare_cap",
            ComponentKind::Capacitor,
            &["+", "-"],
        ));
        let mut board = BoardState::default();
        place(&mut board, &catalog, "bare_cap", 0, None);
        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();
        assert_eq!(netlist.elements[0].value, DEFAULT_CAPACITANCE);
    }

    #[test]
    fn test_semiconductor_models() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        place(&mut board, &catalog, "led_red", 0, None);
        place(&mut board, &catalog, "pnp_2n3906", 3, None);
        place(&mut board, &catalog, "nmos_2n7000", 6, None);

        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();

        let d = netlist.element("D0").unwrap();
        assert_eq!(d.model.as_deref(), Some("LED_RED"));
        assert_eq!(d.param("N"), Some(2.0));

        let q = netlist.element("Q1").unwrap();
        assert_eq!(q.nodes.len(), 3);
        assert_eq!(q.polarity, Some(Polarity::P));
        assert_eq!(q.param("Bf"), Some(100.0));

        let m = netlist.element("M2").unwrap();
        assert_eq!(m.nodes, vec!["NC_2_0", "NC_2_1", "NC_2_2", "NC_2_2"]);
        assert_eq!(m.model.as_deref(), Some("2N7000"));
        assert_eq!(m.param("Vto"), Some(2.0));
        assert_eq!(m.param("Lambda"), None);
    }

    #[test]
    fn test_model_fallback_names() {
        let catalog = Catalog::new()
            .with(ComponentDefinition::with_pin_names("d", ComponentKind::Diode, &["A", "K"]))
            .with(ComponentDefinition::with_pin_names("q", ComponentKind::Bjt, &["C", "B", "E"]));
        let mut board = BoardState::default();
        place(&mut board, &catalog, "d", 0, None);
        place(&mut board, &catalog, "q", 3, None);

        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();
        assert_eq!(netlist.elements[0].model.as_deref(), Some("1N4148"));
        assert!(netlist.elements[0].parameters.is_empty());
        assert_eq!(netlist.elements[1].model.as_deref(), Some("2N3904"));
        assert_eq!(netlist.elements[1].polarity, Some(Polarity::N));
    }

    #[test]
    fn test_ground_and_probe_emit_nothing() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        place(&mut board, &catalog, "ground", 0, None);
        place(&mut board, &catalog, "probe", 1, None);
        let netlist = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap();
        assert!(netlist.elements.is_empty());
    }

    #[test]
    fn test_missing_definition_fails() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        board
            .place_component("unobtainium", GridPosition::ORIGIN, Rotation::Deg0, &[], None)
            .unwrap();
        let err = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap_err();
        assert!(matches!(err, CircuitError::DefinitionNotFound { component: 0, .. }));
    }

    #[test]
    fn test_unsupported_kind_fails() {
        let catalog = Catalog::builtin();
        let mut board = BoardState::default();
        place(&mut board, &catalog, "switch", 0, None);
        let err = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap_err();
        assert!(matches!(err, CircuitError::UnsupportedKind { .. }));
    }

    #[test]
    fn test_bjt_with_two_pins_fails() {
        let catalog = Catalog::new().with(ComponentDefinition::with_pin_names(
            "broken_q",
            ComponentKind::Bjt,
            &["C", "B"],
        ));
        let mut board = BoardState::default();
        place(&mut board, &catalog, "broken_q", 0, None);
        let err = NetlistBuilder::new(&catalog).convert(&board, &[]).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::TooFewPins {
                required: 3,
                found: 2,
                ..
            }
        ));
    }
}
