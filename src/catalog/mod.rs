//! Component catalog: what each placeable part is, electrically.
//!
//! The netlist builder only ever sees the catalog through the
//! [`ComponentCatalog`] trait, so the game can back it with whatever asset
//! pipeline it likes. [`Catalog`] is a plain in-memory implementation with
//! a built-in parts list.

mod models;

pub use models::{
    BjtModel, BjtSpec, ComponentDefinition, ComponentKind, DiodeModel, DiodeSpec, MosfetModel,
    MosfetSpec, Polarity,
};

use std::collections::HashMap;

/// Lookup of component definitions by id.
pub trait ComponentCatalog {
    fn get_definition(&self, id: &str) -> Option<&ComponentDefinition>;
}

/// In-memory catalog keyed by definition id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    definitions: HashMap<String, ComponentDefinition>,
}

impl ComponentCatalog for Catalog {
    fn get_definition(&self, id: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(id)
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: ComponentDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn with(mut self, definition: ComponentDefinition) -> Self {
        self.insert(definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values()
    }

    /// The standard parts bin.
    pub fn builtin() -> Self {
        use ComponentKind::*;

        let two = |id: &str, kind: ComponentKind| {
            ComponentDefinition::with_pin_names(id, kind, &["+", "-"])
        };
        let diode = |id: &str, kind: ComponentKind, spec: DiodeSpec| {
            ComponentDefinition::with_pin_names(id, kind, &["A", "K"]).diode(spec)
        };

        Catalog::new()
            .with(two("resistor_220", Resistor).resistance(220.0).max_power(0.25))
            .with(two("resistor_1k", Resistor).resistance(1_000.0).max_power(0.25))
            .with(two("resistor_2k", Resistor).resistance(2_000.0).max_power(0.25))
            .with(two("resistor_10k", Resistor).resistance(10_000.0).max_power(0.25))
            .with(two("capacitor_100n", Capacitor).capacitance(100e-9))
            .with(two("capacitor_1u", Capacitor).capacitance(1e-6))
            .with(two("inductor_1m", Inductor).inductance(1e-3))
            .with(two("battery_5v", VoltageSource).voltage(5.0).display_name("5V supply"))
            .with(two("battery_9v", VoltageSource).voltage(9.0).display_name("9V battery"))
            .with(two("current_source_1m", CurrentSource).current(1e-3))
            .with(diode(
                "diode_1n4148",
                Diode,
                DiodeSpec {
                    model: Some(DiodeModel::D1N4148),
                    saturation_current: Some(2.52e-9),
                    emission_coefficient: Some(1.752),
                    breakdown_voltage: Some(100.0),
                    breakdown_current: Some(100e-6),
                },
            ).max_current(0.3))
            .with(diode(
                "diode_1n4001",
                Diode,
                DiodeSpec {
                    model: Some(DiodeModel::D1N4001),
                    saturation_current: Some(14.1e-9),
                    emission_coefficient: Some(1.984),
                    breakdown_voltage: Some(50.0),
                    breakdown_current: Some(5e-6),
                },
            ).max_current(1.0))
            .with(diode(
                "led_red",
                Led,
                DiodeSpec {
                    model: Some(DiodeModel::LedRed),
                    saturation_current: Some(1e-18),
                    emission_coefficient: Some(2.0),
                    breakdown_voltage: Some(5.0),
                    breakdown_current: Some(10e-6),
                },
            ).max_current(0.02))
            .with(diode(
                "led_green",
                Led,
                DiodeSpec {
                    model: Some(DiodeModel::LedGreen),
                    saturation_current: Some(1e-20),
                    emission_coefficient: Some(2.0),
                    breakdown_voltage: Some(5.0),
                    breakdown_current: Some(10e-6),
                },
            ).max_current(0.02))
            .with(diode(
                "zener_5v1",
                Zener,
                DiodeSpec {
                    model: Some(DiodeModel::D1N4733A),
                    saturation_current: Some(1e-14),
                    emission_coefficient: Some(1.0),
                    breakdown_voltage: Some(5.1),
                    breakdown_current: Some(1e-3),
                },
            ).max_current(0.178))
            .with(
                ComponentDefinition::with_pin_names("npn_2n3904", Bjt, &["C", "B", "E"])
                    .bjt(BjtSpec {
                        model: Some(BjtModel::Q2N3904),
                        polarity: Polarity::N,
                        beta: Some(100.0),
                        early_voltage: Some(100.0),
                        saturation_current: Some(6.7e-15),
                    })
                    .max_current(0.2),
            )
            .with(
                ComponentDefinition::with_pin_names("pnp_2n3906", Bjt, &["C", "B", "E"])
                    .bjt(BjtSpec {
                        model: Some(BjtModel::Q2N3906),
                        polarity: Polarity::P,
                        beta: Some(100.0),
                        early_voltage: Some(20.0),
                        saturation_current: Some(1.4e-14),
                    })
                    .max_current(0.2),
            )
            .with(
                ComponentDefinition::with_pin_names("nmos_2n7000", Mosfet, &["D", "G", "S"])
                    .mosfet(MosfetSpec {
                        model: Some(MosfetModel::M2N7000),
                        channel: Polarity::N,
                        threshold_voltage: Some(2.0),
                        transconductance: Some(0.1),
                        lambda: None,
                    })
                    .max_current(0.2),
            )
            .with(
                ComponentDefinition::with_pin_names("pmos_bs250", Mosfet, &["D", "G", "S"])
                    .mosfet(MosfetSpec {
                        model: Some(MosfetModel::BS250),
                        channel: Polarity::P,
                        threshold_voltage: Some(-2.0),
                        transconductance: Some(0.05),
                        lambda: None,
                    })
                    .max_current(0.18),
            )
            .with(ComponentDefinition::with_pin_names("ground", Ground, &["GND"]))
            .with(ComponentDefinition::with_pin_names("probe", Probe, &["TIP"]))
            .with(two("switch", Switch))
            .with(ComponentDefinition::with_pin_names("opamp", OpAmp, &["OUT", "IN+", "IN-"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = Catalog::builtin();
        let r = catalog.get_definition("resistor_1k").unwrap();
        assert_eq!(r.kind, ComponentKind::Resistor);
        assert_eq!(r.default_value(), Some(1_000.0));
        assert_eq!(r.pins.len(), 2);
        assert!(catalog.get_definition("flux_capacitor").is_none());
    }

    #[test]
    fn test_spice_prefixes() {
        assert_eq!(ComponentKind::Zener.spice_prefix(), "D");
        assert_eq!(ComponentKind::Mosfet.spice_prefix(), "M");
        assert_eq!(ComponentKind::Switch.spice_prefix(), "X");
    }

    #[test]
    fn test_model_names() {
        assert_eq!(DiodeModel::D1N4148.spice_name(), "1N4148");
        assert_eq!(BjtModel::Q2N3906.spice_name(), "2N3906");
        assert_eq!(MosfetModel::M2N7000.spice_name(), "2N7000");
    }
}
