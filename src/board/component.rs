//! Placed components, their pins, nets and trace segments.

use serde::{Deserialize, Serialize};

use super::types::{GridPosition, InstanceId, NetId, Rotation, TraceId};

/// Pin template from a component definition, in unrotated local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDefinition {
    pub index: usize,
    pub name: String,
    pub local_position: GridPosition,
}

impl PinDefinition {
    pub fn new(index: usize, name: impl Into<String>, local_position: GridPosition) -> Self {
        Self {
            index,
            name: name.into(),
            local_position,
        }
    }
}

/// A pin on a placed component.
///
/// `local_position` is already rotated into board orientation; the world
/// position is the owner's position plus this offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PinInstance {
    pub index: usize,
    pub name: String,
    pub local_position: GridPosition,
    pub connected_net: Option<NetId>,
}

/// A component instance on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedComponent {
    pub id: InstanceId,
    pub definition_id: String,
    pub position: GridPosition,
    pub rotation: Rotation,
    /// Overrides the catalog's electrical value when set.
    pub custom_value: Option<f64>,
    /// Fixed components cannot be removed by the player.
    pub is_fixed: bool,
    pub pins: Vec<PinInstance>,
}

impl PlacedComponent {
    pub(crate) fn new(
        id: InstanceId,
        definition_id: String,
        position: GridPosition,
        rotation: Rotation,
        pin_templates: &[PinDefinition],
        custom_value: Option<f64>,
    ) -> Self {
        let pins = pin_templates
            .iter()
            .map(|def| PinInstance {
                index: def.index,
                name: def.name.clone(),
                local_position: rotation.apply(def.local_position),
                connected_net: None,
            })
            .collect();

        Self {
            id,
            definition_id,
            position,
            rotation,
            custom_value,
            is_fixed: false,
            pins,
        }
    }

    pub fn pin(&self, index: usize) -> Option<&PinInstance> {
        self.pins.iter().find(|p| p.index == index)
    }

    pub(crate) fn pin_mut(&mut self, index: usize) -> Option<&mut PinInstance> {
        self.pins.iter_mut().find(|p| p.index == index)
    }

    /// World position of a pin, or `None` if the index is unknown.
    pub fn pin_world_position(&self, index: usize) -> Option<GridPosition> {
        self.pin(index).map(|p| self.position + p.local_position)
    }

    /// World positions of all pins in declaration order.
    pub fn pin_world_positions(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.pins.iter().map(move |p| self.position + p.local_position)
    }
}

/// Weak back-reference from a net to a component pin.
///
/// Two references denote the same pin when component and pin index match;
/// the cached position is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRef {
    pub component: InstanceId,
    pub pin_index: usize,
    pub position: GridPosition,
}

impl PinRef {
    pub fn same_pin(&self, component: InstanceId, pin_index: usize) -> bool {
        self.component == component && self.pin_index == pin_index
    }
}

/// A named electrical node.
#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    pub pins: Vec<PinRef>,
}

impl Net {
    /// "GND" and "0" denote the ground node.
    pub fn is_ground(&self) -> bool {
        is_ground_name(&self.name)
    }

    /// Nets named "V..." are power rails by convention.
    pub fn is_power(&self) -> bool {
        self.name.starts_with('V')
    }

    pub fn contains_pin(&self, component: InstanceId, pin_index: usize) -> bool {
        self.pins.iter().any(|p| p.same_pin(component, pin_index))
    }
}

/// True for the reserved ground node names.
pub fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("GND")
}

/// An orthogonal wire fragment belonging to one net.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSegment {
    pub id: TraceId,
    pub net: NetId,
    pub start: GridPosition,
    pub end: GridPosition,
}

impl TraceSegment {
    pub fn is_axis_aligned(&self) -> bool {
        self.start.is_aligned_with(self.end)
    }

    pub fn length(&self) -> u32 {
        self.start.manhattan_distance(self.end)
    }

    pub fn touches(&self, p: GridPosition) -> bool {
        self.start == p || self.end == p
    }
}
