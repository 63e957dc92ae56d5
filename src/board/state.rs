//! The board aggregate: components, nets and traces with their invariants.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use super::component::{Net, PinDefinition, PinRef, PlacedComponent, TraceSegment};
use super::types::{BoardBounds, GridPosition, InstanceId, NetId, Rotation, TraceId};
use crate::error::{CircuitError, Result};

/// Change notification queued by mutating board operations.
///
/// The view layer drains these with [`BoardState::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    ComponentPlaced { id: InstanceId, position: GridPosition },
    ComponentRemoved { id: InstanceId },
    NetCreated { id: NetId, name: String },
    NetRemoved { id: NetId },
    /// A connection left the net with at least two pins; carries the two
    /// most recently connected pins.
    PinsConnected { net: NetId, first: PinRef, second: PinRef },
    TraceAdded { id: TraceId, net: NetId },
    TraceRemoved { id: TraceId, net: NetId },
}

/// Mutable graph of everything placed on the board.
///
/// Ids are never reused within the lifetime of one board. Every pin whose
/// `connected_net` is `Some(n)` appears exactly once in net `n`, and every
/// pin listed by a net points back at it.
#[derive(Debug, Clone)]
pub struct BoardState {
    suggested_width: u32,
    suggested_height: u32,
    components: BTreeMap<InstanceId, PlacedComponent>,
    nets: BTreeMap<NetId, Net>,
    traces: BTreeMap<TraceId, TraceSegment>,
    occupancy: HashMap<GridPosition, InstanceId>,
    next_component_id: u32,
    next_net_id: u32,
    next_trace_id: u32,
    events: Vec<BoardEvent>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new(32, 24)
    }
}

impl BoardState {
    /// Create an empty board. The size is advisory; the grid is unbounded.
    pub fn new(suggested_width: u32, suggested_height: u32) -> Self {
        Self {
            suggested_width,
            suggested_height,
            components: BTreeMap::new(),
            nets: BTreeMap::new(),
            traces: BTreeMap::new(),
            occupancy: HashMap::new(),
            next_component_id: 0,
            next_net_id: 0,
            next_trace_id: 0,
            events: Vec::new(),
        }
    }

    // ============ Components ============

    /// Place a component, instantiating its pins from the given templates.
    pub fn place_component(
        &mut self,
        definition_id: &str,
        position: GridPosition,
        rotation: Rotation,
        pins: &[PinDefinition],
        custom_value: Option<f64>,
    ) -> Result<&PlacedComponent> {
        if self.occupancy.contains_key(&position) {
            return Err(CircuitError::PositionOccupied {
                x: position.x,
                y: position.y,
            });
        }
        let mut seen = HashSet::with_capacity(pins.len());
        if let Some(dup) = pins.iter().find(|pin| !seen.insert(pin.index)) {
            return Err(CircuitError::DuplicatePinIndex {
                definition: definition_id.to_string(),
                pin: dup.index,
            });
        }

        let id = InstanceId(self.next_component_id);
        self.next_component_id += 1;

        let component = PlacedComponent::new(
            id,
            definition_id.to_string(),
            position,
            rotation,
            pins,
            custom_value,
        );
        debug!(%id, definition_id, %position, "component placed");

        self.occupancy.insert(position, id);
        self.events.push(BoardEvent::ComponentPlaced { id, position });
        Ok(self.components.entry(id).or_insert(component))
    }

    /// Mark a component as fixed (non-removable) or free it again.
    pub fn set_fixed(&mut self, id: InstanceId, fixed: bool) -> Result<()> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or(CircuitError::ComponentNotFound { id: id.0 })?;
        component.is_fixed = fixed;
        Ok(())
    }

    /// Remove a component and everything that only existed because of it.
    ///
    /// Returns false if the component does not exist or is fixed.
    pub fn remove_component(&mut self, id: InstanceId) -> bool {
        match self.components.get(&id) {
            None => return false,
            Some(c) if c.is_fixed => {
                debug!(%id, "refusing to remove fixed component");
                return false;
            }
            Some(_) => {}
        }
        let Some(component) = self.components.remove(&id) else {
            return false;
        };

        self.occupancy.remove(&component.position);

        let mut touched = BTreeSet::new();
        for pin in &component.pins {
            if let Some(net_id) = pin.connected_net {
                if let Some(net) = self.nets.get_mut(&net_id) {
                    net.pins.retain(|p| p.component != id);
                    touched.insert(net_id);
                }
            }
        }

        let pin_positions: Vec<GridPosition> = component.pin_world_positions().collect();
        let orphaned: Vec<TraceId> = self
            .traces
            .values()
            .filter(|t| pin_positions.iter().any(|p| t.touches(*p)))
            .map(|t| t.id)
            .collect();
        for trace_id in orphaned {
            if let Some(trace) = self.traces.remove(&trace_id) {
                self.events.push(BoardEvent::TraceRemoved {
                    id: trace_id,
                    net: trace.net,
                });
            }
        }

        for net_id in touched {
            if self.nets.get(&net_id).is_some_and(|n| n.pins.is_empty()) {
                self.delete_net(net_id);
            }
        }

        debug!(%id, "component removed");
        self.events.push(BoardEvent::ComponentRemoved { id });
        true
    }

    pub fn component(&self, id: InstanceId) -> Option<&PlacedComponent> {
        self.components.get(&id)
    }

    /// All components in instance id order.
    pub fn components(&self) -> impl Iterator<Item = &PlacedComponent> {
        self.components.values()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_at(&self, position: GridPosition) -> Option<&PlacedComponent> {
        self.occupancy
            .get(&position)
            .and_then(|id| self.components.get(id))
    }

    pub fn is_position_occupied(&self, position: GridPosition) -> bool {
        self.occupancy.contains_key(&position)
    }

    // ============ Nets ============

    pub fn create_net(&mut self, name: &str) -> Result<&Net> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CircuitError::EmptyNetName);
        }

        let id = NetId(self.next_net_id);
        self.next_net_id += 1;
        debug!(%id, name, "net created");

        self.events.push(BoardEvent::NetCreated {
            id,
            name: name.to_string(),
        });
        Ok(self.nets.entry(id).or_insert(Net {
            id,
            name: name.to_string(),
            pins: Vec::new(),
        }))
    }

    /// Attach a component pin to a net, detaching it from any previous net.
    ///
    /// Re-connecting a pin to the net it already belongs to is a no-op.
    pub fn connect_pin_to_net(
        &mut self,
        net_id: NetId,
        component_id: InstanceId,
        pin_index: usize,
    ) -> Result<()> {
        if !self.nets.contains_key(&net_id) {
            return Err(CircuitError::NetNotFound { id: net_id.0 });
        }
        let component = self
            .components
            .get_mut(&component_id)
            .ok_or(CircuitError::ComponentNotFound { id: component_id.0 })?;
        let position = component
            .pin_world_position(pin_index)
            .ok_or(CircuitError::PinNotFound {
                component: component_id.0,
                pin: pin_index,
            })?;
        let pin = component
            .pin_mut(pin_index)
            .ok_or(CircuitError::PinNotFound {
                component: component_id.0,
                pin: pin_index,
            })?;
        let previous = pin.connected_net.replace(net_id);

        if let Some(old) = previous.filter(|old| *old != net_id) {
            self.detach_from_net(old, component_id, pin_index);
        }

        let net = self
            .nets
            .get_mut(&net_id)
            .ok_or(CircuitError::NetNotFound { id: net_id.0 })?;
        if net.contains_pin(component_id, pin_index) {
            return Ok(());
        }
        net.pins.push(PinRef {
            component: component_id,
            pin_index,
            position,
        });

        if let [.., first, second] = net.pins.as_slice() {
            let event = BoardEvent::PinsConnected {
                net: net_id,
                first: *first,
                second: *second,
            };
            self.events.push(event);
        }
        debug!(net = %net_id, component = %component_id, pin_index, "pin connected");
        Ok(())
    }

    /// Detach a pin from its net. Returns false if it was not connected.
    pub fn disconnect_pin(&mut self, component_id: InstanceId, pin_index: usize) -> Result<bool> {
        let component = self
            .components
            .get_mut(&component_id)
            .ok_or(CircuitError::ComponentNotFound { id: component_id.0 })?;
        let pin = component
            .pin_mut(pin_index)
            .ok_or(CircuitError::PinNotFound {
                component: component_id.0,
                pin: pin_index,
            })?;

        let previous = pin.connected_net.take();
        match previous {
            Some(net_id) => {
                self.detach_from_net(net_id, component_id, pin_index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(&id)
    }

    /// First net (by id) with the given name.
    pub fn net_by_name(&self, name: &str) -> Option<&Net> {
        self.nets.values().find(|n| n.name == name)
    }

    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.values()
    }

    /// Remove a pin reference from a net, deleting the net once it is empty.
    fn detach_from_net(&mut self, net_id: NetId, component_id: InstanceId, pin_index: usize) {
        let now_empty = match self.nets.get_mut(&net_id) {
            Some(net) => {
                net.pins.retain(|p| !p.same_pin(component_id, pin_index));
                net.pins.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.delete_net(net_id);
        }
    }

    /// Remove a net, unlinking its pins and dropping its traces.
    fn delete_net(&mut self, net_id: NetId) {
        let Some(net) = self.nets.remove(&net_id) else {
            return;
        };

        for pin_ref in &net.pins {
            if let Some(pin) = self
                .components
                .get_mut(&pin_ref.component)
                .and_then(|c| c.pin_mut(pin_ref.pin_index))
            {
                if pin.connected_net == Some(net_id) {
                    pin.connected_net = None;
                }
            }
        }

        let traces: Vec<TraceId> = self
            .traces
            .values()
            .filter(|t| t.net == net_id)
            .map(|t| t.id)
            .collect();
        for id in traces {
            self.traces.remove(&id);
            self.events.push(BoardEvent::TraceRemoved { id, net: net_id });
        }

        debug!(net = %net_id, name = %net.name, "net removed");
        self.events.push(BoardEvent::NetRemoved { id: net_id });
    }

    // ============ Traces ============

    pub fn add_trace(
        &mut self,
        net_id: NetId,
        start: GridPosition,
        end: GridPosition,
    ) -> Result<&TraceSegment> {
        if !self.nets.contains_key(&net_id) {
            return Err(CircuitError::NetNotFound { id: net_id.0 });
        }

        let id = TraceId(self.next_trace_id);
        self.next_trace_id += 1;

        let segment = TraceSegment {
            id,
            net: net_id,
            start,
            end,
        };
        if !segment.is_axis_aligned() {
            warn!(%id, %start, %end, "trace segment is not axis-aligned");
        }

        self.events.push(BoardEvent::TraceAdded { id, net: net_id });
        Ok(self.traces.entry(id).or_insert(segment))
    }

    /// Remove a trace. A net left without traces is dissolved.
    pub fn remove_trace(&mut self, id: TraceId) -> bool {
        let Some(trace) = self.traces.remove(&id) else {
            return false;
        };
        self.events.push(BoardEvent::TraceRemoved { id, net: trace.net });

        if !self.traces.values().any(|t| t.net == trace.net) {
            self.delete_net(trace.net);
        }
        true
    }

    pub fn trace(&self, id: TraceId) -> Option<&TraceSegment> {
        self.traces.get(&id)
    }

    /// Traces belonging to a net, in id order.
    pub fn traces(&self, net_id: NetId) -> Vec<&TraceSegment> {
        self.traces.values().filter(|t| t.net == net_id).collect()
    }

    /// Traces with an endpoint on the given cell.
    pub fn traces_at(&self, position: GridPosition) -> Vec<&TraceSegment> {
        self.traces.values().filter(|t| t.touches(position)).collect()
    }

    pub fn all_traces(&self) -> impl Iterator<Item = &TraceSegment> {
        self.traces.values()
    }

    // ============ Bounds & events ============

    pub fn suggested_bounds(&self) -> BoardBounds {
        BoardBounds::new(
            GridPosition::ORIGIN,
            GridPosition::new(self.suggested_width as i32, self.suggested_height as i32),
        )
    }

    /// Bounding box of all content, or the suggested bounds for an empty board.
    pub fn compute_content_bounds(&self) -> BoardBounds {
        let component_points = self
            .components
            .values()
            .flat_map(|c| std::iter::once(c.position).chain(c.pin_world_positions()));
        let trace_points = self.traces.values().flat_map(|t| [t.start, t.end]);

        BoardBounds::from_points(component_points.chain(trace_points))
            .unwrap_or_else(|| self.suggested_bounds())
    }

    /// Drain the queued change notifications.
    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Verify the pin/net agreement and the occupancy index.
    pub fn check_consistency(&self) -> Result<()> {
        let fail = |message: String| Err(CircuitError::Inconsistent { message });

        for component in self.components.values() {
            if self.occupancy.get(&component.position) != Some(&component.id) {
                return fail(format!("component {} missing from occupancy index", component.id));
            }
            for pin in &component.pins {
                let Some(net_id) = pin.connected_net else {
                    continue;
                };
                let Some(net) = self.nets.get(&net_id) else {
                    return fail(format!("pin {}.{} points at missing {}", component.id, pin.index, net_id));
                };
                let count = net
                    .pins
                    .iter()
                    .filter(|p| p.same_pin(component.id, pin.index))
                    .count();
                if count != 1 {
                    return fail(format!(
                        "{} lists pin {}.{} {} times",
                        net_id, component.id, pin.index, count
                    ));
                }
            }
        }

        for net in self.nets.values() {
            for pin_ref in &net.pins {
                let connected = self
                    .components
                    .get(&pin_ref.component)
                    .and_then(|c| c.pin(pin_ref.pin_index))
                    .and_then(|p| p.connected_net);
                if connected != Some(net.id) {
                    return fail(format!(
                        "{} lists pin {}.{} which is not connected to it",
                        net.id, pin_ref.component, pin_ref.pin_index
                    ));
                }
            }
        }

        if self.occupancy.len() != self.components.len() {
            return fail("occupancy index has stale entries".to_string());
        }
        for trace in self.traces.values() {
            if !self.nets.contains_key(&trace.net) {
                return fail(format!("{} belongs to missing {}", trace.id, trace.net));
            }
        }
        Ok(())
    }
}
