//! Board graph: placed components, pins, nets and routed traces.
//!
//! [`BoardState`] is the aggregate root. It owns every component, net and
//! trace and keeps the two views of connectivity (pin → net pointer and
//! net → pin list) in agreement across all mutations.

mod component;
mod state;
mod types;

pub use component::{
    is_ground_name, Net, PinDefinition, PinInstance, PinRef, PlacedComponent, TraceSegment,
};
pub use state::{BoardEvent, BoardState};
pub use types::{BoardBounds, GridPosition, InstanceId, NetId, Rotation, TraceId};
