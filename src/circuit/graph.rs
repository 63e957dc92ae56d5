//! Solver-side circuit built from a netlist.

use std::collections::HashMap;

use tracing::debug;

use super::types::{BranchId, MnaLayout, NodeId};
use crate::components::Component;
use crate::error::{CircuitError, Result};
use crate::netlist::CircuitNetlist;

/// A circuit ready for simulation.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Devices in netlist order.
    pub devices: Vec<Component>,

    /// Mapping from node names to node ids. Ground names map to node 0.
    pub node_map: HashMap<String, NodeId>,

    /// Node names by id (for probes and messages).
    pub node_names: Vec<String>,

    /// Number of nodes (including ground).
    pub num_nodes: usize,

    /// Number of branch current variables (voltage sources, inductors).
    pub num_branches: usize,

    device_index: HashMap<String, usize>,
}

impl Circuit {
    /// Number every node, allocate branch unknowns and build one device per
    /// netlist element.
    pub fn from_netlist(netlist: &CircuitNetlist) -> Result<Self> {
        if netlist.elements.is_empty() {
            return Err(CircuitError::NoElements);
        }

        let mut node_map = HashMap::new();
        let mut node_names = vec![netlist.ground_node.clone()];
        node_map.insert(netlist.ground_node.clone(), NodeId::GROUND);

        for name in netlist.node_names() {
            if node_map.contains_key(name) {
                continue;
            }
            let id = if netlist.is_ground(name) {
                NodeId::GROUND
            } else {
                let id = NodeId(node_names.len());
                node_names.push(name.to_string());
                id
            };
            node_map.insert(name.to_string(), id);
        }
        let num_nodes = node_names.len();

        let mut devices = Vec::with_capacity(netlist.elements.len());
        let mut device_index = HashMap::new();
        let mut num_branches = 0usize;

        for element in &netlist.elements {
            let nodes = element
                .nodes
                .iter()
                .map(|name| {
                    node_map
                        .get(name)
                        .copied()
                        .ok_or_else(|| CircuitError::NodeNotFound { node: name.clone() })
                })
                .collect::<Result<Vec<_>>>()?;

            let device = Component::from_element(element, &nodes, &mut num_branches)?;
            if device_index.insert(element.id.clone(), devices.len()).is_some() {
                return Err(CircuitError::invalid_element(&element.id, "duplicate element id"));
            }
            devices.push(device);
        }

        if devices.is_empty() {
            return Err(CircuitError::InvalidCircuit {
                message: "no simulatable elements".to_string(),
            });
        }

        debug!(
            nodes = num_nodes,
            branches = num_branches,
            devices = devices.len(),
            "circuit built"
        );

        Ok(Circuit {
            devices,
            node_map,
            node_names,
            num_nodes,
            num_branches,
            device_index,
        })
    }

    pub fn layout(&self) -> MnaLayout {
        MnaLayout::new(self.num_nodes, self.num_branches)
    }

    /// Size of the MNA solution vector.
    pub fn matrix_size(&self) -> usize {
        self.layout().size()
    }

    pub fn node_index(&self, node: NodeId) -> Option<usize> {
        self.layout().node_index(node)
    }

    pub fn branch_index(&self, branch: BranchId) -> usize {
        self.layout().branch_index(branch)
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        self.node_names
            .get(node.0)
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn device(&self, id: &str) -> Option<&Component> {
        self.device_index.get(id).map(|&i| &self.devices[i])
    }

    /// Position of a device in `devices`.
    pub fn device_position(&self, id: &str) -> Option<usize> {
        self.device_index.get(id).copied()
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut Component> {
        let i = *self.device_index.get(id)?;
        self.devices.get_mut(i)
    }

    pub fn has_nonlinear(&self) -> bool {
        self.devices.iter().any(|d| d.as_device().is_nonlinear())
    }

    /// Clear all per-run device state (operating points, reactive history).
    pub fn reset(&mut self) {
        for device in &mut self.devices {
            device.as_device_mut().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{ElementType, NetlistElement};

    fn netlist() -> CircuitNetlist {
        CircuitNetlist::new("t")
            .with_element(NetlistElement::new("V1", ElementType::VoltageSource, ["in", "GND"], 5.0))
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["in", "out"], 1e3))
            .with_element(NetlistElement::new("L1", ElementType::Inductor, ["out", "0"], 1e-3))
    }

    #[test]
    fn test_node_numbering() {
        let circuit = Circuit::from_netlist(&netlist()).unwrap();
        assert_eq!(circuit.num_nodes, 3);
        assert_eq!(circuit.num_branches, 2);
        assert_eq!(circuit.matrix_size(), 4);
        assert_eq!(circuit.find_node("GND"), Some(NodeId::GROUND));
        assert_eq!(circuit.find_node("0"), Some(NodeId::GROUND));
        assert_eq!(circuit.find_node("in"), Some(NodeId(1)));
        assert_eq!(circuit.node_name(NodeId(2)), "out");
    }

    #[test]
    fn test_device_lookup() {
        let circuit = Circuit::from_netlist(&netlist()).unwrap();
        assert!(circuit.device("R1").is_some());
        assert!(circuit.device("R7").is_none());
        assert!(!circuit.has_nonlinear());
    }

    #[test]
    fn test_empty_netlist_rejected() {
        let err = Circuit::from_netlist(&CircuitNetlist::new("empty")).unwrap_err();
        assert!(matches!(err, CircuitError::NoElements));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let netlist = netlist()
            .with_element(NetlistElement::new("R1", ElementType::Resistor, ["out", "0"], 1e3));
        let err = Circuit::from_netlist(&netlist).unwrap_err();
        assert!(matches!(err, CircuitError::InvalidElement { .. }));
    }
}
