// In-memory working set for one chain run.
//
// The executor mutates this local snapshot ahead of the durable store so a
// node executed earlier in the run is visible to later nodes before any UI
// re-render happens.

use std::collections::HashMap;

use crate::models::schema::{Connection, Graph, Node};

pub struct WorkingSet {
    nodes: HashMap<String, Node>,
    connections: Vec<Connection>,
}

impl WorkingSet {
    pub fn from_graph(graph: Graph) -> Self {
        let nodes = graph
            .nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        Self {
            nodes,
            connections: graph.connections,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn update_value(&mut self, id: &str, value: String) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.value = value;
        }
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Inbound connections in connection-array order.
    pub fn inbound<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.to_node_id == id)
    }

    /// First outbound connection, if any. Forward traversal deliberately
    /// follows only this edge (no fan-out).
    pub fn first_outbound(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.from_node_id == id)
    }
}
