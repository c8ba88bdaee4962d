use super::graph::{CircuitGraph, CircuitNode, Driver, Net, NetId, NodeId, Pin};
use crate::{catalog::GateTemplate, error::SynthError};
use std::sync::Arc;

/// Name of the shared reset/sleep net.
pub const RESET_NET: &str = "RST";

/// Incremental construction of a [`CircuitGraph`]. Nodes may only read nets that
/// already exist, so every finished graph is acyclic by construction.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    nodes: Vec<CircuitNode>,
    nets: Vec<Net>,
    inputs: Vec<String>,
    input_nets: Vec<NetId>,
    reset: Option<NetId>,
}

impl GraphBuilder {
    /// Start a graph with one input net per variable; variables are kept sorted.
    pub fn new(vars: impl IntoIterator<Item = String>) -> Self {
        let mut inputs: Vec<String> = vars.into_iter().collect();
        inputs.sort();
        inputs.dedup();
        let nets: Vec<Net> = inputs
            .iter()
            .enumerate()
            .map(|(i, name)| Net {
                id: NetId(i),
                name: name.clone(),
                driver: Driver::Input(name.clone()),
                sinks: Vec::new(),
            })
            .collect();
        let input_nets = nets.iter().map(|n| n.id).collect();
        Self {
            nodes: Vec::new(),
            nets,
            inputs,
            input_nets,
            reset: None,
        }
    }

    /// Net of primary input `name`.
    pub fn input(&self, name: &str) -> Option<NetId> {
        self.inputs
            .binary_search_by(|v| v.as_str().cmp(name))
            .ok()
            .map(|i| self.input_nets[i])
    }

    /// The shared reset net, created on first use.
    pub fn reset_net(&mut self) -> NetId {
        if let Some(id) = self.reset {
            return id;
        }
        let id = NetId(self.nets.len());
        self.nets.push(Net {
            id,
            name: RESET_NET.to_string(),
            driver: Driver::Reset,
            sinks: Vec::new(),
        });
        self.reset = Some(id);
        id
    }

    /// Instantiate `template` with pin `p` reading `inputs[p]` and return its output net.
    pub fn add_node(
        &mut self,
        template: Arc<GateTemplate>,
        inputs: Vec<NetId>,
    ) -> Result<NetId, SynthError> {
        if inputs.len() != template.arity() {
            return Err(SynthError::Internal(format!(
                "gate {} has {} inputs, {} bound",
                template.name,
                template.arity(),
                inputs.len()
            )));
        }
        if let Some(bad) = inputs.iter().find(|n| n.0 >= self.nets.len()) {
            return Err(SynthError::Internal(format!("unknown net {bad}")));
        }
        let id = NodeId(self.nodes.len());
        let reset = template.has_reset().then(|| self.reset_net());
        let output = NetId(self.nets.len());
        self.nets.push(Net {
            id: output,
            name: format!("n{}", output.0),
            driver: Driver::Node(id),
            sinks: Vec::new(),
        });
        for (pin, net) in inputs.iter().enumerate() {
            self.nets[net.0].sinks.push(Pin { node: id, pin });
        }
        if let Some(net) = reset {
            self.nets[net.0].sinks.push(Pin {
                node: id,
                pin: inputs.len(),
            });
        }
        self.nodes.push(CircuitNode {
            id,
            template,
            inputs,
            reset,
            output,
        });
        Ok(output)
    }

    pub fn finish(self, output: NetId) -> Result<CircuitGraph, SynthError> {
        if output.0 >= self.nets.len() || Some(output) == self.reset {
            return Err(SynthError::Internal(format!("invalid output net {output}")));
        }
        Ok(CircuitGraph {
            nodes: self.nodes,
            nets: self.nets,
            inputs: self.inputs,
            input_nets: self.input_nets,
            reset: self.reset,
            output,
        })
    }
}
