use crate::{
    catalog::{Domain, GateTemplate},
    error::SynthError,
    truth_table::MAX_EXHAUSTIVE_INPUTS,
};
use bit_set::BitSet;
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, sync::Arc};

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
pub struct NetId(pub usize);

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
pub struct NodeId(pub usize);

/// Producer of a net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// A primary input variable.
    Input(String),
    /// The output of a gate instance.
    Node(NodeId),
    /// The shared reset/sleep signal of polymorphic gates.
    Reset,
}

/// A gate input pin: the consuming node and the pin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pin {
    pub node: NodeId,
    pub pin: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    pub driver: Driver,
    pub sinks: Vec<Pin>,
}

impl Net {
    pub fn fanout(&self) -> usize {
        self.sinks.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitNode {
    pub id: NodeId,
    #[serde(rename = "gate", serialize_with = "serialize_template")]
    pub template: Arc<GateTemplate>,
    pub inputs: Vec<NetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<NetId>,
    pub output: NetId,
}

fn serialize_template<S: Serializer>(t: &Arc<GateTemplate>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.name)
}

/// A gate-level circuit: nodes and nets addressed by dense integer ids.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitGraph {
    pub(super) nodes: Vec<CircuitNode>,
    pub(super) nets: Vec<Net>,
    pub(super) inputs: Vec<String>,
    pub(super) input_nets: Vec<NetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) reset: Option<NetId>,
    pub(super) output: NetId,
}

impl CircuitGraph {
    pub fn nodes(&self) -> &[CircuitNode] {
        &self.nodes
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn node(&self, id: NodeId) -> &CircuitNode {
        &self.nodes[id.0]
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }

    /// Primary input variables in sorted order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> NetId {
        self.output
    }

    pub fn reset(&self) -> Option<NetId> {
        self.reset
    }

    pub fn gate_count(&self) -> usize {
        self.nodes.len()
    }

    /// Largest fanout over all signal nets, with the net reaching it.
    ///
    /// The shared reset net is wired once per graph and is not a signal.
    pub fn max_fanout(&self) -> (usize, Option<&Net>) {
        let mut ans = (0, None);
        for net in self.nets.iter().filter(|n| n.driver != Driver::Reset) {
            if ans.1.is_none() || net.fanout() > ans.0 {
                ans = (net.fanout(), Some(net));
            }
        }
        ans
    }

    /// Nodes in dependency order. Fails if the node/net relation has a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, SynthError> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| {
                n.inputs
                    .iter()
                    .filter(|&&net| matches!(self.net(net).driver, Driver::Node(_)))
                    .count()
            })
            .collect();
        let mut queue: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| pending[n.id.0] == 0)
            .map(|n| n.id)
            .collect();
        let mut done = BitSet::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop() {
            if !done.insert(id.0) {
                continue;
            }
            order.push(id);
            for sink in &self.net(self.node(id).output).sinks {
                pending[sink.node.0] -= 1;
                if pending[sink.node.0] == 0 {
                    queue.push(sink.node);
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(SynthError::Internal(format!(
                "circuit has a cycle through {} nodes",
                self.nodes.len() - order.len()
            )));
        }
        Ok(order)
    }

    /// Longest input-to-output path where each node on it weighs `weight(node)`.
    pub fn longest_path(&self, weight: impl Fn(&CircuitNode) -> f64) -> Result<f64, SynthError> {
        let order = self.topological_order()?;
        let mut arrival = vec![0f64; self.nets.len()];
        for id in order {
            let node = self.node(id);
            let start = node
                .inputs
                .iter()
                .map(|net| arrival[net.0])
                .fold(0., f64::max);
            arrival[node.output.0] = start + weight(node);
        }
        Ok(arrival[self.output.0])
    }

    /// Number of gate stages on the longest path from a primary input to the output.
    pub fn depth(&self) -> Result<usize, SynthError> {
        Ok(self.longest_path(|_| 1.)? as usize)
    }

    /// Steady-state output for one input assignment, indexed like [`inputs`](Self::inputs).
    pub fn evaluate(
        &self,
        assignment: &[bool],
        domain: Domain,
        reset: bool,
    ) -> Result<bool, SynthError> {
        if assignment.len() != self.inputs.len() {
            return Err(SynthError::Internal(format!(
                "expected {} input values, got {}",
                self.inputs.len(),
                assignment.len()
            )));
        }
        let mut values = vec![false; self.nets.len()];
        for (net, &v) in self.input_nets.iter().zip(assignment) {
            values[net.0] = v;
        }
        if let Some(net) = self.reset {
            values[net.0] = reset;
        }
        let mut pins = Vec::new();
        for id in self.topological_order()? {
            let node = self.node(id);
            pins.clear();
            pins.extend(node.inputs.iter().map(|net| values[net.0]));
            let r = node.reset.map(|net| values[net.0]).unwrap_or(false);
            values[node.output.0] = node.template.eval(&pins, domain, r);
        }
        Ok(values[self.output.0])
    }

    /// Exhaustive output table with reset released; row `i` assigns input `j` bit `j` of `i`.
    ///
    /// Fails for more than [`MAX_EXHAUSTIVE_INPUTS`] inputs.
    pub fn truth_table(&self, domain: Domain) -> Result<Vec<bool>, SynthError> {
        let k = self.inputs.len();
        if k > MAX_EXHAUSTIVE_INPUTS {
            return Err(SynthError::Internal(format!(
                "{k} inputs are too many to enumerate, at most {MAX_EXHAUSTIVE_INPUTS}"
            )));
        }
        let mut assignment = vec![false; k];
        (0..1usize << k)
            .map(|row| {
                for (j, v) in assignment.iter_mut().enumerate() {
                    *v = (row >> j) & 1 == 1;
                }
                self.evaluate(&assignment, domain, false)
            })
            .collect()
    }

    /// Canonical text of the structure driving the output, independent of net numbering.
    ///
    /// Gates print as `NAME(pin0,pin1,..)`, primary inputs by name.
    pub fn structural_key(&self) -> String {
        let mut memo = vec![None; self.nets.len()];
        self.net_key(self.output, &mut memo)
    }

    fn net_key(&self, id: NetId, memo: &mut [Option<String>]) -> String {
        if let Some(key) = &memo[id.0] {
            return key.clone();
        }
        let key = match &self.net(id).driver {
            Driver::Input(name) => name.clone(),
            Driver::Reset => "RST".to_string(),
            Driver::Node(node) => {
                let node = self.node(*node);
                let pins: Vec<String> =
                    node.inputs.iter().map(|&n| self.net_key(n, memo)).collect();
                format!("{}({})", node.template.name, pins.join(","))
            }
        };
        memo[id.0] = Some(key.clone());
        key
    }

    /// Instance count of every gate name used.
    pub fn gate_histogram(&self) -> BTreeMap<String, usize> {
        let mut ans = BTreeMap::new();
        for node in &self.nodes {
            *ans.entry(node.template.name.clone()).or_default() += 1;
        }
        ans
    }

    /// Reroute one input pin, without any consistency check.
    #[cfg(test)]
    pub(crate) fn rewire(&mut self, node: NodeId, pin: usize, net: NetId) {
        let old = self.nodes[node.0].inputs[pin];
        self.nets[old.0]
            .sinks
            .retain(|s| !(s.node == node && s.pin == pin));
        self.nodes[node.0].inputs[pin] = net;
        self.nets[net.0].sinks.push(Pin { node, pin });
    }
}
