//! Patchbay mode processing (§4.7 "Patchbay mode process"): plugins are
//! wired by explicit connections instead of a fixed chain, and the engine
//! does not force stereo on the chain as a whole. Graph representation
//! itself is out of scope (§4.7); this keeps just enough of one —
//! connections plus a topological order — to run one process call.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::plugin::{process, Plugin, PluginCapability};
use crate::port::EventPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub plugin_id: u32,
    /// 0 = left/mono, 1 = right. Each plugin adapter exposes exactly two
    /// audio ports (§4.5 adapters all bind to a 2-channel native process
    /// call); patchbay routing works at that same granularity rather than
    /// a per-format native port count.
    pub channel: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Connection {
    pub from: PortRef,
    pub to: PortRef,
}

#[derive(Default)]
pub struct Patchbay {
    connections: Vec<Connection>,
}

impl Patchbay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, from: PortRef, to: PortRef) {
        self.connections.push(Connection { from, to });
    }

    pub fn disconnect(&mut self, from: PortRef, to: PortRef) {
        self.connections.retain(|c| !(c.from == from && c.to == to));
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Orders enabled plugin ids so a connection's source always runs
    /// before its destination. A cycle collapses back to table order
    /// rather than erroring — ordering a single process call is all this
    /// core owes the patchbay (§4.7).
    fn order(&self, ids: &[u32]) -> Vec<u32> {
        let mut graph = DiGraph::<u32, ()>::new();
        let mut index_of: HashMap<u32, NodeIndex> = HashMap::new();
        for &id in ids {
            index_of.insert(id, graph.add_node(id));
        }
        for conn in &self.connections {
            if let (Some(&from), Some(&to)) = (index_of.get(&conn.from.plugin_id), index_of.get(&conn.to.plugin_id)) {
                if from != to {
                    graph.add_edge(from, to, ());
                }
            }
        }
        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|i| graph[i]).collect(),
            Err(_) => ids.to_vec(),
        }
    }

    /// Runs one process call in connection order: a plugin's inputs are
    /// the sum of every connection feeding each of its two channels
    /// (silence where nothing is wired), and its outputs become available
    /// for whatever is connected downstream.
    pub fn process(&self, plugins: &mut [Option<Plugin>], frames: usize) {
        let ids: Vec<u32> = plugins.iter().flatten().map(|p| p.common().id).collect();
        let order = self.order(&ids);
        let mut rendered: HashMap<PortRef, Vec<f32>> = HashMap::new();
        let shared_in = EventPort::new(true, 1);

        for id in order {
            let Some(plugin) = plugins.iter_mut().flatten().find(|p| p.common().id == id) else { continue };
            if !plugin.common().is_enabled() {
                continue;
            }

            let mut input_l = vec![0.0f32; frames];
            let mut input_r = vec![0.0f32; frames];
            for conn in &self.connections {
                if conn.to.plugin_id != id {
                    continue;
                }
                let Some(source) = rendered.get(&conn.from) else { continue };
                let dst = if conn.to.channel == 0 { &mut input_l } else { &mut input_r };
                for (d, s) in dst.iter_mut().zip(source.iter()) {
                    *d += s;
                }
            }

            let mut output_l = vec![0.0f32; frames];
            let mut output_r = vec![0.0f32; frames];
            let mut shared_out = EventPort::new(false, 1);
            {
                let audio_in: [&[f32]; 2] = [&input_l, &input_r];
                let mut audio_out: [&mut [f32]; 2] = [&mut output_l, &mut output_r];
                process(plugin, &shared_in, &shared_in, &mut shared_out, &audio_in, &mut audio_out, frames, false);
            }

            rendered.insert(PortRef { plugin_id: id, channel: 0 }, output_l);
            rendered.insert(PortRef { plugin_id: id, channel: 1 }, output_r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_falls_back_to_table_order_without_panicking() {
        let mut patchbay = Patchbay::new();
        patchbay.connect(PortRef { plugin_id: 1, channel: 0 }, PortRef { plugin_id: 2, channel: 0 });
        patchbay.connect(PortRef { plugin_id: 2, channel: 0 }, PortRef { plugin_id: 1, channel: 0 });
        let order = patchbay.order(&[1, 2]);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn disconnect_removes_only_the_matching_connection() {
        let mut patchbay = Patchbay::new();
        let a = PortRef { plugin_id: 1, channel: 0 };
        let b = PortRef { plugin_id: 2, channel: 0 };
        patchbay.connect(a, b);
        patchbay.connect(a, PortRef { plugin_id: 3, channel: 0 });
        patchbay.disconnect(a, b);
        assert_eq!(patchbay.connections().len(), 1);
    }
}
