//! Running several independent nodes (one per name/port) inside one
//! thread, stepped round-robin.

use std::thread;
use std::time::Duration;

use log::warn;

use crate::events::Event;
use crate::node::Node;

#[derive(Default)]
pub struct MultiNet {
    nodes: Vec<Node>,
}

impl MultiNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns its index
    pub fn add(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One reactor pass per node, round-robin; events come back tagged
    /// with the node index
    pub fn poll_all(&mut self) -> Vec<(usize, Event)> {
        let mut events = Vec::new();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            for event in node.poll_once() {
                events.push((index, event));
            }
        }
        events
    }

    /// Send a user command from every node to every peer it knows
    pub fn broadcast(&mut self, cmd: u8, data: &[u8]) -> usize {
        let mut sent = 0;
        for node in self.nodes.iter_mut() {
            for peer in node.peers().peer_names() {
                match node.send_to(&peer, cmd, data.to_vec()) {
                    Ok(_) => sent += 1,
                    Err(err) => warn!("broadcast to {peer} failed: {err}"),
                }
            }
        }
        sent
    }

    /// Step every node until all of them have stopped
    pub fn run<F>(&mut self, mut callback: F)
    where
        F: FnMut(usize, &mut Node, Event),
    {
        loop {
            let mut all_stopped = true;
            for (index, node) in self.nodes.iter_mut().enumerate() {
                for event in node.poll_once() {
                    callback(index, node, event);
                }
                if !node.is_stopped() {
                    all_stopped = false;
                }
            }
            if all_stopped {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn stop_all(&mut self) {
        for node in self.nodes.iter_mut() {
            node.stop();
        }
    }
}
