//! The ARP table: peer name to address/state mapping plus the two-stage
//! liveness machine (probe first, declare dead later) that tolerates
//! transient loss without flapping.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// How a peer is attached to this host
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PeerMode {
    /// The local host's own entry (or a peer not yet slotted)
    Detached,
    /// Connected peer occupying a slot index
    Slot(u32),
}

impl PeerMode {
    /// The wire/diagnostic representation: -1 for detached, the slot index
    /// otherwise
    pub fn as_i32(self) -> i32 {
        match self {
            PeerMode::Detached => -1,
            PeerMode::Slot(index) => index as i32,
        }
    }
}

/// One ARP entry
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub addr: IpAddr,
    pub port: u16,
    pub mode: PeerMode,
    pub peer_type: String,
    /// Node-clock seconds of the last packet from this peer
    pub last_activity: f64,
    /// Node-clock seconds of the last echo probe we sent it
    pub last_triptime_request: f64,
    /// Milliseconds, from the most recent echo answer
    pub last_triptime: f64,
    /// Round-trip sample kept for the monitoring view
    pub monitor_triptime: f64,
}

impl PeerRecord {
    pub fn new(addr: IpAddr, port: u16, now: f64) -> Self {
        Self {
            addr,
            port,
            mode: PeerMode::Detached,
            peer_type: String::new(),
            last_activity: now,
            last_triptime_request: now,
            last_triptime: 0.0,
            monitor_triptime: 0.0,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

/// What the liveness scan decided for one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LivenessAction {
    /// Quiet for a while: send an echo probe
    Probe { peer: String, addr: SocketAddr },
    /// Quiet for too long: remove it
    Drop { peer: String },
}

pub struct PeerTable {
    map: HashMap<String, PeerRecord>,
    self_name: String,
    next_slot: u32,
}

impl PeerTable {
    /// Create the table with the mandatory self entry (loopback, detached
    /// mode)
    pub fn new(self_name: &str, self_port: u16, now: f64) -> Self {
        let mut map = HashMap::new();
        map.insert(
            self_name.to_owned(),
            PeerRecord::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self_port, now),
        );
        Self {
            map,
            self_name: self_name.to_owned(),
            next_slot: 0,
        }
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    pub fn get(&self, name: &str) -> Option<&PeerRecord> {
        self.map.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PeerRecord> {
        self.map.get_mut(name)
    }

    /// Insert or refresh a peer. New peers get the next slot index; the
    /// self entry keeps its detached mode.
    pub fn add_or_update(&mut self, name: &str, addr: IpAddr, port: u16, now: f64) -> bool {
        match self.map.get_mut(name) {
            Some(record) => {
                record.addr = addr;
                record.port = port;
                record.last_activity = now;
                false
            }
            None => {
                let mut record = PeerRecord::new(addr, port, now);
                record.mode = PeerMode::Slot(self.next_slot);
                self.next_slot += 1;
                self.map.insert(name.to_owned(), record);
                true
            }
        }
    }

    /// Remove a peer. The self entry is never removed.
    pub fn remove(&mut self, name: &str) -> Option<PeerRecord> {
        if name == self.self_name {
            return None;
        }
        self.map.remove(name)
    }

    pub fn find_by_address(&self, addr: SocketAddr) -> Option<(&str, &PeerRecord)> {
        self.map
            .iter()
            .find(|(_, record)| record.addr == addr.ip() && record.port == addr.port())
            .map(|(name, record)| (name.as_str(), record))
    }

    pub fn touch_by_address(&mut self, addr: SocketAddr, now: f64) {
        if let Some(record) = self
            .map
            .values_mut()
            .find(|record| record.addr == addr.ip() && record.port == addr.port())
        {
            record.last_activity = now;
        }
    }

    pub fn for_each<F: FnMut(&str, &PeerRecord)>(&self, mut f: F) {
        for (name, record) in &self.map {
            f(name, record);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Names of every peer except ourselves
    pub fn peer_names(&self) -> Vec<String> {
        self.map
            .keys()
            .filter(|name| **name != self.self_name)
            .cloned()
            .collect()
    }

    /// One pass of the liveness machine. Peers quiet for longer than
    /// `probe_after` (or unprobed for twice that) get an echo probe; peers
    /// quiet beyond `dead_after` are scheduled for removal.
    pub(crate) fn scan_liveness(
        &mut self,
        now: f64,
        probe_after: Duration,
        dead_after: Duration,
    ) -> Vec<LivenessAction> {
        let probe_after = probe_after.as_secs_f64();
        let dead_after = dead_after.as_secs_f64();
        let mut actions = Vec::new();
        for (name, record) in self.map.iter_mut() {
            if *name == self.self_name {
                continue;
            }
            let quiet = now - record.last_activity;
            if quiet > dead_after {
                actions.push(LivenessAction::Drop { peer: name.clone() });
            } else if quiet > probe_after
                || now - record.last_triptime_request > 2.0 * probe_after
            {
                record.last_triptime_request = now;
                actions.push(LivenessAction::Probe {
                    peer: name.clone(),
                    addr: record.socket_addr(),
                });
            }
        }
        actions
    }

    /// Diagnostic table of all peers
    pub fn show_str(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<20} {:<22} {:>5} {:>10}", "peer", "address", "mode", "trip ms");
        let mut names: Vec<&String> = self.map.keys().collect();
        names.sort();
        for name in names {
            let record = &self.map[name];
            let _ = writeln!(
                out,
                "{:<20} {:<22} {:>5} {:>10.3}",
                name,
                format!("{}:{}", record.addr, record.port),
                record.mode.as_i32(),
                record.last_triptime,
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PeerTable {
        PeerTable::new("self", 9000, 0.0)
    }

    #[test]
    fn self_entry_always_exists() {
        let mut peers = table();
        assert_eq!(peers.len(), 1);
        let me = peers.get("self").unwrap();
        assert_eq!(me.addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(me.mode, PeerMode::Detached);
        assert!(peers.remove("self").is_none());
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn add_assigns_slots_update_does_not() {
        let mut peers = table();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(peers.add_or_update("a", ip, 9001, 1.0));
        assert!(peers.add_or_update("b", ip, 9002, 1.0));
        assert!(!peers.add_or_update("a", ip, 9003, 2.0));

        assert_eq!(peers.get("a").unwrap().mode, PeerMode::Slot(0));
        assert_eq!(peers.get("b").unwrap().mode, PeerMode::Slot(1));
        assert_eq!(peers.get("a").unwrap().port, 9003);
    }

    #[test]
    fn finds_peers_by_address() {
        let mut peers = table();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        peers.add_or_update("a", ip, 9001, 1.0);
        let (name, _) = peers.find_by_address("10.0.0.1:9001".parse().unwrap()).unwrap();
        assert_eq!(name, "a");
        assert!(peers.find_by_address("10.0.0.1:9999".parse().unwrap()).is_none());
    }

    #[test]
    fn quiet_peer_is_probed_then_dropped() {
        let mut peers = table();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        peers.add_or_update("a", ip, 9001, 0.0);

        let probe_after = Duration::from_secs_f64(11.5);
        let dead_after = Duration::from_secs_f64(14.0);

        // quiet but within the probe window: nothing
        let actions = peers.scan_liveness(5.0, probe_after, dead_after);
        assert!(actions.is_empty());

        // past the probe threshold: exactly one probe
        let actions = peers.scan_liveness(12.0, probe_after, dead_after);
        assert_eq!(
            actions,
            vec![LivenessAction::Probe {
                peer: "a".into(),
                addr: "10.0.0.1:9001".parse().unwrap(),
            }]
        );

        // probing updated last_triptime_request, so the same instant does
        // not probe twice
        let actions = peers.scan_liveness(12.0, probe_after, dead_after);
        assert_eq!(actions.len(), 1); // still past probe_after on activity

        // past the dead threshold: drop
        let actions = peers.scan_liveness(15.0, probe_after, dead_after);
        assert_eq!(actions, vec![LivenessAction::Drop { peer: "a".into() }]);
    }

    #[test]
    fn show_str_lists_every_entry() {
        let mut peers = table();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        peers.add_or_update("relay", ip, 9001, 1.0);
        let shown = peers.show_str();
        assert!(shown.contains("self"));
        assert!(shown.contains("relay"));
        assert!(shown.contains("10.0.0.1:9001"));

        let mut visited = Vec::new();
        peers.for_each(|name, record| visited.push((name.to_owned(), record.mode.as_i32())));
        visited.sort();
        assert_eq!(visited, vec![("relay".into(), 0), ("self".into(), -1)]);
    }

    #[test]
    fn active_peer_is_left_alone() {
        let mut peers = table();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        peers.add_or_update("a", ip, 9001, 0.0);
        peers.touch_by_address("10.0.0.1:9001".parse().unwrap(), 13.0);
        let actions = peers.scan_liveness(
            14.5,
            Duration::from_secs_f64(11.5),
            Duration::from_secs_f64(14.0),
        );
        assert!(actions.is_empty());
    }
}
