//! The event manager: a single-threaded reactor that multiplexes socket
//! I/O, retransmit deadlines, housekeeping, user timers, the async bridge
//! and OS signals, surfacing everything to the application as [`Event`]s.

mod config;

pub use config::NodeConfig;

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use tether_shared::{trip_time_ms, Clock, Command, Timer};

use crate::bridge::{BridgeHandle, BridgeOp, BridgeQueue};
use crate::cque::CallbackQueue;
use crate::dispatch::{
    decode_echo, decode_event_id, decode_publication, encode_echo, encode_event_id,
    encode_publication, Frame, HostInfoAnswer, PeerAnnounce, NODE_VERSION,
};
use crate::error::NodeError;
use crate::events::{Event, Events};
use crate::peers::{LivenessAction, PeerTable};
use crate::restart::RestartHandler;
use crate::signal::Signals;
use crate::subscribe::Subscriptions;
use crate::transport::{PacketReceiver, PacketSender, Socket};
use crate::trudp::{ChannelStats, Incoming, Trudp, TrudpStat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Constructed; the socket opens on the first poll
    Starting,
    Running,
    Stopped,
}

pub struct Node {
    config: NodeConfig,
    clock: Clock,
    local_addr: SocketAddr,
    socket: Option<Box<dyn Socket>>,
    sender: Option<Box<dyn PacketSender>>,
    receiver: Option<Box<dyn PacketReceiver>>,
    trudp: Trudp,
    peers: PeerTable,
    subscriptions: Subscriptions,
    callbacks: CallbackQueue,
    bridge: BridgeQueue,
    bridge_handle: BridgeHandle,
    signals: Signals,
    restart: Option<RestartHandler>,
    tick_timer: Timer,
    liveness_timer: Timer,
    custom_timer: Option<Timer>,
    events: Events,
    phase: Phase,
    restart_requested: bool,
}

impl Node {
    /// Build a node around an unopened socket. Startup order: the self
    /// peer-table entry exists immediately; the socket itself opens on the
    /// first poll, which also emits `Started`.
    pub fn new(config: NodeConfig, socket: Box<dyn Socket>) -> std::io::Result<Self> {
        let clock = Clock::new();
        let local_addr = socket.local_addr();
        let peers = PeerTable::new(&config.name, local_addr.port(), clock.now_secs());
        let (bridge_handle, bridge) = BridgeQueue::with_capacity(config.bridge_capacity);
        let signals = Signals::install()?;
        Ok(Self {
            trudp: Trudp::new(config.retransmit_interval, config.max_send_attempts),
            tick_timer: Timer::new(config.tick_interval),
            liveness_timer: Timer::new(config.liveness_interval),
            custom_timer: config.custom_timer.map(Timer::new),
            restart: Some(RestartHandler::from_current_process()),
            config,
            clock,
            local_addr,
            socket: Some(socket),
            sender: None,
            receiver: None,
            peers,
            subscriptions: Subscriptions::new(),
            callbacks: CallbackQueue::new(),
            bridge,
            bridge_handle,
            signals,
            events: Events::new(),
            phase: Phase::Starting,
            restart_requested: false,
        })
    }

    /// Swap in a different restart handler (tests inject a fake exec)
    pub fn set_restart_handler(&mut self, handler: RestartHandler) {
        self.restart = Some(handler);
    }

    /// Arm, rearm or disarm the application timer; `None` stops Timer
    /// events
    pub fn set_custom_timer(&mut self, interval: Option<Duration>) {
        self.custom_timer = interval.map(Timer::new);
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackQueue {
        &mut self.callbacks
    }

    /// Handle for foreign threads; cheap to clone
    pub fn bridge_handle(&self) -> BridgeHandle {
        self.bridge_handle.clone()
    }

    pub fn channel_stats(&self, addr: SocketAddr) -> Option<&ChannelStats> {
        self.trudp.channel_stats(addr)
    }

    pub fn transport_summary(&self) -> TrudpStat {
        self.trudp.summary()
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// One reactor pass: inbound datagrams, retransmits, timers, signals,
    /// and idle work when no socket work was done. Returns the events the
    /// pass produced, in order.
    pub fn poll_once(&mut self) -> Vec<Event> {
        if self.phase == Phase::Stopped {
            // a fatal signal after teardown asks for a fresh process
            if self.signals.take_terminate() || self.signals.take_restart() {
                self.restart_requested = true;
            }
            return self.events.drain();
        }
        if self.phase == Phase::Starting {
            self.open_socket();
        }

        let mut socket_work = false;
        loop {
            let datagram = match self.receiver.as_mut() {
                Some(receiver) => match receiver.receive() {
                    Ok(Some((addr, payload))) => Some((addr, payload.to_vec())),
                    Ok(None) => None,
                    Err(err) => {
                        warn!("socket receive failed: {err}");
                        None
                    }
                },
                None => None,
            };
            match datagram {
                Some((addr, payload)) => {
                    socket_work = true;
                    self.handle_datagram(addr, &payload);
                }
                None => break,
            }
        }

        if let Some(sender) = self.sender.as_ref() {
            let now_wire = self.clock.wire_now();
            self.trudp.poll_retransmits(sender.as_ref(), now_wire);
        }

        if self.tick_timer.ringing() {
            self.tick_timer.reset();
            self.events.push(Event::Tick);
        }
        if let Some(timer) = self.custom_timer.as_mut() {
            if timer.ringing() {
                timer.reset();
                self.events.push(Event::Timer);
            }
        }

        // idle work runs only when the socket had nothing for us
        if !socket_work && self.phase == Phase::Running {
            self.events.push(Event::Idle);
            let ops = self.bridge.drain();
            for (op, completion) in ops {
                self.apply_bridge_op(op);
                // wake a blocked caller only once the operation has run
                completion.signal();
            }
            self.callbacks.poll_timeouts(Instant::now());
            if self.liveness_timer.ringing() {
                self.liveness_timer.reset();
                self.scan_liveness();
            }
        }

        if self.signals.take_restart() {
            self.restart_requested = true;
            self.begin_stop();
        }
        if self.signals.take_terminate() {
            if self.phase == Phase::Stopped {
                // a second fatal signal asks for a fresh process instead
                self.restart_requested = true;
            } else {
                self.begin_stop();
            }
        }

        self.events.drain()
    }

    /// Drive the reactor until stopped, handing every event to `callback`.
    /// Honors the restart request (signal or config) after teardown.
    pub fn run<F>(&mut self, mut callback: F)
    where
        F: FnMut(&mut Node, Event),
    {
        while self.phase != Phase::Stopped {
            for event in self.poll_once() {
                callback(self, event);
            }
            thread::sleep(Duration::from_millis(1));
        }
        for event in self.events.drain() {
            callback(self, event);
        }
        if self.restart_requested || self.config.restart_after_stop {
            if let Some(handler) = self.restart.as_mut() {
                handler.restart();
            }
        }
    }

    /// Request a clean shutdown; teardown happens synchronously
    pub fn stop(&mut self) {
        self.begin_stop();
    }

    /// Announce ourselves to a peer at a known address
    pub fn connect_to(&mut self, addr: SocketAddr) -> Result<(), NodeError> {
        let announce = self.self_announce()?;
        self.send_frame_to_addr(addr, Command::Connect, announce)?;
        Ok(())
    }

    /// Send a user-range command to a peer by name
    pub fn send_to(&mut self, peer: &str, cmd: u8, data: Vec<u8>) -> Result<u32, NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        self.send_frame_to_addr(addr, Command::User(cmd), data)
    }

    /// Send a command straight to an address, skipping the peer table
    pub fn send_answer_to(
        &mut self,
        addr: SocketAddr,
        cmd: u8,
        data: Vec<u8>,
    ) -> Result<u32, NodeError> {
        self.send_frame_to_addr(addr, Command::User(cmd), data)
    }

    /// Round-trip probe; the answer updates the peer's triptime
    pub fn send_echo(&mut self, peer: &str) -> Result<(), NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        let probe = encode_echo(self.clock.wire_now());
        self.send_frame_to_addr(addr, Command::Echo, probe)?;
        Ok(())
    }

    /// Ask a peer for its name, type and version; the answer surfaces as a
    /// Received event
    pub fn request_host_info(&mut self, peer: &str) -> Result<(), NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        self.send_frame_to_addr(addr, Command::HostInfo, Vec::new())?;
        Ok(())
    }

    /// Subscribe this node to an event published by a remote peer
    pub fn subscribe_remote(&mut self, peer: &str, event: u16) -> Result<(), NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        self.send_frame_to_addr(addr, Command::Subscribe, encode_event_id(event))?;
        Ok(())
    }

    pub fn unsubscribe_remote(&mut self, peer: &str, event: u16) -> Result<(), NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        self.send_frame_to_addr(addr, Command::Unsubscribe, encode_event_id(event))?;
        Ok(())
    }

    /// Fan data out to every subscriber of `event`. One subscriber's
    /// failure never blocks the rest; returns how many sends went out.
    pub fn publish(&mut self, event: u16, data: &[u8]) -> usize {
        let targets: Vec<(String, SocketAddr)> = self
            .subscriptions
            .fan_out(event)
            .into_iter()
            .filter_map(|name| {
                let addr = self.peers.get(&name)?.socket_addr();
                Some((name, addr))
            })
            .collect();

        let mut delivered = 0;
        for (name, addr) in targets {
            let payload = encode_publication(event, data);
            match self.send_frame_to_addr(addr, Command::SubscribeAnswer, payload) {
                Ok(_) => delivered += 1,
                Err(err) => warn!("publishing event {event} to {name} failed: {err}"),
            }
        }
        delivered
    }

    /// Remove a peer, cascading into its transport channel and
    /// subscriptions
    pub fn disconnect_peer(&mut self, peer: &str) {
        self.drop_peer(peer, true);
    }

    /// Reset the transport channel to a peer, locally and on the remote
    /// side, without touching the peer-table entry
    pub fn reset_channel(&mut self, peer: &str) -> Result<(), NodeError> {
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| NodeError::UnknownPeer(peer.to_owned()))?
            .socket_addr();
        let sender = self.sender.as_ref().ok_or(NodeError::NotListening)?;
        self.trudp
            .send_reset(sender.as_ref(), addr, self.clock.wire_now());
        Ok(())
    }

    fn open_socket(&mut self) {
        if let Some(socket) = self.socket.take() {
            let (sender, receiver) = socket.listen();
            self.sender = Some(sender);
            self.receiver = Some(receiver);
            self.phase = Phase::Running;
            info!("{} listening on {}", self.config.name, self.local_addr);
            self.events.push(Event::Started);
        }
    }

    fn begin_stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        info!("{} stopping", self.config.name);
        self.events.push(Event::StoppedBefore);
        // best-effort goodbye while the socket is still open
        if let Ok(announce) = self.self_announce() {
            for name in self.peers.peer_names() {
                if let Some(record) = self.peers.get(&name) {
                    let addr = record.socket_addr();
                    let _ =
                        self.send_frame_to_addr(addr, Command::Disconnected, announce.clone());
                }
            }
        }
        self.sender = None;
        self.receiver = None;
        self.socket = None;
        self.phase = Phase::Stopped;
        self.events.push(Event::Stopped);
    }

    fn self_announce(&self) -> Result<Vec<u8>, tether_shared::WireError> {
        PeerAnnounce {
            name: self.config.name.clone(),
            addr: self.local_addr.ip(),
            port: self.local_addr.port(),
        }
        .encode()
    }

    fn send_frame_to_addr(
        &mut self,
        addr: SocketAddr,
        cmd: Command,
        data: Vec<u8>,
    ) -> Result<u32, NodeError> {
        let sender = self.sender.as_ref().ok_or(NodeError::NotListening)?;
        let frame = Frame::new(cmd, data);
        let seq = self.trudp.send_data(
            sender.as_ref(),
            addr,
            frame.encode(),
            self.clock.wire_now(),
        )?;
        Ok(seq)
    }

    fn handle_datagram(&mut self, addr: SocketAddr, datagram: &[u8]) {
        let now_wire = self.clock.wire_now();
        let incoming = match self.sender.as_ref() {
            Some(sender) => self
                .trudp
                .handle_datagram(sender.as_ref(), addr, datagram, now_wire),
            None => return,
        };
        self.peers.touch_by_address(addr, self.clock.now_secs());
        match incoming {
            Incoming::Data { payloads } => {
                for payload in payloads {
                    self.handle_frame(addr, &payload);
                }
            }
            Incoming::Ack { seq, cmd, .. } => {
                self.events.push(Event::ReceivedAck { to: addr, cmd, seq });
            }
            Incoming::Reset | Incoming::Dropped => {}
        }
    }

    fn handle_frame(&mut self, from: SocketAddr, payload: &[u8]) {
        let frame = match Frame::decode(payload) {
            Some(frame) => frame,
            None => {
                debug!("dropping wrong packet from {from}");
                return;
            }
        };
        match frame.cmd {
            Command::None => {}
            Command::Connect => {
                if let Some(announce) = PeerAnnounce::decode(&frame.data) {
                    let now = self.clock.now_secs();
                    if self
                        .peers
                        .add_or_update(&announce.name, announce.addr, announce.port, now)
                    {
                        info!("peer {} connected from {from}", announce.name);
                        self.events.push(Event::Connected {
                            peer: announce.name,
                        });
                    }
                }
            }
            Command::Disconnected => {
                if let Some(announce) = PeerAnnounce::decode(&frame.data) {
                    self.drop_peer(&announce.name, false);
                }
            }
            Command::Echo => {
                let _ = self.send_frame_to_addr(from, Command::EchoAnswer, frame.data);
            }
            Command::EchoAnswer => {
                if let Some(sent_at) = decode_echo(&frame.data) {
                    let triptime = trip_time_ms(self.clock.wire_now(), sent_at);
                    let name = self
                        .peers
                        .find_by_address(from)
                        .map(|(name, _)| name.to_owned());
                    if let Some(name) = name {
                        if let Some(record) = self.peers.get_mut(&name) {
                            record.last_triptime = triptime;
                            record.monitor_triptime = triptime;
                        }
                        debug!("echo answer from {name}: {triptime:.3} ms");
                    }
                }
            }
            Command::HostInfo => {
                let answer = HostInfoAnswer {
                    name: self.config.name.clone(),
                    peer_type: self.config.peer_type.clone(),
                    version: NODE_VERSION,
                };
                if let Ok(data) = answer.encode() {
                    let _ = self.send_frame_to_addr(from, Command::HostInfoAnswer, data);
                }
            }
            Command::HostInfoAnswer => {
                self.events.push(Event::Received {
                    from: self.peer_name_for(from),
                    cmd: frame.cmd.to_byte(),
                    data: frame.data,
                });
            }
            Command::Subscribe => {
                if let Some(event) = decode_event_id(&frame.data) {
                    if let Some(name) = self.known_peer_name(from) {
                        self.subscriptions.subscribe(event, &name);
                        debug!("{name} subscribed to event {event}");
                    }
                }
            }
            Command::Unsubscribe => {
                if let Some(event) = decode_event_id(&frame.data) {
                    if let Some(name) = self.known_peer_name(from) {
                        self.subscriptions.unsubscribe(event, &name);
                    }
                }
            }
            Command::SubscribeAnswer => {
                if let Some((event, data)) = decode_publication(&frame.data) {
                    self.events.push(Event::Subscribe { event, data });
                }
            }
            Command::User(code) => {
                self.events.push(Event::Received {
                    from: self.peer_name_for(from),
                    cmd: code,
                    data: frame.data,
                });
            }
        }
    }

    fn apply_bridge_op(&mut self, op: BridgeOp) {
        match op {
            BridgeOp::SendToPeer { peer, cmd, data } => {
                if let Err(err) = self.send_to(&peer, cmd, data) {
                    debug!("bridge send to {peer} failed: {err}");
                }
            }
            BridgeOp::Publish { event, data } => {
                self.publish(event, &data);
            }
            BridgeOp::SendAnswer { addr, cmd, data } => {
                if let Err(err) = self.send_answer_to(addr, cmd, data) {
                    debug!("bridge answer to {addr} failed: {err}");
                }
            }
            BridgeOp::Subscribe { peer, event } => {
                if let Err(err) = self.subscribe_remote(&peer, event) {
                    debug!("bridge subscribe via {peer} failed: {err}");
                }
            }
            BridgeOp::AsyncData { data } => {
                self.events.push(Event::Async { data });
            }
        }
    }

    fn scan_liveness(&mut self) {
        let now = self.clock.now_secs();
        let actions =
            self.peers
                .scan_liveness(now, self.config.probe_after, self.config.dead_after);
        for action in actions {
            match action {
                LivenessAction::Probe { peer, addr } => {
                    debug!("probing quiet peer {peer}");
                    let probe = encode_echo(self.clock.wire_now());
                    let _ = self.send_frame_to_addr(addr, Command::Echo, probe);
                }
                LivenessAction::Drop { peer } => {
                    warn!("peer {peer} timed out");
                    self.drop_peer(&peer, true);
                }
            }
        }
    }

    fn drop_peer(&mut self, name: &str, notify: bool) {
        let record = match self.peers.remove(name) {
            Some(record) => record,
            None => return,
        };
        let addr = record.socket_addr();
        if notify {
            if let Ok(announce) = self.self_announce() {
                let _ = self.send_frame_to_addr(addr, Command::Disconnected, announce);
            }
        }
        self.trudp.remove_channel(addr);
        self.subscriptions.remove_peer(name);
        self.events.push(Event::Disconnected {
            peer: name.to_owned(),
        });
    }

    fn known_peer_name(&self, addr: SocketAddr) -> Option<String> {
        self.peers
            .find_by_address(addr)
            .map(|(name, _)| name.to_owned())
    }

    fn peer_name_for(&self, addr: SocketAddr) -> String {
        self.known_peer_name(addr)
            .unwrap_or_else(|| addr.to_string())
    }
}
