use std::time::Duration;

/// Everything a [`Node`](crate::Node) needs to know before it starts
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// This host's unique network name
    pub name: String,
    /// Free-form host type string reported in host-info answers
    pub peer_type: String,
    /// Housekeeping tick interval
    pub tick_interval: Duration,
    /// Application timer interval; `None` means no Timer events
    pub custom_timer: Option<Duration>,
    /// How long an unacknowledged DATA message waits before a resend
    pub retransmit_interval: Duration,
    /// Resends before the channel is reset; `None` retries forever
    pub max_send_attempts: Option<u32>,
    /// How often the peer table is scanned for quiet peers
    pub liveness_interval: Duration,
    /// Quiet time before a peer gets an echo probe
    pub probe_after: Duration,
    /// Quiet time before a peer is declared dead
    pub dead_after: Duration,
    /// Bound on the async bridge queue
    pub bridge_capacity: usize,
    /// Re-exec the process after a clean shutdown
    pub restart_after_stop: bool,
}

impl NodeConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "tether-node".to_owned(),
            peer_type: String::new(),
            tick_interval: Duration::from_millis(250),
            custom_timer: None,
            retransmit_interval: Duration::from_millis(100),
            max_send_attempts: None,
            liveness_interval: Duration::from_millis(1_500),
            probe_after: Duration::from_secs_f64(11.5),
            dead_after: Duration::from_secs(14),
            bridge_capacity: 1_024,
            restart_after_stop: false,
        }
    }
}
