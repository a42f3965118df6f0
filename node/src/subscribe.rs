//! Event subscriptions: peers register interest in a numeric event id and
//! get published payloads fanned out to them.

use std::collections::HashMap;

/// Subscriber lists per event id. Names only; resolution to addresses and
/// the actual sends happen in the node, so a missing peer just skips.
#[derive(Default)]
pub(crate) struct Subscriptions {
    by_event: HashMap<u16, Vec<String>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `peer` to the list for `event`; already-subscribed peers are
    /// left where they are
    pub fn subscribe(&mut self, event: u16, peer: &str) -> bool {
        let list = self.by_event.entry(event).or_default();
        if list.iter().any(|name| name == peer) {
            return false;
        }
        list.push(peer.to_owned());
        true
    }

    pub fn unsubscribe(&mut self, event: u16, peer: &str) -> bool {
        match self.by_event.get_mut(&event) {
            Some(list) => {
                let before = list.len();
                list.retain(|name| name != peer);
                let removed = list.len() < before;
                if list.is_empty() {
                    self.by_event.remove(&event);
                }
                removed
            }
            None => false,
        }
    }

    /// Drop a peer from every event list (peer removal cascade)
    pub fn remove_peer(&mut self, peer: &str) {
        self.by_event.retain(|_, list| {
            list.retain(|name| name != peer);
            !list.is_empty()
        });
    }

    /// Subscriber names for `event`, shuffled so no subscriber gets
    /// systematic priority in the fan-out
    pub fn fan_out(&self, event: u16) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_event
            .get(&event)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        fastrand::shuffle(&mut names);
        names
    }

    pub fn contains(&self, event: u16, peer: &str) -> bool {
        self.by_event
            .get(&event)
            .map(|list| list.iter().any(|name| name == peer))
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, event: u16) -> usize {
        self.by_event.get(&event).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let mut subs = Subscriptions::new();
        assert!(subs.subscribe(7, "a"));
        assert!(!subs.subscribe(7, "a"));
        assert_eq!(subs.subscriber_count(7), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_peer() {
        let mut subs = Subscriptions::new();
        subs.subscribe(7, "a");
        subs.subscribe(7, "b");
        assert!(subs.unsubscribe(7, "a"));
        assert!(!subs.contains(7, "a"));
        assert!(subs.contains(7, "b"));
        assert!(!subs.unsubscribe(7, "a"));
    }

    #[test]
    fn fan_out_holds_every_subscriber_regardless_of_order() {
        let mut subs = Subscriptions::new();
        for name in ["a", "b", "c"] {
            subs.subscribe(3, name);
        }
        let mut names = subs.fan_out(3);
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(subs.fan_out(4).is_empty());
    }

    #[test]
    fn removing_a_peer_clears_it_everywhere() {
        let mut subs = Subscriptions::new();
        subs.subscribe(1, "a");
        subs.subscribe(2, "a");
        subs.subscribe(2, "b");
        subs.remove_peer("a");
        assert_eq!(subs.subscriber_count(1), 0);
        assert_eq!(subs.subscriber_count(2), 1);
        assert!(subs.contains(2, "b"));
    }
}
