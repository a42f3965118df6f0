//! Cross-thread bridge traffic, shutdown ordering and the restart path.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tether_node::{
    BridgeOp, CqueOutcome, Event, LocalHub, MultiNet, Node, NodeConfig, RestartHandler,
};

fn make_node(hub: &LocalHub, name: &str, port: u16) -> Node {
    let addr = format!("127.0.0.1:{port}").parse().unwrap();
    let mut config = NodeConfig::named(name);
    config.tick_interval = Duration::from_millis(50);
    Node::new(config, Box::new(hub.endpoint(addr))).unwrap()
}

fn introduce(alpha: &mut Node, beta: &mut Node) {
    alpha.poll_once();
    beta.poll_once();
    let beta_addr = beta.local_addr();
    let alpha_addr = alpha.local_addr();
    alpha.connect_to(beta_addr).unwrap();
    beta.connect_to(alpha_addr).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while alpha.peers().get("beta").is_none() || beta.peers().get("alpha").is_none() {
        alpha.poll_once();
        beta.poll_once();
        assert!(Instant::now() < deadline, "nodes never met");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn bridge_carries_work_from_a_foreign_thread() {
    let hub = LocalHub::new();
    let mut alpha = make_node(&hub, "alpha", 7200);
    let mut beta = make_node(&hub, "beta", 7201);
    introduce(&mut alpha, &mut beta);

    let handle = alpha.bridge_handle();
    let worker = thread::spawn(move || {
        handle
            .post(&BridgeOp::SendToPeer {
                peer: "beta".into(),
                cmd: 140,
                data: b"via bridge".to_vec(),
            })
            .unwrap();
        // blocking variant: returns once the reactor picked the record up
        handle
            .call(
                &BridgeOp::AsyncData {
                    data: b"wake".to_vec(),
                },
                Duration::from_secs(5),
            )
            .unwrap();
    });

    let mut beta_got_command = false;
    let mut alpha_got_async = false;
    let deadline = Instant::now() + Duration::from_secs(5);
    while !(beta_got_command && alpha_got_async) {
        for event in alpha.poll_once() {
            if event == (Event::Async { data: b"wake".to_vec() }) {
                alpha_got_async = true;
            }
        }
        for event in beta.poll_once() {
            if event
                == (Event::Received {
                    from: "alpha".into(),
                    cmd: 140,
                    data: b"via bridge".to_vec(),
                })
            {
                beta_got_command = true;
            }
        }
        assert!(Instant::now() < deadline, "bridge traffic never arrived");
        thread::sleep(Duration::from_millis(2));
    }
    worker.join().unwrap();
}

#[test]
fn call_returns_only_after_the_operation_ran() {
    let hub = LocalHub::new();
    let mut alpha = make_node(&hub, "alpha", 7260);
    let mut beta = make_node(&hub, "beta", 7261);
    introduce(&mut alpha, &mut beta);

    let handle = alpha.bridge_handle();
    let worker = thread::spawn(move || {
        handle.call(
            &BridgeOp::SendToPeer {
                peer: "beta".into(),
                cmd: 141,
                data: b"synced".to_vec(),
            },
            Duration::from_secs(5),
        )
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !worker.is_finished() {
        alpha.poll_once();
        assert!(Instant::now() < deadline, "call never completed");
        thread::sleep(Duration::from_millis(1));
    }
    assert!(worker.join().unwrap().is_ok());

    // the send happened before the call returned: beta sees the command
    // without alpha doing any further work
    let mut delivered = false;
    let deadline = Instant::now() + Duration::from_secs(2);
    while !delivered {
        for event in beta.poll_once() {
            if event
                == (Event::Received {
                    from: "alpha".into(),
                    cmd: 141,
                    data: b"synced".to_vec(),
                })
            {
                delivered = true;
            }
        }
        assert!(Instant::now() < deadline, "command never arrived");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn shutdown_emits_lifecycle_events_in_order() {
    let hub = LocalHub::new();
    let mut node = make_node(&hub, "solo", 7210);
    node.poll_once();
    node.stop();
    let events = node.poll_once();
    let before = events
        .iter()
        .position(|event| *event == Event::StoppedBefore)
        .expect("StoppedBefore missing");
    let stopped = events
        .iter()
        .position(|event| *event == Event::Stopped)
        .expect("Stopped missing");
    assert!(before < stopped);
    assert!(node.is_stopped());
    // a stopped node produces nothing further
    assert!(node.poll_once().is_empty());
}

#[test]
fn restart_reexecs_with_original_argv_after_teardown() {
    let hub = LocalHub::new();
    let addr = "127.0.0.1:7220".parse().unwrap();
    let mut config = NodeConfig::named("phoenix");
    config.restart_after_stop = true;
    let mut node = Node::new(config, Box::new(hub.endpoint(addr))).unwrap();

    let execs = Arc::new(Mutex::new(Vec::new()));
    let sink = execs.clone();
    node.set_restart_handler(RestartHandler::new(
        "/usr/bin/phoenix",
        vec!["--flag".into()],
        Box::new(move |program, argv| {
            sink.lock().unwrap().push((program.to_owned(), argv.to_vec()));
        }),
    ));

    let stopped_at_exec = Arc::new(Mutex::new(false));
    {
        let stopped_at_exec = stopped_at_exec.clone();
        let execs = execs.clone();
        node.run(move |node, event| {
            if event == Event::Started {
                node.stop();
            }
            if event == Event::Stopped {
                // teardown completes before any exec happens
                *stopped_at_exec.lock().unwrap() = execs.lock().unwrap().is_empty();
            }
        });
    }

    let execs = execs.lock().unwrap();
    assert_eq!(
        *execs,
        vec![("/usr/bin/phoenix".to_owned(), vec!["--flag".to_owned()])]
    );
    assert!(*stopped_at_exec.lock().unwrap());
}

#[test]
fn callback_deadline_is_driven_by_housekeeping() {
    let hub = LocalHub::new();
    let mut node = make_node(&hub, "solo", 7250);
    node.poll_once();

    let fired = Rc::new(RefCell::new(Vec::new()));
    let sink = fired.clone();
    node.callbacks_mut().add(
        move |outcome, data| sink.borrow_mut().push((outcome, data.to_vec())),
        Duration::from_millis(10),
        b"ctx".to_vec(),
    );

    let deadline = Instant::now() + Duration::from_secs(2);
    while fired.borrow().is_empty() {
        node.poll_once();
        assert!(Instant::now() < deadline, "callback never timed out");
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(
        *fired.borrow(),
        vec![(CqueOutcome::Timeout, b"ctx".to_vec())]
    );
}

#[test]
fn custom_timer_fires_at_its_own_interval() {
    let hub = LocalHub::new();
    let mut node = make_node(&hub, "ticker", 7240);
    node.poll_once();
    node.set_custom_timer(Some(Duration::from_millis(20)));

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut fired = 0;
    while fired < 2 {
        for event in node.poll_once() {
            if event == Event::Timer {
                fired += 1;
            }
        }
        assert!(Instant::now() < deadline, "custom timer never fired");
        thread::sleep(Duration::from_millis(2));
    }

    // disarmed: a generous wait produces no further Timer events
    node.set_custom_timer(None);
    let quiet_until = Instant::now() + Duration::from_millis(100);
    while Instant::now() < quiet_until {
        assert!(!node.poll_once().contains(&Event::Timer));
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn multinet_steps_nodes_round_robin() {
    let hub = LocalHub::new();
    let mut alpha = make_node(&hub, "alpha", 7230);
    let mut beta = make_node(&hub, "beta", 7231);
    introduce(&mut alpha, &mut beta);

    let mut net = MultiNet::new();
    let alpha_index = net.add(alpha);
    let beta_index = net.add(beta);
    assert_eq!(net.len(), 2);

    // each node reaches its one known peer
    assert_eq!(net.broadcast(150, b"fanout"), 2);

    let mut received = 0;
    let deadline = Instant::now() + Duration::from_secs(2);
    while received < 2 {
        for (index, event) in net.poll_all() {
            if matches!(event, Event::Received { cmd: 150, .. }) {
                assert!(index == alpha_index || index == beta_index);
                received += 1;
            }
        }
        assert!(Instant::now() < deadline, "broadcast never landed");
        thread::sleep(Duration::from_millis(2));
    }

    net.stop_all();
    let events = net.poll_all();
    assert_eq!(
        events
            .iter()
            .filter(|(_, event)| *event == Event::Stopped)
            .count(),
        2
    );
}
