//! Integration tests for batch mode / auto-capture exclusivity

use flashbatch::modes::{ClipboardRoute, Mode, ModeArbiter, ModeChange, ModeSettings};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

fn record_changes(arbiter: &ModeArbiter) -> Arc<Mutex<Vec<ModeChange>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    arbiter.subscribe(move |change| sink.lock().unwrap().push(*change));
    seen
}

#[test]
fn test_enabling_batch_mode_forces_auto_capture_off() {
    let arbiter = ModeArbiter::new(ModeSettings {
        auto_capture: true,
        batch_mode: false,
    });
    let seen = record_changes(&arbiter);

    arbiter.set_batch_mode(true);

    assert!(arbiter.is_batch_mode_enabled());
    assert!(!arbiter.is_auto_capture_enabled());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ModeChange {
                mode: Mode::BatchMode,
                enabled: true,
                forced: false
            },
            ModeChange {
                mode: Mode::AutoCapture,
                enabled: false,
                forced: true
            },
        ]
    );
}

#[test]
fn test_enabling_auto_capture_forces_batch_mode_off() {
    let arbiter = ModeArbiter::new(ModeSettings {
        auto_capture: false,
        batch_mode: true,
    });
    arbiter.set_auto_capture(true);
    assert!(arbiter.is_auto_capture_enabled());
    assert!(!arbiter.is_batch_mode_enabled());
}

#[test]
fn test_disabling_leaves_other_mode_alone() {
    let arbiter = ModeArbiter::default();
    arbiter.set_batch_mode(true);
    let seen = record_changes(&arbiter);

    arbiter.set_auto_capture(false);
    arbiter.set_batch_mode(false);

    assert!(!arbiter.is_batch_mode_enabled());
    assert!(!arbiter.is_auto_capture_enabled());
    // Setting auto-capture to its current value is not a change
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_observer_sees_consistent_flags() {
    let arbiter = Arc::new(ModeArbiter::default());
    let violations = Arc::new(Mutex::new(0usize));
    {
        let arbiter_ref = Arc::downgrade(&arbiter);
        let violations = Arc::clone(&violations);
        arbiter.subscribe(move |_| {
            if let Some(arbiter) = arbiter_ref.upgrade() {
                if arbiter.is_auto_capture_enabled() && arbiter.is_batch_mode_enabled() {
                    *violations.lock().unwrap() += 1;
                }
            }
        });
    }

    arbiter.set_auto_capture(true);
    arbiter.set_batch_mode(true);
    arbiter.set_auto_capture(true);

    assert_eq!(*violations.lock().unwrap(), 0);
}

#[test]
fn test_unsubscribed_observer_is_silent() {
    let arbiter = ModeArbiter::default();
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let id = arbiter.subscribe(move |_| *counter.lock().unwrap() += 1);

    arbiter.set_batch_mode(true);
    assert!(arbiter.unsubscribe(id));
    assert!(!arbiter.unsubscribe(id));
    arbiter.set_batch_mode(false);

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn test_clipboard_routing_follows_modes() {
    let arbiter = ModeArbiter::default();
    assert_eq!(arbiter.route("Hallo"), ClipboardRoute::Ignore);

    arbiter.set_batch_mode(true);
    assert_eq!(
        arbiter.route("  Hallo Welt \n"),
        ClipboardRoute::Collect("Hallo Welt".to_string())
    );

    arbiter.set_auto_capture(true);
    assert_eq!(
        arbiter.route("Hallo"),
        ClipboardRoute::Generate("Hallo".to_string())
    );
    assert_eq!(arbiter.route("   "), ClipboardRoute::Ignore);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    AutoCapture(bool),
    BatchMode(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::AutoCapture),
        any::<bool>().prop_map(Op::BatchMode),
    ]
}

proptest! {
    #[test]
    fn prop_modes_are_never_both_enabled(
        auto_capture in any::<bool>(),
        batch_mode in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let arbiter = ModeArbiter::new(ModeSettings { auto_capture, batch_mode });
        prop_assert!(!(arbiter.is_auto_capture_enabled() && arbiter.is_batch_mode_enabled()));

        for op in ops {
            match op {
                Op::AutoCapture(on) => {
                    arbiter.set_auto_capture(on);
                    prop_assert_eq!(arbiter.is_auto_capture_enabled(), on);
                }
                Op::BatchMode(on) => {
                    arbiter.set_batch_mode(on);
                    prop_assert_eq!(arbiter.is_batch_mode_enabled(), on);
                }
            }
            prop_assert!(!(arbiter.is_auto_capture_enabled() && arbiter.is_batch_mode_enabled()));
        }
    }
}
