//! Property tests for navigation invariants, plus a concurrency check that
//! snapshots taken during mutation stay in range.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use statusboard::nav::state::{NavigationState, Panel};

use common::recording_registry;

#[derive(Debug, Clone, Copy)]
enum Op {
    Advance,
    Retreat,
    Next,
    Prev,
    Trigger,
    Tick(u64),
    Toggle,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Advance),
        Just(Op::Retreat),
        Just(Op::Next),
        Just(Op::Prev),
        Just(Op::Trigger),
        (0u64..30).prop_map(Op::Tick),
        Just(Op::Toggle),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn panel_and_selection_stay_in_range(
        entries in 1usize..6,
        ops in prop::collection::vec(op(), 0..80),
    ) {
        let start = Instant::now();
        let (registry, _) = recording_registry(entries);
        let nav = NavigationState::starting_at(registry, true, start);
        let mut now = start;

        for op in ops {
            match op {
                Op::Advance => { nav.advance_panel(); }
                Op::Retreat => { nav.retreat_panel(); }
                Op::Next => { nav.select_next_command(); }
                Op::Prev => { nav.select_prev_command(); }
                Op::Trigger => { nav.trigger_selected_command(); }
                Op::Tick(secs) => {
                    now += Duration::from_secs(secs);
                    nav.maybe_auto_advance(now, Duration::from_secs(10));
                }
                Op::Toggle => { nav.toggle_auto_advance(); }
            }
            let snap = nav.snapshot();
            prop_assert!(snap.panel.index() < Panel::COUNT);
            prop_assert!(snap.selected_command < entries);
        }
    }

    #[test]
    fn advance_then_retreat_is_identity(steps in 0usize..40) {
        let (registry, _) = recording_registry(2);
        let nav = NavigationState::new(registry, false);
        for _ in 0..steps {
            nav.advance_panel();
        }
        prop_assert_eq!(nav.snapshot().panel, Panel::from_index(steps % Panel::COUNT));
        for _ in 0..steps {
            nav.retreat_panel();
        }
        prop_assert_eq!(nav.snapshot().panel, Panel::Address);
    }

    #[test]
    fn selection_wraps_modulo_registry_length(entries in 1usize..8, presses in 0usize..50) {
        let (registry, _) = recording_registry(entries);
        let nav = NavigationState::new(registry, false);
        nav.retreat_panel();
        for _ in 0..presses {
            nav.select_next_command();
        }
        prop_assert_eq!(nav.snapshot().selected_command, presses % entries);
        for _ in 0..presses {
            nav.select_prev_command();
        }
        prop_assert_eq!(nav.snapshot().selected_command, 0);
    }

    #[test]
    fn selection_ignored_off_commands(entries in 1usize..8, advances in 0usize..3, presses in 0usize..20) {
        let (registry, _) = recording_registry(entries);
        let nav = NavigationState::new(registry, false);
        for _ in 0..advances {
            nav.advance_panel();
        }
        for _ in 0..presses {
            prop_assert_eq!(nav.select_next_command(), None);
        }
        prop_assert_eq!(nav.snapshot().selected_command, 0);
    }

    #[test]
    fn auto_advance_moves_at_most_one_panel_per_tick(gaps in prop::collection::vec(0u64..40, 1..30)) {
        let start = Instant::now();
        let (registry, _) = recording_registry(2);
        let nav = NavigationState::starting_at(registry, true, start);
        let mut now = start;
        for gap in gaps {
            let before = nav.snapshot().panel;
            now += Duration::from_secs(gap);
            let change = nav.maybe_auto_advance(now, Duration::from_secs(10));
            let after = nav.snapshot().panel;
            match change {
                Some(c) => {
                    prop_assert_eq!(c.from, before);
                    prop_assert_eq!(after, before.next());
                    prop_assert_ne!(before, Panel::Commands);
                }
                None => prop_assert_eq!(after, before),
            }
        }
    }
}

#[test]
fn concurrent_snapshots_never_see_out_of_range_values() {
    let (registry, _) = recording_registry(3);
    let nav = Arc::new(NavigationState::new(registry, true));
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4u64)
        .map(|i| {
            let nav = Arc::clone(&nav);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut n = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    match (n + i) % 5 {
                        0 => {
                            nav.advance_panel();
                        }
                        1 => {
                            nav.retreat_panel();
                        }
                        2 => {
                            nav.select_next_command();
                        }
                        3 => {
                            nav.select_prev_command();
                        }
                        _ => {
                            nav.maybe_auto_advance(Instant::now(), Duration::ZERO);
                        }
                    }
                    n += 1;
                }
            })
        })
        .collect();

    let deadline = Instant::now() + Duration::from_millis(300);
    let mut observed = 0u64;
    while Instant::now() < deadline {
        let snap = nav.snapshot();
        assert!(snap.panel.index() < Panel::COUNT);
        assert!(snap.selected_command < nav.registry().len());
        observed += 1;
    }
    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().expect("writer thread");
    }
    assert!(observed > 0);
}
