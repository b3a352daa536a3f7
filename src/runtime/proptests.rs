//! Property-based tests for the dispatch pipeline
//!
//! Whatever the interleaving of senders, the published state after N actions
//! must equal the left fold of the reducer over those actions.

use super::testing::wait_until;
use super::Store;
use crate::reducer::{Reducer, Worker};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Tally reducer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TallyAction {
    Add(i32),
    Mul(i32),
    Label(String),
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TallyState {
    total: i32,
    label: String,
    steps: usize,
}

struct Tally;

impl Tally {
    fn fold(actions: &[TallyAction]) -> TallyState {
        let mut state = TallyState::default();
        for action in actions {
            let _ = Tally.reduce(&mut state, action.clone());
        }
        state
    }
}

impl Reducer for Tally {
    type Action = TallyAction;
    type State = TallyState;

    fn initial_state(&self) -> TallyState {
        TallyState::default()
    }

    fn reduce(&self, state: &mut TallyState, action: TallyAction) -> Worker<TallyAction> {
        state.steps += 1;
        match action {
            TallyAction::Add(n) => state.total = state.total.wrapping_add(n),
            TallyAction::Mul(n) => state.total = state.total.wrapping_mul(n),
            TallyAction::Label(label) => state.label = label,
            TallyAction::Reset => state.total = 0,
        }
        Worker::none()
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_action() -> impl Strategy<Value = TallyAction> {
    prop_oneof![
        (-100i32..100).prop_map(TallyAction::Add),
        (-3i32..4).prop_map(TallyAction::Mul),
        "[a-z]{0,6}".prop_map(TallyAction::Label),
        Just(TallyAction::Reset),
    ]
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

const TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_published_state_is_left_fold(
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        let expected = Tally::fold(&actions);
        let total = actions.len();

        let published = block_on(async move {
            let store = Store::new(Tally);
            for action in actions {
                store.send(action);
            }
            let reached = wait_until(&store, |s| s.steps == total, TIMEOUT).await;
            (reached, store.state())
        });

        prop_assert!(published.0, "store never applied all {} actions", total);
        prop_assert_eq!(published.1, expected);
    }

    #[test]
    fn prop_senders_keep_their_own_order(
        first in proptest::collection::vec(0i32..50, 1..20),
        second in proptest::collection::vec(0i32..50, 1..20)
    ) {
        let total = first.len() + second.len();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reached = block_on({
            let seen = Arc::clone(&seen);
            let (first, second) = (first.clone(), second.clone());
            async move {
                let store = Store::new(Tally);
                let _subscription = store.subscribe(move |state: &TallyState| {
                    seen.lock().unwrap().push(state.label.clone());
                });

                let a = store.sink();
                let b = store.sink();
                let left = tokio::spawn(async move {
                    for n in first {
                        a.send(TallyAction::Label(format!("a{n:02}")));
                        tokio::task::yield_now().await;
                    }
                });
                let right = tokio::spawn(async move {
                    for n in second {
                        b.send(TallyAction::Label(format!("b{n:02}")));
                        tokio::task::yield_now().await;
                    }
                });
                left.await.unwrap();
                right.await.unwrap();

                let reached = wait_until(&store, |s| s.steps == total, TIMEOUT).await;
                // Callbacks run just after the snapshot is published
                store.idle().await;
                reached
            }
        });
        prop_assert!(reached);

        // Every action bumps `steps`, so each one produced exactly one notification
        let seen = seen.lock().unwrap().clone();
        prop_assert_eq!(seen.len(), total);

        let from_a: Vec<String> = seen.iter().filter(|l| l.starts_with('a')).cloned().collect();
        let from_b: Vec<String> = seen.iter().filter(|l| l.starts_with('b')).cloned().collect();
        let expected_a: Vec<String> = first.iter().map(|n| format!("a{n:02}")).collect();
        let expected_b: Vec<String> = second.iter().map(|n| format!("b{n:02}")).collect();
        prop_assert_eq!(from_a, expected_a);
        prop_assert_eq!(from_b, expected_b);
    }
}
