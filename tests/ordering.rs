//! Property tests for dispatch and snapshot ordering.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use store_mirror::{
    Action, MergeReducer, MirrorChannel, MirrorConfig, Outbound, Selector, StateStore, Store,
    RESET, SET,
};

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        8 => ("[a-d]", any::<i32>()).prop_map(|(key, n)| {
            let mut payload = serde_json::Map::new();
            payload.insert(key, json!(n));
            Action::new(SET, Value::Object(payload))
        }),
        1 => Just(Action::new(RESET, json!({}))),
        1 => Just(Action::new("NOOP", Value::Null)),
    ]
}

fn apply_directly(actions: &[Action]) -> Vec<Value> {
    let store = Store::new(json!({}), MergeReducer);
    actions
        .iter()
        .map(|action| store.dispatch(action.clone()).unwrap().as_ref().clone())
        .collect()
}

proptest! {
    #[test]
    fn prop_remote_dispatch_matches_direct(
        actions in prop::collection::vec(action_strategy(), 0..40),
        budget in 1usize..8,
    ) {
        let store = Arc::new(Store::new(json!({}), MergeReducer));
        let mut mirror = MirrorChannel::install(
            Arc::clone(&store),
            MirrorConfig { max_messages_per_turn: budget, ..Default::default() },
        );
        let remote = mirror.connect();

        for action in &actions {
            remote.dispatch(action).unwrap();
        }
        while !mirror.turn().is_idle() {}

        let expected = apply_directly(&actions).pop().unwrap_or_else(|| json!({}));
        let state = store.get_state();
        prop_assert_eq!(state.as_ref(), &expected);
        prop_assert_eq!(store.version(), actions.len() as u64);
    }

    #[test]
    fn prop_snapshots_follow_transitions(
        actions in prop::collection::vec(action_strategy(), 1..30),
        key in prop::option::of("[a-d]"),
    ) {
        let store = Arc::new(Store::new(json!({}), MergeReducer));
        let mut mirror = MirrorChannel::with_defaults(Arc::clone(&store));
        let observer = mirror.connect();
        observer.subscribe_store(key.as_deref()).unwrap();
        mirror.turn();

        // Mix primary and remote writers
        for (i, action) in actions.iter().enumerate() {
            if i % 2 == 0 {
                store.dispatch(action.clone()).unwrap();
            } else {
                observer.dispatch(action).unwrap();
                mirror.turn();
            }
        }

        let selector = Selector::from_key(key);
        let mut expected = vec![selector.select(&json!({}))];
        expected.extend(apply_directly(&actions).iter().map(|s| selector.select(s)));

        let mut received = Vec::new();
        while let Ok(Outbound::StateChange { snapshot }) = observer.try_recv() {
            received.push(snapshot);
        }
        prop_assert_eq!(received, expected);
    }
}
