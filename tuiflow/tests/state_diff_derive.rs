//! Tests for `#[derive(StateDiff)]`.

use serde_json::json;
use tuiflow::StateDiff;

#[test]
fn unchanged_fields_are_omitted() {
    #[derive(StateDiff, PartialEq, Clone)]
    struct CounterState {
        count: i32,
        label: String,
    }

    let previous = CounterState { count: 0, label: "idle".into() };
    let current = CounterState { count: 1, label: "idle".into() };

    let changes = current.state_diff(&previous);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes.get("count"), Some(&json!(1)));
    assert!(!changes.contains_key("label"));
}

#[test]
fn prefix_is_joined_with_a_dot() {
    #[derive(StateDiff, PartialEq, Clone)]
    #[state_diff(prefix = "counter")]
    struct CounterState {
        count: i32,
    }

    let previous = CounterState { count: 0 };
    let current = CounterState { count: 2 };

    let changes = current.state_diff(&previous);
    assert_eq!(changes.get("counter.count"), Some(&json!(2)));
}

#[test]
fn skipped_fields_never_appear() {
    #[derive(StateDiff, PartialEq, Clone)]
    struct InputState {
        value: String,
        #[state(skip)]
        render_cache: Vec<u8>,
    }

    let previous = InputState { value: "a".into(), render_cache: vec![1] };
    let current = InputState { value: "a".into(), render_cache: vec![1, 2, 3] };

    let changes = current.state_diff(&previous);
    assert!(changes.is_empty());
}

#[test]
fn renamed_key_overrides_the_field_name() {
    #[derive(StateDiff, PartialEq, Clone)]
    struct FormState {
        #[state(key = "username")]
        name: String,
    }

    let previous = FormState { name: "".into() };
    let current = FormState { name: "ada".into() };

    let changes = current.state_diff(&previous);
    assert_eq!(changes.get("username"), Some(&json!("ada")));
    assert!(!changes.contains_key("name"));
}

#[test]
fn no_changes_yields_an_empty_map() {
    #[derive(StateDiff, PartialEq, Clone)]
    struct Stable {
        value: i32,
    }

    let state = Stable { value: 7 };
    let changes = state.state_diff(&state.clone());
    assert!(changes.is_empty());
}
