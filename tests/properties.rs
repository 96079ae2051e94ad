//! Property tests for the core invariants: windowed accumulation, taint
//! monotonicity, sanitizer idempotence, and match-tree determinism.

use chimera::engine::manifest::{MatchLeaf, MatchNode, MatchOp};
use chimera::engine::matcher;
use chimera::engine_core::sanitizer::ResponseSanitizer;
use chimera::engine_core::session::SessionState;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;

proptest! {
    #[test]
    fn accumulated_risk_equals_manual_window_sum(
        events in proptest::collection::vec((0.0f64..3600.0, 0.0f64..1.0), 0..40),
        window in 1.0f64..7200.0,
    ) {
        let mut state = SessionState::default();
        let mut ordered = events.clone();
        ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut now = 0.0f64;
        for (ts, risk) in &ordered {
            now = *ts;
            state.record_risk(*risk, "tool", now, window);
        }

        let expected: f64 = ordered
            .iter()
            .filter(|(ts, _)| now - ts < window)
            .map(|(_, risk)| risk)
            .sum();

        let actual = state.accumulated_risk(now, window);
        prop_assert!((actual - expected).abs() < 1e-9);
    }

    #[test]
    fn accumulated_risk_is_zero_after_everything_ages_out(
        events in proptest::collection::vec(0.0f64..1.0, 1..20),
        window in 1.0f64..600.0,
    ) {
        let mut state = SessionState::default();
        for (i, risk) in events.iter().enumerate() {
            state.record_risk(*risk, "tool", i as f64, window);
        }
        let far_future = events.len() as f64 + window + 1.0;
        prop_assert_eq!(state.accumulated_risk(far_future, window), 0.0);
    }

    #[test]
    fn taint_is_monotonic_under_any_sequence(sources in proptest::collection::vec("\\PC{1,20}", 1..10)) {
        let mut state = SessionState::default();
        state.mark_tainted(&sources[0]);
        for source in &sources {
            state.mark_tainted(source);
            prop_assert!(state.is_tainted());
        }
        prop_assert_eq!(state.taint_source(), Some(sources[0].as_str()));
    }

    #[test]
    fn sanitizing_twice_equals_sanitizing_once(input in "\\PC*") {
        let sanitizer = ResponseSanitizer::with_defaults();
        let once = sanitizer.sanitize_str(&input);
        let twice = sanitizer.sanitize_str(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitizer_on_credentialish_input_is_still_idempotent(
        prefix in "\\PC{0,12}",
        key in "[A-Za-z0-9]{8,24}",
    ) {
        let sanitizer = ResponseSanitizer::with_defaults();
        let input = format!("{prefix} sk-{key} Bearer {key} password: \"{key}\"");
        let once = sanitizer.sanitize_str(&input);
        let twice = sanitizer.sanitize_str(&once);
        prop_assert_eq!(&once, &twice);
        let needle = format!("sk-{}", key);
        prop_assert!(!once.contains(&needle));
    }

    #[test]
    fn match_evaluation_is_deterministic(
        user in "[a-z]{1,10}",
        role in "[a-z]{1,10}",
        limit in 0i64..1000,
    ) {
        let snapshot = json!({
            "args": { "limit": limit },
            "context": { "user_id": user, "user_role": role }
        });
        let node = MatchNode::Any(vec![
            MatchNode::Leaf(MatchLeaf {
                field: "context.user_id".to_string(),
                operator: MatchOp::Eq,
                value: Some(json!("dr_chen")),
                value_from_context: None,
            }),
            MatchNode::Leaf(MatchLeaf {
                field: "args.limit".to_string(),
                operator: MatchOp::Gte,
                value: Some(json!(500)),
                value_from_context: None,
            }),
        ]);
        let regexes = HashMap::new();
        let a = matcher::evaluate_node(&node, &snapshot, &regexes);
        let b = matcher::evaluate_node(&node, &snapshot, &regexes);
        prop_assert_eq!(a, b);
        prop_assert_eq!(a, user == "dr_chen" || limit >= 500);
    }
}
