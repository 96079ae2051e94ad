// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Match-tree evaluation.
//!
//! Leaves compare a dotted-path field of the call snapshot `{args, context}`
//! against a literal value or a context-resolved value, using the closed
//! ten-operator set. Missing-field semantics: `neq` is true (cross-tenant
//! rules may lack the comparator), everything else is false.

use crate::engine::manifest::{MatchLeaf, MatchNode, MatchOp};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Resolve a dotted path (`args.filename`, `context.user_role`) into the
/// snapshot.
pub fn resolve_path<'a>(snapshot: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = snapshot;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// JSON equality with numeric coercion so `1` equals `1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub fn evaluate_node(
    node: &MatchNode,
    snapshot: &Value,
    regexes: &HashMap<String, Regex>,
) -> bool {
    match node {
        MatchNode::All(children) => children.iter().all(|c| evaluate_node(c, snapshot, regexes)),
        MatchNode::Any(children) => children.iter().any(|c| evaluate_node(c, snapshot, regexes)),
        MatchNode::Not(child) => !evaluate_node(child, snapshot, regexes),
        MatchNode::Leaf(leaf) => evaluate_leaf(leaf, snapshot, regexes),
    }
}

fn comparator<'a>(leaf: &'a MatchLeaf, snapshot: &'a Value) -> Option<&'a Value> {
    if let Some(path) = &leaf.value_from_context {
        let context = snapshot.get("context")?;
        return resolve_path(context, path);
    }
    leaf.value.as_ref()
}

fn evaluate_leaf(leaf: &MatchLeaf, snapshot: &Value, regexes: &HashMap<String, Regex>) -> bool {
    let actual = resolve_path(snapshot, &leaf.field);
    let expected = comparator(leaf, snapshot);

    let (actual, expected) = match (actual, expected) {
        (Some(a), Some(e)) => (a, e),
        // A missing field or a dangling context comparator: only `neq`
        // holds.
        _ => return leaf.operator == MatchOp::Neq,
    };

    match leaf.operator {
        MatchOp::Eq => values_equal(actual, expected),
        MatchOp::Neq => !values_equal(actual, expected),
        MatchOp::Gt => numeric_cmp(actual, expected, |a, e| a > e),
        MatchOp::Gte => numeric_cmp(actual, expected, |a, e| a >= e),
        MatchOp::Lt => numeric_cmp(actual, expected, |a, e| a < e),
        MatchOp::Lte => numeric_cmp(actual, expected, |a, e| a <= e),
        MatchOp::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
            (Value::Array(items), needle) => items.iter().any(|i| values_equal(i, needle)),
            _ => false,
        },
        MatchOp::Regex => match (actual, expected) {
            (Value::String(s), Value::String(pattern)) => match regexes.get(pattern) {
                Some(re) => re.is_match(s),
                // Anchored only if the pattern says so; compile misses fall
                // back to a one-shot build (loader validates patterns).
                None => Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false),
            },
            _ => false,
        },
        MatchOp::In => match expected {
            Value::Array(options) => options.iter().any(|o| values_equal(actual, o)),
            _ => false,
        },
        MatchOp::NotIn => match expected {
            Value::Array(options) => !options.iter().any(|o| values_equal(actual, o)),
            _ => false,
        },
    }
}

fn numeric_cmp(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}
