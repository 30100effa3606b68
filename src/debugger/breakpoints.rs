//! Breakpoint table and hit evaluation
//!
//! Owns the breakpoint records, indexed by `(source, position)`. The hit
//! evaluation order is load-bearing: the hit-count predicate is checked
//! before the log message, so a logpoint with a hit condition logs only when
//! the predicate fires.

use std::collections::HashMap;

use crate::common::Result;
use crate::engine::{Position, Value};

/// A breakpoint record.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub source: String,
    pub position: Position,
    /// Expression evaluated by the engine before the break callback fires.
    pub condition: Option<String>,
    /// Predicate over the running hit count.
    pub hit_condition: Option<HitCondition>,
    /// Expression whose stringified value is emitted instead of stopping.
    pub log_message: Option<String>,
    pub hit_count: u32,
}

/// Parsed hit-count predicate: `N`, `== N`, `>= N`, `> N` or `% N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCondition {
    Eq(u32),
    Gt(u32),
    Ge(u32),
    Mod(u32),
}

impl HitCondition {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (ctor, rest): (fn(u32) -> Self, &str) = if let Some(rest) = text.strip_prefix(">=") {
            (Self::Ge, rest)
        } else if let Some(rest) = text.strip_prefix('>') {
            (Self::Gt, rest)
        } else if let Some(rest) = text.strip_prefix("==") {
            (Self::Eq, rest)
        } else if let Some(rest) = text.strip_prefix('=') {
            (Self::Eq, rest)
        } else if let Some(rest) = text.strip_prefix('%') {
            (Self::Mod, rest)
        } else {
            (Self::Eq, text)
        };
        let n = rest.trim().parse().ok()?;
        Some(ctor(n))
    }

    pub fn eval(&self, hits: u32) -> bool {
        match *self {
            HitCondition::Eq(n) => hits == n,
            HitCondition::Gt(n) => hits > n,
            HitCondition::Ge(n) => hits >= n,
            HitCondition::Mod(n) => n != 0 && hits % n == 0,
        }
    }
}

/// What a hit evaluation decided.
#[derive(Debug, Clone, PartialEq)]
pub enum HitOutcome {
    /// Do not break.
    Continue,
    /// Suspend execution.
    Break,
    /// Emit a log message and keep running.
    Log(String),
}

#[derive(Default)]
pub struct BreakpointTable {
    by_key: HashMap<(String, Position), Breakpoint>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a breakpoint, overwriting one at the same coordinates.
    pub fn set(&mut self, bp: Breakpoint) {
        self.by_key.insert((bp.source.clone(), bp.position), bp);
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
    }

    pub fn lookup(&self, source: &str, position: Position) -> Option<&Breakpoint> {
        self.by_key.get(&(source.to_string(), position))
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Evaluate a breakpoint hit at `position`.
    ///
    /// `evaluate` runs an expression in the currently paused frame; it is
    /// used for the log message. A log message that fails to evaluate makes
    /// the hit non-breaking and the failure is surfaced as the log text.
    pub fn evaluate_hit(
        &mut self,
        source: &str,
        position: Position,
        breakpoint: Option<Position>,
        evaluate: &dyn Fn(&str) -> Result<Value>,
    ) -> HitOutcome {
        let Some(bp_pos) = breakpoint else {
            return HitOutcome::Continue;
        };
        let Some(bp) = self.by_key.get_mut(&(source.to_string(), bp_pos)) else {
            return HitOutcome::Continue;
        };
        // The engine already filtered on the condition; this hit counts.
        bp.hit_count += 1;
        tracing::trace!(source, %position, hits = bp.hit_count, "breakpoint hit");

        if let Some(hit_condition) = bp.hit_condition {
            if !hit_condition.eval(bp.hit_count) {
                return HitOutcome::Continue;
            }
        }

        if let Some(log_message) = bp.log_message.clone() {
            return match evaluate(&log_message) {
                Ok(value) => HitOutcome::Log(crate::engine::stringify(&value)),
                Err(err) => {
                    tracing::warn!(%position, error = %err, "logpoint evaluation failed");
                    HitOutcome::Log(format!("logpoint evaluation failed: {err}"))
                }
            };
        }

        HitOutcome::Break
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp_at(position: Position) -> Breakpoint {
        Breakpoint {
            source: "main.js".to_string(),
            position,
            condition: None,
            hit_condition: None,
            log_message: None,
            hit_count: 0,
        }
    }

    fn no_eval(_: &str) -> Result<Value> {
        panic!("evaluator should not be called");
    }

    #[test]
    fn test_hit_condition_parsing() {
        assert_eq!(HitCondition::parse("3"), Some(HitCondition::Eq(3)));
        assert_eq!(HitCondition::parse("== 3"), Some(HitCondition::Eq(3)));
        assert_eq!(HitCondition::parse("= 3"), Some(HitCondition::Eq(3)));
        assert_eq!(HitCondition::parse(">= 2"), Some(HitCondition::Ge(2)));
        assert_eq!(HitCondition::parse("> 2"), Some(HitCondition::Gt(2)));
        assert_eq!(HitCondition::parse("% 4"), Some(HitCondition::Mod(4)));
        assert_eq!(HitCondition::parse("nope"), None);
    }

    #[test]
    fn test_plain_breakpoint_breaks() {
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        table.set(bp_at(pos));
        let outcome = table.evaluate_hit("main.js", pos, Some(pos), &no_eval);
        assert_eq!(outcome, HitOutcome::Break);
        assert_eq!(table.lookup("main.js", pos).unwrap().hit_count, 1);
    }

    #[test]
    fn test_no_breakpoint_reference_continues() {
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        table.set(bp_at(pos));
        let outcome = table.evaluate_hit("main.js", pos, None, &no_eval);
        assert_eq!(outcome, HitOutcome::Continue);
        assert_eq!(table.lookup("main.js", pos).unwrap().hit_count, 0);
    }

    #[test]
    fn test_hit_condition_gates_break() {
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        let mut bp = bp_at(pos);
        bp.hit_condition = HitCondition::parse(">= 2");
        table.set(bp);
        assert_eq!(
            table.evaluate_hit("main.js", pos, Some(pos), &no_eval),
            HitOutcome::Continue
        );
        assert_eq!(
            table.evaluate_hit("main.js", pos, Some(pos), &no_eval),
            HitOutcome::Break
        );
        assert_eq!(
            table.evaluate_hit("main.js", pos, Some(pos), &no_eval),
            HitOutcome::Break
        );
    }

    #[test]
    fn test_logpoint_never_breaks() {
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        let mut bp = bp_at(pos);
        bp.log_message = Some("\"x\"".to_string());
        table.set(bp);
        let outcome = table.evaluate_hit("main.js", pos, Some(pos), &|_| {
            Ok(Value::Str("x".to_string()))
        });
        assert_eq!(outcome, HitOutcome::Log("x".to_string()));
    }

    #[test]
    fn test_hit_condition_before_log_message() {
        // A logpoint with a hit condition logs only when the predicate fires.
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        let mut bp = bp_at(pos);
        bp.hit_condition = HitCondition::parse(">= 2");
        bp.log_message = Some("\"x\"".to_string());
        table.set(bp);
        assert_eq!(
            table.evaluate_hit("main.js", pos, Some(pos), &no_eval),
            HitOutcome::Continue
        );
        let outcome = table.evaluate_hit("main.js", pos, Some(pos), &|_| {
            Ok(Value::Str("x".to_string()))
        });
        assert_eq!(outcome, HitOutcome::Log("x".to_string()));
    }

    #[test]
    fn test_overwrite_on_same_coordinates() {
        let mut table = BreakpointTable::new();
        let pos = Position::new(1, 0);
        let mut first = bp_at(pos);
        first.hit_count = 5;
        table.set(first);
        table.set(bp_at(pos));
        assert_eq!(table.lookup("main.js", pos).unwrap().hit_count, 0);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut table = BreakpointTable::new();
        table.set(bp_at(Position::new(1, 0)));
        table.clear();
        assert!(table.is_empty());
        table.clear();
        assert!(table.is_empty());
    }
}
