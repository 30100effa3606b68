//! Script registry
//!
//! Maps source ids to parsed script metadata, notably the sorted set of
//! positions a breakpoint may legally bind to. Populated when a script is
//! admitted for execution and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::engine::{Position, Program};

/// Parsed script metadata.
pub struct ScriptInfo {
    pub program: Arc<Program>,
    /// Breakpointable positions, sorted ascending.
    pub positions: Vec<Position>,
}

#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, ScriptInfo>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed script under `source_id`.
    pub fn register(&mut self, source_id: &str, program: Arc<Program>) -> Result<()> {
        if self.scripts.contains_key(source_id) {
            return Err(Error::DuplicateSource(source_id.to_string()));
        }
        let positions = program.statement_positions();
        tracing::debug!(
            source = source_id,
            positions = positions.len(),
            "registered script"
        );
        self.scripts
            .insert(source_id.to_string(), ScriptInfo { program, positions });
        Ok(())
    }

    pub fn info(&self, source_id: &str) -> Option<&ScriptInfo> {
        self.scripts.get(source_id)
    }

    /// Snap a requested breakpoint position to the nearest valid position at
    /// or after it: the least breakpointable position `>= pos`, falling
    /// forward across lines.
    pub fn snap_breakpoint(&self, source_id: &str, pos: Position) -> Result<Position> {
        let info = self
            .scripts
            .get(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?;
        info.positions
            .iter()
            .find(|p| **p >= pos)
            .copied()
            .ok_or_else(|| Error::no_breakpoint_location(source_id, pos.line, pos.column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parse;

    fn registry_with(source: &str) -> ScriptRegistry {
        let mut registry = ScriptRegistry::new();
        let program = Arc::new(parse(source).unwrap());
        registry.register("main.js", program).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_source() {
        let mut registry = registry_with("var x = 1;");
        let program = Arc::new(parse("var y = 2;").unwrap());
        assert!(matches!(
            registry.register("main.js", program),
            Err(Error::DuplicateSource(_))
        ));
    }

    #[test]
    fn test_snap_exact_position() {
        let registry = registry_with("var x = 1; var y = 2;");
        let snapped = registry
            .snap_breakpoint("main.js", Position::new(1, 11))
            .unwrap();
        assert_eq!(snapped, Position::new(1, 11));
    }

    #[test]
    fn test_snap_forward_on_line() {
        let registry = registry_with("var x = 1; var y = 2;");
        let snapped = registry
            .snap_breakpoint("main.js", Position::new(1, 3))
            .unwrap();
        assert_eq!(snapped, Position::new(1, 11));
    }

    #[test]
    fn test_snap_falls_to_next_line() {
        let registry = registry_with("var x = 1;\n\nvar y = 2;");
        let snapped = registry
            .snap_breakpoint("main.js", Position::new(2, 0))
            .unwrap();
        assert_eq!(snapped, Position::new(3, 0));
    }

    #[test]
    fn test_snap_past_end_fails() {
        let registry = registry_with("var x = 1;");
        assert!(matches!(
            registry.snap_breakpoint("main.js", Position::new(9, 0)),
            Err(Error::NoBreakpointLocation { .. })
        ));
    }

    #[test]
    fn test_unknown_source() {
        let registry = registry_with("var x = 1;");
        assert!(matches!(
            registry.snap_breakpoint("other.js", Position::new(1, 0)),
            Err(Error::UnknownSource(_))
        ));
    }

    #[test]
    fn test_snapped_position_is_breakpointable() {
        let registry = registry_with("for (var i=0;i<3;i++){ x=i; }");
        let info = registry.info("main.js").unwrap();
        let snapped = registry
            .snap_breakpoint("main.js", Position::new(1, 5))
            .unwrap();
        assert!(info.positions.contains(&snapped));
        assert_eq!(snapped, Position::new(1, 23));
    }
}
