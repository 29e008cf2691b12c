//! Traversal state shared by one root compile and every sub-compile it
//! triggers while expanding dependencies.

use log::{trace, warn};
use std::collections::HashSet;

/// Call-scoped dependency traversal state.
///
/// Created once per root compile and threaded by `&mut` through nested
/// compiles. Never shared between unrelated compiles.
#[derive(Debug, Default, Clone)]
pub struct WxmlDependencyContext {
    warnings: Vec<String>,
    dependencies: Vec<String>,
    dependency_set: HashSet<String>,
    visited: HashSet<String>,
    active: HashSet<String>,
    circular_warnings_emitted: HashSet<String>,
}

impl WxmlDependencyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Dependencies in first-encounter order, without duplicates.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Record a dependency. Returns false when it was already known.
    pub fn add_dependency(&mut self, id: &str) -> bool {
        if self.dependency_set.contains(id) {
            return false;
        }
        self.dependency_set.insert(id.to_string());
        self.dependencies.push(id.to_string());
        true
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    /// Push `id` onto the traversal stack. Returns false when it was already
    /// visited during this root compile, in which case nothing changes.
    pub fn enter(&mut self, id: &str) -> bool {
        if !self.visited.insert(id.to_string()) {
            return false;
        }
        self.active.insert(id.to_string());
        trace!("[wxml] enter {}", id);
        true
    }

    /// Pop `id` off the traversal stack once its subtree is done.
    pub fn leave(&mut self, id: &str) {
        self.active.remove(id);
        trace!("[wxml] leave {}", id);
    }

    /// Warn about the edge `from -> to` closing a cycle, once per directed edge.
    pub fn warn_circular(&mut self, from: &str, to: &str) -> bool {
        let key = format!("{}=>{}", from, to);
        if !self.circular_warnings_emitted.insert(key) {
            return false;
        }
        self.warn(format!(
            "[wxml] circular reference detected: {} -> {}",
            from, to
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_dedup_in_order() {
        let mut ctx = WxmlDependencyContext::new();
        assert!(ctx.add_dependency("/b"));
        assert!(ctx.add_dependency("/a"));
        assert!(!ctx.add_dependency("/b"));
        assert_eq!(ctx.dependencies(), &["/b".to_string(), "/a".to_string()]);
    }

    #[test]
    fn test_enter_leave() {
        let mut ctx = WxmlDependencyContext::new();
        assert!(ctx.enter("/a"));
        assert!(ctx.is_active("/a"));
        ctx.leave("/a");
        assert!(!ctx.is_active("/a"));
        assert!(ctx.is_visited("/a"));
        assert!(!ctx.enter("/a"));
        assert!(!ctx.is_active("/a"));
    }

    #[test]
    fn test_circular_warning_dedup_per_edge() {
        let mut ctx = WxmlDependencyContext::new();
        assert!(ctx.warn_circular("/a", "/b"));
        assert!(!ctx.warn_circular("/a", "/b"));
        assert!(ctx.warn_circular("/b", "/a"));
        assert_eq!(ctx.warnings().len(), 2);
    }
}
