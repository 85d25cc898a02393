//! Compiled-expression cache shared by every operation run.
//!
//! Programs are keyed by expression text plus the [`EnvShape`] of the
//! environment they were compiled for, so structurally similar inputs reuse
//! the same program.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mockgrid_core::item::Data;
use mockgrid_core::{BuiltinEngine, EnvShape, ExprError, ExpressionEngine, Program};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

type CacheKey = (String, EnvShape);

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ProgramCache {
    engine: Arc<dyn ExpressionEngine>,
    programs: RwLock<HashMap<CacheKey, Arc<dyn Program>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinEngine))
    }
}

impl ProgramCache {
    #[must_use]
    pub fn new(engine: Arc<dyn ExpressionEngine>) -> Self {
        Self {
            engine,
            programs: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Returns the program for `source` compiled against the shape of `env`,
    /// compiling and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns the engine's [`ExprError`] if compilation fails. Failures are
    /// not cached.
    pub fn get_or_compile(&self, source: &str, env: &Data) -> Result<Arc<dyn Program>, ExprError> {
        let key = (source.to_string(), EnvShape::of(env));

        if let Some(program) = self.programs.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(program));
        }

        let mut programs = self.programs.write();
        // Another caller may have compiled it between the two locks.
        if let Some(program) = programs.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(program));
        }
        let program = self.engine.compile(source, &key.1)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            expression = source,
            shape = %key.1.signature(),
            engine = self.engine.name(),
            "expression compiled"
        );
        programs.insert(key, Arc::clone(&program));
        Ok(program)
    }

    /// Compiles (or reuses) and runs `source` against `env`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] if compilation or evaluation fails.
    pub fn evaluate(&self, source: &str, env: &Data) -> Result<Value, ExprError> {
        self.get_or_compile(source, env)?.run(env)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }

    pub fn clear(&self) {
        self.programs.write().clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn env(v: Value) -> Data {
        v.as_object().cloned().unwrap()
    }

    /// Engine wrapper that counts compilations.
    #[derive(Default)]
    struct CountingEngine {
        compiles: AtomicUsize,
    }

    impl ExpressionEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn compile(&self, source: &str, shape: &EnvShape) -> Result<Arc<dyn Program>, ExprError> {
            self.compiles.fetch_add(1, Ordering::Relaxed);
            BuiltinEngine.compile(source, shape)
        }
    }

    #[test]
    fn same_shape_reuses_program() {
        let engine = Arc::new(CountingEngine::default());
        let cache = ProgramCache::new(engine.clone());

        assert_eq!(cache.evaluate("x + 1", &env(json!({"x": 1}))).unwrap(), json!(2));
        assert_eq!(cache.evaluate("x + 1", &env(json!({"x": 41}))).unwrap(), json!(42));

        assert_eq!(engine.compiles.load(Ordering::Relaxed), 1);
        let stats = cache.stats();
        assert_eq!(stats, CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn different_shape_compiles_again() {
        let engine = Arc::new(CountingEngine::default());
        let cache = ProgramCache::new(engine.clone());

        cache.evaluate("x", &env(json!({"x": 1}))).unwrap();
        cache.evaluate("x", &env(json!({"x": "one"}))).unwrap();
        cache.evaluate("x", &env(json!({"x": 1, "y": 2}))).unwrap();

        assert_eq!(engine.compiles.load(Ordering::Relaxed), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ProgramCache::default();
        let e = env(json!({"x": 1}));
        assert!(cache.evaluate("missing + 1", &e).is_err());
        assert!(cache.evaluate("x +", &e).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.engine_name(), "builtin");
    }

    #[test]
    fn concurrent_lookups_compile_once() {
        let engine = Arc::new(CountingEngine::default());
        let cache = ProgramCache::new(engine.clone());
        std::thread::scope(|s| {
            for i in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    let e = env(json!({"n": i}));
                    assert_eq!(cache.evaluate("n * 2", &e).unwrap(), json!(i * 2));
                });
            }
        });
        assert_eq!(engine.compiles.load(Ordering::Relaxed), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
