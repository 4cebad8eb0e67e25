//! Per-instance memo of resolved exports

use std::collections::HashMap;

/// Maps export names to resolved handles.
///
/// Misses are memoized too: an instance's exports never change, so a name that
/// did not resolve once never will.
#[derive(Debug)]
pub struct AccessorCache<H> {
    entries: HashMap<String, Option<H>>,
}

impl<H: Clone> AccessorCache<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Return the memoized handle for `name`, resolving it on first lookup.
    pub fn get_or_resolve<F>(&mut self, name: &str, resolve: F) -> Option<H>
    where
        F: FnOnce(&str) -> Option<H>,
    {
        if let Some(entry) = self.entries.get(name) {
            return entry.clone();
        }
        let handle = resolve(name);
        self.entries.insert(name.to_string(), handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Clone> Default for AccessorCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_once_per_name() {
        let mut cache = AccessorCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let handle = cache.get_or_resolve("add", |name| {
                calls += 1;
                Some(name.len())
            });
            assert_eq!(handle, Some(3));
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn memoizes_missing_exports() {
        let mut cache: AccessorCache<u32> = AccessorCache::new();
        let mut calls = 0;

        assert_eq!(cache.get_or_resolve("nope", |_| { calls += 1; None }), None);
        assert_eq!(cache.get_or_resolve("nope", |_| { calls += 1; Some(1) }), None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn starts_empty() {
        let cache: AccessorCache<u32> = AccessorCache::default();
        assert!(cache.is_empty());
    }
}
