use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKey {
    Sma(usize),
}

/// Memoized indicator series for one historical window. Shared by every
/// worker evaluating against that window, so candidates with the same
/// period compute the series once.
#[derive(Debug)]
pub struct IndicatorCache {
    data: Mutex<HashMap<IndicatorKey, Arc<[Option<f64>]>>>,
    capacity: usize,
}

impl IndicatorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<Arc<[Option<f64>]>> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.get(key).cloned()
    }

    pub fn set(&self, key: IndicatorKey, value: Arc<[Option<f64>]>) {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        if data.len() >= self.capacity && !data.contains_key(&key) {
            // Simple eviction: clear the cache when full.
            data.clear();
        }
        data.insert(key, value);
    }

    /// Return the cached series or compute and store it. The lock is not held
    /// while computing; two workers racing on the same key produce identical
    /// series, so the second insert is harmless.
    pub fn get_or_compute<F>(&self, key: IndicatorKey, compute: F) -> Result<Arc<[Option<f64>]>>
    where
        F: FnOnce() -> Result<Vec<Option<f64>>>,
    {
        if let Some(series) = self.get(&key) {
            return Ok(series);
        }
        let series: Arc<[Option<f64>]> = compute()?.into();
        self.set(key, Arc::clone(&series));
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_per_key() {
        let cache = IndicatorCache::new(4);
        let mut calls = 0;
        let first = cache.get_or_compute(IndicatorKey::Sma(3), || {
            calls += 1;
            Ok(vec![None, None, Some(2.0)])
        })
        .unwrap();
        let second = cache.get_or_compute(IndicatorKey::Sma(3), || {
            calls += 1;
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn clears_when_full() {
        let cache = IndicatorCache::new(2);
        cache.set(IndicatorKey::Sma(1), vec![Some(1.0)].into());
        cache.set(IndicatorKey::Sma(2), vec![Some(2.0)].into());
        cache.set(IndicatorKey::Sma(3), vec![Some(3.0)].into());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&IndicatorKey::Sma(3)).is_some());
    }
}
