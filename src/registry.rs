use std::collections::HashMap;

use crate::error::MetricsError;

/// Separator between the segments of a metric key
pub const KEY_DELIMITER: char = '.';

/// Rejects empty keys and keys with an empty segment (`"a..b"`, `".a"`, `"a."`)
pub fn validate_key(key: &str) -> Result<(), MetricsError> {
    if key.is_empty() || key.split(KEY_DELIMITER).any(str::is_empty) {
        return Err(MetricsError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Flat key -> value store for a single iteration.
///
/// Iteration order is first-insertion order. Writing an existing key
/// replaces its value but keeps its position.
#[derive(Debug, Default, Clone)]
pub struct MetricRegistry {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) -> Result<(), MetricsError> {
        let key = key.into();
        validate_key(&key)?;
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Takes every entry out, leaving the registry empty
    pub fn drain(&mut self) -> Vec<(String, f64)> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_keeps_position() {
        let mut registry = MetricRegistry::new();
        registry.insert("b.x", 1.0).unwrap();
        registry.insert("a.y", 2.0).unwrap();
        registry.insert("b.x", 3.0).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b.x"), Some(3.0));
        let keys: Vec<&str> = registry.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b.x", "a.y"]);
    }

    #[test]
    fn test_rejects_empty_segments() {
        let mut registry = MetricRegistry::new();
        for bad in ["", "a..b", ".a", "a.", "."] {
            assert!(
                matches!(registry.insert(bad, 1.0), Err(MetricsError::InvalidKey(_))),
                "key {:?} should be rejected",
                bad
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_non_finite_values_are_stored() {
        let mut registry = MetricRegistry::new();
        registry.insert("loss", f64::NAN).unwrap();
        registry.insert("grad", f64::INFINITY).unwrap();
        assert!(registry.get("loss").unwrap().is_nan());
        assert_eq!(registry.get("grad"), Some(f64::INFINITY));
    }

    #[test]
    fn test_drain_empties() {
        let mut registry = MetricRegistry::new();
        registry.insert("a", 1.0).unwrap();
        registry.insert("b", 2.0).unwrap();

        let drained = registry.drain();
        assert_eq!(drained, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
        assert!(registry.is_empty());
        assert!(!registry.contains("a"));

        registry.insert("a", 5.0).unwrap();
        assert_eq!(registry.iter().collect::<Vec<_>>(), vec![("a", 5.0)]);
    }
}
