use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Sparse `key -> f64` estimate. Keys that were never written read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable<K: Eq + Hash> {
    values: HashMap<K, f64>,
}

impl<K: Eq + Hash> Default for ValueTable<K> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> ValueTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every key in `keys` explicitly set to `0.0`.
    pub fn zeros(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            values: keys.into_iter().map(|k| (k, 0.)).collect(),
        }
    }

    pub fn get(&self, k: K) -> f64 {
        self.values.get(&k).copied().unwrap_or(0.)
    }

    pub fn set(&mut self, k: K, v: f64) {
        self.values.insert(k, v);
    }

    pub fn contains(&self, k: K) -> bool {
        self.values.contains_key(&k)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}

impl<K: Copy + Eq + Hash> FromIterator<(K, f64)> for ValueTable<K> {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Count and running mean of the returns observed for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    pub count: usize,
    pub mean: f64,
}

impl RunningMean {
    pub fn push(&mut self, g: f64) -> f64 {
        self.count += 1;
        self.mean += (g - self.mean) / self.count as f64;
        self.mean
    }
}

/// Returns accumulator keyed by (state, action) or by state.
#[derive(Debug, Clone, PartialEq)]
pub struct Returns<K: Eq + Hash> {
    stats: HashMap<K, RunningMean>,
}

impl<K: Eq + Hash> Default for Returns<K> {
    fn default() -> Self {
        Self {
            stats: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Returns<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `g` for `k` and returns the updated mean.
    pub fn push(&mut self, k: K, g: f64) -> f64 {
        self.stats.entry(k).or_default().push(g)
    }

    pub fn mean(&self, k: K) -> f64 {
        self.stats.get(&k).map_or(0., |m| m.mean)
    }

    pub fn count(&self, k: K) -> usize {
        self.stats.get(&k).map_or(0, |m| m.count)
    }

    pub fn get(&self, k: K) -> Option<&RunningMean> {
        self.stats.get(&k)
    }

    pub fn insert(&mut self, k: K, m: RunningMean) {
        self.stats.insert(k, m);
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, RunningMean)> + '_ {
        self.stats.iter().map(|(&k, &m)| (k, m))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rstest::rstest;

    #[test]
    fn missing_keys_read_as_zero() {
        let mut v = ValueTable::new();
        assert_eq!(v.get((1, 2)), 0.);
        assert!(!v.contains((1, 2)));

        v.set((1, 2), -0.5);
        assert_eq!(v.get((1, 2)), -0.5);
        assert_eq!(v.get((2, 1)), 0.);
    }

    #[rstest]
    #[case(vec![1.])]
    #[case(vec![-3., 5.])]
    #[case(vec![0.1, 0.2, 0.3, -7.25, 12.5])]
    #[case((0..1000).map(|i| (i as f64).sin() * 10.).collect())]
    fn incremental_mean_matches_arithmetic_mean(#[case] gs: Vec<f64>) {
        let mut m = RunningMean::default();
        for &g in &gs {
            m.push(g);
        }

        let expected = gs.iter().sum::<f64>() / gs.len() as f64;
        assert_eq!(m.count, gs.len());
        assert_float_eq!(m.mean, expected, abs <= 1e-9);
    }

    #[test]
    fn returns_default_to_zero_mean_and_count() {
        let mut r = Returns::new();
        assert_eq!(r.count("a"), 0);
        assert_eq!(r.mean("a"), 0.);

        r.push("a", 2.);
        r.push("a", 4.);
        assert_eq!(r.count("a"), 2);
        assert_float_eq!(r.mean("a"), 3., abs <= 1e-12);
        assert_eq!(r.count("b"), 0);
    }
}
