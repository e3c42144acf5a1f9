//! Resource amounts and resource-kind bitmasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a resource definition in the catalog.
pub type ResourceKind = u8;

pub const MAX_RESOURCE_KINDS: usize = 32;

/// Sparse per-kind amounts. Missing kinds read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources(BTreeMap<ResourceKind, i64>);

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ResourceKind) -> i64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: ResourceKind, amount: i64) {
        if amount == 0 {
            self.0.remove(&kind);
        } else {
            self.0.insert(kind, amount);
        }
    }

    pub fn add(&mut self, kind: ResourceKind, amount: i64) {
        self.set(kind, self.get(kind) + amount);
    }

    pub fn with(mut self, kind: ResourceKind, amount: i64) -> Self {
        self.set(kind, amount);
        self
    }

    pub fn add_all(&mut self, other: &Resources) {
        for (&k, &v) in &other.0 {
            self.add(k, v);
        }
    }

    pub fn sub_all(&mut self, other: &Resources) {
        for (&k, &v) in &other.0 {
            self.add(k, -v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Non-zero entries in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, i64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    /// Kinds where `self` holds less than `cost`.
    pub fn shortfall(&self, cost: &Resources) -> ResourceMask {
        let mut mask = ResourceMask::default();
        for (kind, amount) in cost.iter() {
            if amount > 0 && self.get(kind) < amount {
                mask.insert(kind);
            }
        }
        mask
    }

    pub fn covers(&self, cost: &Resources) -> bool {
        self.shortfall(cost).is_empty()
    }
}

impl FromIterator<(ResourceKind, i64)> for Resources {
    fn from_iter<I: IntoIterator<Item = (ResourceKind, i64)>>(iter: I) -> Self {
        let mut r = Resources::new();
        for (k, v) in iter {
            r.add(k, v);
        }
        r
    }
}

/// Bitmask of resource kinds, e.g. the kinds currently blocking production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMask(pub u32);

impl ResourceMask {
    pub fn insert(&mut self, kind: ResourceKind) {
        if (kind as usize) < MAX_RESOURCE_KINDS {
            self.0 |= 1 << kind;
        }
    }

    pub fn contains(self, kind: ResourceKind) -> bool {
        (kind as usize) < MAX_RESOURCE_KINDS && self.0 & (1 << kind) != 0
    }

    pub fn union(self, other: ResourceMask) -> ResourceMask {
        ResourceMask(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn iter(self) -> impl Iterator<Item = ResourceKind> {
        (0..MAX_RESOURCE_KINDS as u8).filter(move |&k| self.contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_mask() {
        let stock = Resources::new().with(0, 100).with(1, 5);
        let cost = Resources::new().with(0, 50).with(1, 10).with(2, 1);
        let mask = stock.shortfall(&cost);
        assert!(!mask.contains(0));
        assert!(mask.contains(1));
        assert!(mask.contains(2));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_zero_entries_are_dropped() {
        let mut r = Resources::new().with(3, 10);
        r.add(3, -10);
        assert!(r.is_empty());
        assert_eq!(r.get(3), 0);
    }
}
