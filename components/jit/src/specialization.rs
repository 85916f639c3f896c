//! Type-specialized compilation variants, cached per route.

use std::collections::BTreeMap;

/// A variable-name-to-type-name assignment identifying one specialized
/// variant of a route. `BTreeMap` gives a stable iteration/comparison
/// order so two assignments with the same entries always compare equal
/// regardless of insertion order.
pub type TypeAssignment = BTreeMap<String, String>;

/// One cached type-specialized compile of a route.
#[derive(Debug, Clone)]
pub struct TypeSpecialization {
    /// The route this specialization belongs to.
    pub route: String,
    /// The type assignment this variant was compiled for.
    pub type_assignment: TypeAssignment,
    /// The specialized bytecode.
    pub bytecode: Vec<u8>,
    /// Number of times this specialization served a lookup.
    pub hit_count: u64,
    /// Number of times a lookup for this assignment missed (before it
    /// existed, or while invalidated).
    pub miss_count: u64,
    /// Whether this specialization is still usable. Cleared (not
    /// removed) by deoptimization so its history survives.
    pub valid: bool,
}

/// The per-route-bounded cache of type specializations.
#[derive(Debug, Clone)]
pub struct SpecializationCache {
    max_per_route: usize,
    entries: std::collections::HashMap<String, Vec<TypeSpecialization>>,
}

impl SpecializationCache {
    /// A cache bounding each route to `max_per_route` entries.
    pub fn new(max_per_route: usize) -> Self {
        SpecializationCache {
            max_per_route,
            entries: std::collections::HashMap::new(),
        }
    }

    /// Looks up a valid specialization for `(route, types)`, bumping its
    /// hit count on success.
    pub fn get(&mut self, route: &str, types: &TypeAssignment) -> Option<Vec<u8>> {
        let variants = self.entries.get_mut(route)?;
        let entry = variants
            .iter_mut()
            .find(|v| v.valid && &v.type_assignment == types)?;
        entry.hit_count += 1;
        Some(entry.bytecode.clone())
    }

    /// Inserts a freshly compiled specialization, evicting the
    /// least-used valid entry first if the route is already at capacity.
    pub fn insert(&mut self, route: &str, types: TypeAssignment, bytecode: Vec<u8>) {
        let variants = self.entries.entry(route.to_string()).or_default();
        if variants.len() >= self.max_per_route {
            if let Some(evict_idx) = variants
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.hit_count)
                .map(|(i, _)| i)
            {
                variants.remove(evict_idx);
            }
        }
        variants.push(TypeSpecialization {
            route: route.to_string(),
            type_assignment: types,
            bytecode,
            hit_count: 0,
            miss_count: 0,
            valid: true,
        });
    }

    /// Clears the validity flag on every specialization for `route`,
    /// without removing them (their hit/miss history is preserved).
    pub fn invalidate_route(&mut self, route: &str) {
        if let Some(variants) = self.entries.get_mut(route) {
            for variant in variants {
                variant.valid = false;
            }
        }
    }

    /// Removes every specialization for `route` outright.
    pub fn clear_route(&mut self, route: &str) {
        self.entries.remove(route);
    }

    /// Removes every cached specialization for every route.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Every specialization currently held, across all routes.
    pub fn all(&self) -> impl Iterator<Item = &TypeSpecialization> {
        self.entries.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(pairs: &[(&str, &str)]) -> TypeAssignment {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn hit_then_miss_on_different_assignment() {
        let mut cache = SpecializationCache::new(5);
        let assignment = types(&[("x", "int")]);
        cache.insert("route", assignment.clone(), vec![1]);
        assert_eq!(cache.get("route", &assignment), Some(vec![1]));
        let other = types(&[("x", "string")]);
        assert_eq!(cache.get("route", &other), None);
    }

    #[test]
    fn eviction_removes_least_used_entry() {
        let mut cache = SpecializationCache::new(2);
        let a = types(&[("x", "int")]);
        let b = types(&[("x", "float")]);
        let c = types(&[("x", "bool")]);
        cache.insert("route", a.clone(), vec![1]);
        cache.insert("route", b.clone(), vec![2]);
        cache.get("route", &b); // b now has a hit, a has none
        cache.insert("route", c.clone(), vec![3]);
        assert_eq!(cache.get("route", &a), None);
        assert!(cache.get("route", &b).is_some());
        assert!(cache.get("route", &c).is_some());
    }

    #[test]
    fn invalidation_hides_without_deleting() {
        let mut cache = SpecializationCache::new(5);
        let assignment = types(&[("x", "int")]);
        cache.insert("route", assignment.clone(), vec![1]);
        cache.invalidate_route("route");
        assert_eq!(cache.get("route", &assignment), None);
        assert_eq!(cache.all().count(), 1);
    }
}
