use crate::abstract_plants::Dominance;
use crate::scheme::{CrossingScheme, CrossingSchemeDescriptor};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Objects that are compared on the frontier through a descriptor.
pub trait Describe {
    type Descriptor;

    fn describe(&self) -> Self::Descriptor;
}

impl Describe for CrossingScheme {
    type Descriptor = CrossingSchemeDescriptor;

    fn describe(&self) -> CrossingSchemeDescriptor {
        self.descriptor()
    }
}

/// `x` dominates `y` when it is no worse on every objective and strictly better on one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDominance;

impl Dominance<CrossingSchemeDescriptor> for DefaultDominance {
    fn dom(&self, x: &CrossingSchemeDescriptor, y: &CrossingSchemeDescriptor) -> bool {
        let no_worse = x.num_generations <= y.num_generations
            && x.total_pop_size <= y.total_pop_size
            && x.max_pop_per_generation <= y.max_pop_per_generation
            && x.linkage_phase_ambiguity <= y.linkage_phase_ambiguity
            && x.num_crossings <= y.num_crossings
            && x.max_crossings_with_plant <= y.max_crossings_with_plant;
        no_worse
            && (x.num_generations < y.num_generations
                || x.total_pop_size < y.total_pop_size
                || x.max_pop_per_generation < y.max_pop_per_generation
                || x.linkage_phase_ambiguity < y.linkage_phase_ambiguity
                || x.num_crossings < y.num_crossings
                || x.max_crossings_with_plant < y.max_crossings_with_plant)
    }
}

/// Set of mutually non-dominated objects.
///
/// All operations hold a single lock, so registrations from several workers are serialised
/// and no member ever dominates another.
pub struct ParetoFrontier<T: Describe> {
    dominance: Arc<dyn Dominance<T::Descriptor>>,
    members: Mutex<Vec<Arc<T>>>,
}

impl<T: Describe + PartialEq> std::fmt::Debug for ParetoFrontier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParetoFrontier")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Describe + PartialEq> ParetoFrontier<T> {
    pub fn new(dominance: Arc<dyn Dominance<T::Descriptor>>) -> Self {
        Self {
            dominance,
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn dominance(&self) -> &Arc<dyn Dominance<T::Descriptor>> {
        &self.dominance
    }

    /// Adds `object` unless an incumbent dominates it or an equal object is already present.
    /// Incumbents dominated by `object` are evicted in the same sweep.
    pub fn register(&self, object: Arc<T>) -> bool {
        let descriptor = object.describe();
        let mut members = self.members.lock();
        let mut dominated = false;
        let mut i = 0;
        while !dominated && i < members.len() {
            let other = members[i].describe();
            dominated = self.dominance.dom(&other, &descriptor);
            if self.dominance.dom(&descriptor, &other) {
                members.swap_remove(i);
            } else {
                i += 1;
            }
        }
        if dominated || members.iter().any(|m| m.as_ref() == object.as_ref()) {
            return false;
        }
        members.push(object);
        true
    }

    pub fn register_all(&self, objects: impl IntoIterator<Item = Arc<T>>) -> bool {
        objects
            .into_iter()
            .fold(true, |ok, object| self.register(object) && ok)
    }

    pub fn dominated_by_registered(&self, descriptor: &T::Descriptor) -> bool {
        self.members
            .lock()
            .iter()
            .any(|m| self.dominance.dom(&m.describe(), descriptor))
    }

    pub fn contains(&self, object: &T) -> bool {
        self.members.lock().iter().any(|m| m.as_ref() == object)
    }

    /// Snapshot of the current members.
    pub fn members(&self) -> Vec<Arc<T>> {
        self.members.lock().clone()
    }

    pub fn into_members(self) -> Vec<Arc<T>> {
        self.members.into_inner()
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl ParetoFrontier<CrossingScheme> {
    pub fn grouped_by_generations(&self) -> BTreeMap<usize, Vec<Arc<CrossingScheme>>> {
        let mut grouped: BTreeMap<usize, Vec<_>> = BTreeMap::new();
        for s in self.members() {
            grouped.entry(s.num_generations()).or_default().push(s);
        }
        grouped
    }
}
