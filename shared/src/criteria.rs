use std::{fmt, sync::Arc};

use crate::{
    component::component::{EntityComponent, ComponentValue},
    component::component_kind::ComponentKind,
    component::filter::ComponentFilter,
    entity::entity::Entity,
};

// EntityCriteria
//
// Ordered mapping from component kind to optional filter predicate. Defines
// both the belongs-to-set test and the retrieval kind list of an entity set.
// Two criteria are structurally equal iff they name the same kinds in the
// same order with equal filters.
#[derive(Clone, Default)]
pub struct EntityCriteria {
    slots: Vec<CriteriaSlot>,
}

#[derive(Clone)]
struct CriteriaSlot {
    kind: ComponentKind,
    filter: Option<Arc<dyn ComponentFilter>>,
}

impl EntityCriteria {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Adds an unfiltered slot for component type `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` already has a slot; one slot per kind.
    pub fn with<T: EntityComponent>(self) -> Self {
        self.add_slot(ComponentKind::of::<T>(), None)
    }

    /// Adds a filtered slot; the kind comes from the filter itself.
    ///
    /// # Panics
    ///
    /// Panics if the filter's kind already has a slot.
    pub fn with_filter(self, filter: Arc<dyn ComponentFilter>) -> Self {
        let kind = filter.kind();
        self.add_slot(kind, Some(filter))
    }

    fn add_slot(mut self, kind: ComponentKind, filter: Option<Arc<dyn ComponentFilter>>) -> Self {
        if self.index_of(kind).is_some() {
            panic!("criteria already contains a slot for {:?}", kind);
        }
        self.slots.push(CriteriaSlot { kind, filter });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.slots.iter().map(|s| s.kind)
    }

    /// Kind list as a shareable slice, for aligning entity views.
    pub fn kind_list(&self) -> Arc<[ComponentKind]> {
        Arc::from(self.kinds().collect::<Vec<_>>())
    }

    pub fn kind_at(&self, index: usize) -> ComponentKind {
        self.slots[index].kind
    }

    pub fn index_of(&self, kind: ComponentKind) -> Option<usize> {
        self.slots.iter().position(|s| s.kind == kind)
    }

    pub fn filter_at(&self, index: usize) -> Option<&dyn ComponentFilter> {
        self.slots[index].filter.as_deref()
    }

    /// True when `value` passes slot `index`'s filter (or the slot has none).
    pub fn slot_matches(&self, index: usize, value: &ComponentValue) -> bool {
        match &self.slots[index].filter {
            Some(filter) => filter.evaluate(value.as_component()),
            None => true,
        }
    }

    /// Full membership test: every slot populated and filter-passing.
    pub fn entity_matches(&self, entity: &Entity) -> bool {
        for slot in &self.slots {
            let Some(value) = entity.value(slot.kind) else {
                return false;
            };
            if let Some(filter) = &slot.filter {
                if !filter.evaluate(value.as_component()) {
                    return false;
                }
            }
        }
        true
    }

    /// True when the two criteria name the same kinds in the same order,
    /// regardless of filters. Filter resets require this to hold.
    pub fn same_kinds(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .kinds()
                .zip(other.kinds())
                .all(|(a, b)| a == b)
    }
}

impl PartialEq for EntityCriteria {
    fn eq(&self, other: &Self) -> bool {
        if !self.same_kinds(other) {
            return false;
        }
        self.slots
            .iter()
            .zip(&other.slots)
            .all(|(a, b)| match (&a.filter, &b.filter) {
                (None, None) => true,
                (Some(x), Some(y)) => x.filter_eq(y.as_ref()),
                _ => false,
            })
    }
}

impl fmt::Debug for EntityCriteria {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_list();
        for slot in &self.slots {
            match &slot.filter {
                Some(filter) => list.entry(&format_args!("{:?} where {:?}", slot.kind, filter)),
                None => list.entry(&slot.kind),
            };
        }
        list.finish()
    }
}
