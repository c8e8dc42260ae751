use std::{any::Any, fmt, sync::Arc};

use crate::component::{
    component::EntityComponent,
    component_kind::ComponentKind,
};

/// Predicate over one component type's value.
///
/// Filters travel inside [`EntityCriteria`](crate::EntityCriteria), so they
/// must be structurally comparable: two criteria are interchangeable iff
/// their filters are `filter_eq`. Closures are therefore excluded; concrete
/// filters carry fn-pointer predicates and named fields only.
pub trait ComponentFilter: fmt::Debug + Send + Sync {
    /// The component type this filter evaluates.
    fn kind(&self) -> ComponentKind;

    /// Evaluates the predicate against a component value.
    ///
    /// # Panics
    ///
    /// Panics if `component` is not of the filter's type; a mismatched value
    /// inside a criteria slot means the entity view is corrupted.
    fn evaluate(&self, component: &dyn EntityComponent) -> bool;

    fn filter_eq(&self, other: &dyn ComponentFilter) -> bool;

    fn as_any(&self) -> &dyn Any;
}

// PredicateFilter
//
// A named fn-pointer predicate over one concrete component type. The name
// participates in equality so that two distinct predicates with the same
// pointer-by-coincidence never compare equal across builds.
pub struct PredicateFilter<T: EntityComponent> {
    name: &'static str,
    predicate: fn(&T) -> bool,
}

impl<T: EntityComponent> PredicateFilter<T> {
    pub fn new(name: &'static str, predicate: fn(&T) -> bool) -> Self {
        Self { name, predicate }
    }

    /// Boxed form, ready to drop into a criteria slot.
    pub fn shared(name: &'static str, predicate: fn(&T) -> bool) -> Arc<dyn ComponentFilter> {
        Arc::new(Self::new(name, predicate))
    }
}

impl<T: EntityComponent> ComponentFilter for PredicateFilter<T> {
    fn kind(&self) -> ComponentKind {
        ComponentKind::of::<T>()
    }

    fn evaluate(&self, component: &dyn EntityComponent) -> bool {
        let Some(concrete) = component.as_any().downcast_ref::<T>() else {
            panic!(
                "filter '{}' evaluated against component of kind {:?}, expected {:?}",
                self.name,
                component.kind(),
                ComponentKind::of::<T>()
            );
        };
        (self.predicate)(concrete)
    }

    fn filter_eq(&self, other: &dyn ComponentFilter) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.name == other.name && self.predicate == other.predicate
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: EntityComponent> fmt::Debug for PredicateFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PredicateFilter({}, {})", ComponentKind::of::<T>().name(), self.name)
    }
}

// AndFilter / OrFilter
//
// Combinators over filters of one shared component kind.
#[derive(Clone)]
pub struct AndFilter {
    kind: ComponentKind,
    operands: Vec<Arc<dyn ComponentFilter>>,
}

impl AndFilter {
    /// # Panics
    ///
    /// Panics if `operands` is empty or mixes component kinds.
    pub fn new(operands: Vec<Arc<dyn ComponentFilter>>) -> Self {
        let kind = combined_kind("AndFilter", &operands);
        Self { kind, operands }
    }
}

impl ComponentFilter for AndFilter {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn evaluate(&self, component: &dyn EntityComponent) -> bool {
        self.operands.iter().all(|f| f.evaluate(component))
    }

    fn filter_eq(&self, other: &dyn ComponentFilter) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        operands_eq(&self.operands, &other.operands)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for AndFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("AndFilter").field(&self.operands).finish()
    }
}

#[derive(Clone)]
pub struct OrFilter {
    kind: ComponentKind,
    operands: Vec<Arc<dyn ComponentFilter>>,
}

impl OrFilter {
    /// # Panics
    ///
    /// Panics if `operands` is empty or mixes component kinds.
    pub fn new(operands: Vec<Arc<dyn ComponentFilter>>) -> Self {
        let kind = combined_kind("OrFilter", &operands);
        Self { kind, operands }
    }
}

impl ComponentFilter for OrFilter {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn evaluate(&self, component: &dyn EntityComponent) -> bool {
        self.operands.iter().any(|f| f.evaluate(component))
    }

    fn filter_eq(&self, other: &dyn ComponentFilter) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        operands_eq(&self.operands, &other.operands)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for OrFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("OrFilter").field(&self.operands).finish()
    }
}

fn combined_kind(combinator: &str, operands: &[Arc<dyn ComponentFilter>]) -> ComponentKind {
    let Some(first) = operands.first() else {
        panic!("{} requires at least one operand", combinator);
    };
    let kind = first.kind();
    for operand in &operands[1..] {
        if operand.kind() != kind {
            panic!(
                "{} mixes component kinds {:?} and {:?}",
                combinator,
                kind,
                operand.kind()
            );
        }
    }
    kind
}

fn operands_eq(a: &[Arc<dyn ComponentFilter>], b: &[Arc<dyn ComponentFilter>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.filter_eq(y.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component;

    #[derive(Debug, Clone, PartialEq)]
    struct Power(i32);
    component!(Power);

    fn positive(p: &Power) -> bool {
        p.0 > 0
    }

    fn small(p: &Power) -> bool {
        p.0 < 10
    }

    #[test]
    fn predicate_filter_evaluates() {
        let filter = PredicateFilter::new("positive", positive);
        assert!(filter.evaluate(&Power(5)));
        assert!(!filter.evaluate(&Power(-5)));
    }

    #[test]
    fn predicate_filter_equality_is_structural() {
        let a = PredicateFilter::new("positive", positive);
        let b = PredicateFilter::new("positive", positive);
        let c = PredicateFilter::new("small", small);
        assert!(a.filter_eq(&b));
        assert!(!a.filter_eq(&c));
    }

    #[test]
    fn and_or_combinators() {
        let and = AndFilter::new(vec![
            PredicateFilter::shared("positive", positive),
            PredicateFilter::shared("small", small),
        ]);
        assert!(and.evaluate(&Power(5)));
        assert!(!and.evaluate(&Power(50)));

        let or = OrFilter::new(vec![
            PredicateFilter::shared("positive", positive),
            PredicateFilter::shared("small", small),
        ]);
        assert!(or.evaluate(&Power(50)));
        assert!(or.evaluate(&Power(-50)));
    }

    #[test]
    #[should_panic]
    fn wrong_component_type_fails_fast() {
        #[derive(Debug, Clone)]
        struct Label(&'static str);
        component!(Label);

        let filter = PredicateFilter::new("positive", positive);
        filter.evaluate(&Label("nope"));
    }
}
