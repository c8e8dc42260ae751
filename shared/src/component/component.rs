use std::{any::Any, fmt, sync::Arc};

use crate::component::component_kind::ComponentKind;

/// One typed, replaceable value attached to an entity.
///
/// Components are immutable per version: a mutation always replaces the whole
/// value through the store, never edits it in place. The runtime type itself
/// is the component-type key (one instance per type per entity).
///
/// Implement via the [`component!`](crate::component) macro:
///
/// ```
/// use syncra_shared::component;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Position { x: f32, y: f32 }
/// component!(Position);
/// ```
pub trait EntityComponent: Any + fmt::Debug + Send + Sync {
    fn kind(&self) -> ComponentKind;
    fn as_any(&self) -> &dyn Any;
}

/// Implements [`EntityComponent`] for a concrete component struct.
#[macro_export]
macro_rules! component {
    ($component:ty) => {
        impl $crate::EntityComponent for $component {
            fn kind(&self) -> $crate::ComponentKind {
                $crate::ComponentKind::of::<$component>()
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

// ComponentValue
//
// Shared handle to one immutable component version. Cloning is cheap; the
// same version may sit in the store, in several entity sets, and in an
// outbound message batch at once.
#[derive(Clone)]
pub struct ComponentValue(Arc<dyn EntityComponent>);

impl ComponentValue {
    pub fn new<T: EntityComponent>(component: T) -> Self {
        ComponentValue(Arc::new(component))
    }

    pub fn kind(&self) -> ComponentKind {
        self.0.kind()
    }

    pub fn as_component(&self) -> &dyn EntityComponent {
        self.0.as_ref()
    }

    pub fn downcast_ref<T: EntityComponent>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
