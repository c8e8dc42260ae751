use crate::{
    component::component::ComponentValue,
    component::component_kind::ComponentKind,
    entity::entity_id::EntityId,
};

/// The fundamental unit of change propagation: one component's new value (or
/// removal) for one entity.
#[derive(Clone, Debug)]
pub struct EntityChange {
    pub entity_id: EntityId,
    pub kind: ComponentKind,
    /// `None` means the component was removed.
    pub value: Option<ComponentValue>,
}

impl EntityChange {
    pub fn set(entity_id: EntityId, value: ComponentValue) -> Self {
        let kind = value.kind();
        Self {
            entity_id,
            kind,
            value: Some(value),
        }
    }

    pub fn removed(entity_id: EntityId, kind: ComponentKind) -> Self {
        Self {
            entity_id,
            kind,
            value: None,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }
}
