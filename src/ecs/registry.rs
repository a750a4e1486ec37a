use crate::foundation::error::{TemporaError, TemporaResult};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::store::{Column, ErasedColumn};

/// Maximum number of registered component types (one bit each in [`ComponentMask`]).
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Any value storable in an [`EntityStore`](crate::EntityStore).
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

/// Dense id of a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    /// Position in the registry.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bit set of component types; the structural "shape" of an entity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u128);

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: Self = Self(0);

    /// Mask with one extra type.
    pub fn with(self, ty: ComponentTypeId) -> Self {
        Self(self.0 | (1u128 << ty.0))
    }

    /// Mask without `ty`.
    pub fn without(self, ty: ComponentTypeId) -> Self {
        Self(self.0 & !(1u128 << ty.0))
    }

    /// Return `true` when `ty` is set.
    pub fn contains(self, ty: ComponentTypeId) -> bool {
        self.0 & (1u128 << ty.0) != 0
    }

    /// Return `true` when every type in `other` is set.
    pub fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return `true` when any type in `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Union.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Return `true` when no type is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set types in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        (0..MAX_COMPONENT_TYPES as u16)
            .filter(move |i| self.0 & (1u128 << i) != 0)
            .map(ComponentTypeId)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|t| t.0)).finish()
    }
}

pub(crate) struct ComponentInfo {
    pub(crate) name: &'static str,
    pub(crate) make_column: Option<fn() -> Box<dyn ErasedColumn>>,
}

fn make_column<T: Component>() -> Box<dyn ErasedColumn> {
    Box::new(Column::<T>::default())
}

/// Registry of component types, frozen once handed to a [`Runtime`](crate::Runtime).
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.infos.iter().map(|i| i.name))
            .finish()
    }
}

impl ComponentRegistry {
    /// Register a value component. Registering the same type twice returns the existing id.
    pub fn register<T: Component>(&mut self, name: &'static str) -> TemporaResult<ComponentTypeId> {
        self.insert::<T>(name, Some(make_column::<T>))
    }

    /// Register a zero-size tag: it only occupies a mask bit, no column.
    pub fn register_tag<T: Component>(&mut self, name: &'static str) -> TemporaResult<ComponentTypeId> {
        self.insert::<T>(name, None)
    }

    fn insert<T: Component>(
        &mut self,
        name: &'static str,
        make_column: Option<fn() -> Box<dyn ErasedColumn>>,
    ) -> TemporaResult<ComponentTypeId> {
        if let Some(id) = self.by_type.get(&TypeId::of::<T>()) {
            return Ok(*id);
        }
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(TemporaError::precondition(format!(
                "component registry full ({MAX_COMPONENT_TYPES} types), cannot add '{name}'"
            )));
        }
        let id = ComponentTypeId(self.infos.len() as u16);
        self.infos.push(ComponentInfo { name, make_column });
        self.by_type.insert(TypeId::of::<T>(), id);
        Ok(id)
    }

    /// Id of a registered type.
    pub fn id_of<T: Component>(&self) -> TemporaResult<ComponentTypeId> {
        self.id_of_type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub(crate) fn id_of_type(&self, ty: TypeId, name: &str) -> TemporaResult<ComponentTypeId> {
        self.by_type.get(&ty).copied().ok_or_else(|| {
            TemporaError::precondition(format!("component type '{name}' is not registered"))
        })
    }

    /// Mask of a single registered type.
    pub fn mask_of<T: Component>(&self) -> TemporaResult<ComponentMask> {
        Ok(ComponentMask::EMPTY.with(self.id_of::<T>()?))
    }

    /// Registered name of a type id.
    pub fn name(&self, id: ComponentTypeId) -> &'static str {
        self.infos.get(id.index()).map_or("<unknown>", |i| i.name)
    }

    /// Return `true` when the type is a tag.
    pub fn is_tag(&self, id: ComponentTypeId) -> bool {
        self.infos
            .get(id.index())
            .is_some_and(|i| i.make_column.is_none())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Return `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub(crate) fn infos(&self) -> &[ComponentInfo] {
        &self.infos
    }
}

/// Builder for masks over registered types.
pub struct MaskBuilder<'a> {
    registry: &'a ComponentRegistry,
    mask: ComponentMask,
}

impl<'a> MaskBuilder<'a> {
    /// Start from the empty mask.
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            mask: ComponentMask::EMPTY,
        }
    }

    /// Add a type.
    pub fn with<T: Component>(mut self) -> TemporaResult<Self> {
        self.mask = self.mask.with(self.registry.id_of::<T>()?);
        Ok(self)
    }

    /// Finished mask.
    pub fn build(self) -> ComponentMask {
        self.mask
    }
}
