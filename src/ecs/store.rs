use crate::foundation::error::{TemporaError, TemporaResult};
use std::any::{Any, TypeId};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::entity::{EntityAllocator, EntityId};
use super::registry::{Component, ComponentMask, ComponentRegistry, ComponentTypeId};

pub(crate) struct Column<T> {
    slots: RwLock<Vec<Option<T>>>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Column<T> {
    fn slots_mut(&mut self) -> &mut Vec<Option<T>> {
        self.slots.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) trait ErasedColumn: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn clear_slot(&mut self, index: usize);
    fn put(&mut self, index: usize, value: Box<dyn Any + Send + Sync>) -> bool;
    fn shrink(&mut self, len: usize);
}

impl<T: Component> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clear_slot(&mut self, index: usize) {
        if let Some(slot) = self.slots_mut().get_mut(index) {
            *slot = None;
        }
    }

    fn put(&mut self, index: usize, value: Box<dyn Any + Send + Sync>) -> bool {
        let Ok(value) = value.downcast::<T>() else {
            return false;
        };
        let slots = self.slots_mut();
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        slots[index] = Some(*value);
        true
    }

    fn shrink(&mut self, len: usize) {
        let slots = self.slots_mut();
        slots.truncate(len);
        slots.shrink_to_fit();
    }
}

struct ImportedComponent {
    ty: TypeId,
    name: &'static str,
    value: Option<Box<dyn Any + Send + Sync>>,
}

/// Component bundle produced by an entity provider, turned into one entity by
/// [`EntityStore::spawn`].
#[derive(Default)]
pub struct ImportedEntity {
    items: Vec<ImportedComponent>,
}

impl ImportedEntity {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a value component.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        self.push(TypeId::of::<T>(), std::any::type_name::<T>(), Some(Box::new(value)));
        self
    }

    /// Add a tag.
    pub fn add_tag<T: Component>(&mut self) -> &mut Self {
        self.push(TypeId::of::<T>(), std::any::type_name::<T>(), None);
        self
    }

    fn push(&mut self, ty: TypeId, name: &'static str, value: Option<Box<dyn Any + Send + Sync>>) {
        self.items.retain(|c| c.ty != ty);
        self.items.push(ImportedComponent { ty, name, value });
    }

    /// Return `true` when the bundle holds `T`.
    pub fn has<T: Component>(&self) -> bool {
        self.items.iter().any(|c| c.ty == TypeId::of::<T>())
    }

    /// Return `true` when the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Shared read access to one component column.
pub struct ColumnRef<'a, T> {
    guard: RwLockReadGuard<'a, Vec<Option<T>>>,
    entities: &'a EntityAllocator,
}

impl<T> ColumnRef<'_, T> {
    /// Value of a live entity.
    pub fn get(&self, e: EntityId) -> Option<&T> {
        if !self.entities.is_alive(e) {
            return None;
        }
        self.guard.get(e.index())?.as_ref()
    }

    /// Raw slots indexed by entity slot index.
    pub fn slots(&self) -> &[Option<T>] {
        &self.guard
    }
}

/// Exclusive write access to one component column.
///
/// Writes only touch existing values, so they are legal while the store is locked.
pub struct ColumnMut<'a, T> {
    guard: RwLockWriteGuard<'a, Vec<Option<T>>>,
    entities: &'a EntityAllocator,
}

impl<T> ColumnMut<'_, T> {
    /// Value of a live entity.
    pub fn get_mut(&mut self, e: EntityId) -> Option<&mut T> {
        if !self.entities.is_alive(e) {
            return None;
        }
        self.guard.get_mut(e.index())?.as_mut()
    }

    /// Raw slots indexed by entity slot index.
    pub fn slots_mut(&mut self) -> &mut [Option<T>] {
        &mut self.guard
    }
}

/// Versioned entity-component table.
///
/// Structural changes (spawn, add/remove component, despawn) bump the structure version and
/// are forbidden while the store is locked for evaluation. A structural change of a locked
/// store is a programming error and panics.
pub struct EntityStore {
    registry: Arc<ComponentRegistry>,
    columns: Vec<Option<Box<dyn ErasedColumn>>>,
    masks: Vec<ComponentMask>,
    entities: EntityAllocator,
    structure_version: u64,
    locked: bool,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.len())
            .field("structure_version", &self.structure_version())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl EntityStore {
    /// Empty store over a frozen registry.
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        let columns = registry
            .infos()
            .iter()
            .map(|info| info.make_column.map(|make| make()))
            .collect();
        Self {
            registry,
            columns,
            masks: Vec::new(),
            entities: EntityAllocator::default(),
            structure_version: 0,
            locked: false,
        }
    }

    /// Component registry the store was built from.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Monotonic structure version.
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.live()
    }

    /// Return `true` when no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forbid structural mutation until [`EntityStore::unlock`].
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow structural mutation again.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Return `true` while locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn assert_unlocked(&self, op: &str) {
        assert!(
            !self.locked,
            "structural mutation ({op}) of a locked EntityStore during evaluation"
        );
    }

    fn bump(&mut self) {
        self.structure_version += 1;
    }

    /// Return `true` when `e` is alive.
    pub fn contains(&self, e: EntityId) -> bool {
        self.entities.is_alive(e)
    }

    /// Structural mask of a live entity.
    pub fn mask(&self, e: EntityId) -> Option<ComponentMask> {
        self.contains(e).then(|| self.masks[e.index()])
    }

    /// Return `true` when `e` has component `T`.
    pub fn has<T: Component>(&self, e: EntityId) -> bool {
        match (self.mask(e), self.registry.id_of::<T>()) {
            (Some(m), Ok(ty)) => m.contains(ty),
            _ => false,
        }
    }

    /// Create an entity from a non-empty bundle.
    pub fn spawn(&mut self, bundle: ImportedEntity) -> TemporaResult<EntityId> {
        self.assert_unlocked("spawn");
        if bundle.is_empty() {
            return Err(TemporaError::precondition(
                "entities must be spawned with at least one component",
            ));
        }
        let mut resolved = Vec::with_capacity(bundle.items.len());
        for item in bundle.items {
            let id = self.registry.id_of_type(item.ty, item.name)?;
            if item.value.is_none() && !self.registry.is_tag(id) {
                return Err(TemporaError::precondition(format!(
                    "component '{}' needs a value",
                    item.name
                )));
            }
            resolved.push((id, item.value));
        }

        let e = self.entities.allocate();
        if self.masks.len() <= e.index() {
            self.masks.resize(e.index() + 1, ComponentMask::EMPTY);
        }
        let mut mask = ComponentMask::EMPTY;
        for (id, value) in resolved {
            if let (Some(column), Some(value)) = (self.columns[id.index()].as_mut(), value) {
                column.put(e.index(), value);
            }
            mask = mask.with(id);
        }
        self.masks[e.index()] = mask;
        self.bump();
        Ok(e)
    }

    /// Add or replace a value component.
    pub fn insert<T: Component>(&mut self, e: EntityId, value: T) -> TemporaResult<()> {
        self.assert_unlocked("insert");
        let id = self.live_type::<T>(e)?;
        let Some(column) = self.columns[id.index()].as_mut() else {
            return Err(TemporaError::precondition(format!(
                "'{}' is a tag, use add_tag",
                self.registry.name(id)
            )));
        };
        column.put(e.index(), Box::new(value));
        self.set_mask_bit(e, id);
        Ok(())
    }

    /// Add a tag component.
    pub fn add_tag<T: Component>(&mut self, e: EntityId) -> TemporaResult<()> {
        self.assert_unlocked("add_tag");
        let id = self.live_type::<T>(e)?;
        self.set_mask_bit(e, id);
        Ok(())
    }

    fn live_type<T: Component>(&self, e: EntityId) -> TemporaResult<ComponentTypeId> {
        if !self.contains(e) {
            return Err(TemporaError::precondition(format!("entity {e:?} is not alive")));
        }
        self.registry.id_of::<T>()
    }

    fn set_mask_bit(&mut self, e: EntityId, id: ComponentTypeId) {
        let m = &mut self.masks[e.index()];
        if !m.contains(id) {
            *m = m.with(id);
            self.bump();
        }
    }

    /// Remove component `T`; an entity left with no components is freed.
    pub fn remove<T: Component>(&mut self, e: EntityId) -> TemporaResult<()> {
        let id = self.registry.id_of::<T>()?;
        self.remove_type(e, id);
        Ok(())
    }

    /// Remove a component by type id; an entity left with no components is freed.
    pub fn remove_type(&mut self, e: EntityId, id: ComponentTypeId) {
        self.assert_unlocked("remove");
        let Some(mask) = self.mask(e) else {
            return;
        };
        if !mask.contains(id) {
            return;
        }
        if let Some(column) = self.columns[id.index()].as_mut() {
            column.clear_slot(e.index());
        }
        let mask = mask.without(id);
        self.masks[e.index()] = mask;
        self.bump();
        if mask.is_empty() {
            self.entities.free(e);
        }
    }

    /// Free an entity and all its components.
    pub fn despawn(&mut self, e: EntityId) -> bool {
        self.assert_unlocked("despawn");
        let Some(mask) = self.mask(e) else {
            return false;
        };
        for id in mask.iter() {
            if let Some(column) = self.columns[id.index()].as_mut() {
                column.clear_slot(e.index());
            }
        }
        self.masks[e.index()] = ComponentMask::EMPTY;
        self.entities.free(e);
        self.bump();
        true
    }

    /// Release trailing storage left behind by freed entities.
    pub fn compact(&mut self) {
        self.assert_unlocked("compact");
        let len = self.entities.capacity();
        for column in self.columns.iter_mut().flatten() {
            column.shrink(len);
        }
        self.entities.sort_free();
    }

    fn column<T: Component>(&self) -> TemporaResult<&Column<T>> {
        let id = self.registry.id_of::<T>()?;
        self.columns[id.index()]
            .as_ref()
            .and_then(|c| c.as_any().downcast_ref::<Column<T>>())
            .ok_or_else(|| {
                TemporaError::precondition(format!(
                    "'{}' has no value column",
                    self.registry.name(id)
                ))
            })
    }

    /// Shared access to the `T` column.
    pub fn read<T: Component>(&self) -> TemporaResult<ColumnRef<'_, T>> {
        let column = self.column::<T>()?;
        Ok(ColumnRef {
            guard: column.slots.read().unwrap_or_else(PoisonError::into_inner),
            entities: &self.entities,
        })
    }

    /// Exclusive access to the `T` column. Never hold a read of the same column at once.
    pub fn write<T: Component>(&self) -> TemporaResult<ColumnMut<'_, T>> {
        let column = self.column::<T>()?;
        Ok(ColumnMut {
            guard: column.slots.write().unwrap_or_else(PoisonError::into_inner),
            entities: &self.entities,
        })
    }

    /// Clone of a component value.
    pub fn get<T: Component + Clone>(&self, e: EntityId) -> Option<T> {
        self.read::<T>().ok()?.get(e).cloned()
    }

    /// Overwrite an existing component value. Legal while locked.
    pub fn set<T: Component>(&self, e: EntityId, value: T) -> TemporaResult<()> {
        let mut column = self.write::<T>()?;
        let slot = column.get_mut(e).ok_or_else(|| {
            TemporaError::precondition(format!(
                "entity {e:?} has no '{}' to overwrite",
                std::any::type_name::<T>()
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Live entities whose mask holds all of `all` and none of `none`, in slot order.
    pub fn query(&self, all: ComponentMask, none: ComponentMask) -> Vec<EntityId> {
        (0..self.entities.capacity())
            .filter_map(|i| self.entities.at(i))
            .filter(|e| {
                let m = self.masks[e.index()];
                m.contains_all(all) && !m.intersects(none)
            })
            .collect()
    }

    /// Return `true` when any live entity holds all of `all`.
    pub fn any_with(&self, all: ComponentMask) -> bool {
        (0..self.entities.capacity())
            .filter_map(|i| self.entities.at(i))
            .any(|e| self.masks[e.index()].contains_all(all))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ecs/store.rs"]
mod tests;
