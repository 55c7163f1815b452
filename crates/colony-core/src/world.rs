//! The authoritative entity list.
//!
//! Entities are held behind `Arc` so an update clones only the entities it
//! touches (copy-on-write per entity). A snapshot taken before an update
//! keeps seeing the old entities, and observers can detect unchanged
//! entities with `Arc::ptr_eq`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::components::{Entity, EntityId};

#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    entities: Vec<Arc<Entity>>,
    index: HashMap<EntityId, usize>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex(&mut self) {
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
    }

    /// Replace the whole list.
    pub fn replace(&mut self, entities: Vec<Entity>) {
        self.entities = entities.into_iter().map(Arc::new).collect();
        self.reindex();
    }

    /// Functional update over the shared list: `prev -> next`.
    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&[Arc<Entity>]) -> Vec<Arc<Entity>>,
    {
        self.entities = f(&self.entities);
        self.reindex();
    }

    /// Append one entity. An entity with an existing id replaces it.
    pub fn push(&mut self, entity: Entity) {
        if let Some(&i) = self.index.get(&entity.id) {
            log::warn!("entity '{}' already exists, replacing", entity.id);
            self.entities[i] = Arc::new(entity);
            return;
        }
        self.index.insert(entity.id.clone(), self.entities.len());
        self.entities.push(Arc::new(entity));
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&i| self.entities[i].as_ref())
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Copy-on-write mutation of one entity. Returns `None` if absent.
    pub fn modify<R>(&mut self, id: &EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        let &i = self.index.get(id)?;
        Some(f(Arc::make_mut(&mut self.entities[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|e| e.as_ref())
    }

    /// Ids of entities matching `pred`, in store order.
    pub fn ids_where(&self, pred: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        self.iter().filter(|e| pred(e)).map(|e| e.id.clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        self.entities.clone()
    }

    pub fn to_vec(&self) -> Vec<Entity> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.iter().filter(|e| e.is_worker()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EntityBody, Vec3, Worker, WorkerState};

    fn worker(id: &str) -> Entity {
        Entity {
            id: EntityId::from(id),
            position: Vec3::ZERO,
            upgrades: vec![],
            body: EntityBody::Worker(Worker::default()),
        }
    }

    #[test]
    fn test_push_and_get() {
        let mut store = ObjectStore::new();
        store.push(worker("worker1"));
        store.push(worker("worker2"));
        assert_eq!(store.len(), 2);
        assert!(store.get(&EntityId::from("worker2")).is_some());
        assert!(store.get(&EntityId::from("worker3")).is_none());
    }

    #[test]
    fn test_modify_is_copy_on_write() {
        let mut store = ObjectStore::new();
        store.push(worker("worker1"));
        store.push(worker("worker2"));
        let before = store.snapshot();

        store.modify(&EntityId::from("worker1"), |e| {
            e.worker_mut().unwrap().state = WorkerState::Moving;
        });

        let after = store.snapshot();
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert!(Arc::ptr_eq(&before[1], &after[1]));
        assert_eq!(before[0].worker().unwrap().state, WorkerState::Idle);
        assert_eq!(after[0].worker().unwrap().state, WorkerState::Moving);
    }

    #[test]
    fn test_functional_update_reindexes() {
        let mut store = ObjectStore::new();
        store.replace(vec![worker("a"), worker("b"), worker("c")]);
        store.update(|prev| prev.iter().rev().cloned().collect());
        assert_eq!(store.iter().next().unwrap().id, EntityId::from("c"));
        let updated = store.modify(&EntityId::from("a"), |e| e.position = Vec3::ground(1.0, 1.0));
        assert!(updated.is_some());
        assert_eq!(store.to_vec()[2].position, Vec3::ground(1.0, 1.0));
    }

    #[test]
    fn test_duplicate_push_replaces() {
        let mut store = ObjectStore::new();
        store.push(worker("w"));
        let mut moved = worker("w");
        moved.position = Vec3::ground(2.0, 0.0);
        store.push(moved);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&EntityId::from("w")).unwrap().position.x, 2.0);
    }
}
