//! The in-memory live set shared by every backend.
//!
//! Besides the entities themselves, the set records which keys changed since
//! the last successful save so the database backend can write a minimal
//! batch. The file backend rewrites everything and simply resets the record.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use hbnb_core::{AnyEntity, EntityId, EntityKind, composite_key};

/// Keys changed since the last successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    pub upserted: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }
}

/// A batch taken for persistence: the change record plus the current value of
/// every upserted entity.
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
    pub changes: PendingChanges,
    pub upserts: Vec<AnyEntity>,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Removed keys of one kind, as bare ids.
    pub fn removed_ids(&self, kind: EntityKind) -> Vec<String> {
        self.changes
            .removed
            .iter()
            .filter_map(|key| hbnb_core::split_key(key))
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.to_string())
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, AnyEntity>,
    pending: PendingChanges,
}

#[derive(Debug, Default)]
pub struct LiveSet {
    inner: RwLock<Inner>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self, kind: Option<EntityKind>) -> HashMap<String, AnyEntity> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .objects
            .iter()
            .filter(|(_, e)| kind.is_none_or(|k| e.kind() == k))
            .map(|(key, e)| (key.clone(), e.clone()))
            .collect()
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<AnyEntity> {
        let key = composite_key(kind, &EntityId::from(id));
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.objects.get(&key).cloned()
    }

    pub fn count(&self, kind: Option<EntityKind>) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match kind {
            None => inner.objects.len(),
            Some(k) => inner.objects.values().filter(|e| e.kind() == k).count(),
        }
    }

    pub fn insert(&self, entity: AnyEntity) {
        let key = entity.key();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.pending.removed.remove(&key);
        inner.pending.upserted.insert(key.clone());
        inner.objects.insert(key, entity);
    }

    /// Remove `entity` and everything it owns. Returns the removed keys, root
    /// first; empty when the entity was not live.
    pub fn remove(&self, entity: &AnyEntity) -> Vec<String> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Inner { objects, pending } = &mut *inner;

        let mut removed = Vec::new();
        let mut queue = vec![(entity.kind(), entity.id().clone())];

        while let Some((kind, id)) = queue.pop() {
            let key = composite_key(kind, &id);
            if objects.remove(&key).is_none() {
                continue;
            }
            pending.upserted.remove(&key);
            pending.removed.insert(key.clone());
            removed.push(key);

            queue.extend(
                objects
                    .values()
                    .filter(|child| is_owned_by(child, kind, &id))
                    .map(|child| (child.kind(), child.id().clone())),
            );

            if kind == EntityKind::Amenity {
                for other in objects.values_mut() {
                    if let AnyEntity::Place(place) = other {
                        if place.unlink_amenity(&id) {
                            pending.upserted.insert(composite_key(EntityKind::Place, &place.base.id));
                        }
                    }
                }
            }
        }

        removed
    }

    /// Swap in a freshly loaded set; the change record is cleared.
    pub fn replace_all(&self, entities: impl IntoIterator<Item = AnyEntity>) {
        let objects = entities.into_iter().map(|e| (e.key(), e)).collect();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.objects = objects;
        inner.pending = PendingChanges::default();
    }

    /// Full copy of the set, clearing the change record.
    pub fn checkpoint(&self) -> HashMap<String, AnyEntity> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.pending = PendingChanges::default();
        inner.objects.clone()
    }

    /// Take the change record and the current values it refers to.
    pub fn take_pending(&self) -> PendingBatch {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let changes = std::mem::take(&mut inner.pending);
        let upserts = changes
            .upserted
            .iter()
            .filter_map(|key| inner.objects.get(key).cloned())
            .collect();
        PendingBatch { changes, upserts }
    }

    /// Put back a change record whose save failed, merging with whatever
    /// changed since it was taken.
    pub fn restore_pending(&self, changes: PendingChanges) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Inner { objects, pending } = &mut *inner;

        for key in changes.upserted {
            if objects.contains_key(&key) && !pending.removed.contains(&key) {
                pending.upserted.insert(key);
            }
        }
        for key in changes.removed {
            if !objects.contains_key(&key) {
                pending.removed.insert(key);
            }
        }
    }

    pub fn pending(&self) -> PendingChanges {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.pending.clone()
    }
}

/// Ownership edges followed on delete.
fn is_owned_by(child: &AnyEntity, owner: EntityKind, owner_id: &EntityId) -> bool {
    match (child, owner) {
        (AnyEntity::City(city), EntityKind::State) => &city.state_id == owner_id,
        (AnyEntity::Place(place), EntityKind::City) => &place.city_id == owner_id,
        (AnyEntity::Place(place), EntityKind::User) => &place.user_id == owner_id,
        (AnyEntity::Review(review), EntityKind::Place) => &review.place_id == owner_id,
        (AnyEntity::Review(review), EntityKind::User) => &review.user_id == owner_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbnb_core::{Amenity, City, Model, Place, Review, State, User};
    use proptest::prelude::*;

    struct World {
        set: LiveSet,
        state: State,
        city: City,
        user: User,
        place: Place,
        review: Review,
        amenity: Amenity,
    }

    fn world() -> World {
        let set = LiveSet::new();
        let state = State::new("Nebraska");
        let city = City::new("Omaha", state.id().clone());
        let user = User::new("host@hbnb.io", "pw");
        let amenity = Amenity::new("Wifi");
        let mut place = Place::new("Loft", city.id().clone(), user.id().clone());
        place.link_amenity(amenity.id().clone());
        let review = Review::new(place.id().clone(), user.id().clone(), "Great");

        for e in [
            state.clone().into(),
            city.clone().into(),
            user.clone().into(),
            amenity.clone().into(),
            place.clone().into(),
            review.clone().into(),
        ] {
            set.insert(e);
        }

        World { set, state, city, user, place, review, amenity }
    }

    #[test]
    fn get_sees_entity_before_any_save() {
        let w = world();
        let got = w.set.get(EntityKind::City, w.city.id().as_str()).unwrap();
        assert_eq!(got, AnyEntity::City(w.city.clone()));
        assert!(w.set.get(EntityKind::State, w.city.id().as_str()).is_none());
    }

    #[test]
    fn deleting_state_cascades_down_to_reviews() {
        let w = world();
        let removed = w.set.remove(&w.state.clone().into());

        assert_eq!(removed.first(), Some(&w.state.key()));
        assert_eq!(removed.len(), 4);
        assert!(removed.contains(&w.review.key()));
        assert_eq!(w.set.count(None), 2);
        assert!(w.set.get(EntityKind::User, w.user.id().as_str()).is_some());
    }

    #[test]
    fn deleting_amenity_unlinks_it_from_places() {
        let w = world();
        w.set.take_pending();
        w.set.remove(&w.amenity.clone().into());

        let place = w
            .set
            .get(EntityKind::Place, w.place.id().as_str())
            .and_then(|e| e.into_model::<Place>())
            .unwrap();
        assert!(place.amenity_ids.is_empty());

        let pending = w.set.pending();
        assert!(pending.upserted.contains(&w.place.key()));
        assert!(pending.removed.contains(&w.amenity.key()));
    }

    #[test]
    fn removing_missing_entity_is_noop() {
        let w = world();
        let stranger: AnyEntity = State::new("Atlantis").into();
        assert!(w.set.remove(&stranger).is_empty());
        assert_eq!(w.set.count(None), 6);
    }

    #[test]
    fn pending_tracks_last_write_per_key() {
        let set = LiveSet::new();
        let state = State::new("Ohio");
        set.insert(state.clone().into());
        set.remove(&state.clone().into());
        let pending = set.pending();
        assert!(pending.upserted.is_empty());
        assert!(pending.removed.contains(&state.key()));

        set.insert(state.clone().into());
        let pending = set.pending();
        assert!(pending.removed.is_empty());
        assert!(pending.upserted.contains(&state.key()));
    }

    #[test]
    fn restore_merges_with_newer_changes() {
        let set = LiveSet::new();
        let kept = State::new("Kept");
        let dropped = State::new("Dropped");
        set.insert(kept.clone().into());
        set.insert(dropped.clone().into());

        let batch = set.take_pending();
        assert_eq!(batch.upserts.len(), 2);

        // Deleted while the failed save was in flight.
        set.remove(&dropped.clone().into());
        set.restore_pending(batch.changes);

        let pending = set.pending();
        assert!(pending.upserted.contains(&kept.key()));
        assert!(!pending.upserted.contains(&dropped.key()));
        assert!(pending.removed.contains(&dropped.key()));
    }

    #[test]
    fn removed_ids_filters_by_kind() {
        let w = world();
        w.set.take_pending();
        w.set.remove(&w.user.clone().into());
        let batch = w.set.take_pending();
        assert_eq!(batch.removed_ids(EntityKind::User), vec![w.user.id().to_string()]);
        assert_eq!(batch.removed_ids(EntityKind::Review), vec![w.review.id().to_string()]);
        assert!(batch.removed_ids(EntityKind::City).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        InsertState(String),
        InsertAmenity(String),
        DeleteNth(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(Op::InsertState),
            "[a-z]{1,8}".prop_map(Op::InsertAmenity),
            (0usize..16).prop_map(Op::DeleteNth),
        ]
    }

    proptest! {
        #[test]
        fn count_always_matches_all(ops in proptest::collection::vec(op(), 0..40)) {
            let set = LiveSet::new();
            let mut inserted: Vec<AnyEntity> = Vec::new();

            for op in ops {
                match op {
                    Op::InsertState(name) => {
                        let e: AnyEntity = State::new(name).into();
                        set.insert(e.clone());
                        inserted.push(e);
                    }
                    Op::InsertAmenity(name) => {
                        let e: AnyEntity = Amenity::new(name).into();
                        set.insert(e.clone());
                        inserted.push(e);
                    }
                    Op::DeleteNth(n) if !inserted.is_empty() => {
                        let victim = inserted[n % inserted.len()].clone();
                        let before = set.count(Some(victim.kind()));
                        let was_live = set.get(victim.kind(), victim.id().as_str()).is_some();
                        set.remove(&victim);
                        prop_assert!(set.get(victim.kind(), victim.id().as_str()).is_none());
                        let expected = if was_live { before - 1 } else { before };
                        prop_assert_eq!(set.count(Some(victim.kind())), expected);
                    }
                    Op::DeleteNth(_) => {}
                }

                for kind in EntityKind::ALL {
                    prop_assert_eq!(set.count(Some(kind)), set.all(Some(kind)).len());
                }
                prop_assert_eq!(set.count(None), set.all(None).len());
            }
        }
    }
}
