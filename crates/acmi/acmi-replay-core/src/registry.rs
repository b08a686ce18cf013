//! Entity registry: identities, classification and merged property state.
//!
//! All mutation of entity state goes through [`EntityRegistry::apply_update`] and
//! [`EntityRegistry::apply_removal`]. Snapshots are appended to the owned [`TemporalStore`]
//! whenever an update carries coordinates.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::RetentionPolicy;
use crate::ids::{EntityKey, KeyAllocator, ObjectId};
use crate::parser::COORDINATES_KEY;
use crate::store::{AppendOutcome, DisplayAttrs, Snapshot, TemporalStore, TemporalTrack};
use crate::value::{EntityKind, PropertyValue};

/// Radius reported for explosions that do not declare one, in metres.
pub const DEFAULT_EXPLOSION_RADIUS: f64 = 300.0;

/// Latest value of every property seen for one entity (last write wins per key).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    values: HashMap<String, PropertyValue>,
}

impl PropertyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one batch of deltas in order.
    pub fn merge<'a, I>(&mut self, deltas: I)
    where
        I: IntoIterator<Item = &'a (String, PropertyValue)>,
    {
        for (k, v) in deltas {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PropertyValue::as_number)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.values.iter()
    }
}

/// One incarnation of a recorded object.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: ObjectId,
    pub key: EntityKey,
    kind: EntityKind,
    properties: PropertyState,
    attrs: DisplayAttrs,
    created_at: f64,
    first_fix: Option<f64>,
    removed_at: Option<f64>,
}

impl Entity {
    fn new(id: ObjectId, key: EntityKey, created_at: f64) -> Self {
        Self {
            id,
            key,
            kind: EntityKind::Unknown,
            properties: PropertyState::new(),
            attrs: DisplayAttrs::default(),
            created_at,
            first_fix: None,
            removed_at: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[inline]
    pub fn properties(&self) -> &PropertyState {
        &self.properties
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.text("Name")
    }

    /// Time of the first record that referenced this incarnation.
    #[inline]
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// Time of the first snapshot ever recorded, before any eviction.
    #[inline]
    pub fn first_fix(&self) -> Option<f64> {
        self.first_fix
    }

    #[inline]
    pub fn removed_at(&self) -> Option<f64> {
        self.removed_at
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Alive between creation and removal (removal instant excluded).
    pub fn alive_at(&self, t: f64) -> bool {
        self.created_at <= t && self.removed_at.map_or(true, |r| r > t)
    }

    /// Has a position at `t`: first snapshot reached and not yet removed.
    pub fn visible_at(&self, t: f64) -> bool {
        self.first_fix.is_some_and(|f| f <= t) && self.removed_at.map_or(true, |r| r > t)
    }

    pub fn radius(&self) -> Option<f64> {
        self.attrs.radius
    }

    fn merge(&mut self, deltas: &[(String, PropertyValue)]) {
        self.properties.merge(deltas);

        let mut attrs_changed = false;
        for (k, v) in deltas {
            match (k.as_str(), v) {
                ("Type", PropertyValue::Text(tags)) => {
                    self.kind = EntityKind::classify(tags);
                    attrs_changed = true;
                }
                ("Name", PropertyValue::Text(name)) => {
                    self.attrs.name = Some(Arc::from(name.as_str()));
                    if self.properties.get("Type").is_none() {
                        if let Some(kind) = EntityKind::from_name_hint(name) {
                            self.kind = kind;
                        }
                    }
                }
                ("Color", PropertyValue::Text(c)) => self.attrs.color = Some(Arc::from(c.as_str())),
                ("Coalition", PropertyValue::Text(c)) => {
                    self.attrs.coalition = Some(Arc::from(c.as_str()))
                }
                ("Radius", PropertyValue::Number(_)) => attrs_changed = true,
                _ => {}
            }
        }
        if attrs_changed {
            self.attrs.radius = match (self.properties.number("Radius"), self.kind) {
                (Some(r), _) => Some(r),
                (None, EntityKind::Explosion) => Some(DEFAULT_EXPLOSION_RADIUS),
                (None, _) => None,
            };
        }
    }
}

/// What an update did to the registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub key: EntityKey,
    pub created: bool,
    pub snapshot: Option<AppendOutcome>,
}

/// Arena of entity incarnations plus their temporal tracks.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    keys: KeyAllocator,
    entities: Vec<Entity>,
    /// Incarnations per id, oldest first. The last one is current.
    by_id: HashMap<ObjectId, Vec<EntityKey>>,
    store: TemporalStore,
}

impl EntityRegistry {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            keys: KeyAllocator::new(),
            entities: Vec::new(),
            by_id: HashMap::new(),
            store: TemporalStore::new(retention),
        }
    }

    /// Current incarnation of `id` that can still receive updates.
    fn live_key(&self, id: ObjectId) -> Option<EntityKey> {
        let key = *self.by_id.get(&id)?.last()?;
        (!self.entities[key.index()].is_removed()).then_some(key)
    }

    fn create(&mut self, id: ObjectId, time: f64) -> EntityKey {
        let key = self.keys.alloc();
        if self.by_id.contains_key(&id) {
            log::warn!("object {id} reused after removal; starting a new incarnation at {time}");
        } else {
            log::debug!("object {id} created at {time}");
        }
        self.entities.push(Entity::new(id, key, time));
        self.by_id.entry(id).or_default().push(key);
        key
    }

    /// Create-or-merge for one update record at `time`.
    pub fn apply_update(
        &mut self,
        id: ObjectId,
        deltas: &[(String, PropertyValue)],
        time: f64,
    ) -> UpdateOutcome {
        let (key, created) = match self.live_key(id) {
            Some(k) => (k, false),
            None => (self.create(id, time), true),
        };

        let entity = &mut self.entities[key.index()];
        entity.merge(deltas);

        let coords = deltas
            .iter()
            .rev()
            .find(|(k, _)| k == COORDINATES_KEY)
            .and_then(|(_, v)| v.as_coordinates());
        if coords.is_none() {
            // Same-timeframe property lines still land in that timeframe's snapshot.
            self.store.refresh_attrs_at(key, time, &entity.attrs);
        }
        let snapshot = coords.map(|c| {
            if entity.first_fix.is_none() {
                entity.first_fix = Some(time);
            }
            let snap = Snapshot {
                time,
                position: c.local,
                geo: c.geo,
                orientation: c.orientation,
                heading: c.heading,
                attrs: entity.attrs.clone(),
            };
            self.store.append(key, snap)
        });

        UpdateOutcome {
            key,
            created,
            snapshot,
        }
    }

    /// Mark the current incarnation removed. None if the id is unknown or already removed.
    pub fn apply_removal(&mut self, id: ObjectId, time: f64) -> Option<EntityKey> {
        let key = self.live_key(id)?;
        self.entities[key.index()].removed_at = Some(time);
        log::debug!("object {id} removed at {time}");
        Some(key)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key.index())
    }

    /// Most recent incarnation of `id`.
    pub fn entity(&self, id: ObjectId) -> Option<&Entity> {
        let key = *self.by_id.get(&id)?.last()?;
        self.get(key)
    }

    /// Every incarnation of `id`, oldest first.
    pub fn incarnations(&self, id: ObjectId) -> impl Iterator<Item = &Entity> {
        self.by_id
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|k| self.get(*k))
    }

    /// The incarnation of `id` relevant at `t`: the latest created at or before `t`,
    /// else the earliest.
    pub fn resolve(&self, id: ObjectId, t: f64) -> Option<&Entity> {
        let keys = self.by_id.get(&id)?;
        keys.iter()
            .rev()
            .filter_map(|k| self.get(*k))
            .find(|e| e.created_at <= t)
            .or_else(|| keys.first().and_then(|k| self.get(*k)))
    }

    /// (id, kind) of every entity alive at `t`, ordered by id.
    pub fn entities_at(&self, t: f64) -> Vec<(ObjectId, EntityKind)> {
        let mut out: Vec<(ObjectId, EntityKind)> = self
            .entities
            .iter()
            .filter(|e| e.alive_at(t))
            .map(|e| (e.id, e.kind))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of incarnations.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn store(&self) -> &TemporalStore {
        &self.store
    }

    pub fn track(&self, key: EntityKey) -> Option<&TemporalTrack> {
        self.store.track(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Coordinates, GeoPoint};

    fn coords(x: f64) -> PropertyValue {
        PropertyValue::Coordinates(Coordinates {
            geo: GeoPoint::new(x, 0.0, 0.0),
            local: [x, 0.0, 0.0],
            orientation: None,
            flat: None,
            heading: None,
        })
    }

    fn text(k: &str, v: &str) -> (String, PropertyValue) {
        (k.to_string(), PropertyValue::Text(v.to_string()))
    }

    #[test]
    fn create_classify_and_snapshot() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        let id = ObjectId(0x7a);
        let out = reg.apply_update(
            id,
            &[text("Type", "Air+FixedWing"), text("Name", "F16"), ("T".into(), coords(1.0))],
            1.0,
        );
        assert!(out.created);
        assert_eq!(out.snapshot, Some(AppendOutcome::Appended));
        let e = reg.entity(id).unwrap();
        assert_eq!(e.kind(), EntityKind::Aircraft);
        assert_eq!(e.name(), Some("F16"));
        assert_eq!(e.first_fix(), Some(1.0));
        let snap = reg.store().query(e.key, 1.0).unwrap();
        assert_eq!(snap.attrs.name.as_deref(), Some("F16"));
    }

    #[test]
    fn update_without_coordinates_adds_no_snapshot() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        let out = reg.apply_update(ObjectId(1), &[text("Name", "Tank")], 0.0);
        assert_eq!(out.snapshot, None);
        assert!(reg.track(out.key).is_none());
        assert!(!reg.entity(ObjectId(1)).unwrap().visible_at(5.0));
    }

    #[test]
    fn explosion_gets_default_radius() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        reg.apply_update(ObjectId(9), &[text("Type", "Misc+Explosion")], 0.0);
        assert_eq!(reg.entity(ObjectId(9)).unwrap().radius(), Some(DEFAULT_EXPLOSION_RADIUS));
        reg.apply_update(ObjectId(9), &[("Radius".into(), PropertyValue::Number(50.0))], 0.0);
        assert_eq!(reg.entity(ObjectId(9)).unwrap().radius(), Some(50.0));
    }

    #[test]
    fn later_line_in_same_timeframe_updates_snapshot_attrs() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        let id = ObjectId(1);
        reg.apply_update(id, &[("T".into(), coords(0.0)), text("Type", "Misc+Explosion")], 0.0);
        reg.apply_update(
            id,
            &[
                ("Radius".into(), PropertyValue::Number(50.0)),
                text("Name", "Boom"),
                text("Color", "Red"),
            ],
            0.0,
        );
        let key = reg.entity(id).unwrap().key;
        let snap = reg.store().query(key, 0.0).unwrap();
        assert_eq!(snap.attrs.radius, Some(50.0));
        assert_eq!(snap.attrs.name.as_deref(), Some("Boom"));
        assert_eq!(snap.rgb(), [1.0, 0.0, 0.0]);

        // A later timeframe without coordinates leaves earlier snapshots alone.
        reg.apply_update(id, &[text("Color", "Blue")], 1.0);
        assert_eq!(reg.store().query(key, 0.0).unwrap().attrs.color.as_deref(), Some("Red"));
    }

    #[test]
    fn missile_name_hint_without_type() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        reg.apply_update(ObjectId(0xa1), &[text("Name", "AIM-9X")], 0.0);
        assert_eq!(reg.entity(ObjectId(0xa1)).unwrap().kind(), EntityKind::Missile);
    }

    #[test]
    fn removal_is_terminal_and_reuse_starts_fresh() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        let id = ObjectId(5);
        reg.apply_update(id, &[("T".into(), coords(1.0))], 0.0);
        assert!(reg.apply_removal(id, 2.0).is_some());
        assert!(reg.apply_removal(id, 3.0).is_none());
        assert!(reg.apply_removal(ObjectId(6), 3.0).is_none());

        let out = reg.apply_update(id, &[("T".into(), coords(9.0))], 4.0);
        assert!(out.created);
        let all: Vec<&Entity> = reg.incarnations(id).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].removed_at(), Some(2.0));
        assert_eq!(reg.track(all[0].key).unwrap().len(), 1);
        assert_eq!(reg.resolve(id, 1.0).unwrap().key, all[0].key);
        assert_eq!(reg.resolve(id, 5.0).unwrap().key, all[1].key);
    }

    #[test]
    fn entities_at_ordered_by_id() {
        let mut reg = EntityRegistry::new(RetentionPolicy::Unbounded);
        reg.apply_update(ObjectId(0x20), &[text("Type", "Air")], 0.0);
        reg.apply_update(ObjectId(0x10), &[text("Type", "Weapon+Missile")], 1.0);
        reg.apply_removal(ObjectId(0x20), 2.0);
        assert_eq!(
            reg.entities_at(1.5),
            vec![
                (ObjectId(0x10), EntityKind::Missile),
                (ObjectId(0x20), EntityKind::Aircraft)
            ]
        );
        assert_eq!(reg.entities_at(2.0), vec![(ObjectId(0x10), EntityKind::Missile)]);
        assert!(reg.entities_at(0.5).iter().all(|(id, _)| *id == ObjectId(0x20)));
    }
}
