//! Simulated object world implementing the object, contact, and effect
//! capabilities.
//!
//! This is deliberately not a physics engine: bodies move at constant
//! velocity and contacts are sphere overlaps. It exists so spells can be
//! cast, stepped, and inspected without a game engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactCallback, ContactService};
use crate::effects::{EffectService, EffectTemplate};
use crate::error::HostError;
use crate::handle::{EffectHandle, ObjectHandle};
use crate::objects::{ObjectDesc, ObjectService, RigidBody};

/// Configuration for a [`SimWorld`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimWorldConfig {
    /// Contact radius given to spawned objects.
    pub object_radius: f32,
}

impl Default for SimWorldConfig {
    fn default() -> Self {
        Self {
            object_radius: 0.25,
        }
    }
}

/// A simulated object.
#[derive(Debug, Clone, PartialEq)]
pub struct SimObject {
    /// Display name.
    pub name: String,
    /// World position.
    pub position: Vec3,
    /// Facing direction.
    pub forward: Vec3,
    /// Rigid body, if dynamic.
    pub body: Option<RigidBody>,
    /// Contact radius.
    pub radius: f32,
    /// Whether the one-shot first contact has already happened.
    pub contacted: bool,
}

/// A simulated effect instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimEffect {
    /// Template name.
    pub template: String,
    /// Position at instantiation (or offset source when parented).
    pub position: Vec3,
    /// Parent object, if any.
    pub parent: Option<ObjectHandle>,
}

#[derive(Default)]
struct WorldState {
    next_object: u64,
    next_effect: u64,
    objects: BTreeMap<ObjectHandle, SimObject>,
    effects: BTreeMap<EffectHandle, SimEffect>,
    listeners: HashMap<ObjectHandle, Vec<ContactCallback>>,
    destroyed: Vec<ObjectHandle>,
}

/// In-memory world of objects and effects.
///
/// Objects are stored in a `BTreeMap` so stepping and contact detection
/// visit them in handle order, which keeps runs reproducible.
///
/// # Example
///
/// ```
/// use spellforge_host::sim::SimWorld;
/// use spellforge_host::{ContactService, ObjectDesc, ObjectService, RigidBody};
/// use glam::Vec3;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let world = SimWorld::new();
/// world.spawn_obstacle("wall", Vec3::new(0.0, 0.0, 2.0), 0.5);
/// let ball = world.spawn(
///     ObjectDesc::new("ball", Vec3::ZERO).with_body(RigidBody::moving(Vec3::Z * 4.0)),
/// );
///
/// let hit = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&hit);
/// world
///     .on_first_contact(ball, Box::new(move |_| flag.store(true, Ordering::SeqCst)))
///     .unwrap();
///
/// world.step(0.5);
/// assert!(hit.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct SimWorld {
    config: SimWorldConfig,
    state: Mutex<WorldState>,
}

impl std::fmt::Debug for SimWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SimWorld")
            .field("config", &self.config)
            .field("objects", &state.objects.len())
            .field("effects", &state.effects.len())
            .field("destroyed", &state.destroyed.len())
            .finish()
    }
}

impl SimWorld {
    /// Creates an empty world with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty world with the given configuration.
    #[must_use]
    pub fn with_config(config: SimWorldConfig) -> Self {
        Self {
            config,
            state: Mutex::default(),
        }
    }

    /// Spawns a static obstacle with an explicit contact radius.
    pub fn spawn_obstacle(&self, name: &str, position: Vec3, radius: f32) -> ObjectHandle {
        let mut state = self.lock();
        Self::insert_object(
            &mut state,
            SimObject {
                name: name.to_string(),
                position,
                forward: Vec3::Z,
                body: None,
                radius,
                contacted: false,
            },
        )
    }

    /// Advances bodies by `dt` seconds and delivers first contacts.
    ///
    /// Returns the number of first contacts that occurred.
    pub fn step(&self, dt: f32) -> usize {
        let fired = {
            let mut state = self.lock();

            for object in state.objects.values_mut() {
                if let Some(body) = object.body {
                    object.position += body.velocity * dt;
                }
            }

            let contacts = Self::detect_contacts(&state);
            let mut fired = Vec::with_capacity(contacts.len());
            for contact in contacts {
                if let Some(object) = state.objects.get_mut(&contact.object) {
                    object.contacted = true;
                }
                let listeners = state.listeners.remove(&contact.object).unwrap_or_default();
                fired.push((contact, listeners));
            }
            fired
        };

        let count = fired.len();
        for (contact, listeners) in fired {
            tracing::debug!(object = %contact.object, listeners = listeners.len(), "first contact");
            for listener in listeners {
                listener(contact);
            }
        }
        count
    }

    /// Forces the first contact of `object`, as if it had touched `other`.
    ///
    /// Returns `false` if the object is gone or has already had its first
    /// contact.
    pub fn touch(&self, object: ObjectHandle, other: Option<ObjectHandle>) -> bool {
        let (contact, listeners) = {
            let mut state = self.lock();
            let Some(sim_object) = state.objects.get_mut(&object) else {
                return false;
            };
            if sim_object.contacted || other == Some(object) {
                return false;
            }
            sim_object.contacted = true;
            let contact = Contact {
                object,
                other,
                point: sim_object.position,
            };
            (contact, state.listeners.remove(&object).unwrap_or_default())
        };

        for listener in listeners {
            listener(contact);
        }
        true
    }

    /// Returns a copy of an object's state.
    #[must_use]
    pub fn object(&self, handle: ObjectHandle) -> Option<SimObject> {
        self.lock().objects.get(&handle).cloned()
    }

    /// Handles of live objects with the given name, in handle order.
    #[must_use]
    pub fn objects_named(&self, name: &str) -> Vec<ObjectHandle> {
        self.lock()
            .objects
            .iter()
            .filter(|(_, object)| object.name == name)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Every successful destruction so far, in order.
    #[must_use]
    pub fn destroyed(&self) -> Vec<ObjectHandle> {
        self.lock().destroyed.clone()
    }

    /// How many times `handle` was destroyed (0 or 1 for a correct caller of
    /// a correct host, but tests assert it).
    #[must_use]
    pub fn destroy_count(&self, handle: ObjectHandle) -> usize {
        self.lock().destroyed.iter().filter(|h| **h == handle).count()
    }

    /// Returns a copy of every live effect.
    #[must_use]
    pub fn effects(&self) -> Vec<(EffectHandle, SimEffect)> {
        self.lock()
            .effects
            .iter()
            .map(|(handle, effect)| (*handle, effect.clone()))
            .collect()
    }

    /// Current world position of an effect; parented effects follow their parent.
    #[must_use]
    pub fn effect_position(&self, handle: EffectHandle) -> Option<Vec3> {
        let state = self.lock();
        let effect = state.effects.get(&handle)?;
        match effect.parent {
            Some(parent) => state.objects.get(&parent).map(|object| object.position),
            None => Some(effect.position),
        }
    }

    /// Number of contact listeners still waiting for a first contact.
    #[must_use]
    pub fn pending_listeners(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }

    /// Drops every waiting contact listener without running it. Returns how
    /// many were dropped.
    pub fn clear_listeners(&self) -> usize {
        let dropped = std::mem::take(&mut self.lock().listeners);
        let count = dropped.values().map(Vec::len).sum();
        drop(dropped);
        count
    }

    fn detect_contacts(state: &WorldState) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for (handle, object) in &state.objects {
            if object.contacted || object.body.is_none() {
                continue;
            }
            let hit = state.objects.iter().find(|(other_handle, other)| {
                *other_handle != handle
                    && object.position.distance(other.position) <= object.radius + other.radius
            });
            if let Some((other_handle, other)) = hit {
                contacts.push(Contact {
                    object: *handle,
                    other: Some(*other_handle),
                    point: object.position.lerp(other.position, 0.5),
                });
            }
        }
        contacts
    }

    fn insert_object(state: &mut WorldState, object: SimObject) -> ObjectHandle {
        let handle = ObjectHandle::new(state.next_object);
        state.next_object += 1;
        state.objects.insert(handle, object);
        handle
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectService for SimWorld {
    fn spawn(&self, desc: ObjectDesc) -> ObjectHandle {
        let mut state = self.lock();
        let handle = Self::insert_object(
            &mut state,
            SimObject {
                name: desc.name,
                position: desc.position,
                forward: desc.forward,
                body: desc.body,
                radius: self.config.object_radius,
                contacted: false,
            },
        );
        tracing::trace!(object = %handle, "spawned");
        handle
    }

    fn destroy(&self, handle: ObjectHandle) -> bool {
        // Listeners are dropped outside the lock; their captures may hold
        // other world handles.
        let dropped_listeners = {
            let mut state = self.lock();
            if state.objects.remove(&handle).is_none() {
                return false;
            }
            state.effects.retain(|_, effect| effect.parent != Some(handle));
            state.destroyed.push(handle);
            state.listeners.remove(&handle)
        };
        drop(dropped_listeners);
        tracing::trace!(object = %handle, "destroyed");
        true
    }

    fn exists(&self, handle: ObjectHandle) -> bool {
        self.lock().objects.contains_key(&handle)
    }

    fn position(&self, handle: ObjectHandle) -> Option<Vec3> {
        self.lock().objects.get(&handle).map(|object| object.position)
    }

    fn set_position(&self, handle: ObjectHandle, position: Vec3) -> Result<(), HostError> {
        let mut state = self.lock();
        let object = state
            .objects
            .get_mut(&handle)
            .ok_or(HostError::ObjectGone(handle))?;
        object.position = position;
        Ok(())
    }
}

impl ContactService for SimWorld {
    fn on_first_contact(
        &self,
        object: ObjectHandle,
        callback: ContactCallback,
    ) -> Result<(), HostError> {
        let mut state = self.lock();
        let contacted = state
            .objects
            .get(&object)
            .map(|o| o.contacted)
            .ok_or(HostError::ObjectGone(object))?;
        if !contacted {
            state.listeners.entry(object).or_default().push(callback);
        }
        Ok(())
    }
}

impl EffectService for SimWorld {
    fn instantiate_effect(
        &self,
        template: &EffectTemplate,
        at: Vec3,
        parent: Option<ObjectHandle>,
    ) -> Result<EffectHandle, HostError> {
        if template.name.is_empty() {
            return Err(HostError::UnknownEffectTemplate(template.name.clone()));
        }

        let mut state = self.lock();
        if let Some(parent) = parent {
            if !state.objects.contains_key(&parent) {
                return Err(HostError::ObjectGone(parent));
            }
        }

        let handle = EffectHandle::new(state.next_effect);
        state.next_effect += 1;
        state.effects.insert(
            handle,
            SimEffect {
                template: template.name.clone(),
                position: at,
                parent,
            },
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn moving(world: &SimWorld, at: Vec3, velocity: Vec3) -> ObjectHandle {
        world.spawn(ObjectDesc::new("mover", at).with_body(RigidBody::moving(velocity)))
    }

    fn counting_listener(count: &Arc<AtomicUsize>) -> ContactCallback {
        let count = Arc::clone(count);
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn spawn_and_destroy() {
            let world = SimWorld::new();
            let handle = world.spawn(ObjectDesc::new("a", Vec3::ONE));
            assert!(world.exists(handle));
            assert_eq!(world.position(handle), Some(Vec3::ONE));

            assert!(world.destroy(handle));
            assert!(!world.exists(handle));
            assert!(!world.destroy(handle));
            assert_eq!(world.destroy_count(handle), 1);
        }

        #[test]
        fn set_position_on_missing_object_fails() {
            let world = SimWorld::new();
            let handle = world.spawn(ObjectDesc::new("a", Vec3::ZERO));
            world.destroy(handle);
            assert_eq!(
                world.set_position(handle, Vec3::X),
                Err(HostError::ObjectGone(handle))
            );
        }

        #[test]
        fn bodies_move_statics_do_not() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::X * 2.0);
            let wall = world.spawn_obstacle("wall", Vec3::new(0.0, 50.0, 0.0), 1.0);
            world.step(0.5);
            assert_eq!(world.position(body), Some(Vec3::X));
            assert_eq!(world.position(wall), Some(Vec3::new(0.0, 50.0, 0.0)));
        }
    }

    mod contact_tests {
        use super::*;

        #[test]
        fn first_contact_fires_once() {
            let world = SimWorld::new();
            world.spawn_obstacle("wall", Vec3::new(1.0, 0.0, 0.0), 0.5);
            let body = moving(&world, Vec3::ZERO, Vec3::X);
            let count = Arc::new(AtomicUsize::new(0));
            world.on_first_contact(body, counting_listener(&count)).unwrap();

            world.step(0.5);
            world.step(0.5);
            world.step(0.5);
            assert_eq!(count.load(Ordering::SeqCst), 1);
            assert!(world.object(body).unwrap().contacted);
        }

        #[test]
        fn late_listener_never_fires() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::ZERO);
            assert!(world.touch(body, None));

            let count = Arc::new(AtomicUsize::new(0));
            world.on_first_contact(body, counting_listener(&count)).unwrap();
            assert!(!world.touch(body, None));
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn self_touch_is_ignored() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::ZERO);
            assert!(!world.touch(body, Some(body)));
            assert!(!world.object(body).unwrap().contacted);
        }

        #[test]
        fn destroyed_object_drops_listeners() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::ZERO);
            let count = Arc::new(AtomicUsize::new(0));
            world.on_first_contact(body, counting_listener(&count)).unwrap();
            world.destroy(body);
            assert!(!world.touch(body, None));
            assert_eq!(count.load(Ordering::SeqCst), 0);
            assert!(world.on_first_contact(body, counting_listener(&count)).is_err());
        }

        #[test]
        fn cleared_listeners_never_run() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::ZERO);
            let count = Arc::new(AtomicUsize::new(0));
            world.on_first_contact(body, counting_listener(&count)).unwrap();
            world.on_first_contact(body, counting_listener(&count)).unwrap();
            assert_eq!(world.pending_listeners(), 2);

            assert_eq!(world.clear_listeners(), 2);
            assert_eq!(world.pending_listeners(), 0);
            assert!(world.touch(body, None));
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn listener_may_destroy_its_object() {
            let world = Arc::new(SimWorld::new());
            let body = moving(&world, Vec3::ZERO, Vec3::ZERO);
            let inner = Arc::clone(&world);
            world
                .on_first_contact(
                    body,
                    Box::new(move |contact| {
                        inner.destroy(contact.object);
                    }),
                )
                .unwrap();
            assert!(world.touch(body, None));
            assert!(!world.exists(body));
        }
    }

    mod effect_tests {
        use super::*;

        #[test]
        fn parented_effect_follows_and_dies_with_parent() {
            let world = SimWorld::new();
            let body = moving(&world, Vec3::ZERO, Vec3::Y);
            let fx = world
                .instantiate_effect(&EffectTemplate::new("trail", 1.0), Vec3::ZERO, Some(body))
                .unwrap();

            world.step(1.0);
            assert_eq!(world.effect_position(fx), Some(Vec3::Y));

            world.destroy(body);
            assert!(world.effects().is_empty());
        }

        #[test]
        fn effect_on_missing_parent_fails() {
            let world = SimWorld::new();
            let body = world.spawn(ObjectDesc::new("a", Vec3::ZERO));
            world.destroy(body);
            let result =
                world.instantiate_effect(&EffectTemplate::new("trail", 1.0), Vec3::ZERO, Some(body));
            assert_eq!(result, Err(HostError::ObjectGone(body)));
        }

        #[test]
        fn unnamed_template_is_rejected() {
            let world = SimWorld::new();
            let result = world.instantiate_effect(&EffectTemplate::new("", 1.0), Vec3::ZERO, None);
            assert!(matches!(result, Err(HostError::UnknownEffectTemplate(_))));
        }
    }
}
