// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch event admission: turns the raw watch stream into typed create/update/delete
//! events and drops updates that cannot change the reconcile outcome.

use crate::config::AnnotationKeys;
use crate::types::VirtualMachine;
use futures::{future, Stream, StreamExt};
use kube::runtime::{reflector::ObjectRef, watcher};
use kube::{Resource, ResourceExt};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::{debug, info};

/// A watch event for one object kind
#[derive(Debug, Clone)]
pub enum ResourceEvent<K> {
    Created(K),
    Updated { old: K, new: K },
    Deleted(K),
}

impl<K> ResourceEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Created(obj) | ResourceEvent::Deleted(obj) => obj,
            ResourceEvent::Updated { new, .. } => new,
        }
    }

    pub fn into_object(self) -> K {
        match self {
            ResourceEvent::Created(obj) | ResourceEvent::Deleted(obj) => obj,
            ResourceEvent::Updated { new, .. } => new,
        }
    }
}

/// Decides whether an event warrants a reconciliation pass
pub trait Admission<K> {
    fn admits(&self, event: &ResourceEvent<K>) -> bool;
}

/// Admission rules for VirtualMachines: creates and deletes always pass; updates pass when
/// the processed flag, printable status or generation changed, or deletion just started.
#[derive(Debug, Clone)]
pub struct VmAdmission {
    keys: AnnotationKeys,
}

impl VmAdmission {
    pub fn new(keys: AnnotationKeys) -> Self {
        Self { keys }
    }
}

impl Admission<VirtualMachine> for VmAdmission {
    fn admits(&self, event: &ResourceEvent<VirtualMachine>) -> bool {
        match event {
            ResourceEvent::Created(_) | ResourceEvent::Deleted(_) => true,
            ResourceEvent::Updated { old, new } => {
                old.annotation(&self.keys.processed) != new.annotation(&self.keys.processed)
                    || old.printable_status() != new.printable_status()
                    || old.metadata.generation != new.metadata.generation
                    || (!old.is_being_deleted() && new.is_being_deleted())
            }
        }
    }
}

/// Remembers the last seen version of every object so updates can be told apart from creates
pub struct EventTracker<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash,
{
    seen: HashMap<ObjectRef<K>, K>,
    relisted: Option<HashSet<ObjectRef<K>>>,
}

impl<K> Default for EventTracker<K>
where
    K: Resource,
    K::DynamicType: Eq + Hash,
{
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K> EventTracker<K>
where
    K: Resource + Clone,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    pub fn track(&mut self, event: watcher::Event<K>) -> Option<ResourceEvent<K>> {
        match event {
            watcher::Event::Apply(obj) => Some(self.applied(obj)),
            watcher::Event::InitApply(obj) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ObjectRef::from_obj(&obj));
                }
                Some(self.applied(obj))
            }
            watcher::Event::Delete(obj) => {
                self.seen.remove(&ObjectRef::from_obj(&obj));
                Some(ResourceEvent::Deleted(obj))
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                None
            }
            watcher::Event::InitDone => {
                // Objects missing from a relist were deleted while the watch was down
                if let Some(relisted) = self.relisted.take() {
                    self.seen.retain(|key, _| relisted.contains(key));
                }
                None
            }
        }
    }

    fn applied(&mut self, obj: K) -> ResourceEvent<K> {
        match self.seen.insert(ObjectRef::from_obj(&obj), obj.clone()) {
            Some(old) => ResourceEvent::Updated { old, new: obj },
            None => ResourceEvent::Created(obj),
        }
    }
}

/// Filter a raw watch stream down to the objects whose events are admitted
pub fn admission_stream<K, A, S>(
    events: S,
    admission: A,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send
where
    K: Resource + Clone + Send + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send,
    A: Admission<K> + Send + 'static,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let mut tracker = EventTracker::<K>::default();

    events.filter_map(move |event| {
        let admitted = match event {
            Ok(event) => tracker.track(event).and_then(|event| {
                let name = event.object().name_any();
                if !admission.admits(&event) {
                    debug!("Ignoring update of {} without relevant changes", name);
                    return None;
                }
                if let ResourceEvent::Deleted(_) = &event {
                    info!("Deletion event received for {}", name);
                }
                Some(Ok(event.into_object()))
            }),
            Err(e) => Some(Err(e)),
        };
        future::ready(admitted)
    })
}
