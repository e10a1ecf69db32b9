use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{ParallaxError, Result};

/// State of one cache key.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SlotState {
    Pending,
    Ready,
}

/// Keyed cache with an explicit in-flight state.
///
/// `reserve` marks a key as pending and hands back a [`Reservation`]. A second
/// `reserve` for the same key fails with [`ParallaxError::InFlight`] instead of
/// duplicating the work. Dropping a reservation without completing it (error,
/// cancelled future) frees the key again.
#[derive(Debug)]
pub struct CacheTable<V> {
    /// `None` while pending.
    slots: HashMap<String, Option<V>>,
    abandoned: Rc<RefCell<Vec<String>>>,
}

impl<V> Default for CacheTable<V> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            abandoned: Rc::default(),
        }
    }
}

impl<V> CacheTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops pending slots whose reservation went away.
    fn reap(&mut self) {
        let abandoned = std::mem::take(&mut *self.abandoned.borrow_mut());
        for key in abandoned {
            if matches!(self.slots.get(&key), Some(None)) {
                log::debug!("cache: releasing abandoned reservation '{key}'");
                self.slots.remove(&key);
            }
        }
    }

    pub fn state(&mut self, key: &str) -> Option<SlotState> {
        self.reap();
        self.slots.get(key).map(|slot| match slot {
            None => SlotState::Pending,
            Some(_) => SlotState::Ready,
        })
    }

    pub fn reserve(&mut self, key: &str) -> Result<Reservation> {
        self.reap();
        if self.slots.contains_key(key) {
            return Err(ParallaxError::InFlight(key.to_string()));
        }
        self.slots.insert(key.to_string(), None);
        Ok(Reservation {
            key: key.to_string(),
            abandoned: Rc::clone(&self.abandoned),
            armed: true,
        })
    }

    /// Stores the value for a reserved key and returns it.
    pub fn complete(&mut self, mut reservation: Reservation, value: V) -> &mut V {
        reservation.armed = false;
        let key = std::mem::take(&mut reservation.key);

        self.slots.entry(key).or_default().insert(value)
    }

    /// Inserts a ready value directly, for work that cannot be observed in flight.
    pub fn insert(&mut self, key: &str, value: V) {
        self.reap();
        self.slots.insert(key.to_string(), Some(value));
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.slots.get_mut(key).and_then(Option::as_mut)
    }

    /// Removes a ready value. Pending keys are left to their reservation.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.reap();
        if !matches!(self.slots.get(key), Some(Some(_))) {
            return None;
        }
        self.slots.remove(key).flatten()
    }

    pub fn ready(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots
            .iter()
            .filter_map(|(k, slot)| slot.as_ref().map(|v| (k.as_str(), v)))
    }

    pub fn ready_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.slots
            .iter_mut()
            .filter_map(|(k, slot)| slot.as_mut().map(|v| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.ready().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pending claim on a cache key. Releases the key on drop unless completed.
#[derive(Debug)]
#[must_use = "dropping a reservation releases the key"]
pub struct Reservation {
    key: String,
    abandoned: Rc<RefCell<Vec<String>>>,
    armed: bool,
}

impl Reservation {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.borrow_mut().push(std::mem::take(&mut self.key));
        }
    }
}
