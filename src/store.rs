//! Insertion-ordered name → value store.
//!
//! Each analyzer keeps one [`NamedStore`] behind its own `RwLock`. Loading
//! an existing name overwrites the value in place, so listing order is the
//! order names were first seen. The store also remembers which name was
//! loaded last (the "current" entry).

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
pub struct NamedStore<T> {
    entries: Vec<(String, T)>,
    current: Option<String>,
}

impl<T> Default for NamedStore<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            current: None,
        }
    }
}

impl<T> NamedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `name` and marks it current. Returns `true`
    /// when an existing entry was replaced.
    pub fn insert(&mut self, name: &str, value: T) -> bool {
        self.current = Some(name.to_string());
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => {
                self.entries.push((name.to_string(), value));
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The most recently loaded entry that is still present.
    pub fn current(&self) -> Option<(&str, &T)> {
        let name = self.current.as_deref()?;
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, v)| (n.as_str(), v))
    }

    pub fn first(&self) -> Option<(&str, &T)> {
        self.entries.first().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Removes `name`. If it was current, the last remaining entry becomes
    /// current.
    pub fn remove(&mut self, name: &str) -> Option<T> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        let (_, value) = self.entries.remove(pos);
        if self.current.as_deref() == Some(name) {
            self.current = self.entries.last().map(|(n, _)| n.clone());
        }
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read guard that survives a panicked writer.
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write guard that survives a panicked writer.
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_seen_order_and_overwrites_in_place() {
        let mut s = NamedStore::new();
        assert!(!s.insert("a.csv", 1));
        assert!(!s.insert("b.csv", 2));
        assert!(s.insert("a.csv", 3));
        assert_eq!(s.names(), vec!["a.csv", "b.csv"]);
        assert_eq!(s.get("a.csv"), Some(&3));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn current_tracks_last_load() {
        let mut s = NamedStore::new();
        s.insert("a", 1);
        s.insert("b", 2);
        assert_eq!(s.current().map(|(n, _)| n), Some("b"));
        s.insert("a", 10);
        assert_eq!(s.current(), Some(("a", &10)));
    }

    #[test]
    fn removing_current_falls_back_to_last_entry() {
        let mut s = NamedStore::new();
        s.insert("a", 1);
        s.insert("b", 2);
        s.insert("c", 3);
        assert_eq!(s.remove("c"), Some(3));
        assert_eq!(s.current().map(|(n, _)| n), Some("b"));
        assert_eq!(s.remove("missing"), None);
    }

    #[test]
    fn clear_empties_everything() {
        let mut s = NamedStore::new();
        s.insert("a", 1);
        s.clear();
        assert!(s.is_empty());
        assert!(s.current().is_none());
        assert!(s.first().is_none());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let lock = std::sync::Arc::new(RwLock::new(NamedStore::<u8>::new()));
        let l2 = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = l2.write().unwrap();
            panic!("poison");
        })
        .join();
        assert!(lock.is_poisoned());
        write(&lock).insert("x", 1);
        assert_eq!(read(&lock).len(), 1);
    }
}
