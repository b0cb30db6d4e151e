//! Keyed storage whose entries carry a creation time and an optional max-age.
//!
//! Nothing expires by itself: the maintenance sweep asks for expired keys with
//! either full or half-life semantics and decides what to do with them. Equality
//! of entries is by key only, so re-inserting under an existing key replaces
//! the value and its expiration.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// When an item was (re)stamped and how long it lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationDetails {
    created: Instant,
    /// `None` never expires
    max_age_seconds: Option<u32>,
}

impl ExpirationDetails {
    pub fn new(max_age_seconds: Option<u32>, now: Instant) -> Self {
        Self {
            created: now,
            max_age_seconds,
        }
    }

    pub fn unlimited(now: Instant) -> Self {
        Self::new(None, now)
    }

    pub fn max_age_seconds(&self) -> Option<u32> {
        self.max_age_seconds
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// Reset the creation time, keeping the max-age
    pub fn stamp(&mut self, now: Instant) {
        self.created = now;
    }

    /// Whether more than the max-age (or half of it) has passed since the last stamp
    pub fn has_expired(&self, now: Instant, half_life: bool) -> bool {
        let Some(max_age) = self.max_age_seconds else {
            return false;
        };
        let mut limit_ms = u64::from(max_age) * 1000;
        if half_life {
            limit_ms /= 2;
        }
        elapsed_millis(self.created, now) > limit_ms
    }

    /// Time left before full expiry, `None` for unlimited items
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let max_age = Duration::from_secs(u64::from(self.max_age_seconds?));
        Some(max_age.saturating_sub(now.saturating_duration_since(self.created)))
    }
}

fn elapsed_millis(since: Instant, now: Instant) -> u64 {
    u64::try_from(now.saturating_duration_since(since).as_millis()).unwrap_or(u64::MAX)
}

/// A value stored with its expiration
#[derive(Debug, Clone)]
pub struct RegistryItem<K, V> {
    pub key: K,
    pub value: V,
    pub expiration: ExpirationDetails,
}

impl<K: PartialEq, V> PartialEq for RegistryItem<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Expiring entries keyed by `K`
#[derive(Debug)]
pub struct ExpiringItems<K, V> {
    items: HashMap<K, RegistryItem<K, V>>,
}

impl<K, V> Default for ExpiringItems<K, V> {
    fn default() -> Self {
        Self { items: HashMap::new() }
    }
}

impl<K, V> ExpiringItems<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the replaced item
    pub fn insert(&mut self, key: K, value: V, expiration: ExpirationDetails) -> Option<RegistryItem<K, V>> {
        self.items.insert(
            key.clone(),
            RegistryItem {
                key,
                value,
                expiration,
            },
        )
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&RegistryItem<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.items.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut RegistryItem<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.items.get_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.items.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<RegistryItem<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.items.remove(key)
    }

    /// Remove every item matching `predicate`, returning what was removed
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<RegistryItem<K, V>>
    where
        F: FnMut(&RegistryItem<K, V>) -> bool,
    {
        let keys: Vec<K> = self
            .items
            .values()
            .filter(|item| predicate(item))
            .map(|item| item.key.clone())
            .collect();
        keys.iter().filter_map(|key| self.items.remove(key)).collect()
    }

    pub fn clear(&mut self) -> Vec<RegistryItem<K, V>> {
        self.items.drain().map(|(_, item)| item).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryItem<K, V>> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegistryItem<K, V>> {
        self.items.values_mut()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.values().map(|item| &item.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn expired_keys(&self, now: Instant, half_life: bool) -> Vec<K> {
        self.items
            .values()
            .filter(|item| item.expiration.has_expired(now, half_life))
            .map(|item| item.key.clone())
            .collect()
    }

    /// Re-stamp an entry; false if the key is unknown
    pub fn stamp<Q>(&mut self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        match self.items.get_mut(key) {
            Some(item) => {
                item.expiration.stamp(now);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(60, 59, false, false)]
    #[case(60, 61, false, true)]
    #[case(60, 31, true, true)]
    #[case(60, 29, true, false)]
    #[case(1800, 901, true, true)]
    #[case(1800, 901, false, false)]
    fn test_has_expired(#[case] max_age: u32, #[case] elapsed: u64, #[case] half_life: bool, #[case] expired: bool) {
        let start = Instant::now();
        let details = ExpirationDetails::new(Some(max_age), start);
        assert_eq!(details.has_expired(start + Duration::from_secs(elapsed), half_life), expired);
    }

    #[test]
    fn test_unlimited_never_expires() {
        let start = Instant::now();
        let details = ExpirationDetails::unlimited(start);
        assert!(!details.has_expired(start + Duration::from_secs(u64::from(u32::MAX)), false));
        assert_eq!(details.remaining(start), None);
    }

    #[test]
    fn test_stamp_resets_the_clock() {
        let start = Instant::now();
        let mut details = ExpirationDetails::new(Some(10), start);
        let later = start + Duration::from_secs(11);
        assert!(details.has_expired(later, false));

        details.stamp(later);
        assert!(!details.has_expired(later, false));
        assert_eq!(details.remaining(later), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_insert_replaces_by_key() {
        let now = Instant::now();
        let mut items = ExpiringItems::new();
        assert!(items.insert("a", 1, ExpirationDetails::new(Some(10), now)).is_none());
        let replaced = items.insert("a", 2, ExpirationDetails::unlimited(now)).unwrap();

        assert_eq!(replaced.value, 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items.get("a").unwrap().value, 2);
    }

    #[test]
    fn test_expired_keys_and_remove_where() {
        let now = Instant::now();
        let mut items = ExpiringItems::new();
        items.insert("short".to_string(), 1, ExpirationDetails::new(Some(5), now));
        items.insert("long".to_string(), 2, ExpirationDetails::new(Some(500), now));
        items.insert("forever".to_string(), 3, ExpirationDetails::unlimited(now));

        let later = now + Duration::from_secs(6);
        assert_eq!(items.expired_keys(later, false), vec!["short".to_string()]);

        let removed = items.remove_where(|item| item.value >= 2);
        assert_eq!(removed.len(), 2);
        assert!(items.contains_key("short"));
        assert_eq!(items.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_half_life_expires_no_later_than_full(max_age in 1u32..100_000, elapsed_ms in 0u64..200_000_000) {
            let start = Instant::now();
            let details = ExpirationDetails::new(Some(max_age), start);
            let now = start + Duration::from_millis(elapsed_ms);
            if details.has_expired(now, false) {
                prop_assert!(details.has_expired(now, true));
            }
        }

        #[test]
        fn prop_remaining_is_zero_once_expired(max_age in 1u32..10_000, elapsed in 0u64..20_000) {
            let start = Instant::now();
            let details = ExpirationDetails::new(Some(max_age), start);
            let now = start + Duration::from_secs(elapsed);
            if details.has_expired(now, false) {
                prop_assert_eq!(details.remaining(now), Some(Duration::ZERO));
            }
        }
    }
}
