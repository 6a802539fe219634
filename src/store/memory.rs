//! In-process store with Redis list semantics.
//!
//! Empty lists disappear like they do in Redis, and touching a key with the
//! wrong kind of value is an error. Blocking pops park on a [`Notify`] that
//! every push wakes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::Store;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Entry {
    Counter(i64),
    List(VecDeque<String>),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    pushed: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the list at `key`, head first. Empty if absent.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.lock().ok().and_then(|e| e.get(key).cloned()) {
            Some(Entry::List(list)) => list.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Current value of the counter at `key`.
    pub fn counter(&self, key: &str) -> Option<i64> {
        match self.lock().ok()?.get(key) {
            Some(Entry::Counter(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().is_ok_and(|e| e.contains_key(key))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn try_pop_first(&self, keys: &[String]) -> Result<Option<(String, String)>> {
        let mut entries = self.lock()?;
        for key in keys {
            if let Some(value) = pop_tail(&mut entries, key)? {
                return Ok(Some((key.clone(), value)));
            }
        }
        Ok(None)
    }

    async fn wait_for_item(&self, keys: &[String]) -> Result<(String, String)> {
        loop {
            // Register interest before checking so a push in between still wakes us.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(hit) = self.try_pop_first(keys)? {
                return Ok(hit);
            }
            notified.await;
        }
    }
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<Option<&'a mut VecDeque<String>>> {
    match entries.get_mut(key) {
        None => Ok(None),
        Some(Entry::List(list)) => Ok(Some(list)),
        Some(Entry::Counter(_)) => Err(Error::WrongType(key.to_string())),
    }
}

fn push_head(entries: &mut HashMap<String, Entry>, key: &str, value: String) -> Result<()> {
    match entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::List(VecDeque::new()))
    {
        Entry::List(list) => {
            list.push_front(value);
            Ok(())
        }
        Entry::Counter(_) => Err(Error::WrongType(key.to_string())),
    }
}

fn pop_tail(entries: &mut HashMap<String, Entry>, key: &str) -> Result<Option<String>> {
    let Some(list) = list_mut(entries, key)? else {
        return Ok(None);
    };
    let value = list.pop_back();
    if list.is_empty() {
        entries.remove(key);
    }
    Ok(value)
}

#[async_trait]
impl Store for MemoryStore {
    async fn increment(&self, key: &str) -> Result<i64> {
        let mut entries = self.lock()?;
        match entries
            .entry(key.to_string())
            .or_insert(Entry::Counter(0))
        {
            Entry::Counter(value) => {
                *value += 1;
                Ok(*value)
            }
            Entry::List(_) => Err(Error::WrongType(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<()> {
        push_head(&mut *self.lock()?, key, value.to_string())?;
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>> {
        pop_tail(&mut *self.lock()?, key)
    }

    async fn list_pop_blocking(
        &self,
        keys: &[String],
        timeout_secs: u64,
    ) -> Result<Option<(String, String)>> {
        if timeout_secs == 0 {
            return self.wait_for_item(keys).await.map(Some);
        }
        match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.wait_for_item(keys),
        )
        .await
        {
            Ok(hit) => hit.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn list_remove(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        let mut entries = self.lock()?;
        let Some(list) = list_mut(&mut entries, key)? else {
            return Ok(0);
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut removed = 0usize;

        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        if list.is_empty() {
            entries.remove(key);
        }
        Ok(removed as i64)
    }

    async fn pop_and_push_elsewhere(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        // Check the destination type up front so a failed push never loses the value.
        list_mut(&mut entries, destination)?;
        let Some(value) = pop_tail(&mut entries, source)? else {
            return Ok(None);
        };
        push_head(&mut entries, destination, value.clone())?;
        drop(entries);
        self.pushed.notify_waiters();
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_are_head_push_tail_pop() {
        let store = MemoryStore::new();
        store.list_push("q", "first").await.unwrap();
        store.list_push("q", "second").await.unwrap();
        assert_eq!(store.list("q"), vec!["second", "first"]);
        assert_eq!(store.list_pop("q").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn empty_list_disappears() {
        let store = MemoryStore::new();
        store.list_push("q", "only").await.unwrap();
        store.list_pop("q").await.unwrap();
        assert!(!store.contains_key("q"));
    }

    #[tokio::test]
    async fn counter_and_list_do_not_mix() {
        let store = MemoryStore::new();
        store.increment("k").await.unwrap();
        let err = store.list_push("k", "x").await.unwrap_err();
        assert!(matches!(err, Error::WrongType(_)));
    }

    #[tokio::test]
    async fn remove_from_tail_with_negative_count() {
        let store = MemoryStore::new();
        for v in ["a", "b", "a", "a"] {
            store.list_push("q", v).await.unwrap();
        }
        // head first: a a b a
        assert_eq!(store.list_remove("q", -1, "a").await.unwrap(), 1);
        assert_eq!(store.list("q"), vec!["a", "a", "b"]);
    }
}
