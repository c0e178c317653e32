use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{CoreError, CoreErrorKind, UserId};
use crate::persistence::{PersistenceResult, UserRecordStore};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<(UserId, String), String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> PersistenceResult<usize> {
        Ok(self.lock_records()?.len())
    }

    fn lock_records(&self) -> PersistenceResult<MutexGuard<'_, HashMap<(UserId, String), String>>> {
        self.records.lock().map_err(|_| {
            CoreError::new(
                CoreErrorKind::Internal,
                "in-memory record store mutex poisoned",
            )
        })
    }
}

impl UserRecordStore for InMemoryRecordStore {
    fn read_record(&self, user: &UserId, key: &str) -> PersistenceResult<Option<String>> {
        let records = self.lock_records()?;
        Ok(records.get(&(user.clone(), key.to_string())).cloned())
    }

    fn write_record(&self, user: &UserId, key: &str, value: &str) -> PersistenceResult<()> {
        let mut records = self.lock_records()?;
        records.insert((user.clone(), key.to_string()), value.to_string());
        Ok(())
    }

    fn update_record(
        &self,
        user: &UserId,
        key: &str,
        update: &mut dyn FnMut(Option<&str>) -> PersistenceResult<Option<String>>,
    ) -> PersistenceResult<()> {
        let mut records = self.lock_records()?;
        let slot = (user.clone(), key.to_string());
        if let Some(next) = update(records.get(&slot).map(String::as_str))? {
            records.insert(slot, next);
        }
        Ok(())
    }

    fn delete_record(&self, user: &UserId, key: &str) -> PersistenceResult<()> {
        let mut records = self.lock_records()?;
        records.remove(&(user.clone(), key.to_string()));
        Ok(())
    }

    fn delete_user(&self, user: &UserId) -> PersistenceResult<()> {
        let mut records = self.lock_records()?;
        records.retain(|(owner, _), _| owner != user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[test]
    fn records_are_isolated_per_user() {
        let store = InMemoryRecordStore::new();
        store.write_record(&user("a"), "k", "1").unwrap();
        store.write_record(&user("b"), "k", "2").unwrap();

        assert_eq!(store.read_record(&user("a"), "k").unwrap().as_deref(), Some("1"));
        assert_eq!(store.read_record(&user("b"), "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn delete_user_only_removes_that_users_records() {
        let store = InMemoryRecordStore::new();
        store.write_record(&user("a"), "k1", "1").unwrap();
        store.write_record(&user("a"), "k2", "1").unwrap();
        store.write_record(&user("b"), "k1", "2").unwrap();

        store.delete_user(&user("a")).unwrap();

        assert_eq!(store.record_count().unwrap(), 1);
        assert!(store.read_record(&user("a"), "k1").unwrap().is_none());
    }

    #[test]
    fn update_record_sees_current_value_and_can_skip_the_write() {
        let store = InMemoryRecordStore::new();
        store.write_record(&user("a"), "k", "1").unwrap();

        store
            .update_record(&user("a"), "k", &mut |current: Option<&str>| {
                Ok(current.map(|value| format!("{value}2")))
            })
            .unwrap();
        assert_eq!(store.read_record(&user("a"), "k").unwrap().as_deref(), Some("12"));

        store
            .update_record(&user("b"), "k", &mut |current: Option<&str>| {
                assert!(current.is_none());
                Ok(None)
            })
            .unwrap();
        assert_eq!(store.record_count().unwrap(), 1);
    }
}
