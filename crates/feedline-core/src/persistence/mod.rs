pub mod in_memory;

pub use in_memory::InMemoryRecordStore;

use crate::models::{CoreError, UserId};

pub type PersistenceResult<T> = Result<T, CoreError>;

/// Record key under which a user's recent searches are stored.
pub const RECENT_SEARCH_KEY: &str = "recentSearch";

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    /// Applies every pending migration. Refuses databases written by a
    /// newer schema.
    fn migrate_to_latest(&self) -> PersistenceResult<()>;
}

/// Small per-user key-value records. Values are opaque JSON text.
pub trait UserRecordStore: Send + Sync {
    fn read_record(&self, user: &UserId, key: &str) -> PersistenceResult<Option<String>>;

    fn write_record(&self, user: &UserId, key: &str, value: &str) -> PersistenceResult<()>;

    /// Atomic read-modify-write of one record. `update` sees the current
    /// value and returns the replacement, or `None` to leave it untouched.
    /// No other write to the same store interleaves with the update.
    fn update_record(
        &self,
        user: &UserId,
        key: &str,
        update: &mut dyn FnMut(Option<&str>) -> PersistenceResult<Option<String>>,
    ) -> PersistenceResult<()>;

    fn delete_record(&self, user: &UserId, key: &str) -> PersistenceResult<()>;

    fn delete_user(&self, user: &UserId) -> PersistenceResult<()>;
}
