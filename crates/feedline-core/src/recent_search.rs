use std::sync::Arc;

use crate::models::{CoreError, CoreErrorKind, RecentSearchList, UserId};
use crate::persistence::{PersistenceResult, RECENT_SEARCH_KEY, UserRecordStore};

/// Per-user list of recent search terms.
///
/// The store is bound to at most one identity at a time. Without an
/// identity it is inert: reads return nothing and writes succeed without
/// touching the backing records.
pub struct RecentSearchStore {
    user: Option<UserId>,
    records: Arc<dyn UserRecordStore>,
}

impl RecentSearchStore {
    pub fn new(user: Option<UserId>, records: Arc<dyn UserRecordStore>) -> Self {
        Self { user, records }
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn switch_identity(&mut self, user: Option<UserId>) {
        if self.user != user {
            tracing::debug!(
                from = ?self.user.as_ref().map(UserId::as_str),
                to = ?user.as_ref().map(UserId::as_str),
                "recent search store identity changed"
            );
        }
        self.user = user;
    }

    pub fn get(&self) -> Vec<String> {
        let Some(user) = self.user.as_ref() else {
            return Vec::new();
        };
        match self.load(user) {
            Ok(list) => list.into_entries(),
            Err(error) => {
                tracing::warn!(
                    user = %user,
                    kind = ?error.kind,
                    message = %error.message,
                    "ignoring unreadable recent search record"
                );
                Vec::new()
            }
        }
    }

    pub fn add(&self, entry: &str) -> PersistenceResult<()> {
        let Some(user) = self.user.as_ref() else {
            return Ok(());
        };
        if entry.trim().is_empty() {
            return Ok(());
        }
        self.update(user, |list| list.push_front(entry))
    }

    pub fn remove(&self, entry: &str) -> PersistenceResult<()> {
        let Some(user) = self.user.as_ref() else {
            return Ok(());
        };
        self.update(user, |list| list.remove(entry))
    }

    pub fn clear(&self) -> PersistenceResult<()> {
        let Some(user) = self.user.as_ref() else {
            return Ok(());
        };
        self.records
            .delete_record(user, RECENT_SEARCH_KEY)
            .map_err(|error| error.for_user(user))
    }

    /// Drops every record kept for the current identity and detaches it.
    pub fn sign_out_and_forget(&mut self) -> PersistenceResult<()> {
        let Some(user) = self.user.take() else {
            return Ok(());
        };
        self.records
            .delete_user(&user)
            .map_err(|error| error.for_user(&user))
    }

    fn load(&self, user: &UserId) -> PersistenceResult<RecentSearchList> {
        let raw = self
            .records
            .read_record(user, RECENT_SEARCH_KEY)
            .map_err(|error| error.for_user(user))?;
        decode(user, raw.as_deref())
    }

    /// Read-modify-write of the user's list as one atomic record update,
    /// so concurrent callers never drop each other's entries. `change`
    /// returns whether the list was modified; unchanged lists are not
    /// written back.
    fn update(
        &self,
        user: &UserId,
        mut change: impl FnMut(&mut RecentSearchList) -> bool,
    ) -> PersistenceResult<()> {
        self.records
            .update_record(user, RECENT_SEARCH_KEY, &mut |raw: Option<&str>| {
                // A corrupt record is replaced rather than blocking the write.
                let mut list = decode(user, raw).unwrap_or_else(|error| {
                    tracing::warn!(
                        user = %user,
                        message = %error.message,
                        "resetting unreadable recent search record"
                    );
                    RecentSearchList::new()
                });
                if !change(&mut list) {
                    return Ok(None);
                }
                encode(user, &list).map(Some)
            })
            .map_err(|error| error.for_user(user))
    }
}

fn decode(user: &UserId, raw: Option<&str>) -> PersistenceResult<RecentSearchList> {
    let Some(raw) = raw else {
        return Ok(RecentSearchList::new());
    };
    let entries: Vec<String> = serde_json::from_str(raw).map_err(|error| {
        CoreError::new(
            CoreErrorKind::SerializationFailure,
            format!("recent search record is not a JSON string array: {error}"),
        )
        .for_user(user)
    })?;
    Ok(RecentSearchList::from_entries(entries))
}

fn encode(user: &UserId, list: &RecentSearchList) -> PersistenceResult<String> {
    serde_json::to_string(list).map_err(|error| {
        CoreError::new(
            CoreErrorKind::SerializationFailure,
            format!("failed to encode recent searches: {error}"),
        )
        .for_user(user)
    })
}
