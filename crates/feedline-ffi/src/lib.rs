use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex};

use feedline_core::logging::{DEFAULT_LOG_DIRECTIVE, init_logging};
use feedline_core::models::UserId;
use feedline_core::persistence::{MigrationStore, UserRecordStore};
use feedline_core::recent_search::RecentSearchStore;
use feedline_core::sqlite::SqliteStore;
use lazy_static::lazy_static;

struct FeedlineState {
    records: Arc<dyn UserRecordStore>,
}

lazy_static! {
    static ref STATE: Mutex<Option<FeedlineState>> = Mutex::new(None);
}

/// Initialize the Feedline core with the given SQLite database path.
///
/// # Safety
///
/// `db_path` must be a valid, non-null pointer to a NUL-terminated UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_init(db_path: *const c_char) -> bool {
    let Some(path_str) = (unsafe { read_c_str(db_path) }) else {
        return false;
    };

    let Ok(mut guard) = STATE.lock() else {
        return false;
    };
    if guard.is_some() {
        return true;
    }

    init_logging(DEFAULT_LOG_DIRECTIVE);

    let store = Arc::new(SqliteStore::new(path_str));
    if let Err(error) = store.migrate_to_latest() {
        tracing::error!(
            kind = ?error.kind,
            message = %error.message,
            "failed to migrate feedline database"
        );
        return false;
    }

    *guard = Some(FeedlineState { records: store });
    true
}

/// Recent searches of `user_id` as a JSON array, most recent first.
///
/// A null `user_id` means no signed-in user and yields `[]`. Returns null
/// when the core is not initialized or `user_id` is not UTF-8; both are
/// logged. Free the result with `feedline_free_string`.
///
/// # Safety
///
/// `user_id` must be null or a valid pointer to a NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_recent_searches(user_id: *const c_char) -> *mut c_char {
    let Some(store) = (unsafe { recent_search_store(user_id) }) else {
        return std::ptr::null_mut();
    };

    let json = match serde_json::to_string(&store.get()) {
        Ok(j) => j,
        Err(_) => return std::ptr::null_mut(),
    };

    match CString::new(json) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
///
/// `user_id` must be null or a valid C string; `entry` must be a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_recent_search_add(
    user_id: *const c_char,
    entry: *const c_char,
) -> bool {
    let Some(store) = (unsafe { recent_search_store(user_id) }) else {
        return false;
    };
    let Some(entry) = (unsafe { read_c_str(entry) }) else {
        return false;
    };
    report("add", store.add(entry))
}

/// # Safety
///
/// `user_id` must be null or a valid C string; `entry` must be a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_recent_search_remove(
    user_id: *const c_char,
    entry: *const c_char,
) -> bool {
    let Some(store) = (unsafe { recent_search_store(user_id) }) else {
        return false;
    };
    let Some(entry) = (unsafe { read_c_str(entry) }) else {
        return false;
    };
    report("remove", store.remove(entry))
}

/// # Safety
///
/// `user_id` must be null or a valid pointer to a NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_recent_search_clear(user_id: *const c_char) -> bool {
    let Some(store) = (unsafe { recent_search_store(user_id) }) else {
        return false;
    };
    report("clear", store.clear())
}

/// Deletes every record kept for `user_id`, recent searches included.
/// Call on sign-out. A null `user_id` is an accepted no-op.
///
/// # Safety
///
/// `user_id` must be null or a valid pointer to a NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_recent_search_forget_user(user_id: *const c_char) -> bool {
    let Some(mut store) = (unsafe { recent_search_store(user_id) }) else {
        return false;
    };
    report("forget_user", store.sign_out_and_forget())
}

/// Free a string previously returned by a `feedline_*` function.
///
/// # Safety
///
/// `s` must be a pointer previously returned by a `feedline_*` function, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn feedline_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

unsafe fn recent_search_store(user_id: *const c_char) -> Option<RecentSearchStore> {
    let records = {
        let guard = STATE.lock().ok()?;
        let Some(state) = guard.as_ref() else {
            tracing::warn!("feedline_init has not been called");
            return None;
        };
        state.records.clone()
    };

    let user = if user_id.is_null() {
        None
    } else {
        let Ok(raw) = unsafe { CStr::from_ptr(user_id) }.to_str() else {
            tracing::error!("rejecting user id that is not valid UTF-8");
            return None;
        };
        // Blank ids are treated as signed out.
        UserId::new(raw).ok()
    };

    Some(RecentSearchStore::new(user, records))
}

unsafe fn read_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn report(operation: &str, outcome: Result<(), feedline_core::models::CoreError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(
                operation,
                user = ?error.user,
                kind = ?error.kind,
                message = %error.message,
                "recent search operation failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(value: &str) -> CString {
        CString::new(value).unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let value = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        unsafe { feedline_free_string(ptr) };
        value
    }

    // The core is process-wide, so every test shares one database.
    fn init_core() {
        let path = std::env::temp_dir()
            .join(format!("feedline-ffi-{}.sqlite3", std::process::id()));
        let path_c = c(path.to_str().unwrap());
        assert!(unsafe { feedline_init(path_c.as_ptr()) });
    }

    #[test]
    fn recent_searches_round_trip_through_the_c_abi() {
        init_core();

        unsafe {
            let alice = c("user-alice");
            let bob = c("user-bob");

            assert!(feedline_recent_search_add(alice.as_ptr(), c("rust").as_ptr()));
            assert!(feedline_recent_search_add(alice.as_ptr(), c("tokio").as_ptr()));
            assert!(feedline_recent_search_add(alice.as_ptr(), c("rust").as_ptr()));

            assert_eq!(
                take_string(feedline_recent_searches(alice.as_ptr())),
                r#"["rust","tokio"]"#
            );
            assert_eq!(take_string(feedline_recent_searches(bob.as_ptr())), "[]");

            // Signed out: reads are empty, writes are accepted no-ops.
            assert_eq!(
                take_string(feedline_recent_searches(std::ptr::null())),
                "[]"
            );
            assert!(feedline_recent_search_add(std::ptr::null(), c("x").as_ptr()));

            assert!(feedline_recent_search_remove(alice.as_ptr(), c("tokio").as_ptr()));
            assert_eq!(
                take_string(feedline_recent_searches(alice.as_ptr())),
                r#"["rust"]"#
            );

            assert!(feedline_recent_search_clear(alice.as_ptr()));
            assert_eq!(take_string(feedline_recent_searches(alice.as_ptr())), "[]");
        }
    }

    #[test]
    fn concurrent_adds_through_the_c_abi_keep_every_entry() {
        init_core();

        let user = c("user-concurrent");
        unsafe {
            assert!(feedline_recent_search_forget_user(user.as_ptr()));
        }

        let writers: Vec<_> = (0..2)
            .map(|writer| {
                std::thread::spawn(move || {
                    let user = c("user-concurrent");
                    for index in 0..10 {
                        let entry = c(&format!("w{writer}-{index}"));
                        assert!(unsafe {
                            feedline_recent_search_add(user.as_ptr(), entry.as_ptr())
                        });
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let json = unsafe { take_string(feedline_recent_searches(user.as_ptr())) };
        let entries: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(entries.len(), 20);

        unsafe {
            assert!(feedline_recent_search_forget_user(user.as_ptr()));
            assert_eq!(take_string(feedline_recent_searches(user.as_ptr())), "[]");
            assert!(feedline_recent_search_forget_user(std::ptr::null()));
        }
    }

    #[test]
    fn non_utf8_user_id_is_rejected() {
        init_core();

        let invalid = CString::new(vec![0xff, 0xfe]).unwrap();
        unsafe {
            assert!(feedline_recent_searches(invalid.as_ptr()).is_null());
            assert!(!feedline_recent_search_add(invalid.as_ptr(), c("x").as_ptr()));
        }
    }
}
