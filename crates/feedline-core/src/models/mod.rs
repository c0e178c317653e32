pub mod error;
pub mod identity;
pub mod list;
pub mod page;
pub mod search;

pub use error::{CoreError, CoreErrorKind};
pub use identity::UserId;
pub use list::{
    DEFAULT_LOADING_INDICATOR_DEBOUNCE, DEFAULT_PAGE_SIZE, ListConfig, ListOperation, ListPhase,
    ListSnapshot,
};
pub use page::{FetchPolicy, Page, PageCursor, PageRequest};
pub use search::{MAX_RECENT_SEARCHES, RecentSearchList};
