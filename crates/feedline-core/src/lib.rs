pub mod debounce;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod persistence;
pub mod recent_search;
pub mod sqlite;
