pub mod controller;

pub use controller::PaginatedListController;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::models::{CoreError, Page, PageRequest};

pub type PaginationResult<T> = Result<T, CoreError>;

pub type PageFuture<N> = Pin<Box<dyn Future<Output = PaginationResult<Page<N>>> + Send>>;

/// Abort signal shared between a controller and one in-flight fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchCancellationToken {
    flag: Arc<AtomicBool>,
}

impl FetchCancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cursor-paginated connection feeding a list controller.
pub trait PageSource<N>: Send + Sync {
    fn fetch_page(&self, request: PageRequest, token: FetchCancellationToken) -> PageFuture<N>;

    /// First page for `variables` as currently held in the local store, if
    /// any. Served synchronously before the network answers a refresh.
    fn cached_first_page(&self, _variables: &Value, _count: usize) -> Option<Page<N>> {
        None
    }
}
