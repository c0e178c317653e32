use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::AbortHandle;
use tokio::time::timeout;

use crate::debounce::DebouncedFlag;
use crate::models::{
    CoreError, CoreErrorKind, FetchPolicy, ListConfig, ListOperation, ListPhase, ListSnapshot,
    Page, PageCursor, PageRequest,
};
use crate::pagination::{FetchCancellationToken, PageSource, PaginationResult};

/// Drives one cursor-paginated list on behalf of a single screen.
///
/// The controller owns the list state exclusively. Its actions
/// (`load_initial`, `load_next`, `refresh`, `refetch`) return as soon as the
/// fetch is issued; results are applied when the fetch completes. At most
/// one fetch is in flight: a refresh supersedes a pending load-next and a
/// refetch supersedes anything, and superseded results are discarded.
pub struct PaginatedListController<N> {
    source: Arc<dyn PageSource<N>>,
    config: ListConfig,
    inner: Arc<Mutex<ControllerState<N>>>,
    idle: Arc<Notify>,
    loading_indicator: DebouncedFlag,
}

struct ControllerState<N> {
    variables: Value,
    phase: ListPhase,
    items: Vec<N>,
    has_next: bool,
    end_cursor: Option<PageCursor>,
    last_error: Option<CoreError>,
    in_flight: Option<InFlightFetch>,
    next_fetch_id: u64,
    disposed: bool,
}

struct InFlightFetch {
    id: u64,
    operation: ListOperation,
    token: FetchCancellationToken,
    abort_handle: AbortHandle,
}

impl InFlightFetch {
    fn cancel(self) {
        self.token.cancel();
        self.abort_handle.abort();
    }
}

impl<N> ControllerState<N> {
    fn new(variables: Value) -> Self {
        Self {
            variables,
            phase: ListPhase::Idle,
            items: Vec::new(),
            has_next: false,
            end_cursor: None,
            last_error: None,
            in_flight: None,
            next_fetch_id: 0,
            disposed: false,
        }
    }

    fn wants_loading_indicator(&self) -> bool {
        self.phase == ListPhase::LoadingNext
    }

    fn supersede_in_flight(&mut self, by: ListOperation) {
        if let Some(superseded) = self.in_flight.take() {
            tracing::debug!(
                operation = superseded.operation.as_str(),
                fetch_id = superseded.id,
                by = by.as_str(),
                "in-flight fetch superseded"
            );
            superseded.cancel();
        }
    }

    fn replace_with(&mut self, page: Page<N>) {
        let (has_next, end_cursor) = pagination_info(page.has_next, page.end_cursor);
        self.items = page.nodes;
        self.has_next = has_next;
        self.end_cursor = end_cursor;
    }

    fn append(&mut self, page: Page<N>) {
        let (has_next, end_cursor) = pagination_info(page.has_next, page.end_cursor);
        self.items.extend(page.nodes);
        self.has_next = has_next;
        self.end_cursor = end_cursor;
    }
}

impl<N> ControllerState<N>
where
    N: Clone,
{
    fn snapshot(&self) -> ListSnapshot<N> {
        ListSnapshot {
            items: self.items.clone(),
            has_next: self.has_next,
            phase: self.phase,
            last_error: self.last_error.clone(),
        }
    }
}

impl<N> PaginatedListController<N>
where
    N: Clone + Send + 'static,
{
    pub fn new(source: Arc<dyn PageSource<N>>, config: ListConfig) -> PaginationResult<Self> {
        Self::with_variables(source, config, Value::Object(Map::new()))
    }

    /// Controller whose first query runs with `variables`.
    pub fn with_variables(
        source: Arc<dyn PageSource<N>>,
        config: ListConfig,
        variables: Value,
    ) -> PaginationResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            inner: Arc::new(Mutex::new(ControllerState::new(variables))),
            idle: Arc::new(Notify::new()),
            loading_indicator: DebouncedFlag::new(config.loading_indicator_debounce),
        })
    }

    pub fn config(&self) -> ListConfig {
        self.config
    }

    /// Shows the locally stored first page when there is one, otherwise
    /// fetches it. Returns whether a fetch was issued.
    pub async fn load_initial(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.disposed || state.phase != ListPhase::Idle {
            return false;
        }

        if let Some(cached) = self
            .source
            .cached_first_page(&state.variables, self.config.page_size)
        {
            state.replace_with(cached);
            state.last_error = None;
            tracing::debug!(
                items = state.items.len(),
                "initial page served from local store"
            );
            return false;
        }

        state.phase = ListPhase::Refreshing;
        let request = PageRequest::first(
            state.variables.clone(),
            self.config.page_size,
            FetchPolicy::StoreOrNetwork,
        );
        self.begin_fetch(&mut state, ListOperation::InitialLoad, request);
        true
    }

    /// Requests the page after the current cursor. A no-op unless the list
    /// is idle and the connection reported more items.
    pub async fn load_next(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.disposed || state.phase != ListPhase::Idle || !state.has_next {
            return false;
        }

        state.phase = ListPhase::LoadingNext;
        let request = PageRequest {
            variables: state.variables.clone(),
            after: state.end_cursor.clone(),
            count: self.config.page_size,
            policy: FetchPolicy::NetworkOnly,
        };
        self.begin_fetch(&mut state, ListOperation::LoadNext, request);
        true
    }

    /// Re-fetches the first page from the network and replaces the list
    /// with it. Calls made while a refresh is running collapse into it.
    pub async fn refresh(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.disposed || state.phase == ListPhase::Refreshing {
            return false;
        }

        state.supersede_in_flight(ListOperation::Refresh);
        state.phase = ListPhase::Refreshing;
        if let Some(cached) = self
            .source
            .cached_first_page(&state.variables, self.config.page_size)
        {
            state.replace_with(cached);
        }

        let request = PageRequest::first(
            state.variables.clone(),
            self.config.page_size,
            FetchPolicy::StoreAndNetwork,
        );
        self.begin_fetch(&mut state, ListOperation::Refresh, request);
        true
    }

    /// Re-runs the query with new `variables` (a changed search term, say)
    /// and replaces the list with its first page. Whatever is in flight,
    /// a refresh included, is superseded, and the previous items are
    /// dropped so no page of the old query is ever extended. Later
    /// `load_next` and `refresh` calls use the new variables.
    ///
    /// Returns whether a fetch was issued. Refetching with the current
    /// variables is a no-op; a first page already in the local store is
    /// shown without a request.
    pub async fn refetch(&self, variables: Value) -> bool {
        let mut state = self.inner.lock().await;
        if state.disposed || state.variables == variables {
            return false;
        }

        state.supersede_in_flight(ListOperation::Refetch);
        state.variables = variables;
        state.last_error = None;

        if let Some(cached) = self
            .source
            .cached_first_page(&state.variables, self.config.page_size)
        {
            state.replace_with(cached);
            state.phase = ListPhase::Idle;
            self.loading_indicator.set(false);
            self.idle.notify_waiters();
            return false;
        }

        state.items.clear();
        state.has_next = false;
        state.end_cursor = None;
        state.phase = ListPhase::Refreshing;
        let request = PageRequest::first(
            state.variables.clone(),
            self.config.page_size,
            FetchPolicy::StoreOrNetwork,
        );
        self.begin_fetch(&mut state, ListOperation::Refetch, request);
        true
    }

    pub async fn variables(&self) -> Value {
        self.inner.lock().await.variables.clone()
    }

    /// Cancels any in-flight fetch and stops accepting actions. Results
    /// that arrive afterwards are dropped.
    pub async fn dispose(&self) {
        {
            let mut state = self.inner.lock().await;
            if state.disposed {
                return;
            }
            state.disposed = true;
            if let Some(in_flight) = state.in_flight.take() {
                in_flight.cancel();
            }
            state.phase = ListPhase::Idle;
        }
        self.loading_indicator.set(false);
        self.idle.notify_waiters();
    }

    pub async fn is_disposed(&self) -> bool {
        self.inner.lock().await.disposed
    }

    pub async fn snapshot(&self) -> ListSnapshot<N> {
        self.inner.lock().await.snapshot()
    }

    pub async fn wait_until_idle(
        &self,
        timeout_duration: Option<Duration>,
    ) -> PaginationResult<ListSnapshot<N>> {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            {
                let state = self.inner.lock().await;
                if state.phase == ListPhase::Idle {
                    return Ok(state.snapshot());
                }
                notified.as_mut().enable();
            }

            match timeout_duration {
                Some(duration) => timeout(duration, notified).await.map_err(|_| {
                    CoreError::new(
                        CoreErrorKind::Timeout,
                        "timed out waiting for list to become idle",
                    )
                })?,
                None => notified.await,
            }
        }
    }

    /// Debounced footer-spinner flag: loading the next page and not
    /// refreshing, held for the configured delay.
    pub fn show_loading_indicator(&self) -> bool {
        self.loading_indicator.get()
    }

    pub fn subscribe_loading_indicator(&self) -> watch::Receiver<bool> {
        self.loading_indicator.subscribe()
    }

    fn begin_fetch(
        &self,
        state: &mut ControllerState<N>,
        operation: ListOperation,
        request: PageRequest,
    ) {
        let fetch_id = state.next_fetch_id;
        state.next_fetch_id = state.next_fetch_id.wrapping_add(1);
        let token = FetchCancellationToken::new();

        tracing::debug!(
            operation = operation.as_str(),
            fetch_id,
            count = request.count,
            policy = request.policy.as_str(),
            "issuing page fetch"
        );

        let fetch = self.source.fetch_page(request, token.clone());
        let inner = self.inner.clone();
        let idle = self.idle.clone();
        let loading_indicator = self.loading_indicator.clone();
        let join_handle = tokio::spawn(async move {
            let outcome = fetch.await;
            let applied =
                apply_completion(&inner, fetch_id, operation, outcome, &loading_indicator).await;
            if applied {
                idle.notify_waiters();
            }
        });

        state.in_flight = Some(InFlightFetch {
            id: fetch_id,
            operation,
            token,
            abort_handle: join_handle.abort_handle(),
        });
        self.loading_indicator.set(state.wants_loading_indicator());
    }
}

impl<N> Drop for PaginatedListController<N> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.try_lock() {
            state.disposed = true;
            if let Some(in_flight) = state.in_flight.take() {
                in_flight.cancel();
            }
        }
    }
}

async fn apply_completion<N>(
    inner: &Mutex<ControllerState<N>>,
    fetch_id: u64,
    operation: ListOperation,
    outcome: PaginationResult<Page<N>>,
    loading_indicator: &DebouncedFlag,
) -> bool {
    let mut state = inner.lock().await;
    let is_current = state
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.id == fetch_id && !in_flight.token.is_cancelled());
    if state.disposed || !is_current {
        tracing::debug!(
            operation = operation.as_str(),
            fetch_id,
            "discarding result of superseded fetch"
        );
        return false;
    }

    state.in_flight = None;
    state.phase = ListPhase::Idle;
    match outcome {
        Ok(page) => {
            let received = page.nodes.len();
            match operation {
                ListOperation::LoadNext => state.append(page),
                ListOperation::InitialLoad | ListOperation::Refresh | ListOperation::Refetch => {
                    state.replace_with(page)
                }
            }
            state.last_error = None;
            tracing::debug!(
                operation = operation.as_str(),
                received,
                total = state.items.len(),
                has_next = state.has_next,
                "page fetch applied"
            );
        }
        Err(error) => {
            let error = error.during(operation);
            tracing::warn!(
                operation = operation.as_str(),
                kind = ?error.kind,
                message = %error.message,
                "page fetch failed"
            );
            state.last_error = Some(error);
        }
    }

    loading_indicator.set(state.wants_loading_indicator());
    true
}

fn pagination_info(has_next: bool, end_cursor: Option<PageCursor>) -> (bool, Option<PageCursor>) {
    if has_next && end_cursor.is_none() {
        tracing::warn!("connection reported more items without an end cursor");
        return (false, None);
    }
    (has_next, end_cursor)
}
