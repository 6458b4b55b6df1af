//! Keeps the URL, the backend request and the table view consistent.
//!
//! The URL is the only source of truth. User interaction never fetches
//! directly: it computes new query parameters and navigates. Every navigation
//! event then derives a fresh [`QueryState`] from the URL and issues a fetch.
//! Fetching never navigates, so the cycle cannot loop.
//!
//! Fetches run as tasks of a [`JoinSet`] on the current runtime. Each one
//! carries a sequence number; only the response to the last issued request may
//! touch the view, older ones are dropped on arrival. Teardown drops the set,
//! which aborts running requests and discards results not yet handled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::domain::{ListConfig, ListError, Result};
use crate::filter::{FilterModel, FilterName, FilterOption};
use crate::params::QueryParams;
use crate::query::{QueryState, derive_from_route, to_backend_query, to_url_query_params};
use crate::router::Router;
use crate::service::{Contact, ContactService, ResponsePage};
use crate::subscription::Subscription;
use crate::table::TableViewModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
}

impl Account {
    pub fn new(login: impl Into<String>) -> Self {
        Self { login: login.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
}

/// How the delete-confirmation dialog was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogClose {
    Deleted,
    Dismissed,
}

#[derive(Debug)]
pub enum Outcome {
    Fetched {
        seq: u64,
        result: Result<ResponsePage<Contact>>,
    },
    Deleted {
        id: i64,
        result: Result<()>,
    },
}

#[derive(Debug)]
pub enum SyncEvent {
    Navigated(QueryParams),
    FiltersChanged(Vec<FilterOption>),
    AccountChanged(Option<Account>),
    Outcome(Outcome),
}

pub struct RouteSynchronizer {
    config: ListConfig,
    service: Arc<dyn ContactService>,
    router: Router,
    navigations: Option<Subscription<QueryParams>>,
    filters: FilterModel,
    filter_changes: Option<Subscription<Vec<FilterOption>>>,
    auth: Option<watch::Receiver<Option<Account>>>,
    account: Option<Account>,
    state: QueryState,
    phase: Phase,
    table: TableViewModel,
    total_items: u64,
    last_issued: u64,
    pending_deletes: usize,
    last_error: Option<ListError>,
    tasks: JoinSet<Outcome>,
}

impl RouteSynchronizer {
    pub fn new(config: ListConfig, service: Arc<dyn ContactService>, router: Router) -> Self {
        let table = TableViewModel::from_config(&config);
        let filters = FilterModel::from_params(router.current());
        Self {
            config,
            service,
            router,
            navigations: None,
            filters,
            filter_changes: None,
            auth: None,
            account: None,
            state: QueryState::default(),
            phase: Phase::Idle,
            table,
            total_items: 0,
            last_issued: 0,
            pending_deletes: 0,
            last_error: None,
            tasks: JoinSet::new(),
        }
    }

    /// Start listening to navigation, filter and account changes.
    /// The first fetch only happens once an account is known.
    pub fn mount(&mut self, mut auth: watch::Receiver<Option<Account>>) {
        self.navigations = Some(self.router.subscribe());
        self.filter_changes = Some(self.filters.subscribe());
        self.account = auth.borrow_and_update().clone();
        self.auth = Some(auth);
        trace!("Mounted, account: {:?}", self.account);
        if self.account.is_some() {
            self.reload();
        }
    }

    /// Release every subscription and abort requests still in flight.
    /// Nothing reaches the view afterwards, not even responses that already arrived.
    pub fn teardown(&mut self) {
        if let Some(navigations) = self.navigations.take() {
            navigations.unsubscribe();
        }
        if let Some(filter_changes) = self.filter_changes.take() {
            filter_changes.unsubscribe();
        }
        self.auth = None;
        self.tasks = JoinSet::new();
        self.last_issued += 1;
        self.phase = Phase::Idle;
        self.pending_deletes = 0;
        trace!("Torn down");
    }

    pub fn is_mounted(&self) -> bool {
        self.navigations.is_some()
    }

    // -------------------- Accessors ---------------------- //

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<dyn ContactService> {
        &self.service
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn filters(&self) -> &FilterModel {
        &self.filters
    }

    pub fn table(&self) -> &TableViewModel {
        &self.table
    }

    /// Local filter, sort and pagination; none of it touches the URL.
    pub fn table_mut(&mut self) -> &mut TableViewModel {
        &mut self.table
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_pages(&self) -> u64 {
        self.total_items
            .div_ceil(u64::from(self.config.items_per_page))
            .max(1)
    }

    pub fn last_error(&self) -> Option<&ListError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ListError> {
        self.last_error.take()
    }

    // -------------------- User interaction ---------------------- //

    pub fn navigate_to_page(&mut self, page: u32) {
        let sort_field = self.state.sort_field.clone();
        let options = self.filters.options().to_vec();
        self.handle_navigation(page, &sort_field, self.state.ascending, &options);
    }

    /// Sort on `field`; sorting again on the same field flips the direction.
    pub fn sort_by(&mut self, field: &str) {
        let ascending = if self.state.sort_field == field {
            !self.state.ascending
        } else {
            true
        };
        let options = self.filters.options().to_vec();
        self.handle_navigation(self.state.page, field, ascending, &options);
    }

    pub fn add_filter<S: AsRef<str>>(&mut self, name: FilterName, values: &[S]) -> bool {
        self.filters.add_filter(name, values)
    }

    pub fn remove_filter(&mut self, name: FilterName, value: &str) -> bool {
        self.filters.remove_filter(name, value)
    }

    pub fn clear_filters(&mut self) -> bool {
        self.filters.clear()
    }

    pub fn go_back(&mut self) -> bool {
        self.router.go_back()
    }

    /// Fetch again for the current URL without navigating.
    pub fn reload(&mut self) {
        let route_sort = if self.config.honor_route_default_sort {
            self.router.data().default_sort.as_deref()
        } else {
            None
        };
        self.state = derive_from_route(self.router.current(), route_sort);
        self.filters.initialize_from_params(self.router.current());
        self.issue_fetch();
    }

    /// Delete a contact; a successful delete refreshes the current page.
    pub fn delete(&mut self, id: i64) {
        if !self.is_mounted() {
            warn!("Not deleting contact {id}, the list is torn down");
            return;
        }
        let service = Arc::clone(&self.service);
        self.pending_deletes += 1;
        self.tasks.spawn(async move {
            let result = service.delete(id).await;
            Outcome::Deleted { id, result }
        });
    }

    pub fn on_dialog_closed(&mut self, reason: DialogClose) {
        if reason == DialogClose::Deleted {
            self.reload();
        }
    }

    fn handle_navigation(&mut self, page: u32, sort_field: &str, ascending: bool, filters: &[FilterOption]) {
        let params = to_url_query_params(page, sort_field, ascending, filters);
        self.router.navigate(params);
    }

    fn issue_fetch(&mut self) {
        if !self.is_mounted() {
            debug!("Skipping fetch, the list is torn down");
            return;
        }
        self.last_issued += 1;
        let seq = self.last_issued;
        self.phase = Phase::Loading;

        let query = to_backend_query(&self.state, self.config.items_per_page);
        debug!("Issuing fetch #{seq}: {:?}", query);
        let service = Arc::clone(&self.service);
        self.tasks.spawn(async move {
            let result = service.query(&query).await;
            Outcome::Fetched { seq, result }
        });
    }

    // -------------------- Event handling ---------------------- //

    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Navigated(params) => {
                trace!("URL changed to {}", params);
                self.reload();
            }
            SyncEvent::FiltersChanged(options) => {
                let sort_field = self.state.sort_field.clone();
                self.handle_navigation(1, &sort_field, self.state.ascending, &options);
            }
            SyncEvent::AccountChanged(account) => {
                let had_account = self.account.is_some();
                self.account = account;
                if !had_account && self.account.is_some() {
                    info!("Authenticated, loading contacts");
                    self.reload();
                }
            }
            SyncEvent::Outcome(Outcome::Fetched { seq, result }) => self.on_fetched(seq, result),
            SyncEvent::Outcome(Outcome::Deleted { id, result }) => {
                self.pending_deletes = self.pending_deletes.saturating_sub(1);
                match result {
                    Ok(()) => self.on_dialog_closed(DialogClose::Deleted),
                    Err(e) => {
                        warn!("Deleting contact {id} failed: {e}");
                        self.last_error = Some(e);
                    }
                }
            }
        }
    }

    fn on_fetched(&mut self, seq: u64, result: Result<ResponsePage<Contact>>) {
        if seq != self.last_issued {
            debug!("Discarding stale response #{seq}, latest is #{}", self.last_issued);
            return;
        }
        self.phase = Phase::Idle;
        match result {
            Ok(page) => {
                self.total_items = page.total_count;
                self.table.rebuild(&page);
                self.last_error = None;
            }
            Err(e) => {
                // Keep the previous rows on screen.
                warn!("Loading contacts failed: {e}");
                self.last_error = Some(e);
            }
        }
    }

    /// Handle everything that is ready without waiting. Returns the number of events handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_event() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    fn try_next_event(&mut self) -> Option<SyncEvent> {
        if !self.is_mounted() {
            return None;
        }
        while let Some(joined) = self.tasks.try_join_next() {
            if let Some(outcome) = finished(joined) {
                return Some(SyncEvent::Outcome(outcome));
            }
        }
        if let Some(auth) = self.auth.as_mut()
            && auth.has_changed().unwrap_or(false)
        {
            return Some(SyncEvent::AccountChanged(auth.borrow_and_update().clone()));
        }
        if let Some(options) = self.filter_changes.as_mut().and_then(|s| s.try_recv()) {
            return Some(SyncEvent::FiltersChanged(options));
        }
        self.navigations
            .as_mut()
            .and_then(|s| s.try_recv())
            .map(SyncEvent::Navigated)
    }

    /// Wait for the next event from any source. Returns `None` right away once torn down.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        if !self.is_mounted() {
            return None;
        }
        let Self {
            navigations,
            filter_changes,
            auth,
            tasks,
            ..
        } = self;
        tokio::select! {
            Some(outcome) = next_outcome(tasks) => Some(SyncEvent::Outcome(outcome)),
            Some(account) = account_change(auth) => Some(SyncEvent::AccountChanged(account)),
            Some(options) = next_from(filter_changes) => Some(SyncEvent::FiltersChanged(options)),
            Some(params) = next_from(navigations) => Some(SyncEvent::Navigated(params)),
            else => None,
        }
    }

    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Run until no fetch or delete is outstanding.
    pub async fn settle(&mut self) {
        loop {
            self.process_pending();
            if !self.is_loading() && self.pending_deletes == 0 {
                break;
            }
            if !self.process_next().await {
                break;
            }
        }
    }

    /// Handle events for at most `timeout`, for use inside a render loop.
    pub async fn pump(&mut self, timeout: Duration) {
        self.process_pending();
        if let Ok(Some(event)) = tokio::time::timeout(timeout, self.next_event()).await {
            self.handle_event(event);
        }
        self.process_pending();
    }
}

impl Drop for RouteSynchronizer {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn next_outcome(tasks: &mut JoinSet<Outcome>) -> Option<Outcome> {
    loop {
        if let Some(outcome) = finished(tasks.join_next().await?) {
            return Some(outcome);
        }
    }
}

fn finished(joined: std::result::Result<Outcome, tokio::task::JoinError>) -> Option<Outcome> {
    match joined {
        Ok(outcome) => Some(outcome),
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            warn!("Request task failed: {e}");
            None
        }
    }
}

async fn next_from<T>(subscription: &mut Option<Subscription<T>>) -> Option<T> {
    subscription.as_mut()?.recv().await
}

async fn account_change(auth: &mut Option<watch::Receiver<Option<Account>>>) -> Option<Option<Account>> {
    let auth = auth.as_mut()?;
    auth.changed().await.ok()?;
    Some(auth.borrow_and_update().clone())
}
