//! The navigable location of the list view.
//!
//! The router owns the current query string and its back stack. Every actual
//! change is announced to subscribers as a navigation event; navigating to the
//! location that is already current does nothing, which is what keeps the
//! URL → fetch → URL cycle from looping.

use tracing::trace;

use crate::params::QueryParams;
use crate::subscription::{Emitter, Subscription};

/// Static data attached to the list route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteData {
    pub default_sort: Option<String>,
}

#[derive(Debug)]
pub struct Router {
    current: QueryParams,
    history: Vec<QueryParams>,
    data: RouteData,
    navigations: Emitter<QueryParams>,
}

impl Router {
    pub fn new(initial: QueryParams, data: RouteData) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
            data,
            navigations: Emitter::new(),
        }
    }

    pub fn current(&self) -> &QueryParams {
        &self.current
    }

    pub fn data(&self) -> &RouteData {
        &self.data
    }

    pub fn subscribe(&mut self) -> Subscription<QueryParams> {
        self.navigations.subscribe()
    }

    /// Navigate to `params`. Returns false when it already is the current location.
    pub fn navigate(&mut self, params: QueryParams) -> bool {
        if self.current == params {
            trace!("Navigation to current location {} ignored", params);
            return false;
        }
        trace!("Navigate {} -> {}", self.current, params);
        let previous = std::mem::replace(&mut self.current, params);
        self.history.push(previous);
        self.navigations.emit(self.current.clone());
        true
    }

    /// Go back to the previous location. Returns true if successful.
    pub fn go_back(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                trace!("Back to {}", previous);
                self.current = previous;
                self.navigations.emit(self.current.clone());
                true
            }
            None => false,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
