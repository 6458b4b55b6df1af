//! Contact list synchronization engine.
//!
//! The navigable query string is the single source of truth. [`sync`] derives
//! a [`query::QueryState`] from it on every navigation, fetches the matching
//! page through a [`service::ContactService`] and feeds the result into a
//! [`table::TableViewModel`] for client-side filtering, sorting and paging.

pub mod domain;
pub mod export;
pub mod filter;
pub mod params;
pub mod query;
pub mod router;
pub mod service;
pub mod subscription;
pub mod sync;
pub mod table;

pub use domain::{Column, ListConfig, ListError, Message, Result};
pub use params::QueryParams;
pub use router::{RouteData, Router};
pub use service::{Contact, ContactService, HttpContactService, ResponsePage};
pub use sync::{Account, DialogClose, Phase, RouteSynchronizer};
pub use table::{ContactRow, TableViewModel};
