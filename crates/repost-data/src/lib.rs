#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Shared Postgres-backed data access layer: the feed/item/run/node store
//! (§3, §4.2-§4.7) and the distributed advisory lock (C2, §4.8).

pub mod error;
pub mod lock;
pub mod store;

pub use error::{DataError, DataResult};
pub use lock::{Lock, LockGuard, LockMode, LockOutcome};
pub use store::{NewItem, Store};
