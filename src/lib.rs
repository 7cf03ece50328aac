//! GD Notes - durable multi-window note store
//!
//! Each note tab lives in its own top-level window while every tab and the
//! global preferences share one JSON document on disk. This crate is the
//! state layer behind those windows:
//!
//! - [`store`]: the document, its normalization and migrations, and the
//!   atomic-write [`DurableStore`](store::DurableStore)
//! - [`window`]: the tab-to-window registry and the window system boundary
//! - [`sync`]: metadata broadcasts between windows
//! - [`save`]: debounced save scheduling
//! - [`orchestrator`]: the single event loop that serializes all access
//! - [`session`]: the per-window editing context

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod save;
pub mod session;
pub mod store;
pub mod sync;
pub mod window;

pub use error::{Error, Result, ResultExt};
