//! Durable document store for GD Notes
//!
//! This module owns the shared document: its data model, normalization,
//! schema migrations, and the atomic file persistence behind
//! [`DurableStore`].

mod document;
mod durable;
mod migrate;
mod naming;
mod normalize;
mod persistence;

pub use document::*;
pub use durable::DurableStore;
pub use naming::{derive_name, plain_text, truncate_name, MAX_TAB_NAME_LENGTH, TAB_NAME_WORDS};
pub use normalize::{
    normalize_document, normalize_tab, MAX_FONT_SIZE, MAX_WINDOW_SIZE, MIN_FONT_SIZE,
    MIN_WINDOW_SIZE,
};
pub use persistence::{document_path, load_document, save_document, LoadedDocument};
