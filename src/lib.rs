#![warn(
    clippy::pedantic,
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2021_compatibility
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

#![doc = include_str!("../README.md")]
//! ## Features
#![doc = document_features::document_features!()]

pub mod analysis;
pub mod graph;
pub mod jvm;
pub mod types;

/// Test utilities
#[cfg(test)]
pub(crate) mod tests;
