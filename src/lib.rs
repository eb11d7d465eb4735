//! titlekit - signed title metadata toolkit
//!
//! This crate reads and fakesigns tickets and TMDs, classifies installed
//! system modules (IOS) as working or stub, and resolves shared content
//! through the platform content map.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Documentation
    missing_docs,

    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::too_many_arguments,
    clippy::type_complexity,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::single_match_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]
#![allow(
    missing_docs, // Public API docs are incomplete
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod api;
pub mod es;
pub mod exceptions;
pub mod exit_codes;
pub mod logger;
pub mod utils;
pub mod version;

// Re-export main API types
pub use api::{Console, ConsoleOptions, IosReport, TitleSummary, check_file, forge_file};
pub use exceptions::{Result, TitleError};

// Re-export the core for advanced usage
pub use es::{
    ContainerKind, IosClass, SignedBlob, TitleId, TitleStore, classify_ios, fakesign,
    is_shared_content_present, read_build_tag,
};
