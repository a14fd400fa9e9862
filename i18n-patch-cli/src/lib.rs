//! CLI library for testing purposes

pub mod logging;
pub mod validation;

pub use i18n_patch::{PatchOptions, Patcher, TranslationReport};
