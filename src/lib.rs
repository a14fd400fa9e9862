#![forbid(unsafe_code)]
//! Locale-aware, rule-driven text substitution over a tree of source files.
//!
//! A translation set (`i18n.yml`) describes which files to touch and how: literal or regular
//! expression patterns whose replacements reference a locale map (`ja.yml`), reusable named
//! patterns, inserts at the beginning or end of a file, whole new files, and activation
//! conditions. The set is compiled once against the locale map and then applied to every
//! matching file in a single streaming pass.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use i18n_patch::{PatchOptions, Patcher};
//!
//! # async fn run() -> Result<(), i18n_patch::Error> {
//! let options = PatchOptions::new()
//!     .with_locale("ja")
//!     .with_config_dir("config")
//!     .with_dest("out");
//! let reports = Patcher::new("src").with_options(options).generate(None, None).await?;
//! for report in reports {
//!     println!("{}", report.summary());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Building blocks
//!
//! - [`compiler`]: resolves locale keys, expands named patterns and compiles expressions
//! - [`condition`]: evaluates `evaluateWhen` expressions against run variables
//! - [`translator`]: streaming line engine for one file, with multi-line lookahead
//! - [`scheduler`]: runs translations in stages with bounded file concurrency
//! - [`config`]: loads rule and locale files (YAML, JSON or TOML)

pub mod compiler;
pub mod condition;
pub mod config;
pub mod error;
pub mod path_glob;
pub mod patcher;
pub mod scheduler;
pub mod stats;
pub mod translator;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    compiler::{CompiledPattern, CompiledTranslation, compile, compile_set},
    condition::{ConditionVars, evaluate, is_active},
    config::Config,
    error::Error,
    patcher::{PatchOptions, Patcher},
    scheduler::Scheduler,
    stats::{Disposition, SkipReason, Statistics, TranslationReport},
    translator::{Translated, Translator, translate_str},
    types::{
        AddDirective, Arg, ArgTemplate, Conditional, Insert, InsertAt, LocaleFilter, LocaleMap,
        NamedPattern, Params, Pattern, Scalar, Translation, TranslationSet,
    },
};
