//! Entry point for a whole run.

use std::path::{Path, PathBuf};

use crate::{
    compiler,
    condition::ConditionVars,
    config::{self, Config},
    error::Error,
    path_glob,
    scheduler::{DEFAULT_CONCURRENCY, Scheduler},
    stats::TranslationReport,
    types::{LocaleMap, TranslationSet},
};

/// Default directory holding `i18n.*` and the locale files.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Options for a [`Patcher`] run.
#[derive(Debug, Clone)]
pub struct PatchOptions {
    /// Destination root; the source tree itself when `None`.
    pub dest: Option<PathBuf>,
    pub config_dir: PathBuf,
    pub locale: Option<String>,
    pub condition: ConditionVars,
    /// Log a summary line per translation at info level.
    pub statistics: bool,
    pub show_unmatched: bool,
    pub concurrency: usize,
}

impl Default for PatchOptions {
    fn default() -> Self {
        PatchOptions {
            dest: None,
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            locale: None,
            condition: ConditionVars::default(),
            statistics: false,
            show_unmatched: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl PatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Condition variables in `key=value,...` form.
    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = ConditionVars::parse(condition);
        self
    }

    pub fn with_statistics(mut self, statistics: bool) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_show_unmatched(mut self, show: bool) -> Self {
        self.show_unmatched = show;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Applies a translation set to a source tree, optionally into a separate destination.
#[derive(Debug, Clone)]
pub struct Patcher {
    src: PathBuf,
    options: PatchOptions,
}

impl Patcher {
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Patcher {
            src: src.into(),
            options: PatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn dest(&self) -> &Path {
        self.options.dest.as_deref().unwrap_or(&self.src)
    }

    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Runs the translation set against the destination tree.
    ///
    /// Rules and locale map are read from the config directory unless given. Everything is
    /// compiled before any file is touched.
    pub async fn generate(
        &self,
        translations: Option<TranslationSet>,
        locale: Option<LocaleMap>,
    ) -> Result<Vec<TranslationReport>, Error> {
        let translations = match translations {
            Some(set) => set,
            None => config::load_rules(&self.options.config_dir)?,
        };
        let locale = match locale {
            Some(map) => map,
            None => {
                let name = self.options.locale.as_deref().ok_or(Error::MissingLocale)?;
                config::load_locale(&self.options.config_dir, name)?
            }
        };
        let config = Config::new(translations, locale);
        let compiled = compiler::compile_set(&config.translations, &config.locale)?;

        if self.dest() != self.src {
            let (src, dest) = (self.src.clone(), self.dest().to_path_buf());
            let copied =
                tokio::task::spawn_blocking(move || path_glob::copy_tree(&src, &dest)).await??;
            log::debug!("copied {} files to {}", copied, self.dest().display());
        }

        let mut scheduler = Scheduler::new(self.dest())
            .with_condition(self.options.condition.clone())
            .with_concurrency(self.options.concurrency)
            .with_unmatched_report(self.options.show_unmatched);
        if let Some(locale) = &self.options.locale {
            scheduler = scheduler.with_locale(locale.clone());
        }

        let reports = scheduler.run(compiled).await?;
        if self.options.statistics {
            for report in &reports {
                log::info!("{}", report.summary());
            }
        }
        Ok(reports)
    }
}
