//! Runs compiled translations over the destination tree.
//!
//! Translations are planned into stages: every parallel group becomes one batch placed where
//! the group id first appears, every other translation is a stage of its own. Stages run in
//! order; members of a batch run concurrently. Within a translation, files are processed
//! concurrently up to the configured bound. The first failure aborts all outstanding work of
//! the run.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Semaphore,
    task::JoinSet,
};

use crate::{
    compiler::CompiledTranslation,
    condition::{self, ConditionVars},
    error::Error,
    path_glob::{self, DEFAULT_SRC_GLOB},
    stats::{Disposition, SkipReason, TranslationReport},
    translator::{Translated, Translator},
    types::InsertAt,
};

/// Default bound on files processed concurrently per translation.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// A unit of sequential execution; indices refer to the translation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Single(usize),
    /// Translations sharing a parallel-group id, run concurrently.
    Batch(Vec<usize>),
}

/// Plans stages from each translation's parallel-group id.
pub fn plan_stages(groups: &[Option<String>]) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut placed = vec![false; groups.len()];
    for (i, group) in groups.iter().enumerate() {
        if placed[i] {
            continue;
        }
        placed[i] = true;
        let Some(group) = group else {
            stages.push(Stage::Single(i));
            continue;
        };
        let mut members = vec![i];
        for (j, other) in groups.iter().enumerate().skip(i + 1) {
            if other.as_ref() == Some(group) {
                placed[j] = true;
                members.push(j);
            }
        }
        if members.len() < 2 {
            stages.push(Stage::Single(i));
        } else {
            stages.push(Stage::Batch(members));
        }
    }
    stages
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    dest: PathBuf,
    locale: Option<String>,
    condition: ConditionVars,
    concurrency: usize,
    report_unmatched: bool,
}

impl Scheduler {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Scheduler {
            dest: dest.into(),
            locale: None,
            condition: ConditionVars::default(),
            concurrency: DEFAULT_CONCURRENCY,
            report_unmatched: false,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_condition(mut self, condition: ConditionVars) -> Self {
        self.condition = condition;
        self
    }

    /// Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Logs every line no pattern changed as `file:line:text`.
    pub fn with_unmatched_report(mut self, enabled: bool) -> Self {
        self.report_unmatched = enabled;
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Runs all translations and returns one report per translation, in declaration order.
    pub async fn run(
        &self,
        translations: Vec<CompiledTranslation>,
    ) -> Result<Vec<TranslationReport>, Error> {
        let groups: Vec<Option<String>> = translations
            .iter()
            .map(|t| t.parallel_group.clone())
            .collect();
        let stages = plan_stages(&groups);
        log::debug!("planned {} stages for {} translations", stages.len(), translations.len());

        let translations: Vec<Arc<CompiledTranslation>> =
            translations.into_iter().map(Arc::new).collect();

        for stage in stages {
            match stage {
                Stage::Single(i) => {
                    self.clone()
                        .process_translation(translations[i].clone())
                        .await?
                }
                Stage::Batch(members) => {
                    log::debug!(
                        "running translations {:?} in parallel",
                        members.iter().map(|&i| translations[i].id).collect::<Vec<_>>()
                    );
                    let mut tasks = JoinSet::new();
                    for i in members {
                        tasks.spawn(self.clone().process_translation(translations[i].clone()));
                    }
                    // Returning early drops the set, which aborts the remaining members.
                    while let Some(result) = tasks.join_next().await {
                        result??;
                    }
                }
            }
        }

        Ok(translations
            .iter()
            .map(|t| TranslationReport::from_statistics(t.id, t.label.clone(), &t.statistics))
            .collect())
    }

    async fn process_translation(self, translation: Arc<CompiledTranslation>) -> Result<(), Error> {
        let started = Instant::now();
        let stats = &translation.statistics;

        if !condition::is_active(&translation, &self.condition) {
            log::info!("[{}]: skipped, condition is not met", translation.id);
            stats.record_disposition(Disposition::Skipped(SkipReason::Condition));
            return Ok(());
        }

        let admitted = translation
            .locale
            .as_ref()
            .is_none_or(|filter| filter.admits(self.locale.as_deref()));
        if !admitted {
            log::info!("[{}]: skipped for locale {:?}", translation.id, self.locale);
            stats.record_disposition(Disposition::Skipped(SkipReason::Locale));
            return Ok(());
        }

        if let Some(add) = &translation.add {
            let path = self.dest.join(&add.path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::file_io(parent, e))?;
            }
            tokio::fs::write(&path, &add.content)
                .await
                .map_err(|e| Error::file_io(&path, e))?;
            log::info!("[{}]: added {}", translation.id, path.display());
            stats.record_disposition(Disposition::Added(PathBuf::from(&add.path)));
            stats.record_elapsed(started.elapsed());
            return Ok(());
        }

        let src = match &translation.src {
            None => DEFAULT_SRC_GLOB.to_string(),
            Some(serde_json::Value::String(s)) if s.is_empty() => DEFAULT_SRC_GLOB.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => return Err(Error::InvalidSource(other.to_string())),
        };

        let root = self.dest.clone();
        let files =
            tokio::task::spawn_blocking(move || path_glob::expand_glob(&root, &src)).await??;
        log::debug!("[{}]: {} files matched", translation.id, files.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for file in files {
            while let Some(result) = tasks.try_join_next() {
                result??;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(std::io::Error::other)?;
            let label = self.report_unmatched.then(|| self.file_label(&file));
            let translation = translation.clone();
            tasks.spawn(async move {
                let result = process_file(&translation, &file, label).await;
                drop(permit);
                result
            });
        }
        while let Some(result) = tasks.join_next().await {
            result??;
        }

        stats.record_disposition(Disposition::Processed);
        stats.record_elapsed(started.elapsed());
        Ok(())
    }

    fn file_label(&self, file: &Path) -> String {
        file.strip_prefix(&self.dest)
            .unwrap_or(file)
            .display()
            .to_string()
    }
}

/// Translates one file in place.
async fn process_file(
    translation: &CompiledTranslation,
    path: &Path,
    unmatched_label: Option<String>,
) -> Result<(), Error> {
    translation.statistics.record_file();

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::file_io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut translator = Translator::new(translation);
    if let Some(label) = unmatched_label {
        translator = translator.with_unmatched_report(label);
    }

    let mut body = String::new();
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let read = reader
            .read_until(b'\n', &mut chunk)
            .await
            .map_err(|e| Error::file_io(path, e))?;
        if read == 0 {
            break;
        }
        translator.feed(&String::from_utf8_lossy(&chunk));
        body.push_str(&translator.take_output());
    }
    let translated = translator.finish();
    body.push_str(&translated.output);
    translation
        .statistics
        .record_unmatched(translated.unmatched_lines);

    if translated.matched {
        tokio::fs::write(path, translated.with_inserts(&body))
            .await
            .map_err(|e| Error::file_io(path, e))?;
        log::debug!("[{}]: translated {}", translation.id, path.display());
    }

    if translation.has_per_file_inserts() {
        apply_per_file_inserts(translation, path, &translated).await?;
    }
    Ok(())
}

/// Applies insert patterns that have no main expression. Values the line pass already
/// inserted at the same anchor are not inserted twice.
async fn apply_per_file_inserts(
    translation: &CompiledTranslation,
    path: &Path,
    translated: &Translated,
) -> Result<(), Error> {
    let mut content = tokio::fs::read(path)
        .await
        .map_err(|e| Error::file_io(path, e))?;
    let mut changed = false;
    for insert in translation.per_file_inserts() {
        match insert.at {
            InsertAt::Begin => {
                if translated.begin.contains(&insert.value) {
                    continue;
                }
                content.splice(0..0, insert.value.bytes());
            }
            InsertAt::End => {
                if translated.end.contains(&insert.value) {
                    continue;
                }
                if content.last().is_some_and(|&b| b != b'\n') {
                    content.push(b'\n');
                }
                content.extend_from_slice(insert.value.as_bytes());
            }
        }
        changed = true;
    }
    if changed {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| Error::file_io(path, e))?;
    }
    Ok(())
}
