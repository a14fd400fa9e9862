//! Loading of the rule file (`i18n.*`) and the locale file (`<locale>.*`) from a config directory.
//!
//! Each file is looked up with the extensions in [`CONFIG_EXTENSIONS`] order; the first one that
//! exists wins. Locale files are flat maps; scalar values such as numbers are kept in their text
//! form.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::{
    error::Error,
    types::{LocaleMap, Scalar, TranslationSet},
};

/// Name of the rule file, without extension.
pub const RULES_FILE_NAME: &str = "i18n";

pub const CONFIG_EXTENSIONS: [&str; 4] = ["yml", "yaml", "json", "toml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "yml" | "yaml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, Error> {
        Ok(match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        })
    }
}

/// The rules and the locale map of one run.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub translations: TranslationSet,
    pub locale: LocaleMap,
}

impl Config {
    /// Builds a config from already-loaded parts and numbers the translations.
    pub fn new(mut translations: TranslationSet, locale: LocaleMap) -> Self {
        translations.assign_ids();
        Config {
            translations,
            locale,
        }
    }

    /// Reads `i18n.*` and `<locale>.*` from `dir`.
    pub fn load(dir: &Path, locale: &str) -> Result<Self, Error> {
        Ok(Config::new(load_rules(dir)?, load_locale(dir, locale)?))
    }
}

/// Path of the first existing `<name>.<ext>` in `dir`.
pub fn find_config_file(dir: &Path, name: &str) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
}

/// A blank file yields the default value.
fn read_config<T: DeserializeOwned + Default>(dir: &Path, name: &str) -> Result<T, Error> {
    let path = find_config_file(dir, name).ok_or_else(|| Error::ConfigNotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })?;
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ConfigFormat::from_extension)
        .unwrap_or(ConfigFormat::Yaml);
    let content = fs::read_to_string(&path).map_err(|e| Error::file_io(&path, e))?;
    log::debug!("loading {}", path.display());
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    format.parse(&content)
}

pub fn load_rules(dir: &Path) -> Result<TranslationSet, Error> {
    let mut set: TranslationSet = read_config(dir, RULES_FILE_NAME)?;
    set.assign_ids();
    Ok(set)
}

pub fn load_locale(dir: &Path, locale: &str) -> Result<LocaleMap, Error> {
    if locale.is_empty() {
        return Err(Error::MissingLocale);
    }
    let raw: BTreeMap<String, Option<Scalar>> = read_config(dir, locale)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, value.map(|v| v.to_string()).unwrap_or_default()))
        .collect())
}
