use std::path::Path;
use unic_langid::LanguageIdentifier;

/// Validate a locale name using unic-langid.
///
/// The locale also names the locale config file, so path separators are rejected even though
/// they could never form an identifier anyway.
pub fn validate_locale(locale: &str) -> Result<(), String> {
    if locale.is_empty() {
        return Err("Locale cannot be empty".to_string());
    }

    match locale.parse::<LanguageIdentifier>() {
        Ok(lang_id) => {
            let lang_str = lang_id.to_string();
            if lang_str.starts_with('-') || lang_str.ends_with('-') || lang_str == "und" {
                return Err(format!(
                    "Invalid locale: {}. Expected valid BCP 47 language identifier",
                    locale
                ));
            }
            Ok(())
        }
        Err(_) => Err(format!(
            "Invalid locale: {}. Expected valid BCP 47 language identifier",
            locale
        )),
    }
}

/// Validate that a directory exists
pub fn validate_dir(path: &Path, what: &str) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("{} directory does not exist: {}", what, path.display()));
    }

    if !path.is_dir() {
        return Err(format!("{} path is not a directory: {}", what, path.display()));
    }

    Ok(())
}

/// Validate the file concurrency bound
pub fn validate_concurrency(concurrency: usize) -> Result<(), String> {
    if concurrency == 0 {
        return Err("Concurrency must be at least 1".to_string());
    }
    Ok(())
}

/// Validate a condition list of the form `key=value,key2=value2`
pub fn validate_condition(condition: &str) -> Result<(), String> {
    for token in condition.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((key, _)) = token.split_once('=')
            && key.trim().is_empty()
        {
            return Err(format!("Condition variable without a name: {}", token));
        }
    }
    Ok(())
}
