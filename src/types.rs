//! Core, file-format-agnostic types for i18n-patch.
//! Config loaders deserialize into these; the compiler consumes them.
//!
//! Keys are accepted in camelCase (the canonical form), snake_case and kebab-case, so
//! a rule file written as `named-patterns:` or `named_patterns:` deserializes the same way.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use serde::{Deserialize, Serialize};

/// Flat mapping of locale key to localized text.
pub type LocaleMap = HashMap<String, String>;

/// A scalar config value. Parameter values and parallel-group ids may be written as
/// numbers or booleans in YAML; they are compared and substituted by their text form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

/// The ordered list of translations making up one run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationSet {
    pub translations: Vec<Translation>,
}

impl TranslationSet {
    pub fn new(translations: Vec<Translation>) -> Self {
        let mut set = TranslationSet { translations };
        set.assign_ids();
        set
    }

    /// Numbers translations by their position, starting at 1.
    pub fn assign_ids(&mut self) {
        for (i, t) in self.translations.iter_mut().enumerate() {
            t.id = i + 1;
        }
    }
}

/// One named rule set applied to the files matching `src`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Translation {
    /// Position in the translation set, 1-based.
    #[serde(skip)]
    pub id: usize,

    pub name: Option<String>,

    /// Glob relative to the destination root. Kept raw so a non-string value can be
    /// reported when the translation is scheduled.
    pub src: Option<serde_json::Value>,

    pub locale: Option<LocaleFilter>,

    pub patterns: Vec<Pattern>,

    #[serde(alias = "named_patterns", alias = "named-patterns")]
    pub named_patterns: Vec<NamedPattern>,

    pub conditionals: Vec<Conditional>,

    /// Regular expressions; a raw line matching any of them bypasses all patterns.
    #[serde(alias = "skip_patterns", alias = "skip-patterns")]
    pub skip_patterns: Vec<String>,

    pub add: Option<AddDirective>,

    #[serde(alias = "parallel_group", alias = "parallel-group")]
    pub parallel_group: Option<Scalar>,

    /// Boolean activation expression, see [`crate::condition`].
    #[serde(alias = "evaluate_when", alias = "evaluate-when")]
    pub evaluate_when: Option<String>,
}

impl Translation {
    pub fn new(src: &str) -> Self {
        Translation {
            src: Some(serde_json::Value::String(src.to_string())),
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Non-empty parallel-group id in its text form.
    pub fn parallel_group_id(&self) -> Option<String> {
        self.parallel_group
            .as_ref()
            .map(|g| g.to_string())
            .filter(|g| !g.is_empty())
    }

    /// Label used in logs and statistics: the name, else the source glob.
    pub fn label(&self) -> Option<String> {
        self.name.clone().or_else(|| match &self.src {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }
}

/// Restricts a translation to (or away from) a set of locales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocaleFilter {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

impl LocaleFilter {
    /// `include` takes precedence over `exclude`; an unknown locale never satisfies `include`.
    pub fn admits(&self, locale: Option<&str>) -> bool {
        if let Some(include) = &self.include {
            return locale.is_some_and(|l| include.iter().any(|i| i == l));
        }
        if let Some(exclude) = &self.exclude {
            return !locale.is_some_and(|l| exclude.iter().any(|e| e == l));
        }
        true
    }
}

/// A raw pattern as written in the rule file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pattern {
    /// Main expression. A regular expression when `flags` is set, a literal otherwise.
    /// Absent for per-file insert patterns.
    pub pattern: Option<String>,
    pub flags: Option<String>,
    pub exclude: Option<String>,
    /// Replacement template with `${key}` and `{N}` tokens.
    pub replace: Option<String>,
    pub args: Vec<Arg>,
    pub insert: Option<Insert>,
    #[serde(alias = "match_once", alias = "match-once")]
    pub match_once: bool,
    #[serde(alias = "complete_pattern", alias = "complete-pattern")]
    pub complete_pattern: bool,
    /// Reference to a [`NamedPattern`].
    pub name: Option<String>,
    pub params: Option<Params>,
}

impl Pattern {
    pub fn literal(pattern: &str, replace: &str) -> Self {
        Pattern {
            pattern: Some(pattern.to_string()),
            replace: Some(replace.to_string()),
            ..Default::default()
        }
    }

    pub fn regex(pattern: &str, flags: &str, replace: &str) -> Self {
        Pattern {
            pattern: Some(pattern.to_string()),
            flags: Some(flags.to_string()),
            replace: Some(replace.to_string()),
            ..Default::default()
        }
    }
}

/// Parameters for a named-pattern reference: one set, or one concrete pattern per set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Params {
    Many(Vec<BTreeMap<String, Scalar>>),
    One(BTreeMap<String, Scalar>),
}

impl Params {
    pub fn sets(&self) -> Vec<&BTreeMap<String, Scalar>> {
        match self {
            Params::Many(sets) => sets.iter().collect(),
            Params::One(set) => vec![set],
        }
    }
}

/// Positional argument of a replacement template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Arg {
    Literal(String),
    Template(ArgTemplate),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArgTemplate {
    pub replace: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertAt {
    Begin,
    End,
}

/// Inserts the locale value of `value` at the beginning or end of a file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Insert {
    pub at: InsertAt,
    /// Locale key.
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Conditional {
    pub insert: Option<Insert>,
}

/// Materializes the locale value of `value` as a new file at `path` (relative to the destination).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddDirective {
    pub path: String,
    pub value: String,
}

/// A reusable pattern whose strings contain `{param}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: String,
    pub flags: Option<String>,
    pub exclude: Option<String>,
    pub replace: Option<String>,
    pub args: Vec<Arg>,
    pub params: Vec<String>,
}
