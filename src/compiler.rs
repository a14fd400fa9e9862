//! Pattern compilation.
//!
//! Turns a [`Translation`] plus a [`LocaleMap`] into a [`CompiledTranslation`]:
//! named patterns are fanned out per parameter set, `${key}` tokens are resolved against the
//! locale map, insert values are looked up, and every expression is compiled. The locale map is
//! only read. A malformed expression aborts compilation.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::{
    error::Error,
    stats::Statistics,
    types::{
        Arg, ArgTemplate, Insert, InsertAt, LocaleFilter, LocaleMap, NamedPattern, Pattern,
        Scalar, Translation, TranslationSet,
    },
};

lazy_static! {
    static ref LOCALE_KEY_REGEX: Regex = Regex::new(r"\$\{([^}]*)\}").unwrap();
}

/// Stands for "the rest of a line" inside a multi-line expression and is not a line break.
const REST_OF_LINE: &str = r"[^\n]";
const LINE_BREAK_ESCAPE: &str = r"\n";

/// Main expression of a compiled pattern.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Plain text; replaces the first occurrence.
    Literal(String),
    Regex(Regex),
}

impl Expression {
    pub fn source(&self) -> &str {
        match self {
            Expression::Literal(s) => s,
            Expression::Regex(re) => re.as_str(),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Expression::Literal(s) => text.contains(s.as_str()),
            Expression::Regex(re) => re.is_match(text),
        }
    }

    fn replace(&self, text: &str, replacement: &str, global: bool) -> String {
        match self {
            Expression::Literal(s) => match text.find(s.as_str()) {
                Some(start) => {
                    let end = start + s.len();
                    let mut out = String::with_capacity(text.len() + replacement.len());
                    out.push_str(&text[..start]);
                    expand_literal_refs(replacement, text, start, end, &mut out);
                    out.push_str(&text[end..]);
                    out
                }
                None => text.to_string(),
            },
            Expression::Regex(re) => {
                let expanded = expand_group_refs(replacement);
                let limit = if global { 0 } else { 1 };
                re.replacen(text, limit, expanded.as_str()).into_owned()
            }
        }
    }

    /// Number of input lines a match of this expression covers.
    pub fn line_span(&self) -> usize {
        match self {
            Expression::Literal(s) => s.matches('\n').count() + 1,
            Expression::Regex(re) => regex_line_span(re.as_str()),
        }
    }
}

/// Counts explicit `\n` escapes, ignoring the `[^\n]` rest-of-line placeholder.
pub fn regex_line_span(source: &str) -> usize {
    source
        .replace(REST_OF_LINE, "")
        .matches(LINE_BREAK_ESCAPE)
        .count()
        + 1
}

/// A positional argument after locale-key resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArg {
    Text(String),
    Template {
        /// `None` when the template references locale keys and none of them exist.
        resolved: Option<String>,
        raw: String,
        args: Vec<ResolvedArg>,
    },
}

impl ResolvedArg {
    fn render(&self) -> String {
        match self {
            ResolvedArg::Text(s) => s.clone(),
            ResolvedArg::Template {
                resolved: Some(text),
                args,
                ..
            } => substitute_positional(text, args),
            ResolvedArg::Template {
                resolved: None,
                raw,
                ..
            } => raw.clone(),
        }
    }
}

/// Resolved replacement text whose `{N}` tokens are filled from `args` at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    pub args: Vec<ResolvedArg>,
}

impl Replacement {
    pub fn render(&self) -> String {
        substitute_positional(&self.text, &self.args)
    }
}

fn substitute_positional(text: &str, args: &[ResolvedArg]) -> String {
    let mut out = text.to_string();
    for (i, arg) in args.iter().enumerate() {
        let token = format!("{{{}}}", i);
        if out.contains(&token) {
            out = out.replace(&token, &arg.render());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInsert {
    pub at: InsertAt,
    /// Locale value, always ending in `\n`.
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// `None` for per-file insert patterns.
    pub expression: Option<Expression>,
    pub global: bool,
    pub exclude: Option<Regex>,
    /// `None` when the pattern is inert: no replacement, or only missing locale keys.
    pub replacement: Option<Replacement>,
    pub insert: Option<CompiledInsert>,
    pub match_once: bool,
    pub complete_pattern: bool,
    pub line_span: usize,
}

impl CompiledPattern {
    pub fn is_resolved(&self) -> bool {
        self.replacement.is_some()
    }

    /// Inserts unconditionally into every file of the translation, outside the line pass.
    pub fn is_per_file_insert(&self) -> bool {
        self.expression.is_none() && self.insert.is_some()
    }

    /// Applies the pattern to `text`, returning the new text only when it changed.
    pub fn apply(&self, text: &str) -> Option<String> {
        let expression = self.expression.as_ref()?;
        let replacement = self.replacement.as_ref()?;
        if !expression.is_match(text) {
            return None;
        }
        if self.exclude.as_ref().is_some_and(|ex| ex.is_match(text)) {
            return None;
        }
        let out = expression.replace(text, &replacement.render(), self.global);
        if out == text { None } else { Some(out) }
    }
}

/// Content of an `add` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAdd {
    pub path: String,
    pub content: String,
}

/// A translation ready to be applied; shared read-only by all file tasks.
#[derive(Debug)]
pub struct CompiledTranslation {
    pub id: usize,
    pub label: Option<String>,
    pub src: Option<serde_json::Value>,
    pub locale: Option<LocaleFilter>,
    pub parallel_group: Option<String>,
    pub evaluate_when: Option<String>,
    pub add: Option<CompiledAdd>,
    pub patterns: Vec<CompiledPattern>,
    /// Resolved conditional inserts, recorded once a file changes.
    pub conditionals: Vec<CompiledInsert>,
    pub skip_patterns: Vec<Regex>,
    pub statistics: Statistics,
}

impl CompiledTranslation {
    pub fn per_file_inserts(&self) -> impl Iterator<Item = &CompiledInsert> {
        self.patterns
            .iter()
            .filter(|p| p.is_per_file_insert())
            .filter_map(|p| p.insert.as_ref())
    }

    pub fn has_per_file_inserts(&self) -> bool {
        self.patterns.iter().any(|p| p.is_per_file_insert())
    }
}

pub fn compile_set(
    set: &TranslationSet,
    locale: &LocaleMap,
) -> Result<Vec<CompiledTranslation>, Error> {
    set.translations
        .iter()
        .map(|t| compile(t, locale))
        .collect()
}

pub fn compile(translation: &Translation, locale: &LocaleMap) -> Result<CompiledTranslation, Error> {
    let conditionals = translation
        .conditionals
        .iter()
        .filter_map(|c| c.insert.as_ref())
        .filter_map(|insert| resolve_insert(insert, locale))
        .collect();

    let skip_patterns = translation
        .skip_patterns
        .iter()
        .map(|s| build_regex(s, None).map(|(re, _)| re))
        .collect::<Result<Vec<_>, _>>()?;

    let (add, patterns) = match &translation.add {
        Some(add) => {
            let content = locale
                .get(&add.value)
                .cloned()
                .ok_or_else(|| Error::missing_key(&add.value, format!("add directive `{}`", add.path)))?;
            let add = CompiledAdd {
                path: add.path.clone(),
                content,
            };
            (Some(add), Vec::new())
        }
        None => {
            let patterns = expand_named_patterns(translation)
                .into_iter()
                .map(|p| compile_pattern(&p, locale))
                .collect::<Result<Vec<_>, _>>()?;
            (None, patterns)
        }
    };

    Ok(CompiledTranslation {
        id: translation.id,
        label: translation.label(),
        src: translation.src.clone(),
        locale: translation.locale.clone(),
        parallel_group: translation.parallel_group_id(),
        evaluate_when: translation.evaluate_when.clone(),
        add,
        statistics: Statistics::new(patterns.len()),
        patterns,
        conditionals,
        skip_patterns,
    })
}

/// Replaces each reference to a named pattern by one concrete pattern per parameter set.
///
/// References whose name is unknown, and references without `params`, pass through unchanged.
pub fn expand_named_patterns(translation: &Translation) -> Vec<Pattern> {
    let mut out = Vec::with_capacity(translation.patterns.len());
    for p in &translation.patterns {
        let named = p
            .name
            .as_ref()
            .and_then(|name| translation.named_patterns.iter().find(|np| &np.name == name));
        let (Some(named), Some(params)) = (named, p.params.as_ref()) else {
            out.push(p.clone());
            continue;
        };
        let sets = params.sets();
        if sets.is_empty() {
            out.push(p.clone());
            continue;
        }
        for set in sets {
            let mut concrete = instantiate(named, set);
            concrete.match_once = p.match_once;
            concrete.complete_pattern = p.complete_pattern;
            concrete.insert = p.insert.clone();
            out.push(concrete);
        }
    }
    out
}

/// Substitutes `{param}` placeholders of a named pattern. Parameters missing from `set`
/// leave their placeholder untouched.
fn instantiate(named: &NamedPattern, set: &BTreeMap<String, Scalar>) -> Pattern {
    let substitute = |target: &str| {
        named.params.iter().fold(target.to_string(), |acc, param| {
            match set.get(param) {
                Some(value) => acc.replace(&format!("{{{}}}", param), &value.to_string()),
                None => acc,
            }
        })
    };

    fn substitute_arg(arg: &Arg, substitute: &dyn Fn(&str) -> String) -> Arg {
        match arg {
            Arg::Literal(s) => Arg::Literal(substitute(s)),
            Arg::Template(t) => Arg::Template(ArgTemplate {
                replace: substitute(&t.replace),
                args: t.args.iter().map(|a| substitute_arg(a, substitute)).collect(),
            }),
        }
    }

    Pattern {
        pattern: Some(substitute(&named.pattern)),
        // Named patterns are always regular expressions.
        flags: Some(named.flags.clone().unwrap_or_default()),
        exclude: named.exclude.as_deref().map(substitute),
        replace: named.replace.as_deref().map(substitute),
        args: named
            .args
            .iter()
            .map(|a| substitute_arg(a, &substitute))
            .collect(),
        name: Some(named.name.clone()),
        ..Default::default()
    }
}

fn compile_pattern(p: &Pattern, locale: &LocaleMap) -> Result<CompiledPattern, Error> {
    let (expression, global) = match (&p.pattern, &p.flags) {
        (Some(source), Some(flags)) => {
            let (re, global) = build_regex(source, Some(flags))?;
            (Some(Expression::Regex(re)), global)
        }
        (Some(source), None) => (Some(Expression::Literal(source.clone())), false),
        (None, _) => (None, false),
    };
    let exclude = p
        .exclude
        .as_deref()
        .map(|ex| build_regex(ex, p.flags.as_deref()).map(|(re, _)| re))
        .transpose()?;
    let replacement = p.replace.as_deref().and_then(|template| {
        resolve(template, locale).map(|text| Replacement {
            text,
            args: p.args.iter().map(|a| resolve_arg(a, locale)).collect(),
        })
    });
    let line_span = expression.as_ref().map_or(1, Expression::line_span);

    Ok(CompiledPattern {
        expression,
        global,
        exclude,
        replacement,
        insert: p.insert.as_ref().and_then(|i| resolve_insert(i, locale)),
        match_once: p.match_once,
        complete_pattern: p.complete_pattern,
        line_span,
    })
}

enum KeyResolution {
    NoTokens,
    Unresolved,
    Resolved(String),
}

fn resolve_keys(template: &str, locale: &LocaleMap) -> KeyResolution {
    let mut has_tokens = false;
    let mut resolved = false;
    let text = LOCALE_KEY_REGEX.replace_all(template, |caps: &regex::Captures| {
        has_tokens = true;
        match locale.get(&caps[1]) {
            Some(value) => {
                resolved = true;
                value.clone()
            }
            None => String::new(),
        }
    });
    match (has_tokens, resolved) {
        (false, _) => KeyResolution::NoTokens,
        (true, false) => KeyResolution::Unresolved,
        (true, true) => KeyResolution::Resolved(text.into_owned()),
    }
}

/// Substitutes `${key}` tokens from the locale map.
///
/// A template without tokens is returned as is. A template whose tokens all reference missing
/// keys yields `None`; missing keys next to a present one become empty text.
pub fn resolve(template: &str, locale: &LocaleMap) -> Option<String> {
    match resolve_keys(template, locale) {
        KeyResolution::NoTokens => Some(template.to_string()),
        KeyResolution::Unresolved => None,
        KeyResolution::Resolved(text) => Some(text),
    }
}

fn resolve_arg(arg: &Arg, locale: &LocaleMap) -> ResolvedArg {
    match arg {
        Arg::Literal(s) => match resolve_keys(s, locale) {
            KeyResolution::Resolved(text) => ResolvedArg::Text(text),
            _ => ResolvedArg::Text(s.clone()),
        },
        Arg::Template(t) => ResolvedArg::Template {
            resolved: resolve(&t.replace, locale),
            raw: t.replace.clone(),
            args: t.args.iter().map(|a| resolve_arg(a, locale)).collect(),
        },
    }
}

fn resolve_insert(insert: &Insert, locale: &LocaleMap) -> Option<CompiledInsert> {
    let mut value = locale.get(&insert.value)?.clone();
    if !value.ends_with('\n') {
        value.push('\n');
    }
    Some(CompiledInsert {
        at: insert.at,
        value,
    })
}

/// Builds a regular expression from a source and JavaScript-style flags.
/// Returns whether the `g` (replace all) flag was present.
pub fn build_regex(source: &str, flags: Option<&str>) -> Result<(Regex, bool), Error> {
    let mut builder = RegexBuilder::new(source);
    let mut global = false;
    let flags = flags.unwrap_or_default();
    for flag in flags.chars() {
        match flag {
            'g' => global = true,
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' => {}
            other => {
                return Err(Error::UnsupportedFlag {
                    flag: other,
                    flags: flags.to_string(),
                });
            }
        }
    }
    let re = builder.build().map_err(|source_err| Error::InvalidPattern {
        pattern: source.to_string(),
        source: source_err,
    })?;
    Ok((re, global))
}

/// Writes a literal pattern's replacement into `out`, expanding `$$`, `$&` (the match),
/// `` $` `` (text before it) and `$'` (text after it). Any other `$` is kept.
fn expand_literal_refs(replacement: &str, text: &str, start: usize, end: usize, out: &mut String) {
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let expansion = match chars.peek().copied() {
            Some('$') => "$",
            Some('&') => &text[start..end],
            Some('`') => &text[..start],
            Some('\'') => &text[end..],
            _ => {
                out.push('$');
                continue;
            }
        };
        chars.next();
        out.push_str(expansion);
    }
}

/// Rewrites `$1`, `$&` and `$<name>` group references into the `${..}` form so that a
/// reference directly followed by text is not read as one long group name. A `$` that
/// starts no reference stays a literal dollar sign.
fn expand_group_refs(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{}}}", digits));
            }
            Some('<') => {
                let rest: String = chars.clone().collect();
                match rest.find('>') {
                    Some(end) if end > 1 => {
                        out.push_str(&format!("${{{}}}", &rest[1..end]));
                        for _ in 0..rest[..=end].chars().count() {
                            chars.next();
                        }
                    }
                    _ => out.push_str("$$"),
                }
            }
            _ => out.push_str("$$"),
        }
    }
    out
}
