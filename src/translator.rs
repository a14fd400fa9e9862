//! Streaming, line-oriented application of a compiled translation to one file.
//!
//! A [`Translator`] is created per file and fed text chunks in order. It splits them into
//! lines and runs every compiled pattern over each line. Patterns whose expression spans
//! several lines look ahead into buffered lines; when not enough lines have arrived yet the
//! line is suspended, together with its pending pattern queue, until the next chunk (or
//! [`Translator::finish`]) supplies them.
//!
//! ```rust
//! use i18n_patch::{LocaleMap, Pattern, Translation, Translator, compile};
//!
//! let locale: LocaleMap = [("greeting".to_string(), "こんにちは".to_string())].into();
//! let translation = Translation::new("**/*").with_pattern(Pattern::literal("HELLO", "${greeting}"));
//! let compiled = compile(&translation, &locale)?;
//!
//! let mut translator = Translator::new(&compiled);
//! translator.feed("HEL");
//! translator.feed("LO\n");
//! let result = translator.finish();
//! assert!(result.matched);
//! assert_eq!(result.output, "こんにちは\n");
//! # Ok::<(), i18n_patch::Error>(())
//! ```

use std::collections::VecDeque;

use crate::{
    compiler::{CompiledInsert, CompiledTranslation},
    types::InsertAt,
};

const NEWLINE: char = '\n';

/// Result of translating one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    /// Output not yet taken with [`Translator::take_output`].
    pub output: String,
    /// Whether any line changed. When false the original file must be left as is.
    pub matched: bool,
    /// Values to insert at the beginning of the file, each ending in `\n`, deduplicated.
    pub begin: Vec<String>,
    /// Values to append at the end of the file, each ending in `\n`, deduplicated.
    pub end: Vec<String>,
    pub processed_lines: usize,
    pub unmatched_lines: usize,
}

impl Translated {
    /// Assembles begin buffer, translated body and end buffer.
    pub fn with_inserts(&self, body: &str) -> String {
        let mut content = String::with_capacity(body.len());
        for value in &self.begin {
            content.push_str(value);
        }
        content.push_str(body);
        if !self.end.is_empty() && !content.is_empty() && !content.ends_with(NEWLINE) {
            content.push(NEWLINE);
        }
        for value in &self.end {
            content.push_str(value);
        }
        content
    }
}

/// A line whose pattern queue has not been exhausted yet.
#[derive(Debug)]
struct PendingLine {
    original: String,
    current: String,
    /// Indices into the compiled pattern list, in declaration order.
    queue: VecDeque<usize>,
}

enum Step {
    Done(PendingLine),
    Suspended(PendingLine),
}

pub struct Translator<'a> {
    translation: &'a CompiledTranslation,
    /// Incomplete last line of the input seen so far.
    carry: String,
    /// Complete lines not yet processed.
    buffer: VecDeque<String>,
    pending: Option<PendingLine>,
    /// matchOnce patterns already applied in this file.
    frozen: Vec<bool>,
    begin: Vec<String>,
    end: Vec<String>,
    output: String,
    matched: bool,
    conditionals_recorded: bool,
    input_ended: bool,
    processed_lines: usize,
    unmatched_lines: usize,
    report_unmatched: Option<String>,
}

impl<'a> Translator<'a> {
    pub fn new(translation: &'a CompiledTranslation) -> Self {
        Translator {
            translation,
            carry: String::new(),
            buffer: VecDeque::new(),
            pending: None,
            frozen: vec![false; translation.patterns.len()],
            begin: Vec::new(),
            end: Vec::new(),
            output: String::new(),
            matched: false,
            conditionals_recorded: false,
            input_ended: false,
            processed_lines: 0,
            unmatched_lines: 0,
            report_unmatched: None,
        }
    }

    /// Logs every unmatched line as `file:line:text` at warn level.
    pub fn with_unmatched_report(mut self, file: impl Into<String>) -> Self {
        self.report_unmatched = Some(file.into());
        self
    }

    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Feeds the next chunk of the file.
    pub fn feed(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.carry.push_str(chunk);
        if let Some(last_break) = self.carry.rfind(NEWLINE) {
            let rest = self.carry.split_off(last_break + 1);
            let complete = std::mem::replace(&mut self.carry, rest);
            // `complete` ends with a line break, so the last split piece is empty.
            let mut lines: Vec<&str> = complete.split(NEWLINE).collect();
            lines.pop();
            self.buffer.extend(lines.into_iter().map(str::to_string));
        }
        self.process();
    }

    /// Takes the output emitted so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Ends the input, processes every remaining line and returns the result.
    pub fn finish(mut self) -> Translated {
        if !self.carry.is_empty() {
            let last = std::mem::take(&mut self.carry);
            self.buffer.push_back(last);
        }
        self.input_ended = true;
        self.process();
        Translated {
            output: self.output,
            matched: self.matched,
            begin: self.begin,
            end: self.end,
            processed_lines: self.processed_lines,
            unmatched_lines: self.unmatched_lines,
        }
    }

    fn process(&mut self) {
        loop {
            let line = match self.pending.take() {
                Some(line) => line,
                None => {
                    let Some(raw) = self.buffer.pop_front() else {
                        break;
                    };
                    self.processed_lines += 1;
                    if self.should_skip(&raw) {
                        self.emit(&raw);
                        continue;
                    }
                    PendingLine {
                        current: raw.clone(),
                        original: raw,
                        queue: self.queue_patterns(),
                    }
                }
            };
            match self.consume(line) {
                Step::Done(line) => {
                    if line.current == line.original {
                        self.unmatched_lines += 1;
                        if let Some(file) = &self.report_unmatched {
                            log::warn!("{}:{}:{}", file, self.processed_lines, line.original);
                        }
                    }
                    self.emit(&line.current);
                }
                Step::Suspended(line) => {
                    self.pending = Some(line);
                    break;
                }
            }
        }
    }

    fn should_skip(&self, line: &str) -> bool {
        self.translation
            .skip_patterns
            .iter()
            .any(|re| re.is_match(line))
    }

    fn queue_patterns(&self) -> VecDeque<usize> {
        (0..self.translation.patterns.len())
            .filter(|&i| !self.frozen[i])
            .collect()
    }

    fn consume(&mut self, mut line: PendingLine) -> Step {
        let patterns = &self.translation.patterns;
        while let Some(idx) = line.queue.pop_front() {
            let pattern = &patterns[idx];
            if self.frozen[idx] || !pattern.is_resolved() {
                continue;
            }

            let mut window = line.current.clone();
            let mut absorbed = 0;
            if pattern.line_span > 1 {
                let have = window.split(NEWLINE).count();
                let required = pattern.line_span.saturating_sub(have);
                if required <= self.buffer.len() {
                    for next in self.buffer.iter().take(required) {
                        window.push(NEWLINE);
                        window.push_str(next);
                    }
                    absorbed = required;
                } else if self.input_ended {
                    continue;
                } else {
                    line.queue.push_front(idx);
                    return Step::Suspended(line);
                }
            }

            // An unchanged window is dropped, so the line stays as it was before the lookahead.
            let Some(changed) = pattern.apply(&window) else {
                continue;
            };
            for _ in 0..absorbed {
                if let Some(absorbed_line) = self.buffer.pop_front() {
                    line.original.push(NEWLINE);
                    line.original.push_str(&absorbed_line);
                    self.processed_lines += 1;
                }
            }
            line.current = changed;
            self.matched = true;
            if pattern.match_once {
                self.frozen[idx] = true;
            }
            if let Some(insert) = &pattern.insert {
                record(&mut self.begin, &mut self.end, insert);
            }
            if !self.conditionals_recorded {
                self.conditionals_recorded = true;
                for insert in &self.translation.conditionals {
                    record(&mut self.begin, &mut self.end, insert);
                }
            }
            if pattern.complete_pattern {
                line.queue.clear();
                break;
            }
        }
        Step::Done(line)
    }

    fn emit(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push(NEWLINE);
    }
}

fn record(begin: &mut Vec<String>, end: &mut Vec<String>, insert: &CompiledInsert) {
    let buffer = match insert.at {
        InsertAt::Begin => begin,
        InsertAt::End => end,
    };
    if !buffer.contains(&insert.value) {
        buffer.push(insert.value.clone());
    }
}

/// Runs a whole text through a fresh translator.
pub fn translate_str(translation: &CompiledTranslation, text: &str) -> Translated {
    let mut translator = Translator::new(translation);
    translator.feed(text);
    translator.finish()
}
