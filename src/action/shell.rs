//! Quote-aware shell tokenizer.
//!
//! A command string is parsed exactly once, at the boundary, into argv
//! segments plus a set of obfuscation indicators. Rule matching only ever
//! looks at the parsed form.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// Shells and script interpreters that execute whatever they are fed.
const INTERPRETERS: &[&str] = &[
    "sh", "bash", "zsh", "dash", "ksh", "fish", "python", "python3", "perl", "ruby", "node",
    "php",
];

/// Launchers that run their arguments as a command without changing it.
const TRANSPARENT_WRAPPERS: &[&str] = &["env", "nohup", "time", "command", "builtin", "nice"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Indicator {
    /// `$( ... )`
    CommandSubstitution,
    /// `` `...` ``
    Backtick,
    /// `<( ... )` or `>( ... )`
    ProcessSubstitution,
    /// `... | sh`, `... | python`
    PipeToInterpreter,
    /// `eval`, `exec`, `source` or `.` as the program
    EvalExec,
    /// `sh -c`, `python -c`, `perl -e`
    InlineInterpreter,
    /// `base64 -d`, `xxd -r`
    EncodedPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("dangling escape at end of input")]
    TrailingEscape,
    #[error("no command words")]
    Empty,
}

/// File named by a `<`/`>` redirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub target: String,
    pub write: bool,
}

/// A command line split into argv segments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub segments: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<Indicator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirects: Vec<Redirect>,
}

impl ParsedCommand {
    pub fn has_indicators(&self) -> bool {
        !self.indicators.is_empty()
    }

    /// Output redirections to anything other than `/dev/null`.
    pub fn writes_files(&self) -> bool {
        self.redirects
            .iter()
            .any(|r| r.write && r.target != "/dev/null")
    }

    /// Segments with transparent wrappers (`env FOO=1`, `nohup`, ...) peeled off.
    pub fn effective_segments(&self) -> impl Iterator<Item = &[String]> {
        self.segments.iter().map(|argv| strip_wrappers(argv))
    }

    /// Space-joined rendering used in logs and oracle queries.
    pub fn display(&self) -> String {
        self.segments
            .iter()
            .map(|argv| {
                argv.iter()
                    .map(|word| quote_word(word))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" ; ")
    }
}

fn quote_word(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", word.replace('\'', "'\\''"))
    } else {
        word.to_string()
    }
}

/// Basename of the program word, so `/usr/bin/rm` and `rm` match alike.
pub fn program_name(argv: &[String]) -> Option<&str> {
    argv.first()
        .map(|word| word.rsplit('/').next().unwrap_or(word.as_str()))
}

fn is_env_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_wrappers(argv: &[String]) -> &[String] {
    let mut rest = argv;
    loop {
        let Some(program) = program_name(rest) else {
            return rest;
        };
        if !TRANSPARENT_WRAPPERS.contains(&program) {
            return rest;
        }
        rest = &rest[1..];
        while rest
            .first()
            .is_some_and(|w| is_env_assignment(w) || w.starts_with('-'))
        {
            rest = &rest[1..];
        }
    }
}

#[derive(Default)]
struct Tokenizer {
    segments: Vec<Vec<String>>,
    pipe_fed: Vec<bool>,
    indicators: Vec<Indicator>,
    redirects: Vec<Redirect>,
    segment: Vec<String>,
    word: String,
    has_word: bool,
    /// Next word is a redirection target; `Some(true)` for output.
    pending_redirect: Option<bool>,
    /// The pending redirection was `>&`/`<&`, so a numeric target is an fd.
    pending_dup: bool,
    next_is_piped: bool,
}

impl Tokenizer {
    fn flag(&mut self, indicator: Indicator) {
        if !self.indicators.contains(&indicator) {
            self.indicators.push(indicator);
        }
    }

    fn push_char(&mut self, c: char) {
        self.word.push(c);
        self.has_word = true;
    }

    fn end_word(&mut self) {
        if !self.has_word {
            return;
        }
        let word = std::mem::take(&mut self.word);
        self.has_word = false;
        if let Some(write) = self.pending_redirect.take() {
            let fd_dup = std::mem::take(&mut self.pending_dup)
                && (word == "-" || word.chars().all(|c| c.is_ascii_digit()));
            if !fd_dup {
                self.redirects.push(Redirect {
                    target: word,
                    write,
                });
            }
            return;
        }
        self.segment.push(word);
    }

    fn end_segment(&mut self, piped_into_next: bool) {
        self.end_word();
        let segment = std::mem::take(&mut self.segment);
        let first_word = segment
            .iter()
            .position(|w| !is_env_assignment(w))
            .unwrap_or(segment.len());
        let argv: Vec<String> = segment.into_iter().skip(first_word).collect();
        if !argv.is_empty() {
            self.segments.push(argv);
            self.pipe_fed.push(self.next_is_piped);
        }
        self.next_is_piped = piped_into_next;
    }

    /// A bare file-descriptor number before the operator (`2>`) is dropped.
    fn start_redirect(&mut self, write: bool) {
        if self.has_word && self.word.chars().all(|c| c.is_ascii_digit()) {
            self.word.clear();
            self.has_word = false;
        } else {
            self.end_word();
        }
        self.pending_redirect = Some(write);
        self.pending_dup = false;
    }
}

/// Parse a shell command string into argv segments.
pub fn parse_command(input: &str) -> Result<ParsedCommand, ParseError> {
    let mut t = Tokenizer::default();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                t.has_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => t.word.push(inner),
                        None => return Err(ParseError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                t.has_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('$' | '`' | '"' | '\\')) => t.word.push(escaped),
                            Some('\n') => {}
                            Some(other) => {
                                t.word.push('\\');
                                t.word.push(other);
                            }
                            None => return Err(ParseError::UnterminatedQuote('"')),
                        },
                        Some('$') if chars.peek() == Some(&'(') => {
                            t.flag(Indicator::CommandSubstitution);
                            t.word.push('$');
                        }
                        Some('`') => {
                            t.flag(Indicator::Backtick);
                            t.word.push('`');
                        }
                        Some(inner) => t.word.push(inner),
                        None => return Err(ParseError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(escaped) => t.push_char(escaped),
                None => return Err(ParseError::TrailingEscape),
            },
            '$' if chars.peek() == Some(&'(') => {
                chars.next();
                t.flag(Indicator::CommandSubstitution);
                t.end_segment(false);
            }
            '`' => {
                t.flag(Indicator::Backtick);
                t.end_segment(false);
            }
            '<' | '>' if chars.peek() == Some(&'(') => {
                chars.next();
                t.flag(Indicator::ProcessSubstitution);
                t.end_segment(false);
            }
            '>' | '<' => {
                t.start_redirect(c == '>');
                while let Some(&next) = chars.peek() {
                    if !matches!(next, '>' | '<' | '&') {
                        break;
                    }
                    t.pending_dup |= next == '&';
                    chars.next();
                }
            }
            '(' | ')' | ';' | '\n' => t.end_segment(false),
            '&' => match chars.peek() {
                Some('&') => {
                    chars.next();
                    t.end_segment(false);
                }
                Some('>') => {
                    chars.next();
                    t.start_redirect(true);
                    if chars.peek() == Some(&'>') {
                        chars.next();
                    }
                }
                _ => t.end_segment(false),
            },
            '|' => match chars.peek() {
                Some('|') => {
                    chars.next();
                    t.end_segment(false);
                }
                Some('&') => {
                    chars.next();
                    t.end_segment(true);
                }
                _ => t.end_segment(true),
            },
            '#' if !t.has_word => {
                while chars.peek().is_some_and(|n| *n != '\n') {
                    chars.next();
                }
            }
            c if c.is_whitespace() => t.end_word(),
            c => t.push_char(c),
        }
    }
    t.end_segment(false);

    if t.segments.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parsed = ParsedCommand {
        segments: t.segments,
        indicators: t.indicators,
        redirects: t.redirects,
    };
    for (argv, piped) in parsed.segments.iter().zip(&t.pipe_fed) {
        for indicator in segment_indicators(strip_wrappers(argv), *piped) {
            if !parsed.indicators.contains(&indicator) {
                parsed.indicators.push(indicator);
            }
        }
    }
    Ok(parsed)
}

fn segment_indicators(argv: &[String], piped: bool) -> Vec<Indicator> {
    let mut found = Vec::new();
    let Some(program) = program_name(argv) else {
        return found;
    };
    let args = &argv[1..];
    let has_arg = |flag: &str| args.iter().any(|a| a == flag);

    let interpreter = INTERPRETERS.contains(&program);
    if piped && interpreter {
        found.push(Indicator::PipeToInterpreter);
    }
    if matches!(program, "eval" | "exec" | "source" | ".") {
        found.push(Indicator::EvalExec);
    }
    if interpreter && (has_arg("-c") || has_arg("-e")) {
        found.push(Indicator::InlineInterpreter);
    }
    let decodes = match program {
        "base64" => has_arg("-d") || has_arg("-D") || has_arg("--decode"),
        "xxd" => args.iter().any(|a| a.starts_with("-r")),
        _ => false,
    };
    if decodes {
        found.push(Indicator::EncodedPayload);
    }
    found
}
