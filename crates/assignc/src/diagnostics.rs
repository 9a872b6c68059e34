use std::fmt;
use std::io::IsTerminal;
use std::ops::Range;
use std::path::Path;

use ariadne::{sources, Config, IndexType, Label, Report, ReportKind};

use crate::parser::ParseError;
use crate::tokenizer::{Position, TokenizeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticStage {
    Tokenize,
    Parse,
    Io,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticStage::Tokenize => "tokenize",
            DiagnosticStage::Parse => "parse",
            DiagnosticStage::Io => "io",
        };
        f.write_str(name)
    }
}

/// A span in the diagnostic's source with the text shown under it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLabel {
    pub span: Range<usize>,
    pub message: String,
}

/// An error report about one program. Every diagnostic this crate produces is
/// an error, so there is no severity.
#[derive(Clone, Debug)]
pub struct CompilerDiagnostic {
    pub code: String,
    pub stage: DiagnosticStage,
    pub message: String,
    pub file_id: String,
    pub source: String,
    pub labels: Vec<SourceLabel>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl CompilerDiagnostic {
    pub fn new(
        code: impl Into<String>,
        stage: DiagnosticStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            stage,
            message: message.into(),
            file_id: file_id_from_path(None),
            source: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_source(mut self, file_id: impl Into<String>, source: impl Into<String>) -> Self {
        self.file_id = file_id.into();
        self.source = source.into();
        self
    }

    pub fn with_label(mut self, span: Range<usize>, message: impl Into<String>) -> Self {
        self.labels.push(SourceLabel {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn render_plain(&self) -> String {
        self.render(false)
    }

    pub fn render_terminal_auto(&self) -> String {
        self.render(std::io::stderr().is_terminal())
    }

    fn headline(&self) -> String {
        format!("error[{}:{}]: {}", self.stage, self.code, self.message)
    }

    fn render(&self, use_color: bool) -> String {
        let anchor = self
            .labels
            .first()
            .map(|label| sanitize_span(&label.span))
            .unwrap_or_else(|| 0..next_char_boundary(&self.source, 0));

        let config = Config::default()
            .with_color(use_color)
            .with_index_type(IndexType::Byte);
        let mut report = Report::build(ReportKind::Error, (self.file_id.clone(), anchor))
            .with_code(self.code.clone())
            .with_message(self.headline())
            .with_config(config)
            .with_labels(self.labels.iter().map(|label| {
                Label::new((self.file_id.clone(), sanitize_span(&label.span)))
                    .with_message(label.message.clone())
            }));
        for note in &self.notes {
            report = report.with_note(note.clone());
        }
        if let Some(help) = &self.help {
            report = report.with_help(help.clone());
        }

        let mut output = Vec::new();
        let cache = sources([(self.file_id.clone(), self.source.clone())]);
        match report.finish().write(cache, &mut output) {
            Ok(()) => String::from_utf8_lossy(&output).trim_end().to_string(),
            Err(_) => self.render_fallback(),
        }
    }

    fn render_fallback(&self) -> String {
        let mut lines = vec![self.headline()];
        lines.extend(self.notes.iter().map(|note| format!("note: {note}")));
        lines.extend(self.help.iter().map(|help| format!("help: {help}")));
        lines.join("\n")
    }
}

impl fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_plain())
    }
}

pub fn diagnostic_from_anyhow(
    stage: DiagnosticStage,
    code: impl Into<String>,
    message: impl Into<String>,
    error: &anyhow::Error,
) -> CompilerDiagnostic {
    let mut diagnostic = CompilerDiagnostic::new(code, stage, message);

    let mut causes = error.chain();
    if let Some(primary) = causes.next() {
        diagnostic.message = format!("{}: {}", diagnostic.message, primary);
    }
    for cause in causes {
        diagnostic = diagnostic.with_note(format!("caused by: {cause}"));
    }

    diagnostic
}

pub fn diagnostic_from_tokenize_error(
    source: &str,
    source_path: Option<&Path>,
    error: &TokenizeError,
) -> CompilerDiagnostic {
    let (code, label) = match error {
        TokenizeError::InvalidCharacter { character, .. } => (
            "ASSIGNC-TOKENIZE-001",
            format!("unexpected character '{}'", character.escape_default()),
        ),
        TokenizeError::NumericOverflow { .. } => (
            "ASSIGNC-TOKENIZE-002",
            "integer literal does not fit in 64 bits".to_string(),
        ),
    };
    let file_id = file_id_from_path(source_path);
    let mut diagnostic =
        CompilerDiagnostic::new(code, DiagnosticStage::Tokenize, "tokenization failed")
            .with_source(file_id, source.to_string())
            .with_label(error.span(), label)
            .with_note(position_note(&error.position()));
    if matches!(error, TokenizeError::InvalidCharacter { .. }) {
        diagnostic = diagnostic.with_help(
            "programs may only contain letters, digits, `+ - * / = ; ( )`, spaces and newlines",
        );
    }
    diagnostic
}

pub fn diagnostic_from_parse_error(
    source: &str,
    source_path: Option<&Path>,
    error: &ParseError,
) -> CompilerDiagnostic {
    let code = match error {
        ParseError::UnexpectedEndOfInput { .. } => "ASSIGNC-PARSE-001",
        ParseError::UnexpectedTokenKind { .. } => "ASSIGNC-PARSE-002",
        ParseError::UnmatchedParenthesis { .. } => "ASSIGNC-PARSE-003",
        ParseError::InvalidTermToken { .. } => "ASSIGNC-PARSE-004",
        ParseError::MaxNestingExceeded { .. } => "ASSIGNC-PARSE-005",
        ParseError::NumericOverflow { .. } => "ASSIGNC-PARSE-006",
    };
    let file_id = file_id_from_path(source_path);
    let mut diagnostic = CompilerDiagnostic::new(code, DiagnosticStage::Parse, "parsing failed")
        .with_source(file_id, source.to_string());

    match error {
        ParseError::UnexpectedEndOfInput { .. } => {
            if let Some(span) = last_char_span(source) {
                diagnostic = diagnostic.with_label(span, error.to_string());
            } else {
                diagnostic = diagnostic.with_note(error.to_string());
            }
        }
        ParseError::UnmatchedParenthesis { opening, found } => {
            diagnostic = diagnostic.with_label(
                span_from_position(source, opening),
                "this parenthesis is never closed",
            );
            let closing_span = match found {
                Some(token) => Some(token.span()),
                None => last_char_span(source),
            };
            if let Some(span) = closing_span {
                diagnostic = diagnostic.with_label(span, "expected ')' here");
            }
            diagnostic = diagnostic.with_note(position_note(opening));
        }
        ParseError::UnexpectedTokenKind { found, .. } | ParseError::InvalidTermToken { found } => {
            diagnostic = diagnostic
                .with_label(found.span(), error.to_string())
                .with_note(position_note(&found.position));
        }
        ParseError::MaxNestingExceeded { position, .. } => {
            diagnostic = diagnostic
                .with_label(span_from_position(source, position), error.to_string())
                .with_note(position_note(position));
        }
        ParseError::NumericOverflow { text, position } => {
            let span = position.offset..position.offset + text.len();
            diagnostic = diagnostic
                .with_label(span, error.to_string())
                .with_note(position_note(position));
        }
    }

    diagnostic
}

fn position_note(position: &Position) -> String {
    format!("at line {}, column {}", position.line, position.column)
}

pub fn file_id_from_path(path: Option<&Path>) -> String {
    path.map(|value| value.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}

pub fn span_from_position(source: &str, position: &Position) -> Range<usize> {
    let start = position.offset.min(source.len());
    let end = next_char_boundary(source, start);
    sanitize_span(&(start..end))
}

fn last_char_span(source: &str) -> Option<Range<usize>> {
    source
        .char_indices()
        .last()
        .map(|(idx, ch)| idx..idx + ch.len_utf8())
}

pub fn sanitize_span(span: &Range<usize>) -> Range<usize> {
    if span.end <= span.start {
        span.start..span.start.saturating_add(1)
    } else {
        span.clone()
    }
}

pub fn next_char_boundary(source: &str, start: usize) -> usize {
    if start >= source.len() {
        return start.saturating_add(1);
    }
    let mut iter = source[start..].char_indices();
    let _ = iter.next();
    if let Some((delta, _)) = iter.next() {
        start + delta
    } else {
        source.len()
    }
}
