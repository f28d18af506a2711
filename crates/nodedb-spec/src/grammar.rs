//! Field and attribute grammar for node bodies.
//!
//! A body is a sequence of spans, each starting with a field-type keyword
//! or `attribute`. A keyword only starts a span when the tokens after it
//! read as a span head: a field type followed by its access bracket, or
//! `attribute` followed by a name and a value. Names, values, strings and
//! free text therefore never split a span, and an unclosed bracket never
//! hides the spans after it.

use std::sync::LazyLock;

use regex::Regex;

use nodedb_core::{parse_field_value, AccessMode, Annotations, AttributeValue, Field, FieldType};

use crate::error::{Diagnostic, DiagnosticKind};
use crate::lexer::{tokenize, Token, TokenKind};

pub const ATTRIBUTE_KEYWORD: &str = "attribute";

static ANNOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)(?:\s*\(([^)]*)\))?").unwrap()
});

/// A parsed span.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Field(Field),
    Attribute { name: String, value: AttributeValue },
}

/// Items and diagnostics from one body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyParse {
    pub items: Vec<Item>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse every span of a node body, recovering at the next span start
/// after a malformed one.
pub fn parse_body(body: &str) -> BodyParse {
    let tokens = tokenize(body);
    let mut out = BodyParse::default();

    let first = next_span_start(&tokens, 0);
    if let Some(text) = leftover_text(body, &tokens[..first]) {
        out.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnrecognizedText,
            "text before the first field or attribute",
            text,
        ));
    }

    let mut pos = first;
    while pos < tokens.len() {
        let mut span = SpanParser {
            body,
            tokens: &tokens,
            start: pos,
            pos: pos + 1,
            diagnostics: Vec::new(),
        };
        let parsed = if tokens[pos].is_ident(ATTRIBUTE_KEYWORD) {
            span.attribute()
        } else {
            span.field()
        };
        let (item, end) = match parsed {
            Ok(item) => (Some(item), span.pos),
            Err(message) => {
                let end = next_span_start(&tokens, pos + 1);
                let kind = if tokens[pos].is_ident(ATTRIBUTE_KEYWORD) {
                    DiagnosticKind::InvalidAttribute
                } else {
                    DiagnosticKind::InvalidField
                };
                span.diagnostics.push(Diagnostic::new(
                    kind,
                    message,
                    span_text(body, &tokens[pos..end]),
                ));
                (None, end)
            }
        };
        out.diagnostics.append(&mut span.diagnostics);
        out.items.extend(item);
        pos = end;
    }
    out
}

/// Parse `@name` and `@name(p1, p2)` annotations from trailing text.
pub fn parse_annotations(text: &str) -> Annotations {
    let mut annotations = Annotations::new();
    for caps in ANNOTATION_RE.captures_iter(text) {
        let params = caps.get(2).map(|list| {
            list.as_str()
                .split(',')
                .map(str::trim)
                .take_while(|p| p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        });
        annotations.insert(&caps[1], params);
    }
    annotations
}

/// Whether a token may start a field or attribute span.
fn is_span_keyword(token: &Token) -> bool {
    token.is(TokenKind::Ident)
        && (token.text == ATTRIBUTE_KEYWORD || token.text.parse::<FieldType>().is_ok())
}

/// Whether the token at `i` starts a span.
///
/// `attribute` must be followed by a name and then something other than a
/// plain word, so prose such as "this attribute controls it" stays text.
/// A malformed value after the name still opens a span, to be reported.
fn opens_span(tokens: &[Token], i: usize) -> bool {
    let Some(token) = tokens.get(i) else {
        return false;
    };
    if token.is_ident(ATTRIBUTE_KEYWORD) {
        let name = tokens.get(i + 1);
        let value = tokens.get(i + 2);
        name.is_some_and(|n| n.is(TokenKind::Ident))
            && !value.is_some_and(|v| {
                v.is(TokenKind::Ident)
                    && !v.text.eq_ignore_ascii_case("TRUE")
                    && !v.text.eq_ignore_ascii_case("FALSE")
            })
    } else {
        is_span_keyword(token) && tokens.get(i + 1).is_some_and(|n| n.is(TokenKind::LBracket))
    }
}

/// Index of the first token at or after `from` that opens a span, or
/// `tokens.len()`.
fn next_span_start(tokens: &[Token], from: usize) -> usize {
    (from..tokens.len())
        .find(|&i| opens_span(tokens, i))
        .unwrap_or(tokens.len())
}

/// Brackets and parentheses left open at the end of `tokens`.
fn open_depth(tokens: &[Token]) -> usize {
    tokens.iter().fold(0usize, |depth, token| match token.kind {
        TokenKind::LBracket | TokenKind::LParen => depth + 1,
        TokenKind::RBracket | TokenKind::RParen => depth.saturating_sub(1),
        _ => depth,
    })
}

fn span_text(body: &str, tokens: &[Token]) -> String {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => body[first.start..last.end].trim().to_string(),
        _ => String::new(),
    }
}

/// Non-comment text among `tokens`, or `None` when there is none.
fn leftover_text(body: &str, tokens: &[Token]) -> Option<String> {
    let code: Vec<Token> = tokens
        .iter()
        .filter(|t| !t.is(TokenKind::Comment))
        .cloned()
        .collect();
    if code.is_empty() {
        None
    } else {
        Some(span_text(body, &code))
    }
}

/// Join tokens back into text: runs of code keep their source spacing,
/// comments contribute their content.
fn tail_text(body: &str, tokens: &[Token]) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    for token in tokens {
        if token.is(TokenKind::Comment) {
            if let Some((s, e)) = run.take() {
                pieces.push(body[s..e].to_string());
            }
            if !token.text.is_empty() {
                pieces.push(token.text.clone());
            }
        } else {
            run = Some(match run {
                Some((s, _)) => (s, token.end),
                None => (token.start, token.end),
            });
        }
    }
    if let Some((s, e)) = run {
        pieces.push(body[s..e].to_string());
    }
    pieces.join(" ").replace(['\n', '\t'], " ").trim().to_string()
}

/// Source text covering `tokens`, with each code token's own text in
/// place of its source so lexer substitutions such as `pi/2` carry through.
fn substituted_text(body: &str, tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_end: Option<usize> = None;
    for token in tokens.iter().filter(|t| !t.is(TokenKind::Comment)) {
        if let Some(end) = prev_end {
            out.push_str(&body[end..token.start]);
        }
        out.push_str(&token.text);
        prev_end = Some(token.end);
    }
    out
}

/// Content of a quoted string token with `\\` and `\"` unescaped.
fn unquote(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .map(|s| s.strip_suffix('"').unwrap_or(s))
        .unwrap_or(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('\\') | Some('"')) {
            out.extend(chars.next());
        } else {
            out.push(c);
        }
    }
    out
}

struct SpanParser<'a> {
    body: &'a str,
    tokens: &'a [Token],
    /// Index of the span keyword.
    start: usize,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SpanParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn keyword(&self) -> &'a Token {
        &self.tokens[self.start]
    }

    /// Consume a name. A keyword counts as a name unless the token after
    /// it shows it opens the next span.
    fn expect_ident(&mut self, what: &str) -> Result<&'a Token, String> {
        match self.peek() {
            Some(t) if t.is(TokenKind::Ident) && !opens_span(self.tokens, self.pos) => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(format!("expected {what}, found {:?}", t.text)),
            None => Err(format!("expected {what}")),
        }
    }

    /// Index of the bracket closing the one at `open`, refusing to cross
    /// the start of another span.
    fn matching_bracket(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ if opens_span(self.tokens, i) => return None,
                _ => {}
            }
        }
        None
    }

    fn diagnose(&mut self, kind: DiagnosticKind, message: impl Into<String>, text: String) {
        self.diagnostics.push(Diagnostic::new(kind, message, text));
    }

    // --- attribute ---

    fn attribute(&mut self) -> Result<Item, String> {
        let name = self.expect_ident("attribute name")?.text.clone();
        let token = self
            .peek()
            .ok_or_else(|| "Invalid attribute specification".to_string())?;
        let value = match token.kind {
            TokenKind::Ident if token.text.eq_ignore_ascii_case("TRUE") => AttributeValue::Bool(true),
            TokenKind::Ident if token.text.eq_ignore_ascii_case("FALSE") => {
                AttributeValue::Bool(false)
            }
            TokenKind::Number => match token.text.parse::<i64>() {
                Ok(i) => AttributeValue::Int(i),
                Err(_) => AttributeValue::Float(
                    token
                        .text
                        .parse::<f64>()
                        .map_err(|_| "Invalid attribute specification".to_string())?,
                ),
            },
            TokenKind::Str => AttributeValue::String(unquote(&token.text)),
            _ => return Err("Invalid attribute specification".to_string()),
        };
        self.pos += 1;
        self.pos = next_span_start(self.tokens, self.pos);
        Ok(Item::Attribute { name, value })
    }

    // --- field ---

    fn field(&mut self) -> Result<Item, String> {
        let field_type = self
            .keyword()
            .text
            .parse::<FieldType>()
            .map_err(|e| e.to_string())?;
        let access = self.access_mode()?;
        let name = self.expect_ident("field name")?.text.clone();
        let mut field = Field::new(field_type, access.clone(), name);

        match access {
            AccessMode::InitializeOnly | AccessMode::InputOutput => {
                field.value = self.default_value(field_type);
            }
            AccessMode::InputOnly | AccessMode::OutputOnly
                if field_type == FieldType::MFNode =>
            {
                self.misplaced_default();
            }
            _ => {}
        }

        if field_type.is_node_ref() {
            if let Some(types) = self.valid_value_types() {
                field.valid_value_types = types;
            }
        }

        let end = next_span_start(self.tokens, self.pos);
        let tail = &self.tokens[self.pos..end];
        if end < self.tokens.len() && open_depth(tail) > 0 {
            self.diagnose(
                DiagnosticKind::UnbalancedBracket,
                format!("unclosed bracket in the text after field {}", field.name),
                span_text(self.body, tail),
            );
        }
        let info = tail_text(self.body, tail);
        self.pos = end;
        if ANNOTATION_RE.is_match(&info) {
            field.annotations = parse_annotations(&info);
        } else if !info.is_empty() {
            field.comment = Some(info);
        }
        Ok(Item::Field(field))
    }

    fn access_mode(&mut self) -> Result<AccessMode, String> {
        match self.peek() {
            Some(t) if t.is(TokenKind::LBracket) => {}
            _ => return Err("expected access mode".to_string()),
        }
        let close = self
            .matching_bracket(self.pos)
            .ok_or_else(|| "unterminated access mode".to_string())?;
        let content: String = self.tokens[self.pos + 1..close]
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        self.pos = close + 1;
        Ok(AccessMode::from_bracket(&content))
    }

    /// Consume the default value if it fits the type.
    fn default_value(&mut self, field_type: FieldType) -> Option<String> {
        let candidate = self.default_candidate(field_type);
        match candidate {
            Some((raw, next)) if parse_field_value(field_type, &raw).is_some() => {
                self.pos = next;
                Some(raw)
            }
            _ => {
                let end = next_span_start(self.tokens, self.pos);
                self.diagnose(
                    DiagnosticKind::InvalidDefault,
                    "no or incorrect default value",
                    span_text(self.body, &self.tokens[self.start..end]),
                );
                None
            }
        }
    }

    /// The raw literal at the cursor and the index after it, with source
    /// fixups applied.
    fn default_candidate(&mut self, field_type: FieldType) -> Option<(String, usize)> {
        let token = self.peek()?;

        if token.is(TokenKind::LBracket) {
            let close = self.matching_bracket(self.pos)?;
            let raw = substituted_text(self.body, &self.tokens[self.pos..=close]);
            let inner = self.tokens[self.pos + 1..close]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<String>();
            if field_type == FieldType::SFNode && inner.is_empty() {
                self.diagnose(
                    DiagnosticKind::Correction,
                    "replaced empty SFNode default [] with NULL",
                    raw,
                );
                return Some(("NULL".to_string(), close + 1));
            }
            if matches!(
                field_type,
                FieldType::MFColor | FieldType::MFColorRGBA | FieldType::MFVec3f
            ) && inner == "NULL"
            {
                self.diagnose(
                    DiagnosticKind::Correction,
                    format!("replaced {field_type} default [NULL] with []"),
                    raw,
                );
                return Some(("[]".to_string(), close + 1));
            }
            return field_type.is_multi().then_some((raw, close + 1));
        }

        let kind = field_type.kind();
        match kind.tuple_width() {
            Some(width) => {
                let numbers = self.tokens.get(self.pos..self.pos + width)?;
                if !numbers.iter().all(|t| t.is(TokenKind::Number)) {
                    return None;
                }
                let raw = numbers
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                Some((raw, self.pos + width))
            }
            None if token.is(TokenKind::Ident) || token.is(TokenKind::Str) => {
                Some((token.text.clone(), self.pos + 1))
            }
            None => None,
        }
    }

    /// Discard `[]` on an event MFNode field when a valid-value list follows.
    fn misplaced_default(&mut self) {
        let empty_list = matches!(
            (self.peek(), self.peek_at(1), self.peek_at(2)),
            (Some(a), Some(b), Some(c))
                if a.is(TokenKind::LBracket) && b.is(TokenKind::RBracket) && c.is(TokenKind::LBracket)
        );
        if empty_list {
            let keyword = self.keyword();
            let text = span_text(self.body, &self.tokens[self.start..self.pos + 2]);
            self.diagnose(
                DiagnosticKind::MisplacedDefault,
                format!(
                    "{} inputOnly/outputOnly field declaration provides a default value",
                    keyword.text
                ),
                text,
            );
            self.pos += 2;
        }
    }

    /// A bracketed `A|B` or `A,B` list right after the value position.
    fn valid_value_types(&mut self) -> Option<Vec<String>> {
        if !self.peek()?.is(TokenKind::LBracket) {
            return None;
        }
        let close = self.matching_bracket(self.pos)?;
        let mut types = Vec::new();
        let mut current = String::new();
        for token in &self.tokens[self.pos + 1..close] {
            if token.is(TokenKind::Comma) || token.is(TokenKind::Pipe) {
                types.push(std::mem::take(&mut current));
            } else {
                current.push_str(&token.text);
            }
        }
        types.push(current);
        self.pos = close + 1;
        Some(
            types
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }
}
