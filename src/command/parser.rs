use std::ops::Range;

use crate::command::ir::{FilterApplication, FilterChain, OutputSpec, ParsedCommand, Stream};
use crate::command::lexer::{Span, Token, TokenKind, is_number, lex};
use crate::foundation::error::{FfgraphError, FfgraphResult, LexError, ParseError};
use crate::registry::FilterRegistry;

/// Flags that never take a value.
const VALUELESS_FLAGS: [&str; 19] = [
    "y",
    "n",
    "hide_banner",
    "nostdin",
    "stats",
    "nostats",
    "an",
    "vn",
    "sn",
    "dn",
    "shortest",
    "re",
    "copyts",
    "start_at_zero",
    "xerror",
    "benchmark",
    "benchmark_all",
    "ignore_unknown",
    "copy_unknown",
];

/// Flags that configure the whole invocation regardless of where they appear.
const GLOBAL_FLAGS: [&str; 22] = [
    "y",
    "n",
    "hide_banner",
    "nostdin",
    "stats",
    "nostats",
    "copyts",
    "start_at_zero",
    "xerror",
    "benchmark",
    "benchmark_all",
    "ignore_unknown",
    "copy_unknown",
    "threads",
    "hwaccel",
    "hwaccel_device",
    "hwaccel_output_format",
    "init_hw_device",
    "filter_hw_device",
    "loglevel",
    "v",
    "filter_complex_threads",
];

pub(crate) fn is_valueless_flag(flag: &str) -> bool {
    VALUELESS_FLAGS.contains(&flag)
}

fn is_global_flag(flag: &str) -> bool {
    GLOBAL_FLAGS.contains(&flag)
}

/// Parses an ffmpeg command line, or a bare filter graph when the text does not start with a
/// flag or the program name.
#[tracing::instrument(skip(src, registry), fields(len = src.len()))]
pub fn parse_command(src: &str, registry: &FilterRegistry) -> FfgraphResult<ParsedCommand> {
    let tokens = lex(src)?;
    let words = split_words(&tokens);

    let first = &tokens[words[0].clone()];
    let skip_program = is_program_name(&word_text(first));
    let cmd = if skip_program || is_flag_token(&first[0]) {
        let mut p = CommandParser {
            tokens: &tokens,
            words,
            pos: usize::from(skip_program),
            registry,
            cmd: ParsedCommand::default(),
            pending: OutputSpec::default(),
            seen_input: false,
        };
        p.run()?
    } else {
        ParsedCommand {
            chains: GraphParser::new(&tokens, registry).parse_graph()?,
            ..ParsedCommand::default()
        }
    };

    tracing::debug!(
        inputs = cmd.inputs.len(),
        chains = cmd.chains.len(),
        outputs = cmd.outputs.len(),
        "parsed command"
    );
    Ok(cmd)
}

/// Parses `-filter_complex` syntax on its own.
pub fn parse_filter_graph(src: &str, registry: &FilterRegistry) -> FfgraphResult<Vec<FilterChain>> {
    let tokens = lex(src)?;
    Ok(GraphParser::new(&tokens, registry).parse_graph()?)
}

// Maximal runs of tokens with no whitespace between them. `Eof` is never part of a word.
fn split_words(tokens: &[Token]) -> Vec<Range<usize>> {
    let n = tokens.len().saturating_sub(1);
    let mut out = Vec::new();
    let mut start = 0;
    for i in 0..n {
        if i + 1 == n || !tokens[i].touches(&tokens[i + 1]) {
            out.push(start..i + 1);
            start = i + 1;
        }
    }
    out
}

fn word_text(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

fn is_flag_token(t: &Token) -> bool {
    if t.kind != TokenKind::Expr {
        return false;
    }
    let mut chars = t.value.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_program_name(word: &str) -> bool {
    let base = word.rsplit(['/', '\\']).next().unwrap_or(word);
    base.eq_ignore_ascii_case("ffmpeg") || base.eq_ignore_ascii_case("ffmpeg.exe")
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s)
}

struct CommandParser<'a> {
    tokens: &'a [Token],
    words: Vec<Range<usize>>,
    pos: usize,
    registry: &'a FilterRegistry,
    cmd: ParsedCommand,
    pending: OutputSpec,
    seen_input: bool,
}

impl<'a> CommandParser<'a> {
    fn word(&self, idx: usize) -> &'a [Token] {
        let tokens = self.tokens;
        &tokens[self.words[idx].clone()]
    }

    fn run(&mut self) -> FfgraphResult<ParsedCommand> {
        while self.pos < self.words.len() {
            let word = self.word(self.pos);
            if !is_flag_token(&word[0]) {
                self.pending.path = word_text(word);
                self.cmd.outputs.push(std::mem::take(&mut self.pending));
                self.pos += 1;
                continue;
            }

            let flag = word_text(word)[1..].to_owned();
            self.pos += 1;
            match flag.as_str() {
                "filter_complex" | "lavfi" => self.filter_complex(&flag)?,
                f if is_valueless_flag(f) => self.option(f, String::new()),
                "i" => {
                    let value = self.value(&flag)?;
                    self.cmd.inputs.push(value);
                    self.seen_input = true;
                }
                "map" => {
                    let value = self.value(&flag)?;
                    self.pending.maps.push(strip_brackets(&value).to_owned());
                }
                _ => {
                    let value = self.value(&flag)?;
                    self.option(&flag, value);
                }
            }
        }

        if !self.pending.maps.is_empty() || !self.pending.codec_options.is_empty() {
            let mut pending: Vec<String> = self
                .pending
                .maps
                .iter()
                .map(|m| format!("-map {m}"))
                .collect();
            pending.extend(self.pending.codec_options.keys().map(|k| format!("-{k}")));
            return Err(ParseError::MissingOutputPath {
                pending: pending.join(", "),
            }
            .into());
        }
        Ok(std::mem::take(&mut self.cmd))
    }

    fn option(&mut self, flag: &str, value: String) {
        if is_global_flag(flag) || !self.seen_input {
            self.cmd.global_options.insert(flag.to_owned(), value);
        } else {
            self.pending.codec_options.insert(flag.to_owned(), value);
        }
    }

    fn value(&mut self, flag: &str) -> Result<String, ParseError> {
        let missing = || ParseError::MissingOptionValue {
            flag: flag.to_owned(),
        };
        if self.pos >= self.words.len() {
            return Err(missing());
        }
        let word = self.word(self.pos);
        if is_flag_token(&word[0]) {
            return Err(missing());
        }
        let text = word_text(word);
        self.pos += 1;
        Ok(text)
    }

    fn filter_complex(&mut self, flag: &str) -> FfgraphResult<()> {
        let missing = || ParseError::MissingOptionValue {
            flag: flag.to_owned(),
        };
        if self.pos >= self.words.len() || is_flag_token(&self.word(self.pos)[0]) {
            return Err(missing().into());
        }

        let word = self.word(self.pos);
        if let [quoted] = word
            && quoted.kind == TokenKind::QuotedString
        {
            let base = quoted.span.start + 1;
            let inner = match lex(&quoted.value) {
                Ok(tokens) => tokens,
                Err(LexError::EmptyInput) => return Err(missing().into()),
                Err(e) => return Err(FfgraphError::Lex(e.shifted(base))),
            };
            let chains = GraphParser::new(&inner, self.registry)
                .parse_graph()
                .map_err(|e| e.shifted(base))?;
            self.cmd.chains.extend(chains);
            self.pos += 1;
            return Ok(());
        }

        // Unquoted: the graph runs until a flag that starts a new word at a chain boundary.
        let start = self.words[self.pos].start;
        let mut end = start;
        while self.tokens[end].kind != TokenKind::Eof {
            let t = &self.tokens[end];
            if end > start {
                let prev = &self.tokens[end - 1];
                let continues_param = matches!(
                    prev.kind,
                    TokenKind::Equals | TokenKind::Colon | TokenKind::Comma | TokenKind::LBracket
                );
                if is_flag_token(t) && !prev.touches(t) && !continues_param {
                    break;
                }
            }
            end += 1;
        }

        let mut graph = self.tokens[start..end].to_vec();
        let at = self.tokens[end].span.start;
        graph.push(Token {
            kind: TokenKind::Eof,
            value: String::new(),
            span: Span { start: at, end: at },
        });
        let chains = GraphParser::new(&graph, self.registry).parse_graph()?;
        self.cmd.chains.extend(chains);
        self.pos = self
            .words
            .iter()
            .position(|w| w.start >= end)
            .unwrap_or(self.words.len());
        Ok(())
    }
}

/// Recursive descent over a token slice terminated by `Eof`.
struct GraphParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    registry: &'a FilterRegistry,
}

enum Piece {
    Text(String),
    Quoted(String),
    Equals,
}

impl<'a> GraphParser<'a> {
    fn new(tokens: &'a [Token], registry: &'a FilterRegistry) -> Self {
        Self {
            tokens,
            pos: 0,
            registry,
        }
    }

    fn peek(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn bump(&mut self) -> &'a Token {
        let t = self.peek();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ParseError {
        let t = self.peek();
        ParseError::UnexpectedToken {
            offset: t.span.start,
            found: t.describe(),
        }
    }

    fn parse_graph(&mut self) -> Result<Vec<FilterChain>, ParseError> {
        let mut chains = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.bump();
                    continue;
                }
                _ => {}
            }
            chains.push(self.parse_chain()?);
            if self.peek().kind == TokenKind::Eof {
                break;
            }
            if !self.consume(TokenKind::Semicolon) {
                return Err(self.unexpected());
            }
        }
        Ok(chains)
    }

    fn parse_chain(&mut self) -> Result<FilterChain, ParseError> {
        let mut inputs = Vec::new();
        while self.peek().kind == TokenKind::LBracket {
            inputs.push(Stream::new(self.parse_label()?));
        }

        let mut applications = vec![self.parse_application()?];
        while self.consume(TokenKind::Comma) {
            applications.push(self.parse_application()?);
        }

        let mut output: Option<Stream> = None;
        while self.peek().kind == TokenKind::LBracket {
            let offset = self.peek().span.start;
            let label = self.parse_label()?;
            if let Some(existing) = &output {
                return Err(ParseError::MultipleOutputLabels {
                    existing: existing.label.clone(),
                    label,
                    offset,
                });
            }
            output = Some(Stream::new(label));
        }

        Ok(FilterChain {
            inputs,
            applications,
            output,
        })
    }

    fn parse_label(&mut self) -> Result<String, ParseError> {
        let open = self.bump().span.start;
        let mut label = String::new();
        loop {
            let t = self.bump();
            match t.kind {
                TokenKind::RBracket => break,
                TokenKind::Eof | TokenKind::LBracket => {
                    return Err(ParseError::UnterminatedBracket { offset: open });
                }
                _ => label.push_str(&t.value),
            }
        }
        if label.is_empty() {
            return Err(ParseError::EmptyLabel { offset: open });
        }
        Ok(label)
    }

    fn parse_application(&mut self) -> Result<FilterApplication, ParseError> {
        let t = self.peek();
        if t.kind != TokenKind::Expr || !is_identifier(&t.value) {
            return Err(ParseError::MissingFilterName {
                offset: t.span.start,
                found: t.describe(),
            });
        }
        self.bump();
        let mut app = FilterApplication::new(t.value.clone());
        if self.consume(TokenKind::Equals) {
            self.parse_params(&mut app)?;
        }
        Ok(app)
    }

    fn parse_params(&mut self, app: &mut FilterApplication) -> Result<(), ParseError> {
        let filter = app.name.clone();
        let malformed = |segment: &str, reason: &str| ParseError::MalformedParameter {
            filter: filter.clone(),
            segment: segment.to_owned(),
            reason: reason.to_owned(),
        };

        let mut segments: Vec<Vec<Piece>> = vec![Vec::new()];
        loop {
            let t = self.peek();
            match t.kind {
                TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::Eof => break,
                TokenKind::Colon => segments.push(Vec::new()),
                TokenKind::Equals => push_piece(&mut segments, Piece::Equals),
                TokenKind::QuotedString => {
                    push_piece(&mut segments, Piece::Quoted(t.value.clone()));
                }
                TokenKind::Expr => {
                    for (i, part) in t.value.split(':').enumerate() {
                        if i > 0 {
                            segments.push(Vec::new());
                        }
                        if !part.is_empty() {
                            push_piece(&mut segments, Piece::Text(part.to_owned()));
                        }
                    }
                }
                TokenKind::Number | TokenKind::Path => {
                    push_piece(&mut segments, Piece::Text(t.value.clone()));
                }
            }
            self.bump();
        }

        if segments.len() == 1 && segments[0].is_empty() {
            return Err(malformed("", "empty parameter list after '='"));
        }

        let spec = self.registry.get_spec(&app.name);
        let mut bound = Vec::with_capacity(segments.len());
        // Bare numbers bind to required params only while every earlier segment did too.
        let mut leading = true;
        for (index, pieces) in segments.iter().enumerate() {
            let raw = render_segment(pieces);
            if pieces.is_empty() {
                return Err(malformed(&raw, "empty parameter segment"));
            }

            let (key, value) = match pieces.iter().position(|p| matches!(p, Piece::Equals)) {
                Some(eq) => {
                    let (key_pieces, rest) = pieces.split_at(eq);
                    if key_pieces.iter().any(|p| matches!(p, Piece::Quoted(_))) {
                        return Err(malformed(&raw, "parameter names cannot be quoted"));
                    }
                    let key = join_pieces(key_pieces);
                    if !is_identifier(&key) {
                        return Err(malformed(&raw, "parameter name must be an identifier"));
                    }
                    let value_pieces = &rest[1..];
                    let value = join_pieces(value_pieces);
                    let quoted = value_pieces.iter().any(|p| matches!(p, Piece::Quoted(_)));
                    if value.is_empty() && !quoted {
                        return Err(malformed(&raw, "missing value after '='"));
                    }
                    leading = false;
                    (key, value)
                }
                None => {
                    let value = join_pieces(pieces);
                    let unclaimed = if leading && is_number(&value) {
                        spec.and_then(|s| {
                            s.required_params
                                .iter()
                                .find(|p| !app.params.contains_key(p.as_str()))
                        })
                    } else {
                        None
                    };
                    let key = match unclaimed {
                        Some(param) => param.clone(),
                        None => {
                            leading = false;
                            index.to_string()
                        }
                    };
                    (key, value)
                }
            };

            if app.params.contains_key(&key) {
                return Err(malformed(&raw, &format!("duplicate parameter '{key}'")));
            }
            bound.push(key.clone());
            app.params.insert(key, value);
        }

        tracing::trace!(filter = %app.name, params = ?bound, "parsed parameters");
        Ok(())
    }
}

fn push_piece(segments: &mut [Vec<Piece>], piece: Piece) {
    if let Some(last) = segments.last_mut() {
        last.push(piece);
    }
}

fn join_pieces(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| match p {
            Piece::Text(s) | Piece::Quoted(s) => s.as_str(),
            Piece::Equals => "=",
        })
        .collect()
}

fn render_segment(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| match p {
            Piece::Text(s) => s.clone(),
            Piece::Quoted(s) => format!("\"{s}\""),
            Piece::Equals => "=".to_owned(),
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
