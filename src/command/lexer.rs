use crate::foundation::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Equals,
    Number,
    QuotedString,
    Path,
    Expr,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::Colon => "':'",
            Self::Equals => "'='",
            Self::Number => "number",
            Self::QuotedString => "quoted string",
            Self::Path => "path",
            Self::Expr => "expression",
            Self::Eof => "end of input",
        }
    }
}

/// `value` is the literal source text, except for quoted strings where it is the unescaped
/// content between the quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    /// True when no whitespace separates `self` from `next`.
    pub fn touches(&self, next: &Token) -> bool {
        self.span.end == next.span.start
    }

    pub(crate) fn describe(&self) -> String {
        match self.kind {
            TokenKind::Number | TokenKind::Path | TokenKind::Expr | TokenKind::QuotedString => {
                format!("{} '{}'", self.kind.describe(), self.value)
            }
            other => other.describe().to_owned(),
        }
    }
}

pub(crate) fn is_expr_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-' | '*' | '/' | ':')
}

fn is_path_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '<' | '>' | '"' | '|' | '?' | '*' | '[' | ']' | ';' | ',')
}

/// Splits command or filter-graph text into tokens terminated by [`TokenKind::Eof`].
///
/// Recognizers run in a fixed priority order at each offset: single-character punctuation,
/// quoted strings, numbers, drive-letter paths, then the expression catch-all.
pub fn lex(input: &str) -> Result<Vec<Token>, LexError> {
    if input.trim().is_empty() {
        return Err(LexError::EmptyInput);
    }

    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        let single = match c {
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            ':' => Some(TokenKind::Colon),
            '=' => Some(TokenKind::Equals),
            _ => None,
        };
        if let Some(kind) = single {
            i += 1;
            out.push(token(kind, &input[start..i], start, i));
            continue;
        }

        if c == '"' {
            let (value, end) = lex_quoted(input, start)?;
            i = end;
            out.push(Token {
                kind: TokenKind::QuotedString,
                value,
                span: Span { start, end },
            });
            continue;
        }

        if let Some(end) = match_number(bytes, start) {
            i = end;
            out.push(token(TokenKind::Number, &input[start..i], start, i));
            continue;
        }

        if let Some(end) = match_drive_path(input, start) {
            i = end;
            out.push(token(TokenKind::Path, &input[start..i], start, i));
            continue;
        }

        if is_expr_char(c) {
            while i < bytes.len() && is_expr_char(bytes[i] as char) {
                i += 1;
            }
            out.push(token(TokenKind::Expr, &input[start..i], start, i));
            continue;
        }

        let found = input[start..].chars().next().unwrap_or(c);
        return Err(LexError::UnexpectedChar {
            found,
            offset: start,
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        value: String::new(),
        span: Span {
            start: input.len(),
            end: input.len(),
        },
    });

    tracing::trace!(tokens = out.len(), "lexed command text");
    Ok(out)
}

fn token(kind: TokenKind, text: &str, start: usize, end: usize) -> Token {
    Token {
        kind,
        value: text.to_owned(),
        span: Span { start, end },
    }
}

// `\"` and `\\` unescape; any other backslash pair is kept verbatim so Windows paths survive.
fn lex_quoted(input: &str, start: usize) -> Result<(String, usize), LexError> {
    let mut value = String::new();
    let mut chars = input[start + 1..].char_indices();
    while let Some((off, ch)) = chars.next() {
        match ch {
            '"' => return Ok((value, start + 1 + off + 1)),
            '\\' => match chars.next() {
                Some((_, next @ ('"' | '\\'))) => value.push(next),
                Some((_, next)) => {
                    value.push('\\');
                    value.push(next);
                }
                None => break,
            },
            other => value.push(other),
        }
    }
    Err(LexError::UnterminatedString { offset: start })
}

// -?[0-9]+(\.[0-9]*)?
fn match_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    Some(i)
}

// [A-Za-z]:\ followed by path characters.
fn match_drive_path(input: &str, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let drive = *bytes.get(start)?;
    if !drive.is_ascii_alphabetic() || bytes.get(start + 1) != Some(&b':') {
        return None;
    }
    if bytes.get(start + 2) != Some(&b'\\') {
        return None;
    }
    let mut end = start + 3;
    for (off, ch) in input[end..].char_indices() {
        if !is_path_char(ch) {
            return Some(end + off);
        }
    }
    end = input.len();
    Some(end)
}

/// True when the lexer would read all of `text` back as one drive-letter path token.
pub(crate) fn is_drive_path(text: &str) -> bool {
    match_drive_path(text, 0) == Some(text.len())
}

/// True when `text` is a complete numeric literal as the lexer recognizes it.
pub(crate) fn is_number(text: &str) -> bool {
    match_number(text.as_bytes(), 0) == Some(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_simple_chain() {
        use TokenKind::*;
        assert_eq!(
            kinds("[0:v]scale=1280:720[out]"),
            vec![
                LBracket, Number, Colon, Expr, RBracket, Expr, Equals, Number, Colon, Number,
                LBracket, Expr, RBracket, Eof
            ]
        );
    }

    #[test]
    fn expressions_swallow_colons_and_arithmetic() {
        let toks = lex("scale=iw/2:ih/2").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Expr);
        assert_eq!(toks[2].value, "iw/2:ih/2");
    }

    #[test]
    fn numbers_keep_their_literal_text() {
        let toks = lex("-1.50 7.").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[0].value, "-1.50");
        assert_eq!(toks[1].value, "7.");
    }

    #[test]
    fn flags_lex_as_expressions() {
        let toks = lex("-c:v libx264").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Expr);
        assert_eq!(toks[0].value, "-c:v");
        assert!(!toks[0].touches(&toks[1]));
    }

    #[test]
    fn quoted_strings_unescape_quotes_and_backslashes_only() {
        let toks = lex(r#""say \"hi\" C:\dir \\x""#).unwrap();
        assert_eq!(toks[0].kind, TokenKind::QuotedString);
        assert_eq!(toks[0].value, r#"say "hi" C:\dir \x"#);
        assert_eq!(toks[0].span.start, 0);
        assert_eq!(toks[1].kind, TokenKind::Eof);
    }

    #[test]
    fn drive_paths_are_single_tokens() {
        let toks = lex(r"-i D:\media\in put.mp4").unwrap();
        assert_eq!(toks[1].kind, TokenKind::Path);
        assert_eq!(toks[1].value, r"D:\media\in");
        assert!(is_drive_path(r"C:\a\b.mp4"));
        assert!(!is_drive_path("C:/a/b.mp4"));
    }

    #[test]
    fn whitespace_is_discarded() {
        assert_eq!(kinds("  a \t ;\n b "), vec![
            TokenKind::Expr,
            TokenKind::Semicolon,
            TokenKind::Expr,
            TokenKind::Eof
        ]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(lex(""), Err(LexError::EmptyInput));
        assert_eq!(lex("   \n"), Err(LexError::EmptyInput));
    }

    #[test]
    fn unknown_character_reports_char_and_offset() {
        assert_eq!(
            lex("format=yuv420p|nv12"),
            Err(LexError::UnexpectedChar {
                found: '|',
                offset: 14
            })
        );
        assert_eq!(
            lex("a é"),
            Err(LexError::UnexpectedChar {
                found: 'é',
                offset: 2
            })
        );
    }

    #[test]
    fn unterminated_string_points_at_opening_quote() {
        assert_eq!(
            lex(r#"-i "abc"#),
            Err(LexError::UnterminatedString { offset: 3 })
        );
    }

    #[test]
    fn numeric_literal_check() {
        assert!(is_number("1280"));
        assert!(is_number("-0.5"));
        assert!(!is_number("1280x720"));
        assert!(!is_number("iw"));
        assert!(!is_number(""));
    }
}
