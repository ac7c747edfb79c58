//! Tokenizer for annotation literals.
//!
//! The lexer never fails. Literal tokens keep their raw text (quotes, radix
//! prefixes and suffixes included) because the meaning of `1` depends on the
//! declared element type, which is only known during resolution.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    Hex,
    Octal,
    String,
    Char,
    Boolean,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Bang,
    Equals,
    At,
    /// A string or char literal missing its closing quote.
    Unterminated,
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parse errors.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::Hex => "hex literal",
            TokenKind::Octal => "octal literal",
            TokenKind::String => "string literal",
            TokenKind::Char => "char literal",
            TokenKind::Boolean => "boolean literal",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::Comma => "`,`",
            TokenKind::Dot => "`.`",
            TokenKind::Colon => "`:`",
            TokenKind::Bang => "`!`",
            TokenKind::Equals => "`=`",
            TokenKind::At => "`@`",
            TokenKind::Unterminated => "unterminated literal",
            TokenKind::Eof => "end of input",
        }
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Integer
                | TokenKind::Float
                | TokenKind::Hex
                | TokenKind::Octal
                | TokenKind::String
                | TokenKind::Char
                | TokenKind::Boolean
        )
    }
}

/// Byte range of a token or node within the literal text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A token with its raw text and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Eof {
            f.write_str("end of input")
        } else {
            f.write_str(&self.text)
        }
    }
}

/// Tokenize an annotation literal. The returned vector always ends with an
/// [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// Single-pass scanner over the literal text.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '!' => self.single(TokenKind::Bang),
                '=' => self.single(TokenKind::Equals),
                '@' => self.single(TokenKind::At),
                '"' => self.scan_quoted('"', TokenKind::String),
                '\'' => self.scan_quoted('\'', TokenKind::Char),
                '.' => {
                    if self.peek_next_char().is_some_and(|c| c.is_ascii_digit()) {
                        self.scan_number()
                    } else {
                        self.single(TokenKind::Dot)
                    }
                }
                '-' => {
                    let next = self.peek_next_char();
                    if next.is_some_and(|c| c.is_ascii_digit() || c == '.') {
                        self.scan_number()
                    } else {
                        self.scan_identifier()
                    }
                }
                c if c.is_ascii_digit() => self.scan_number(),
                _ => self.scan_identifier(),
            },
        };

        Token {
            kind,
            text: self.source[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Identifier runs swallow dots, array brackets and any character that is
    /// neither whitespace nor punctuation; the parser and resolver decide
    /// whether the run is meaningful.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_identifier_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
            TokenKind::Boolean
        } else {
            TokenKind::Identifier
        }
    }

    fn scan_quoted(&mut self, quote: char, kind: TokenKind) -> TokenKind {
        self.advance(); // opening quote
        loop {
            match self.advance() {
                None => return TokenKind::Unterminated,
                Some('\\') => {
                    // Keep the escape raw; it is decoded during resolution.
                    if self.advance().is_none() {
                        return TokenKind::Unterminated;
                    }
                }
                Some(c) if c == quote => return kind,
                Some(_) => {}
            }
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        if self.peek_char() == Some('-') {
            self.advance();
        }

        let digits_start = self.pos;
        if self.peek_char() == Some('0') && matches!(self.peek_next_char(), Some('x' | 'X')) {
            self.advance();
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            if matches!(self.peek_char(), Some('l' | 'L')) {
                self.advance();
            }
            self.absorb_trailing_identifier_chars();
            return TokenKind::Hex;
        }

        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && self.dot_continues_number() {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let next = self.peek_next_char();
            if next.is_some_and(|n| n.is_ascii_digit() || n == '+' || n == '-') {
                is_float = true;
                self.advance();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.advance();
                }
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let mut is_long = false;
        match self.peek_char() {
            Some('f' | 'F' | 'd' | 'D') => {
                is_float = true;
                self.advance();
            }
            Some('l' | 'L') if !is_float => {
                is_long = true;
                self.advance();
            }
            _ => {}
        }
        self.absorb_trailing_identifier_chars();

        if is_float {
            return TokenKind::Float;
        }
        let digits = &self.source[digits_start..self.pos];
        let digits = if is_long {
            &digits[..digits.len() - 1]
        } else {
            digits
        };
        if digits.len() > 1 && digits.starts_with('0') {
            TokenKind::Octal
        } else {
            TokenKind::Integer
        }
    }

    /// `12abc` stays one token so the resolver can reject it as a whole.
    fn absorb_trailing_identifier_chars(&mut self) {
        while let Some(c) = self.peek_char() {
            if is_identifier_char(c) && c != '.' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// A `.` belongs to the number unless a name follows it. Suffix and
    /// exponent letters (`1.f`, `1.d`, `1.e5`) still count as the number.
    fn dot_continues_number(&self) -> bool {
        let mut rest = self.source[self.pos..].chars().skip(1);
        match (rest.next(), rest.next()) {
            (None, _) => true,
            (Some('f' | 'F' | 'd' | 'D'), after) => {
                after.is_none_or(|a| !is_identifier_start(a) && !a.is_ascii_digit())
            }
            (Some('e' | 'E'), Some(after)) => {
                after.is_ascii_digit() || after == '+' || after == '-'
            }
            (Some(next), _) => !is_identifier_start(next),
        }
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (index, c) = self.chars.next()?;
        self.pos = index + c.len_utf8();
        Some(c)
    }
}

fn is_identifier_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '{' | '}' | ',' | ':' | '!' | '=' | '@' | '"' | '\'')
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|token| token.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .into_iter()
            .filter(|token| token.kind != TokenKind::Eof)
            .map(|token| token.text)
            .collect()
    }

    #[test]
    fn tokenizes_key_value_literal() {
        assert_eq!(
            kinds(r#"Simple(val="foo", s="bar")"#),
            vec![
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dotted_names_are_single_identifiers() {
        assert_eq!(
            texts("IntAnno(java.lang.String.class)"),
            vec!["IntAnno", "(", "java.lang.String.class", ")"]
        );
        assert_eq!(texts("int[][].class"), vec!["int[][].class"]);
    }

    #[test]
    fn numeric_literal_kinds() {
        assert_eq!(kinds("12")[0], TokenKind::Integer);
        assert_eq!(kinds("12L")[0], TokenKind::Integer);
        assert_eq!(kinds("-12")[0], TokenKind::Integer);
        assert_eq!(kinds("0")[0], TokenKind::Integer);
        assert_eq!(kinds("0L")[0], TokenKind::Integer);
        assert_eq!(kinds("017")[0], TokenKind::Octal);
        assert_eq!(kinds("0x1F")[0], TokenKind::Hex);
        assert_eq!(kinds("0XffL")[0], TokenKind::Hex);
        assert_eq!(kinds("1.5")[0], TokenKind::Float);
        assert_eq!(kinds(".5")[0], TokenKind::Float);
        assert_eq!(kinds("1e10")[0], TokenKind::Float);
        assert_eq!(kinds("2f")[0], TokenKind::Float);
        assert_eq!(kinds("2.5D")[0], TokenKind::Float);
    }

    #[test]
    fn trailing_dot_takes_suffix_and_exponent() {
        assert_eq!(texts("1.f"), vec!["1.f"]);
        assert_eq!(texts("1.D"), vec!["1.D"]);
        assert_eq!(texts("1.e5"), vec!["1.e5"]);
        assert_eq!(texts("{1.,2.e-3}"), vec!["{", "1.", ",", "2.e-3", "}"]);
        assert_eq!(kinds("1.f")[0], TokenKind::Float);
        assert_eq!(kinds("1.e5")[0], TokenKind::Float);
    }

    #[test]
    fn literal_text_keeps_suffix_and_prefix() {
        assert_eq!(texts("{1L,2L,3L,4l}"), vec!["{", "1L", ",", "2L", ",", "3L", ",", "4l", "}"]);
        assert_eq!(texts("0x10"), vec!["0x10"]);
    }

    #[test]
    fn booleans_are_case_insensitive() {
        assert_eq!(kinds("true")[0], TokenKind::Boolean);
        assert_eq!(kinds("FALSE")[0], TokenKind::Boolean);
        assert_eq!(kinds("truthy")[0], TokenKind::Identifier);
    }

    #[test]
    fn quoted_literals_keep_escapes() {
        let tokens = tokenize(r#""a\"b" '\n'"#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, r#""a\"b""#);
        assert_eq!(tokens[1].kind, TokenKind::Char);
        assert_eq!(tokens[1].text, r"'\n'");
    }

    #[test]
    fn unterminated_string_is_flagged() {
        let tokens = tokenize(r#"A(x="abc"#);
        assert_eq!(tokens[4].kind, TokenKind::Unterminated);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
    }

    #[test]
    fn offsets_cover_source() {
        let tokens = tokenize("  A ( 1 )");
        assert_eq!(tokens[0].span, Span::new(2, 3));
        assert_eq!(tokens[2].span, Span::new(6, 7));
        assert_eq!(tokens.last().expect("eof").span, Span::new(9, 9));
    }

    #[test]
    fn stray_characters_are_bundled_into_identifiers() {
        assert_eq!(texts("a#b ; c"), vec!["a#b", ";", "c"]);
        assert_eq!(kinds("12abc")[0], TokenKind::Integer);
        assert_eq!(texts("12abc"), vec!["12abc"]);
    }

    #[test]
    fn punctuation_set() {
        assert_eq!(
            kinds("(){},.:!=@"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Colon,
                TokenKind::Bang,
                TokenKind::Equals,
                TokenKind::At,
                TokenKind::Eof,
            ]
        );
    }
}
