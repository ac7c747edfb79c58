//! Recursive-descent parser for annotation literals.
//!
//! ```text
//! root         := '@'? annotation EOF
//! annotation   := Identifier ( '(' argList? ')' )?
//! argList      := keyValuePair (',' keyValuePair)* | value
//! keyValuePair := Identifier '=' value
//! value        := literal | Identifier | array | '@' annotation
//! array        := '{' (value (',' value)*)? '}'
//! ```

use crate::ast::{AnnotationNode, ArrayNode, KeyValuePair, Literal, Node, Root};
use crate::error::ParseError;
use crate::lexer::{Span, Token, TokenKind, tokenize};

/// Maximum nesting of annotations and arrays.
pub const MAX_DEPTH: usize = 256;

/// Parse one annotation literal such as `Simple(val = "foo")`.
pub fn parse(source: &str) -> Result<Root, ParseError> {
    let mut parser = Parser::new(tokenize(source));
    let root = parser.parse_root()?;
    parser.expect_end()?;
    Ok(root)
}

/// Parse a lone element value such as `{1, 2}` or `@Inner(3)`.
pub fn parse_value(source: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::new(tokenize(source));
    let value = parser.parse_value()?;
    parser.expect_end()?;
    Ok(value)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// `tokens` must end with an EOF token, as [`tokenize`] guarantees.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(0, |token| token.span.end);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                span: Span::new(end, end),
            });
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse_root(&mut self) -> Result<Root, ParseError> {
        if self.check(TokenKind::At) {
            self.advance();
        }
        let annotation = self.parse_annotation()?;
        Ok(Root { annotation })
    }

    fn parse_annotation(&mut self) -> Result<AnnotationNode, ParseError> {
        let name_token = self.expect(TokenKind::Identifier, "annotation name")?;
        let start = name_token.span;
        let name = name_token.text;

        if !self.check(TokenKind::LParen) {
            return Ok(AnnotationNode {
                name,
                pairs: Vec::new(),
                span: start,
            });
        }

        let open = self.current().span;
        self.advance();
        self.enter(open)?;
        let pairs = if self.check(TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_arg_list()?
        };
        let close = self.expect_closing(TokenKind::RParen, '(', open)?;
        self.depth -= 1;

        Ok(AnnotationNode {
            name,
            pairs,
            span: start.to(close),
        })
    }

    fn parse_arg_list(&mut self) -> Result<Vec<KeyValuePair>, ParseError> {
        let is_named = self.check(TokenKind::Identifier) && self.peek_kind(1) == TokenKind::Equals;
        if !is_named {
            let value = self.parse_value()?;
            let span = value.span();
            return Ok(vec![KeyValuePair {
                name: "value".to_string(),
                value,
                span,
            }]);
        }

        let mut pairs = vec![self.parse_key_value_pair()?];
        while self.check(TokenKind::Comma) {
            self.advance();
            pairs.push(self.parse_key_value_pair()?);
        }
        Ok(pairs)
    }

    fn parse_key_value_pair(&mut self) -> Result<KeyValuePair, ParseError> {
        let name_token = self.expect(TokenKind::Identifier, "element name")?;
        self.expect(TokenKind::Equals, "`=`")?;
        let value = self.parse_value()?;
        let span = name_token.span.to(value.span());
        Ok(KeyValuePair {
            name: name_token.text,
            value,
            span,
        })
    }

    pub fn parse_value(&mut self) -> Result<Node, ParseError> {
        let token = self.current().clone();
        let literal = || Literal {
            text: token.text.clone(),
            span: token.span,
        };
        let node = match token.kind {
            TokenKind::Identifier => Node::Identifier(literal()),
            TokenKind::Boolean => Node::Boolean(literal()),
            TokenKind::Char => Node::Char(literal()),
            TokenKind::String => Node::String(literal()),
            TokenKind::Integer => Node::Integer(literal()),
            TokenKind::Float => Node::Float(literal()),
            TokenKind::Hex => Node::Hex(literal()),
            TokenKind::Octal => Node::Oct(literal()),
            TokenKind::LBrace => return self.parse_array().map(Node::Array),
            TokenKind::At => {
                self.advance();
                return self.parse_annotation_value(token.span);
            }
            _ => return Err(self.error("value")),
        };
        self.advance();
        Ok(node)
    }

    fn parse_annotation_value(&mut self, at: Span) -> Result<Node, ParseError> {
        self.enter(at)?;
        let mut annotation = self.parse_annotation()?;
        self.depth -= 1;
        annotation.span = at.to(annotation.span);
        Ok(Node::Annotation(annotation))
    }

    fn parse_array(&mut self) -> Result<ArrayNode, ParseError> {
        let open = self.current().span;
        self.advance();
        self.enter(open)?;

        let mut elements = Vec::new();
        if !self.check(TokenKind::RBrace) {
            elements.push(self.parse_value()?);
            while self.check(TokenKind::Comma) {
                self.advance();
                elements.push(self.parse_value()?);
            }
        }
        let close = self.expect_closing(TokenKind::RBrace, '{', open)?;
        self.depth -= 1;

        Ok(ArrayNode {
            elements,
            span: open.to(close),
        })
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        let token = self.current();
        match token.kind {
            TokenKind::Eof => Ok(()),
            TokenKind::Unterminated => Err(self.error("end of input")),
            _ => Err(ParseError::TrailingInput {
                found: token.text.clone(),
                offset: token.span.start,
            }),
        }
    }

    // Helpers

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    fn advance(&mut self) {
        if self.current().kind != TokenKind::Eof {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            let token = self.current().clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.error(expected))
        }
    }

    /// Consume a closing delimiter. Running out of input before it reports
    /// the unbalanced opening delimiter instead.
    fn expect_closing(
        &mut self,
        kind: TokenKind,
        delimiter: char,
        open: Span,
    ) -> Result<Span, ParseError> {
        match self.current().kind {
            found if found == kind => {
                let span = self.current().span;
                self.advance();
                Ok(span)
            }
            TokenKind::Eof => Err(ParseError::Unbalanced {
                delimiter,
                offset: open.start,
            }),
            _ => Err(self.error(&format!("`,` or {}", kind.describe()))),
        }
    }

    fn enter(&mut self, at: Span) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                offset: at.start,
            });
        }
        Ok(())
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        match token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                offset: token.span.start,
            },
            TokenKind::Unterminated => ParseError::Unterminated {
                text: token.text.clone(),
                offset: token.span.start,
            },
            kind => ParseError::UnexpectedToken {
                found: format!("{} `{}`", kind.describe(), token.text),
                expected: expected.to_string(),
                offset: token.span.start,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_names(root: &Root) -> Vec<&str> {
        root.annotation
            .pairs
            .iter()
            .map(|pair| pair.name.as_str())
            .collect()
    }

    #[test]
    fn parses_key_value_pairs() {
        let root = parse(r#"Simple(val="foo", s="bar")"#).expect("parse");
        assert_eq!(root.annotation.name, "Simple");
        assert_eq!(pair_names(&root), vec!["val", "s"]);
        let Node::String(lit) = &root.annotation.pairs[0].value else {
            panic!("expected string");
        };
        assert_eq!(lit.text, "\"foo\"");
    }

    #[test]
    fn single_value_becomes_value_pair() {
        let root = parse("IntAnno(java.lang.String.class)").expect("parse");
        assert_eq!(pair_names(&root), vec!["value"]);
        assert!(matches!(root.annotation.pairs[0].value, Node::Identifier(_)));
    }

    #[test]
    fn bare_and_empty_annotations_have_no_pairs() {
        for source in ["Marker", "@Marker", "Marker()", "  @Marker ( ) "] {
            let root = parse(source).expect(source);
            assert_eq!(root.annotation.name, "Marker");
            assert!(root.annotation.pairs.is_empty(), "{source}");
        }
    }

    #[test]
    fn parses_nested_annotations_and_arrays() {
        let root = parse("OneLevel(@Simple({1,1}))").expect("parse");
        let Node::Annotation(inner) = &root.annotation.pairs[0].value else {
            panic!("expected nested annotation");
        };
        assert_eq!(inner.name, "Simple");
        let Node::Array(array) = &inner.pairs[0].value else {
            panic!("expected array");
        };
        assert_eq!(array.elements.len(), 2);
    }

    #[test]
    fn empty_and_nested_arrays() {
        let root = parse("A(x = {}, y = {{1}, {2, 3}})").expect("parse");
        let Node::Array(empty) = &root.annotation.pairs[0].value else {
            panic!("expected array");
        };
        assert!(empty.elements.is_empty());
        let Node::Array(nested) = &root.annotation.pairs[1].value else {
            panic!("expected array");
        };
        assert_eq!(nested.elements.len(), 2);
    }

    #[test]
    fn spans_cover_source_text() {
        let source = "A(x = @B(1))";
        let root = parse(source).expect("parse");
        assert_eq!(root.annotation.span, Span::new(0, source.len()));
        let value = &root.annotation.pairs[0].value;
        assert_eq!(&source[value.span().start..value.span().end], "@B(1)");
    }

    #[test]
    fn parse_value_accepts_default_literals() {
        assert!(matches!(parse_value("{1, 2}"), Ok(Node::Array(_))));
        assert!(matches!(parse_value("@Inner(3)"), Ok(Node::Annotation(_))));
        assert!(matches!(parse_value("-0x1F"), Ok(Node::Hex(_))));
        assert!(matches!(
            parse_value("1 2"),
            Err(ParseError::TrailingInput { offset: 2, .. })
        ));
    }

    #[test]
    fn rejects_missing_equals() {
        let err = parse("A(x 1)").expect_err("missing `=`");
        assert!(matches!(err, ParseError::UnexpectedToken { offset: 4, .. }));
    }

    #[test]
    fn rejects_stray_commas() {
        assert!(matches!(
            parse("A(x = 1,)"),
            Err(ParseError::UnexpectedToken { offset: 8, .. })
        ));
        assert!(matches!(
            parse("A({1,,2})"),
            Err(ParseError::UnexpectedToken { offset: 5, .. })
        ));
    }

    #[test]
    fn reports_unbalanced_delimiters() {
        assert_eq!(
            parse("A(x = 1"),
            Err(ParseError::Unbalanced {
                delimiter: '(',
                offset: 1
            })
        );
        assert_eq!(
            parse("A(x = {1, 2"),
            Err(ParseError::Unbalanced {
                delimiter: '{',
                offset: 6
            })
        );
    }

    #[test]
    fn reports_unexpected_end_of_input() {
        assert!(matches!(
            parse("A(x = "),
            Err(ParseError::UnexpectedEof { offset: 6, .. })
        ));
        assert!(matches!(parse(""), Err(ParseError::UnexpectedEof { .. })));
    }

    #[test]
    fn reports_unterminated_literals() {
        assert!(matches!(
            parse(r#"A(x = "open)"#),
            Err(ParseError::Unterminated { offset: 6, .. })
        ));
    }

    #[test]
    fn never_drops_trailing_tokens() {
        assert_eq!(
            parse("A(1) B"),
            Err(ParseError::TrailingInput {
                found: "B".to_string(),
                offset: 5
            })
        );
        assert!(matches!(
            parse("A(1))"),
            Err(ParseError::TrailingInput { .. })
        ));
    }

    #[test]
    fn limits_nesting_depth() {
        let deep = format!("A({}{})", "{".repeat(MAX_DEPTH + 1), "}".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse(&deep), Err(ParseError::TooDeep { .. })));
        let shallow = format!("A({}{})", "{".repeat(10), "}".repeat(10));
        assert!(parse(&shallow).is_ok());
    }
}
