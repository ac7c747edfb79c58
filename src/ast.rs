//! Syntax tree for a single annotation literal.
//!
//! Literal nodes keep their raw text; coercion to typed values happens in
//! [`crate::resolver`]. `Display` renders canonical literal text that parses
//! back to an equal tree (spans aside).

use std::fmt;

use crate::lexer::Span;

/// Parsed annotation literal. Wraps exactly one annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub annotation: AnnotationNode,
}

/// `Name(key = value, ...)`, `Name(value)` or a bare `Name`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationNode {
    pub name: String,
    pub pairs: Vec<KeyValuePair>,
    pub span: Span,
}

/// One `name = value` element assignment. A single positional value is
/// stored as a pair named `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValuePair {
    pub name: String,
    pub value: Node,
    pub span: Span,
}

/// Raw literal text with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub text: String,
    pub span: Span,
}

/// `{a, b, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    pub elements: Vec<Node>,
    pub span: Span,
}

/// Value positions of the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Identifier(Literal),
    Boolean(Literal),
    Char(Literal),
    String(Literal),
    Integer(Literal),
    Float(Literal),
    Hex(Literal),
    Oct(Literal),
    Array(ArrayNode),
    Annotation(AnnotationNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Identifier(lit)
            | Node::Boolean(lit)
            | Node::Char(lit)
            | Node::String(lit)
            | Node::Integer(lit)
            | Node::Float(lit)
            | Node::Hex(lit)
            | Node::Oct(lit) => lit.span,
            Node::Array(array) => array.span,
            Node::Annotation(annotation) => annotation.span,
        }
    }

    /// Direct children: array elements or nested pair values.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Array(array) => array.elements.iter().collect(),
            Node::Annotation(annotation) => annotation.pairs.iter().map(|pair| &pair.value).collect(),
            _ => Vec::new(),
        }
    }

    /// Short kind name used in validation messages (`was [Class]`).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Identifier(lit) if lit.text.ends_with(".class") => "Class",
            Node::Identifier(_) => "identifier",
            Node::Boolean(_) => "boolean",
            Node::Char(_) => "char",
            Node::String(_) => "String",
            Node::Integer(lit) if has_long_suffix(&lit.text) => "long",
            Node::Integer(_) => "int",
            Node::Float(_) => "float",
            Node::Hex(_) => "hex",
            Node::Oct(_) => "octal",
            Node::Array(_) => "array type",
            Node::Annotation(_) => "annotation",
        }
    }
}

fn has_long_suffix(text: &str) -> bool {
    text.ends_with('L') || text.ends_with('l')
}

/// Pre-order traversal over every value node below `root`, with depth
/// (top-level pair values have depth 1).
pub fn walk<'a, F>(root: &'a Root, mut visit: F)
where
    F: FnMut(&'a Node, usize),
{
    fn walk_node<'a, F>(node: &'a Node, depth: usize, visit: &mut F)
    where
        F: FnMut(&'a Node, usize),
    {
        visit(node, depth);
        for child in node.children() {
            walk_node(child, depth + 1, visit);
        }
    }

    for pair in &root.annotation.pairs {
        walk_node(&pair.value, 1, &mut visit);
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.annotation)
    }
}

impl fmt::Display for AnnotationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.pairs.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (index, pair) in self.pairs.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", pair.name, pair.value)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Identifier(lit)
            | Node::Boolean(lit)
            | Node::Char(lit)
            | Node::String(lit)
            | Node::Integer(lit)
            | Node::Float(lit)
            | Node::Hex(lit)
            | Node::Oct(lit) => f.write_str(&lit.text),
            Node::Array(array) => {
                f.write_str("{")?;
                for (index, element) in array.elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("}")
            }
            Node::Annotation(annotation) => write!(f, "@{annotation}"),
        }
    }
}
