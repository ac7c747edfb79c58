//! Type-directed resolution of parsed literals.
//!
//! Literal text is only interpreted here, against the declared element type:
//! `1` is a valid `byte`, `int`, `long[]` element or `double`, depending on
//! where it appears.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::{AnnotationNode, Literal, Node, Root};
use crate::classpath::AnnotationInterface;
use crate::defaults::LoaderContext;
use crate::error::{ValidationError, ValidationErrorKind};
use crate::types::{ClassRef, ElementType, EnumRef, PRIMITIVE_NAMES};
use crate::value::{AnnotationValue, Value};

/// Resolves literals against the interfaces visible through a loader
/// context. Holds no mutable state; one resolver may serve many threads.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    context: LoaderContext<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(context: LoaderContext<'a>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LoaderContext<'a> {
        &self.context
    }

    /// Resolve a whole literal. Returns `Ok(None)` when the root name is not
    /// an annotation interface, which is how ordinary doc tags look.
    pub fn resolve(&self, root: &Root) -> Result<Option<AnnotationValue>, ValidationError> {
        let Some(interface) = self.context.types().find_annotation(&root.annotation.name) else {
            return Ok(None);
        };
        let defaults = self.defaults(interface, root.annotation.span.start)?;
        self.resolve_annotation(&root.annotation, interface, &defaults)
            .map(Some)
    }

    /// Resolve explicit pairs against `interface` and complete the rest from
    /// `defaults`. Elements with neither are an error.
    pub fn resolve_annotation(
        &self,
        node: &AnnotationNode,
        interface: &AnnotationInterface,
        defaults: &AnnotationValue,
    ) -> Result<AnnotationValue, ValidationError> {
        let mut elements = BTreeMap::new();
        for pair in &node.pairs {
            let Some(element) = interface.element(&pair.name) else {
                return Err(error(
                    interface,
                    pair.span.start,
                    ValidationErrorKind::UnknownElement {
                        element: pair.name.clone(),
                    },
                ));
            };
            if elements.contains_key(&pair.name) {
                return Err(error(
                    interface,
                    pair.span.start,
                    ValidationErrorKind::DuplicateElement {
                        element: pair.name.clone(),
                    },
                ));
            }
            let value = self.resolve_value(&pair.value, &element.ty, interface, &element.name)?;
            elements.insert(pair.name.clone(), value);
        }

        for element in &interface.elements {
            if elements.contains_key(&element.name) {
                continue;
            }
            let Some(value) = defaults.get(&element.name) else {
                return Err(error(
                    interface,
                    node.span.start,
                    ValidationErrorKind::MissingElement {
                        element: element.name.clone(),
                    },
                ));
            };
            elements.insert(element.name.clone(), value.clone());
        }

        Ok(AnnotationValue {
            annotation_type: interface.name.clone(),
            elements,
        })
    }

    /// Coerce one value node to the declared type of `element`.
    pub fn resolve_value(
        &self,
        node: &Node,
        ty: &ElementType,
        interface: &AnnotationInterface,
        element: &str,
    ) -> Result<Value, ValidationError> {
        let coercion = Coercion {
            resolver: self,
            interface,
            element,
        };
        coercion.value(node, ty)
    }

    fn defaults(
        &self,
        interface: &AnnotationInterface,
        offset: usize,
    ) -> Result<Arc<AnnotationValue>, ValidationError> {
        self.context.defaults_for(interface).map_err(|err| {
            error(
                interface,
                offset,
                ValidationErrorKind::DefaultsUnavailable {
                    reason: err.to_string(),
                },
            )
        })
    }
}

fn error(interface: &AnnotationInterface, offset: usize, kind: ValidationErrorKind) -> ValidationError {
    ValidationError {
        annotation: interface.name.clone(),
        kind,
        offset,
    }
}

/// Coercion of the value of one element.
struct Coercion<'r, 'a> {
    resolver: &'r Resolver<'a>,
    interface: &'r AnnotationInterface,
    element: &'r str,
}

impl Coercion<'_, '_> {
    fn value(&self, node: &Node, ty: &ElementType) -> Result<Value, ValidationError> {
        match (ty, node) {
            (ElementType::Array(inner), Node::Array(array)) => array
                .elements
                .iter()
                .map(|child| self.value(child, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (ElementType::Byte, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                let value = self.integer(lit, ty, 8)?;
                Ok(Value::Byte(value as i8))
            }
            (ElementType::Short, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                let value = self.integer(lit, ty, 16)?;
                Ok(Value::Short(value as i16))
            }
            (ElementType::Int, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                let value = self.integer(lit, ty, 32)?;
                Ok(Value::Int(value as i32))
            }
            (ElementType::Long, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                Ok(Value::Long(self.integer(lit, ty, 64)?))
            }
            (ElementType::Float, Node::Float(lit)) => {
                let value = self.float::<f32>(lit, ty, 'f', 'd')?;
                Ok(Value::Float(value))
            }
            (ElementType::Double, Node::Float(lit)) => {
                let value = self.float::<f64>(lit, ty, 'd', 'f')?;
                Ok(Value::Double(value))
            }
            (ElementType::Float, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                Ok(Value::Float(self.integer(lit, &ElementType::Long, 64)? as f32))
            }
            (ElementType::Double, Node::Integer(lit) | Node::Hex(lit) | Node::Oct(lit)) => {
                Ok(Value::Double(self.integer(lit, &ElementType::Long, 64)? as f64))
            }
            (ElementType::Boolean, Node::Boolean(lit)) => {
                Ok(Value::Boolean(lit.text.eq_ignore_ascii_case("true")))
            }
            (ElementType::Char, Node::Char(lit)) => self.char(lit, ty).map(Value::Char),
            (ElementType::String, Node::String(lit)) => self.string(lit, ty).map(Value::String),
            (ElementType::Class, Node::Identifier(lit)) => self.class(lit, ty).map(Value::Class),
            (ElementType::Enum(name), Node::Identifier(lit)) => {
                self.enum_constant(lit, ty, name).map(Value::Enum)
            }
            (ElementType::Annotation(name), Node::Annotation(annotation)) => {
                self.annotation(annotation, name).map(Value::Annotation)
            }
            _ => Err(self.mismatch(node.span().start, ty, node.kind_name())),
        }
    }

    /// Integer literal as a value of `bits` width, sign-extended to `i64`.
    fn integer(&self, lit: &Literal, ty: &ElementType, bits: u32) -> Result<i64, ValidationError> {
        let Some(parsed) = IntegerLiteral::parse(&lit.text) else {
            return Err(self.invalid(lit, ty));
        };
        if parsed.long_suffix && bits != 64 {
            return Err(self.mismatch(lit.span.start, ty, "long"));
        }
        let allow_unsigned = bits >= 32 && parsed.radix != 10;
        parsed
            .fit(bits, allow_unsigned)
            .ok_or_else(|| self.out_of_range(lit, ty))
    }

    fn float<F: FloatLiteral>(
        &self,
        lit: &Literal,
        ty: &ElementType,
        own_suffix: char,
        other_suffix: char,
    ) -> Result<F, ValidationError> {
        let text = lit.text.as_str();
        let mut body = text;
        if let Some(last) = text.chars().last() {
            if last.eq_ignore_ascii_case(&other_suffix) {
                let found = if other_suffix == 'f' { "float" } else { "double" };
                return Err(self.mismatch(lit.span.start, ty, found));
            }
            if last.eq_ignore_ascii_case(&own_suffix) {
                body = &text[..text.len() - 1];
            }
        }
        let value: F = body.parse().map_err(|_| self.invalid(lit, ty))?;
        if value.is_infinite() || (value.is_zero() && has_nonzero_digit(body)) {
            return Err(self.out_of_range(lit, ty));
        }
        Ok(value)
    }

    fn char(&self, lit: &Literal, ty: &ElementType) -> Result<char, ValidationError> {
        let units = unquote(&lit.text)
            .and_then(unescape)
            .ok_or_else(|| self.invalid(lit, ty))?;
        match units.as_slice() {
            [unit] => char::from_u32(u32::from(*unit)).ok_or_else(|| self.invalid(lit, ty)),
            _ => Err(self.invalid(lit, ty)),
        }
    }

    fn string(&self, lit: &Literal, ty: &ElementType) -> Result<String, ValidationError> {
        unquote(&lit.text)
            .and_then(unescape)
            .and_then(|units| String::from_utf16(&units).ok())
            .ok_or_else(|| self.invalid(lit, ty))
    }

    /// `java.lang.String.class`, `int[][].class`, `String` or `a.B[]`.
    fn class(&self, lit: &Literal, ty: &ElementType) -> Result<ClassRef, ValidationError> {
        let mut base = lit.text.strip_suffix(".class").unwrap_or(&lit.text);
        let mut dimensions: u8 = 0;
        while let Some(stripped) = base.strip_suffix("[]") {
            dimensions = dimensions
                .checked_add(1)
                .ok_or_else(|| self.invalid(lit, ty))?;
            base = stripped;
        }
        if base.is_empty() || base.contains(['[', ']']) {
            return Err(self.invalid(lit, ty));
        }

        if PRIMITIVE_NAMES.contains(&base) {
            if base == "void" && dimensions > 0 {
                return Err(self.invalid(lit, ty));
            }
            return Ok(ClassRef::new(base, dimensions));
        }

        let name = self
            .resolver
            .context
            .types()
            .find_class(base)
            .ok_or_else(|| {
                self.with_offset(
                    lit.span.start,
                    ValidationErrorKind::UnknownType {
                        element: self.element.to_string(),
                        name: base.to_string(),
                    },
                )
            })?;
        Ok(ClassRef::new(name, dimensions))
    }

    /// `EnumType.CONSTANT` with the enum's qualified or simple name.
    fn enum_constant(
        &self,
        lit: &Literal,
        ty: &ElementType,
        enum_name: &str,
    ) -> Result<EnumRef, ValidationError> {
        if lit.text.ends_with(".class") {
            return Err(self.mismatch(lit.span.start, ty, "Class"));
        }
        let Some((type_part, constant)) = lit.text.rsplit_once('.') else {
            return Err(self.invalid(lit, ty));
        };
        let Some(enum_type) = self.resolver.context.types().enumeration(enum_name) else {
            return Err(self.with_offset(
                lit.span.start,
                ValidationErrorKind::UnknownType {
                    element: self.element.to_string(),
                    name: enum_name.to_string(),
                },
            ));
        };
        if type_part != enum_type.name && type_part != enum_type.simple_name() {
            return Err(self.mismatch(lit.span.start, ty, type_part));
        }
        if !enum_type.has_constant(constant) {
            return Err(self.with_offset(
                lit.span.start,
                ValidationErrorKind::UnknownEnumConstant {
                    element: self.element.to_string(),
                    enum_type: enum_type.name.clone(),
                    constant: constant.to_string(),
                },
            ));
        }
        Ok(EnumRef::new(enum_type.name.clone(), constant))
    }

    fn annotation(
        &self,
        node: &AnnotationNode,
        declared: &str,
    ) -> Result<AnnotationValue, ValidationError> {
        let resolver = self.resolver;
        let Some(interface) = resolver.context.types().annotation(declared) else {
            return Err(self.with_offset(
                node.span.start,
                ValidationErrorKind::UnknownType {
                    element: self.element.to_string(),
                    name: declared.to_string(),
                },
            ));
        };
        if !interface.is_named(&node.name) {
            return Err(self.with_offset(
                node.span.start,
                ValidationErrorKind::AnnotationMismatch {
                    element: self.element.to_string(),
                    expected: interface.name.clone(),
                    found: node.name.clone(),
                },
            ));
        }
        let defaults = resolver.defaults(interface, node.span.start)?;
        resolver.resolve_annotation(node, interface, &defaults)
    }

    fn with_offset(&self, offset: usize, kind: ValidationErrorKind) -> ValidationError {
        error(self.interface, offset, kind)
    }

    fn mismatch(&self, offset: usize, ty: &ElementType, found: &str) -> ValidationError {
        self.with_offset(
            offset,
            ValidationErrorKind::TypeMismatch {
                element: self.element.to_string(),
                expected: ty.to_string(),
                found: found.to_string(),
            },
        )
    }

    fn invalid(&self, lit: &Literal, ty: &ElementType) -> ValidationError {
        self.with_offset(
            lit.span.start,
            ValidationErrorKind::InvalidLiteral {
                element: self.element.to_string(),
                expected: ty.to_string(),
                literal: lit.text.clone(),
            },
        )
    }

    fn out_of_range(&self, lit: &Literal, ty: &ElementType) -> ValidationError {
        self.with_offset(
            lit.span.start,
            ValidationErrorKind::OutOfRange {
                element: self.element.to_string(),
                expected: ty.to_string(),
                literal: lit.text.clone(),
            },
        )
    }
}

/// Sign, magnitude and radix of an integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IntegerLiteral {
    negative: bool,
    /// Saturates at `u128::MAX` for absurdly long literals.
    magnitude: u128,
    radix: u32,
    long_suffix: bool,
}

impl IntegerLiteral {
    fn parse(text: &str) -> Option<Self> {
        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (long_suffix, rest) = match rest.strip_suffix(['l', 'L']) {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let (radix, digits) = if let Some(hex) = rest
            .strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
        {
            (16, hex)
        } else if rest.len() > 1 && rest.starts_with('0') {
            (8, &rest[1..])
        } else {
            (10, rest)
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        let magnitude = u128::from_str_radix(digits, radix).unwrap_or(u128::MAX);
        Some(Self {
            negative,
            magnitude,
            radix,
            long_suffix,
        })
    }

    /// Value as a `bits`-wide two's complement integer. Decimal literals must
    /// fit the signed range; with `allow_unsigned` the full unsigned range is
    /// accepted and wraps.
    fn fit(self, bits: u32, allow_unsigned: bool) -> Option<i64> {
        let half = 1u128 << (bits - 1);
        let full = 1u128 << bits;
        let signed = if self.magnitude < half || (self.negative && self.magnitude == half) {
            self.magnitude as i128
        } else if allow_unsigned && self.magnitude < full {
            self.magnitude as i128 - full as i128
        } else {
            return None;
        };
        let value = if self.negative { -signed } else { signed };
        let wrapped = if value >= half as i128 {
            value - full as i128
        } else {
            value
        };
        i64::try_from(wrapped).ok()
    }
}

/// Float parsing shared by `float` and `double` elements.
trait FloatLiteral: std::str::FromStr {
    fn is_infinite(&self) -> bool;
    fn is_zero(&self) -> bool;
}

impl FloatLiteral for f32 {
    fn is_infinite(&self) -> bool {
        f32::is_infinite(*self)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl FloatLiteral for f64 {
    fn is_infinite(&self) -> bool {
        f64::is_infinite(*self)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

/// Whether the mantissa of a float literal has a non-zero digit.
fn has_nonzero_digit(text: &str) -> bool {
    let mantissa = text.split(['e', 'E']).next().unwrap_or(text);
    mantissa.chars().any(|c| matches!(c, '1'..='9'))
}

/// Strip matching surrounding quotes.
fn unquote(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    let open = chars.next()?;
    let close = chars.next_back()?;
    if open != close || !matches!(open, '"' | '\'') {
        return None;
    }
    Some(&text[1..text.len() - 1])
}

/// Decode escapes into UTF-16 code units.
fn unescape(text: &str) -> Option<Vec<u16>> {
    let mut units = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }
        let escaped = chars.next()?;
        let unit = match escaped {
            'b' => 0x08,
            't' => 0x09,
            'n' => 0x0a,
            'f' => 0x0c,
            'r' => 0x0d,
            '"' => 0x22,
            '\'' => 0x27,
            '\\' => 0x5c,
            'u' => {
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let mut value = 0u16;
                for _ in 0..4 {
                    let digit = chars.next()?.to_digit(16)?;
                    value = value * 16 + digit as u16;
                }
                value
            }
            '0'..='7' => {
                let max_digits = if escaped <= '3' { 3 } else { 2 };
                let mut value = escaped.to_digit(8)? as u16;
                for _ in 1..max_digits {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit as u16;
                            chars.next();
                        }
                        None => break,
                    }
                }
                value
            }
            _ => return None,
        };
        units.push(unit);
    }
    Some(units)
}
