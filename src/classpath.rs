//! Type introspection: annotation interfaces, enums and loadable classes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::defaults::{DefaultsRegistry, LoaderContext, ModuleToken};
use crate::descriptor::{DescriptorType, element_return_type};
use crate::error::SchemaError;
use crate::parser::parse_value;
use crate::resolver::Resolver;
use crate::types::{ElementType, simple_name};

/// Introspection over the types visible to one module.
pub trait TypeLookup: Send + Sync {
    fn annotation(&self, name: &str) -> Option<&AnnotationInterface>;

    fn enumeration(&self, name: &str) -> Option<&EnumType>;

    /// Whether `name` is a loadable class (including enums and annotations).
    fn is_class(&self, name: &str) -> bool;

    /// Resolve an annotation name as written in source.
    fn find_annotation(&self, name: &str) -> Option<&AnnotationInterface> {
        self.annotation(name)
    }

    /// Resolve a class name as written in a class literal to its qualified
    /// name.
    fn find_class(&self, name: &str) -> Option<String> {
        self.is_class(name).then(|| name.to_string())
    }
}

/// Bytecode container read path for element defaults.
pub trait DefaultsSource: Send + Sync {
    /// Encoded default value (see [`codec::encode_value`]) of `element` on
    /// `interface`, if one is declared.
    fn default_value(&self, interface: &str, element: &str) -> Option<Vec<u8>>;
}

/// A declared annotation element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub ty: ElementType,
    pub descriptor: String,
}

/// An annotation interface with its elements in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationInterface {
    pub name: String,
    pub elements: Vec<Element>,
}

impl AnnotationInterface {
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.name == name)
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Whether `name` as written in source refers to this interface.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.simple_name() == name
    }
}

/// An enum type and its constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub constants: Vec<String>,
}

impl EnumType {
    pub fn has_constant(&self, constant: &str) -> bool {
        self.constants.iter().any(|candidate| candidate == constant)
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }
}

/// JSON schema document describing the visible types.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub annotations: Vec<AnnotationDecl>,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationDecl {
    pub name: String,
    #[serde(default)]
    pub elements: Vec<ElementDecl>,
}

/// Element declaration: a method descriptor such as `()[J` and an optional
/// default written in the literal value grammar.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementDecl {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub default: Option<String>,
}

/// In-memory default-value attributes keyed by (interface, element).
#[derive(Clone, Debug, Default)]
pub struct DefaultsTable {
    entries: BTreeMap<(String, String), Vec<u8>>,
}

impl DefaultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, interface: &str, element: &str, bytes: Vec<u8>) {
        self.entries
            .insert((interface.to_string(), element.to_string()), bytes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DefaultsSource for DefaultsTable {
    fn default_value(&self, interface: &str, element: &str) -> Option<Vec<u8>> {
        self.entries
            .get(&(interface.to_string(), element.to_string()))
            .cloned()
    }
}

/// Index of every type a schema declares, with compiled element defaults.
#[derive(Clone, Debug, Default)]
pub struct ClasspathIndex {
    annotations: BTreeMap<String, AnnotationInterface>,
    enums: BTreeMap<String, EnumType>,
    classes: BTreeSet<String>,
    defaults: DefaultsTable,
}

impl ClasspathIndex {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        let schema: SchemaFile =
            serde_path_to_error::deserialize(deserializer).map_err(|err| SchemaError::Json {
                path: err.path().to_string(),
                message: err.inner().to_string(),
            })?;
        Self::from_schema(schema)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let schema: SchemaFile =
            serde_path_to_error::deserialize(value).map_err(|err| SchemaError::Json {
                path: err.path().to_string(),
                message: err.inner().to_string(),
            })?;
        Self::from_schema(schema)
    }

    pub fn from_schema(schema: SchemaFile) -> Result<Self, SchemaError> {
        let mut names = BTreeSet::new();
        let declared = schema
            .annotations
            .iter()
            .map(|decl| decl.name.as_str())
            .chain(schema.enums.iter().map(|decl| decl.name.as_str()))
            .chain(schema.classes.iter().map(String::as_str));
        let mut duplicates = Vec::new();
        for name in declared {
            if !names.insert(name) {
                duplicates.push(name.to_string());
            }
        }
        if let Some(name) = duplicates.into_iter().next() {
            return Err(SchemaError::DuplicateType { name });
        }

        let enums: BTreeMap<String, EnumType> = schema
            .enums
            .into_iter()
            .map(|decl| (decl.name.clone(), decl))
            .collect();
        let annotation_names: BTreeSet<&str> = schema
            .annotations
            .iter()
            .map(|decl| decl.name.as_str())
            .collect();

        let mut annotations = BTreeMap::new();
        let mut default_literals = Vec::new();
        for decl in &schema.annotations {
            let mut elements: Vec<Element> = Vec::new();
            for element in &decl.elements {
                if elements.iter().any(|existing| existing.name == element.name) {
                    return Err(SchemaError::DuplicateElement {
                        interface: decl.name.clone(),
                        element: element.name.clone(),
                    });
                }
                let ty = classify_element(decl, element, &enums, &annotation_names)?;
                if let Some(literal) = &element.default {
                    default_literals.push((decl.name.clone(), element.name.clone(), literal.clone()));
                }
                elements.push(Element {
                    name: element.name.clone(),
                    ty,
                    descriptor: element.descriptor.clone(),
                });
            }
            annotations.insert(
                decl.name.clone(),
                AnnotationInterface {
                    name: decl.name.clone(),
                    elements,
                },
            );
        }

        let mut index = Self {
            annotations,
            enums,
            classes: schema.classes.into_iter().collect(),
            defaults: DefaultsTable::new(),
        };
        let order = index.dependency_order()?;
        index.defaults = index.compile_defaults(&order, default_literals)?;
        debug!(
            annotations = index.annotations.len(),
            enums = index.enums.len(),
            defaults = index.defaults.len(),
            "loaded type schema"
        );
        Ok(index)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &AnnotationInterface> {
        self.annotations.values()
    }

    pub fn defaults(&self) -> &DefaultsTable {
        &self.defaults
    }

    /// Annotation interfaces ordered so that every interface comes after the
    /// interfaces its elements reference. Cycles are rejected.
    fn dependency_order(&self) -> Result<Vec<String>, SchemaError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            index: &ClasspathIndex,
            name: &str,
            marks: &mut BTreeMap<String, Mark>,
            stack: &mut Vec<String>,
            order: &mut Vec<String>,
        ) -> Result<(), SchemaError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    stack.push(name.to_string());
                    return Err(SchemaError::CyclicAnnotation {
                        path: stack.join(" -> "),
                    });
                }
                None => {}
            }
            marks.insert(name.to_string(), Mark::Visiting);
            stack.push(name.to_string());
            if let Some(interface) = index.annotations.get(name) {
                for element in &interface.elements {
                    if let Some(referenced) = element.ty.referenced_annotation() {
                        visit(index, referenced, marks, stack, order)?;
                    }
                }
            }
            stack.pop();
            marks.insert(name.to_string(), Mark::Done);
            order.push(name.to_string());
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut order = Vec::new();
        for name in self.annotations.keys() {
            let mut stack = Vec::new();
            visit(self, name, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    /// Resolve and encode every default literal. Interfaces are processed in
    /// dependency order so nested annotation defaults can already see the
    /// defaults of the interfaces they reference.
    fn compile_defaults(
        &self,
        order: &[String],
        literals: Vec<(String, String, String)>,
    ) -> Result<DefaultsTable, SchemaError> {
        let mut by_interface: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for (interface, element, literal) in literals {
            by_interface
                .entry(interface)
                .or_default()
                .push((element, literal));
        }

        let mut table = DefaultsTable::new();
        for interface_name in order {
            let Some(pending) = by_interface.remove(interface_name) else {
                continue;
            };
            let Some(interface) = self.annotations.get(interface_name) else {
                continue;
            };
            let mut compiled = Vec::new();
            {
                let registry = DefaultsRegistry::new();
                let context = LoaderContext::with_sources(
                    self,
                    &table,
                    &registry,
                    ModuleToken::default(),
                );
                let resolver = Resolver::new(context);
                for (element_name, literal) in pending {
                    let invalid = |reason: String| SchemaError::InvalidDefault {
                        interface: interface_name.clone(),
                        element: element_name.clone(),
                        reason,
                    };
                    let Some(element) = interface.element(&element_name) else {
                        continue;
                    };
                    let node = parse_value(&literal).map_err(|err| invalid(err.to_string()))?;
                    let value = resolver
                        .resolve_value(&node, &element.ty, interface, &element.name)
                        .map_err(|err| invalid(err.to_string()))?;
                    let bytes =
                        codec::encode_value(&value).map_err(|err| invalid(err.to_string()))?;
                    compiled.push((element_name, bytes));
                }
            }
            for (element_name, bytes) in compiled {
                table.insert(interface_name, &element_name, bytes);
            }
        }
        Ok(table)
    }
}

impl TypeLookup for ClasspathIndex {
    fn annotation(&self, name: &str) -> Option<&AnnotationInterface> {
        self.annotations.get(name)
    }

    fn enumeration(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    fn is_class(&self, name: &str) -> bool {
        self.classes.contains(name)
            || self.annotations.contains_key(name)
            || self.enums.contains_key(name)
            || PLATFORM_CLASSES.contains(&name)
    }

    /// Exact loadable name, then a unique simple-name match among declared
    /// types, then `java.lang`.
    fn find_class(&self, name: &str) -> Option<String> {
        if self.is_class(name) {
            return Some(name.to_string());
        }
        if name.contains('.') {
            return None;
        }
        let mut matches = self
            .classes
            .iter()
            .map(String::as_str)
            .chain(self.annotations.keys().map(String::as_str))
            .chain(self.enums.keys().map(String::as_str))
            .filter(|candidate| simple_name(candidate) == name);
        if let Some(first) = matches.next() {
            return matches.next().is_none().then(|| first.to_string());
        }
        let lang = format!("java.lang.{name}");
        PLATFORM_CLASSES.contains(&lang.as_str()).then_some(lang)
    }

    /// Exact qualified name first, then a unique simple-name match.
    fn find_annotation(&self, name: &str) -> Option<&AnnotationInterface> {
        if let Some(interface) = self.annotations.get(name) {
            return Some(interface);
        }
        if name.contains('.') {
            return None;
        }
        let mut matches = self
            .annotations
            .values()
            .filter(|interface| interface.simple_name() == name);
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first)
    }
}

impl DefaultsSource for ClasspathIndex {
    fn default_value(&self, interface: &str, element: &str) -> Option<Vec<u8>> {
        self.defaults.default_value(interface, element)
    }
}

fn classify_element(
    decl: &AnnotationDecl,
    element: &ElementDecl,
    enums: &BTreeMap<String, EnumType>,
    annotations: &BTreeSet<&str>,
) -> Result<ElementType, SchemaError> {
    let descriptor_type =
        element_return_type(&element.descriptor).map_err(|err| SchemaError::InvalidDescriptor {
            interface: decl.name.clone(),
            element: element.name.clone(),
            descriptor: element.descriptor.clone(),
            reason: format!("{err:#}"),
        })?;
    let unsupported = || SchemaError::UnsupportedElementType {
        interface: decl.name.clone(),
        element: element.name.clone(),
        descriptor: element.descriptor.clone(),
    };
    let scalar = |ty: DescriptorType| -> Result<ElementType, SchemaError> {
        match ty {
            DescriptorType::Primitive(primitive) => Ok(primitive),
            DescriptorType::Object(name) if name == "java.lang.String" => Ok(ElementType::String),
            DescriptorType::Object(name) if name == "java.lang.Class" => Ok(ElementType::Class),
            DescriptorType::Object(name) if enums.contains_key(&name) => Ok(ElementType::Enum(name)),
            DescriptorType::Object(name) if annotations.contains(name.as_str()) => {
                Ok(ElementType::Annotation(name))
            }
            _ => Err(unsupported()),
        }
    };
    match descriptor_type {
        DescriptorType::Array(inner) => Ok(ElementType::Array(Box::new(scalar(*inner)?))),
        other => scalar(other),
    }
}

/// JDK classes every module can load without declaring them.
const PLATFORM_CLASSES: &[&str] = &[
    "java.io.Serializable",
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.CharSequence",
    "java.lang.Character",
    "java.lang.Class",
    "java.lang.Comparable",
    "java.lang.Double",
    "java.lang.Enum",
    "java.lang.Error",
    "java.lang.Exception",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Iterable",
    "java.lang.Long",
    "java.lang.Number",
    "java.lang.Object",
    "java.lang.Runnable",
    "java.lang.RuntimeException",
    "java.lang.Short",
    "java.lang.String",
    "java.lang.Thread",
    "java.lang.Throwable",
    "java.lang.Void",
    "java.lang.annotation.Annotation",
    "java.util.Collection",
    "java.util.Date",
    "java.util.List",
    "java.util.Map",
    "java.util.Set",
];
