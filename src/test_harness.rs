use anyhow::{Context, Result};

use crate::classpath::ClasspathIndex;
use crate::compiler::compile_literal;
use crate::defaults::{DefaultsRegistry, LoaderContext, ModuleToken};
use crate::error::CompileError;
use crate::resolver::Resolver;
use crate::types::{ClassRef, EnumRef};
use crate::value::{AnnotationValue, Value};

/// Types shared by the unit tests.
pub(crate) const FIXTURE_SCHEMA: &str = r##"{
  "annotations": [
    {"name": "test.Simple", "elements": [
      {"name": "val", "descriptor": "()Ljava/lang/String;"},
      {"name": "s", "descriptor": "()Ljava/lang/String;"}
    ]},
    {"name": "test.IntAnno", "elements": [
      {"name": "value", "descriptor": "()I"}
    ]},
    {"name": "test.DefaultInt", "elements": [
      {"name": "value", "descriptor": "()I", "default": "3"}
    ]},
    {"name": "test.Long", "elements": [
      {"name": "v", "descriptor": "()J"},
      {"name": "arr", "descriptor": "()[J"}
    ]},
    {"name": "test.Marker"},
    {"name": "test.Defaults", "elements": [
      {"name": "count", "descriptor": "()I", "default": "3"},
      {"name": "name", "descriptor": "()Ljava/lang/String;", "default": "\"anon\""},
      {"name": "color", "descriptor": "()Ltest/Color;", "default": "test.Color.RED"},
      {"name": "list", "descriptor": "()[I", "default": "{1, 2}"},
      {"name": "inner", "descriptor": "()Ltest/DefaultInt;", "default": "@DefaultInt"},
      {"name": "required", "descriptor": "()Ljava/lang/String;"}
    ]},
    {"name": "test.Everything", "elements": [
      {"name": "b", "descriptor": "()B", "default": "0"},
      {"name": "s", "descriptor": "()S", "default": "0"},
      {"name": "i", "descriptor": "()I", "default": "0"},
      {"name": "l", "descriptor": "()J", "default": "0"},
      {"name": "f", "descriptor": "()F", "default": "0"},
      {"name": "d", "descriptor": "()D", "default": "0"},
      {"name": "z", "descriptor": "()Z", "default": "false"},
      {"name": "c", "descriptor": "()C", "default": "'a'"},
      {"name": "str", "descriptor": "()Ljava/lang/String;", "default": "\"\""},
      {"name": "cls", "descriptor": "()Ljava/lang/Class;", "default": "java.lang.Object.class"},
      {"name": "color", "descriptor": "()Ltest/Color;", "default": "Color.GREEN"},
      {"name": "anno", "descriptor": "()Ltest/Simple;", "default": "@Simple(val=\"v\", s=\"s\")"},
      {"name": "ints", "descriptor": "()[I", "default": "{}"},
      {"name": "strs", "descriptor": "()[Ljava/lang/String;", "default": "{}"},
      {"name": "colors", "descriptor": "()[Ltest/Color;", "default": "{}"},
      {"name": "classes", "descriptor": "()[Ljava/lang/Class;", "default": "{}"},
      {"name": "annos", "descriptor": "()[Ltest/Simple;", "default": "{}"}
    ]}
  ],
  "enums": [
    {"name": "test.Color", "constants": ["RED", "GREEN", "BLUE"]}
  ],
  "classes": ["test.Widget"]
}"##;

pub(crate) fn fixture_index() -> ClasspathIndex {
    ClasspathIndex::from_json(FIXTURE_SCHEMA).expect("fixture schema")
}

fn simple(val: &str, s: &str) -> AnnotationValue {
    AnnotationValue::new("test.Simple")
        .with("val", Value::String(val.to_string()))
        .with("s", Value::String(s.to_string()))
}

/// A `test.Everything` value with every element set away from its default.
pub(crate) fn everything_value() -> AnnotationValue {
    AnnotationValue::new("test.Everything")
        .with("b", Value::Byte(-8))
        .with("s", Value::Short(300))
        .with("i", Value::Int(-70_000))
        .with("l", Value::Long(1 << 40))
        .with("f", Value::Float(1.5))
        .with("d", Value::Double(-2.25))
        .with("z", Value::Boolean(true))
        .with("c", Value::Char('é'))
        .with("str", Value::String("héllo".to_string()))
        .with("cls", Value::Class(ClassRef::new("int", 2)))
        .with("color", Value::Enum(EnumRef::new("test.Color", "BLUE")))
        .with("anno", Value::Annotation(simple("x", "y")))
        .with("ints", Value::Array((1..=3).map(Value::Int).collect()))
        .with("strs", Value::Array(vec![Value::String("a".to_string())]))
        .with(
            "colors",
            Value::Array(vec![
                Value::Enum(EnumRef::new("test.Color", "RED")),
                Value::Enum(EnumRef::new("test.Color", "GREEN")),
            ]),
        )
        .with(
            "classes",
            Value::Array(vec![
                Value::Class(ClassRef::new("java.lang.String", 0)),
                Value::Class(ClassRef::new("test.Widget", 1)),
            ]),
        )
        .with(
            "annos",
            Value::Array(vec![Value::Annotation(simple("a", "b"))]),
        )
}

/// A schema plus its own defaults registry, so tests never share cache
/// entries through the global registry.
pub(crate) struct TestHarness {
    index: ClasspathIndex,
    registry: DefaultsRegistry,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        Self {
            index: fixture_index(),
            registry: DefaultsRegistry::new(),
        }
    }

    pub(crate) fn with_schema(json: &str) -> Result<Self> {
        let index = ClasspathIndex::from_json(json).context("load test schema")?;
        Ok(Self {
            index,
            registry: DefaultsRegistry::new(),
        })
    }

    pub(crate) fn index(&self) -> &ClasspathIndex {
        &self.index
    }

    pub(crate) fn context(&self) -> LoaderContext<'_> {
        LoaderContext::new(&self.index, &self.registry, ModuleToken::default())
    }

    pub(crate) fn resolve(&self, literal: &str) -> Result<Option<AnnotationValue>, CompileError> {
        compile_literal(literal, &Resolver::new(self.context()))
    }
}
