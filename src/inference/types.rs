//! Type tags, shape trees and the unification lattice
//!
//! Every merge in the crate (repeated observations of an endpoint, repeated
//! discoveries of an entity, schema files from separate capture sessions)
//! funnels through [`unify_tag`], [`unify_shape`] and [`merge_shapes_with`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Reserved key holding an XML element's attribute types
pub const PROPERTIES_KEY: &str = "properties";

// Prefix written before reference names that would otherwise read back as a builtin
const REFERENCE_ESCAPE: char = '@';

/// Inferred primitive type of a scalar field
///
/// Variant order is the lattice order: `None < DateTime < Bool < Int < Float < Str < Reference`.
/// Two references compare by their tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    /// No value observed
    #[default]
    None,
    /// `YYYY-MM-DDTHH:MM:SS[.fff][Z]`
    DateTime,
    /// `true` / `false`
    Bool,
    /// Integer that round-trips through a float
    Int,
    /// Floating point number
    Float,
    /// Anything else
    Str,
    /// Relationship placeholder pointing at a child tag of an entity
    Reference(String),
}

impl TypeTag {
    /// Position of this tag in the lattice order
    pub fn order(&self) -> u8 {
        match self {
            TypeTag::None => 0,
            TypeTag::DateTime => 1,
            TypeTag::Bool => 2,
            TypeTag::Int => 3,
            TypeTag::Float => 4,
            TypeTag::Str => 5,
            TypeTag::Reference(_) => 6,
        }
    }

    /// Name used in schema files
    pub fn type_name(&self) -> &str {
        match self {
            TypeTag::None => "none",
            TypeTag::DateTime => "datetime",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Reference(tag) => tag,
        }
    }

    /// Parse a schema-file type name; unknown names are references
    ///
    /// A leading `@` marks a reference explicitly and is stripped once.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "" | "none" => TypeTag::None,
            "datetime" => TypeTag::DateTime,
            "bool" => TypeTag::Bool,
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "str" => TypeTag::Str,
            other => TypeTag::Reference(
                other
                    .strip_prefix(REFERENCE_ESCAPE)
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }

    /// Name written to schema files
    ///
    /// Same as [`TypeTag::type_name`], except that references whose name is a
    /// builtin type name (or starts with `@`) are written as `@<name>`.
    pub fn persisted_name(&self) -> Cow<'_, str> {
        match self {
            TypeTag::Reference(tag)
                if tag.starts_with(REFERENCE_ESCAPE)
                    || !TypeTag::from_type_name(tag).is_reference() =>
            {
                Cow::Owned(format!("{REFERENCE_ESCAPE}{tag}"))
            }
            other => Cow::Borrowed(other.type_name()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypeTag::None)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeTag::Reference(_))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TypeTag::None => serializer.serialize_none(),
            other => serializer.serialize_str(&other.persisted_name()),
        }
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Shape::deserialize(deserializer)? {
            Shape::Scalar(tag) => Ok(tag),
            Shape::Tree(_) => Err(de::Error::custom("expected a type name, found an object")),
        }
    }
}

/// Inferred shape of one field: a scalar type or a nested structure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Scalar(TypeTag),
    Tree(ShapeTree),
}

impl Shape {
    pub fn as_tree(&self) -> Option<&ShapeTree> {
        match self {
            Shape::Tree(tree) => Some(tree),
            Shape::Scalar(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TypeTag> {
        match self {
            Shape::Scalar(tag) => Some(tag),
            Shape::Tree(_) => None,
        }
    }
}

impl From<TypeTag> for Shape {
    fn from(tag: TypeTag) -> Self {
        Shape::Scalar(tag)
    }
}

impl From<ShapeTree> for Shape {
    fn from(tree: ShapeTree) -> Self {
        Shape::Tree(tree)
    }
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Shape::Scalar(tag) => tag.serialize(serializer),
            Shape::Tree(tree) => tree.serialize(serializer),
        }
    }
}

struct ShapeVisitor;

impl<'de> Visitor<'de> for ShapeVisitor {
    type Value = Shape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type name, null or a nested object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Shape, E> {
        Ok(Shape::Scalar(TypeTag::None))
    }

    fn visit_none<E: de::Error>(self) -> Result<Shape, E> {
        Ok(Shape::Scalar(TypeTag::None))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Shape, D::Error> {
        deserializer.deserialize_any(ShapeVisitor)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Shape, E> {
        Ok(Shape::Scalar(TypeTag::from_type_name(value)))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Shape, A::Error> {
        let tree = ShapeTree::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(Shape::Tree(tree))
    }

    // Older schema files write attribute-less elements as `"properties": []`
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Shape, A::Error> {
        if seq.next_element::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::custom("only an empty list may stand in for a shape"));
        }
        Ok(Shape::Tree(ShapeTree::new()))
    }
}

impl<'de> Deserialize<'de> for Shape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ShapeVisitor)
    }
}

/// Inferred structure of a JSON object or XML element
///
/// Keys are kept sorted so that serialized schemas are byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeTree(BTreeMap<String, Shape>);

impl ShapeTree {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, shape: impl Into<Shape>) -> Self {
        self.0.insert(key.into(), shape.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, shape: impl Into<Shape>) -> Option<Shape> {
        self.0.insert(key.into(), shape.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Shape> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Shape> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Shape> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The attribute map of an XML element shape, if present
    pub fn properties(&self) -> Option<&ShapeTree> {
        self.get(PROPERTIES_KEY).and_then(Shape::as_tree)
    }

    /// Insert `shape` under `key`, unifying with any value already there
    pub fn unify_insert(&mut self, key: impl Into<String>, shape: Shape) {
        match self.0.entry(key.into()) {
            btree_map::Entry::Occupied(mut entry) => {
                let merged = unify_shape(entry.get(), &shape, MergeMode::Widen);
                entry.insert(merged);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(shape);
            }
        }
    }

    /// Flattened view of all scalar leaves, keyed by their own field name
    ///
    /// Leaves sharing a name at different depths are unified.
    pub fn leaves(&self) -> ShapeTree {
        let mut result = ShapeTree::new();
        self.collect_leaves(&mut result);
        result
    }

    fn collect_leaves(&self, into: &mut ShapeTree) {
        for (key, shape) in &self.0 {
            match shape {
                Shape::Scalar(_) => into.unify_insert(key.clone(), shape.clone()),
                Shape::Tree(tree) => tree.collect_leaves(into),
            }
        }
    }
}

impl FromIterator<(String, Shape)> for ShapeTree {
    fn from_iter<I: IntoIterator<Item = (String, Shape)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ShapeTree {
    type Item = (String, Shape);
    type IntoIter = btree_map::IntoIter<String, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ShapeTree {
    type Item = (&'a String, &'a Shape);
    type IntoIter = btree_map::Iter<'a, String, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How conflicting values are resolved when two shapes are merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    /// Lattice join: commutative, associative, idempotent
    #[default]
    Widen,
    /// The second operand wins every scalar conflict unless it is `none`
    Override,
}

/// Join two scalar tags
pub fn unify_tag(a: &TypeTag, b: &TypeTag) -> TypeTag {
    if a.is_none() {
        return b.clone();
    }
    if b.is_none() {
        return a.clone();
    }
    if a >= b { a.clone() } else { b.clone() }
}

/// Join two field shapes; a structure always beats a scalar
pub fn unify_shape(a: &Shape, b: &Shape, mode: MergeMode) -> Shape {
    match (a, b) {
        (Shape::Tree(left), Shape::Tree(right)) => {
            Shape::Tree(merge_shapes_with(left, right, mode))
        }
        (_, Shape::Scalar(TypeTag::None)) => a.clone(),
        (_, _) if mode == MergeMode::Override => b.clone(),
        (Shape::Tree(_), Shape::Scalar(_)) => a.clone(),
        (Shape::Scalar(_), Shape::Tree(_)) => b.clone(),
        (Shape::Scalar(left), Shape::Scalar(right)) => Shape::Scalar(unify_tag(left, right)),
    }
}

/// Union of two shape trees, unifying keys present on both sides
pub fn merge_shapes(s1: &ShapeTree, s2: &ShapeTree) -> ShapeTree {
    merge_shapes_with(s1, s2, MergeMode::Widen)
}

/// [`merge_shapes`] with an explicit conflict policy
pub fn merge_shapes_with(s1: &ShapeTree, s2: &ShapeTree, mode: MergeMode) -> ShapeTree {
    let mut merged = s1.0.clone();
    for (key, right) in &s2.0 {
        match merged.entry(key.clone()) {
            btree_map::Entry::Occupied(mut entry) => {
                let unified = unify_shape(entry.get(), right, mode);
                entry.insert(unified);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(right.clone());
            }
        }
    }
    ShapeTree(merged)
}
