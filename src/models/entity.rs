//! Named entity types detected in response shapes

use crate::inference::ShapeTree;

/// A reusable entity type and its property shape
///
/// At most one `ObjectStructure` exists per name in a canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStructure {
    pub object_type_name: String,
    pub properties: ShapeTree,
}

impl ObjectStructure {
    pub fn new(object_type_name: impl Into<String>, properties: ShapeTree) -> Self {
        Self {
            object_type_name: object_type_name.into(),
            properties,
        }
    }
}
