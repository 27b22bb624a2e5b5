//! Schema model
//!
//! Defines the data structures produced by inference and consumed by merging,
//! persistence and code generation.

pub mod api;
pub mod entity;
pub mod flow;

pub use api::{ApiStructure, ServiceEndpoints};
pub use entity::ObjectStructure;
pub use flow::{CaptureHandle, ContentType, FlowDetails};

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the field's default value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
