use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::ids::{CollectionId, SegmentId};
use crate::timestamp::Timestamp;

/// Type parameter key carrying a vector field's dimension.
pub const DIM_PARAM: &str = "dim";

/// Field data types understood by the capacity estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    /// Packed bit vector, `dim / 8` bytes per record.
    VectorBinary,
    /// `f32` vector, `dim * 4` bytes per record.
    VectorFloat,
}

impl DataType {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::VectorBinary => "vector_binary",
            Self::VectorFloat => "vector_float",
        }
    }

    /// Whether the type needs a `dim` type parameter.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::VectorBinary | Self::VectorFloat)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            "vector_binary" => Ok(Self::VectorBinary),
            "vector_float" => Ok(Self::VectorFloat),
            other => Err(CoreError::schema(format!("unrecognized data type `{other}`"))),
        }
    }
}

/// Descriptor for a single field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_id: i64,
    pub name: String,
    pub is_primary_key: bool,
    pub data_type: DataType,
    /// Free-form type parameters such as `dim`.
    #[serde(default)]
    pub type_params: BTreeMap<String, String>,
}

impl FieldSchema {
    /// Creates a non-primary field without type parameters.
    #[must_use]
    pub fn new(field_id: i64, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_id,
            name: name.into(),
            is_primary_key: false,
            data_type,
            type_params: BTreeMap::new(),
        }
    }

    /// Adds a type parameter.
    #[must_use]
    pub fn with_type_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.type_params.insert(key.into(), value.into());
        self
    }

    /// Parses the `dim` type parameter of a vector field.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Schema` when the parameter is missing, not an
    /// integer, or zero.
    pub fn dimension(&self) -> CoreResult<u64> {
        let raw = self.type_params.get(DIM_PARAM).ok_or_else(|| {
            CoreError::schema(format!(
                "field `{}` has no `{DIM_PARAM}` type parameter",
                self.name
            ))
        })?;
        match raw.trim().parse::<u64>() {
            Ok(dim) if dim > 0 => Ok(dim),
            _ => Err(CoreError::schema(format!(
                "field `{}` has invalid dimension `{raw}`",
                self.name
            ))),
        }
    }
}

/// Ordered field list of a collection. Immutable once the collection exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Catalog record for a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// Stable collection identifier.
    pub id: CollectionId,
    pub schema: CollectionSchema,
    /// Creation timestamp (hybrid).
    pub create_time: Timestamp,
    /// Segments recorded for the collection, in the order they were sealed.
    #[serde(default)]
    pub segment_ids: Vec<SegmentId>,
    #[serde(default)]
    pub partition_tags: Vec<String>,
}

impl CollectionMeta {
    /// Creates a collection record without partitions or segments.
    #[must_use]
    pub fn new(id: CollectionId, schema: CollectionSchema, create_time: Timestamp) -> Self {
        Self {
            id,
            schema,
            create_time,
            segment_ids: Vec::new(),
            partition_tags: Vec::new(),
        }
    }

    /// Collection name, taken from the schema.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    #[must_use]
    pub fn has_partition(&self, tag: &str) -> bool {
        self.partition_tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_names() {
        for dt in [
            DataType::Bool,
            DataType::Int32,
            DataType::String,
            DataType::VectorFloat,
            DataType::VectorBinary,
        ] {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
        assert!(matches!(
            "vector_half".parse::<DataType>(),
            Err(CoreError::Schema { .. })
        ));
    }

    #[test]
    fn test_dimension_parsing() {
        let field = FieldSchema::new(2, "embedding", DataType::VectorFloat);
        assert!(field.dimension().is_err());

        let field = field.with_type_param(DIM_PARAM, "128");
        assert_eq!(field.dimension().unwrap(), 128);

        let bad = FieldSchema::new(3, "bad", DataType::VectorFloat).with_type_param(DIM_PARAM, "0");
        assert!(bad.dimension().is_err());
    }

    #[test]
    fn test_has_partition() {
        let schema = CollectionSchema::new("docs", vec![]);
        let mut meta = CollectionMeta::new(CollectionId::new(1), schema, 0);
        assert!(!meta.has_partition("p1"));
        meta.partition_tags.push("p1".into());
        assert!(meta.has_partition("p1"));
        assert_eq!(meta.name(), "docs");
    }
}
