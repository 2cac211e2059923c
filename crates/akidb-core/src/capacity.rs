//! Segment capacity estimation from a collection schema.

use crate::collection::{CollectionSchema, DataType, FieldSchema};
use crate::error::{CoreError, CoreResult};

/// Estimated width of a variable-length string value.
pub const STRING_ESTIMATED_BYTES: u64 = 125;

fn field_size(field: &FieldSchema) -> CoreResult<u64> {
    let size = match field.data_type {
        DataType::Bool | DataType::Int8 => 1,
        DataType::Int16 => 2,
        DataType::Int32 | DataType::Float => 4,
        DataType::Int64 | DataType::Double => 8,
        DataType::String => STRING_ESTIMATED_BYTES,
        DataType::VectorBinary => field.dimension()?.div_ceil(8),
        DataType::VectorFloat => field.dimension()?.checked_mul(4).ok_or_else(|| {
            CoreError::schema(format!("field `{}` dimension is too large", field.name))
        })?,
    };
    Ok(size)
}

/// Estimates the number of bytes a single record occupies.
///
/// # Errors
///
/// Returns `CoreError::Schema` if a vector field lacks a usable `dim`
/// parameter, the record size overflows, or the schema has no fields.
pub fn estimate_size_per_record(schema: &CollectionSchema) -> CoreResult<u64> {
    let mut total = 0u64;
    for field in &schema.fields {
        total = total.checked_add(field_size(field)?).ok_or_else(|| {
            CoreError::schema(format!("collection `{}` record size overflows", schema.name))
        })?;
    }
    if total == 0 {
        return Err(CoreError::schema(format!(
            "collection `{}` has no sized fields",
            schema.name
        )));
    }
    Ok(total)
}

/// Maximum number of rows a segment of `max_segment_bytes` can hold.
///
/// # Errors
///
/// Propagates schema errors from [`estimate_size_per_record`].
pub fn row_capacity(schema: &CollectionSchema, max_segment_bytes: u64) -> CoreResult<u64> {
    Ok(max_segment_bytes / estimate_size_per_record(schema)?)
}
