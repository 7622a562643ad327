//! SeaQuery `Value` to `may_postgres` parameter conversion.
//!
//! Two passes: the first copies every value into a typed vector, the second
//! borrows from those vectors, so the `&dyn ToSql` slice stays valid for the
//! whole closure call.

use crate::executor::StorageError;
use may_postgres::types::ToSql;
use sea_query::{Value, Values};

/// Convert `values` and run `f` with the bound parameter slice.
///
/// Unsigned values (what SeaQuery emits for `LIMIT`/`OFFSET`) are bound as
/// `i64`, matching the `bigint` PostgreSQL infers for those placeholders.
///
/// # Errors
///
/// Returns `StorageError::QueryError` for value types the Category schema never
/// produces, or for a `u64` that does not fit in `i64`.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, StorageError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, StorageError>,
{
    let mut bools: Vec<bool> = Vec::new();
    let mut ints: Vec<i32> = Vec::new();
    let mut big_ints: Vec<i64> = Vec::new();
    let mut strings: Vec<String> = Vec::new();
    let mut nulls: Vec<Option<i32>> = Vec::new();

    for value in values.iter() {
        match value {
            Value::Bool(Some(b)) => bools.push(*b),
            Value::TinyInt(Some(i)) => ints.push(i32::from(*i)),
            Value::SmallInt(Some(i)) => ints.push(i32::from(*i)),
            Value::Int(Some(i)) => ints.push(*i),
            Value::BigInt(Some(i)) => big_ints.push(*i),
            Value::Unsigned(Some(u)) => big_ints.push(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => {
                let v = i64::try_from(*u).map_err(|_| {
                    StorageError::QueryError(format!(
                        "BigUnsigned value {} exceeds i64::MAX ({}), cannot be safely cast to i64",
                        u,
                        i64::MAX
                    ))
                })?;
                big_ints.push(v);
            }
            Value::String(Some(s)) => strings.push(s.to_string()),
            Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::String(None) => nulls.push(None),
            _ => {
                return Err(StorageError::QueryError(format!(
                    "Unsupported value type in query: {:?}",
                    value
                )));
            }
        }
    }

    let mut bool_idx = 0;
    let mut int_idx = 0;
    let mut big_int_idx = 0;
    let mut string_idx = 0;
    let mut null_idx = 0;

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.0.len());

    for value in values.iter() {
        match value {
            Value::Bool(Some(_)) => {
                params.push(&bools[bool_idx]);
                bool_idx += 1;
            }
            Value::TinyInt(Some(_)) | Value::SmallInt(Some(_)) | Value::Int(Some(_)) => {
                params.push(&ints[int_idx]);
                int_idx += 1;
            }
            Value::BigInt(Some(_)) | Value::Unsigned(Some(_)) | Value::BigUnsigned(Some(_)) => {
                params.push(&big_ints[big_int_idx]);
                big_int_idx += 1;
            }
            Value::String(Some(_)) => {
                params.push(&strings[string_idx]);
                string_idx += 1;
            }
            _ => {
                params.push(&nulls[null_idx]);
                null_idx += 1;
            }
        }
    }

    f(&params)
}
