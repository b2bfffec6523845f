//! Column codec for [`JsonValue`] payloads.
//!
//! PostgreSQL sends `json` columns as plain JSON text. `jsonb` columns in the binary protocol carry a
//! one-byte format version ahead of the same text; version `1` is the only one the server emits.
//!
//! [`encode`] and [`decode`] are pure byte transforms. With the `postgres` feature enabled,
//! [`JsonValue`] also implements sqlx's `Type`, `Encode` and `Decode` for `jsonb` on top of them, so
//! payloads can be bound and fetched directly.
use crate::error::{Error, Result};
use crate::json::JsonValue;

/// Version byte prefixed to binary `jsonb` values.
pub const JSONB_VERSION: u8 = 1;

/// Wire representation of a JSON column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// Textual JSON, no prefix (`json` columns, or any JSON column in text format).
    Json,
    /// Binary `jsonb`: [`JSONB_VERSION`] followed by JSON text.
    Jsonb,
}

/// Serialize `value` into a column payload.
pub fn encode(value: &JsonValue, format: ColumnFormat) -> Result<Vec<u8>> {
    match format {
        ColumnFormat::Json => value.to_vec(),
        ColumnFormat::Jsonb => {
            let mut buf = vec![JSONB_VERSION];
            serde_json::to_writer(&mut buf, value)?;
            Ok(buf)
        }
    }
}

/// Parse a column payload.
///
/// # Errors
/// [`Error::Decode`] when the payload is empty, the version byte is not [`JSONB_VERSION`], or the
/// remainder is not valid JSON.
pub fn decode(bytes: &[u8], format: ColumnFormat) -> Result<JsonValue> {
    let body = match format {
        ColumnFormat::Json => bytes,
        ColumnFormat::Jsonb => match bytes.split_first() {
            Some((&JSONB_VERSION, rest)) => rest,
            Some((version, _)) => {
                return Err(Error::payload(format!(
                    "unsupported jsonb format version {}",
                    version
                )))
            }
            None => return Err(Error::payload("empty jsonb payload")),
        },
    };

    JsonValue::from_slice(body).map_err(|e| match e {
        Error::Parse { source } => Error::payload(format!("invalid JSON payload: {}", source)),
        other => other,
    })
}

#[cfg(feature = "postgres")]
mod pg {
    use super::{decode, encode, ColumnFormat};
    use crate::json::JsonValue;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::postgres::types::Oid;
    use sqlx::postgres::{
        PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueFormat, PgValueRef, Postgres,
    };
    use sqlx::{TypeInfo, ValueRef};

    const JSON_OID: Oid = Oid(114);
    const JSONB_OID: Oid = Oid(3802);
    const JSONB_ARRAY_OID: Oid = Oid(3807);

    impl sqlx::Type<Postgres> for JsonValue {
        fn type_info() -> PgTypeInfo {
            PgTypeInfo::with_oid(JSONB_OID)
        }

        fn compatible(ty: &PgTypeInfo) -> bool {
            *ty == PgTypeInfo::with_oid(JSONB_OID) || *ty == PgTypeInfo::with_oid(JSON_OID)
        }
    }

    impl PgHasArrayType for JsonValue {
        fn array_type_info() -> PgTypeInfo {
            PgTypeInfo::with_oid(JSONB_ARRAY_OID)
        }
    }

    impl sqlx::Encode<'_, Postgres> for JsonValue {
        fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
            let bytes = encode(self, ColumnFormat::Jsonb)?;
            buf.extend_from_slice(&bytes);
            Ok(IsNull::No)
        }
    }

    impl<'r> sqlx::Decode<'r, Postgres> for JsonValue {
        fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
            let is_jsonb = value.type_info().name().eq_ignore_ascii_case("jsonb");
            let format = match value.format() {
                PgValueFormat::Binary if is_jsonb => ColumnFormat::Jsonb,
                _ => ColumnFormat::Json,
            };
            Ok(decode(value.as_bytes()?, format)?)
        }
    }
}
