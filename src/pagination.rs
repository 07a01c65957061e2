use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_PAGE_LIMIT: i64 = 100;
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Field value carried inside an opaque pagination cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorValue {
    Timestamp(OffsetDateTime),
    Id(Uuid),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Cursor decoding failures are client input errors, surfaced as 400s at the
/// HTTP boundary, never as server faults.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Base64,
    #[error("cursor is not valid utf-8")]
    Utf8,
    #[error("cursor is structurally invalid")]
    Structure,
    #[error("cursor field `{0}` is malformed")]
    Field(String),
}

/// Encode named field values into an opaque cursor token.
///
/// Wire form before base64: `key=prefix:value` pairs joined by `&`, where the
/// prefix records the type (`dt`, `uuid`, `num`, `str`) so decoding restores
/// the exact typed values.
pub fn encode_cursor(fields: &[(&str, CursorValue)]) -> Result<String, CursorError> {
    let mut parts = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let serialized = match value {
            CursorValue::Timestamp(ts) => {
                let formatted = ts
                    .format(&Rfc3339)
                    .map_err(|_| CursorError::Field((*key).to_string()))?;
                format!("dt:{}", formatted)
            }
            CursorValue::Id(id) => format!("uuid:{}", id),
            CursorValue::Int(n) => format!("num:{}", n),
            CursorValue::Float(n) => format!("num:{}", n),
            CursorValue::Text(s) => format!("str:{}", s),
        };
        parts.push(format!("{}={}", key, serialized));
    }

    Ok(URL_SAFE.encode(parts.join("&")))
}

/// Decode a cursor token back into its typed field values. Exact inverse of
/// [`encode_cursor`] for every supported type.
pub fn decode_cursor(raw: &str) -> Result<Vec<(String, CursorValue)>, CursorError> {
    let decoded = URL_SAFE.decode(raw).map_err(|_| CursorError::Base64)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CursorError::Utf8)?;

    let mut fields = Vec::new();
    for part in decoded.split('&') {
        let (key, value) = part.split_once('=').ok_or(CursorError::Structure)?;
        let (prefix, data) = value.split_once(':').ok_or(CursorError::Structure)?;

        let value = match prefix {
            "dt" => CursorValue::Timestamp(
                OffsetDateTime::parse(data, &Rfc3339)
                    .map_err(|_| CursorError::Field(key.to_string()))?,
            ),
            "uuid" => CursorValue::Id(
                Uuid::parse_str(data).map_err(|_| CursorError::Field(key.to_string()))?,
            ),
            "num" => {
                if let Ok(n) = data.parse::<i64>() {
                    CursorValue::Int(n)
                } else {
                    CursorValue::Float(
                        data.parse::<f64>()
                            .map_err(|_| CursorError::Field(key.to_string()))?,
                    )
                }
            }
            "str" => CursorValue::Text(data.to_string()),
            _ => return Err(CursorError::Structure),
        };
        fields.push((key.to_string(), value));
    }

    Ok(fields)
}

/// The (created_at, id) ordering key used by notification listing. Ties on
/// created_at are broken by id, so the pair is strictly decreasing page over
/// page and no row is skipped or duplicated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl PageCursor {
    pub fn encode(&self) -> Result<String, CursorError> {
        encode_cursor(&[
            ("created_at", CursorValue::Timestamp(self.created_at)),
            ("id", CursorValue::Id(self.id)),
        ])
    }

    pub fn decode(raw: &str) -> Result<Self, CursorError> {
        let mut created_at = None;
        let mut id = None;
        for (key, value) in decode_cursor(raw)? {
            match (key.as_str(), value) {
                ("created_at", CursorValue::Timestamp(ts)) => created_at = Some(ts),
                ("id", CursorValue::Id(value)) => id = Some(value),
                _ => return Err(CursorError::Field(key)),
            }
        }

        match (created_at, id) {
            (Some(created_at), Some(id)) => Ok(Self { created_at, id }),
            _ => Err(CursorError::Structure),
        }
    }
}

/// Clamp a caller-requested page size to `1..=MAX_PAGE_LIMIT`.
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn roundtrip_all_field_types() {
        let fields = vec![
            (
                "created_at",
                CursorValue::Timestamp(datetime!(2026-03-01 12:30:45.123456 UTC)),
            ),
            (
                "id",
                CursorValue::Id(Uuid::parse_str("6d9e2c34-5f7a-4b2d-9c1e-8a4f3b2d1c0e").unwrap()),
            ),
            ("score", CursorValue::Int(42)),
            ("ratio", CursorValue::Float(2.5)),
            ("name", CursorValue::Text("window seat".to_string())),
        ];

        let encoded = encode_cursor(&fields).unwrap();
        let decoded = decode_cursor(&encoded).unwrap();

        assert_eq!(decoded.len(), fields.len());
        for ((key, value), (decoded_key, decoded_value)) in fields.iter().zip(decoded.iter()) {
            assert_eq!(key, decoded_key);
            assert_eq!(value, decoded_value);
        }
    }

    #[test]
    fn page_cursor_roundtrip() {
        let cursor = PageCursor {
            created_at: datetime!(2026-01-15 08:00:00 UTC),
            id: Uuid::new_v4(),
        };

        let decoded = PageCursor::decode(&cursor.encode().unwrap()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_cursor("not base64 at all!!!"),
            Err(CursorError::Base64)
        ));
    }

    #[test]
    fn decode_rejects_missing_separator() {
        let raw = URL_SAFE.encode("created_at-dt-2026");
        assert!(matches!(decode_cursor(&raw), Err(CursorError::Structure)));
    }

    #[test]
    fn decode_rejects_unknown_prefix() {
        let raw = URL_SAFE.encode("created_at=blob:abc");
        assert!(matches!(decode_cursor(&raw), Err(CursorError::Structure)));
    }

    #[test]
    fn decode_rejects_malformed_timestamp() {
        let raw = URL_SAFE.encode("created_at=dt:yesterday");
        assert!(matches!(decode_cursor(&raw), Err(CursorError::Field(_))));
    }

    #[test]
    fn page_cursor_rejects_foreign_fields() {
        let raw = encode_cursor(&[("rank", CursorValue::Int(3))]).unwrap();
        assert!(PageCursor::decode(&raw).is_err());
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-10)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_PAGE_LIMIT);
    }
}
