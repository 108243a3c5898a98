//! API datetimes use the literal textual pattern `YYYY-MM-DD HH:MM:SS` and
//! are interpreted as UTC. Storage and comparison also use UTC, so no
//! zone-patching ever happens on either side of the wire.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an API datetime, failing on anything that doesn't match the pattern.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(s, FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Format an instant in the API pattern.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.format(FORMAT).to_string()
}

/// Use with `#[serde(with = "api_datetime")]` on `DateTime<Utc>` fields.
pub mod api_datetime {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse(&s).map_err(|_| {
            D::Error::custom(format!(
                "invalid date '{s}', expected the pattern YYYY-MM-DD HH:MM:SS"
            ))
        })
    }
}

/// As [`api_datetime`], for optional fields. Pair with `#[serde(default)]`.
pub mod api_datetime_option {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_some(&super::format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => super::parse(&s).map(Some).map_err(|_| {
                D::Error::custom(format!(
                    "invalid date '{s}', expected the pattern YYYY-MM-DD HH:MM:SS"
                ))
            }),
            None => Ok(None),
        }
    }
}
