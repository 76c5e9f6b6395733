//! Response code families: the pass/fail oracle for a test case
//!
//! A family is an exact code (`"404"`), a coarse class (`"4XX"`), or a union
//! of other families. Families parse from and print to the same string form,
//! with unions joined by `|`.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lowest reserved code for transport failures.
pub const SYNTHETIC_CODE_MIN: u16 = 900;
/// Highest reserved code for transport failures.
pub const SYNTHETIC_CODE_MAX: u16 = 999;

/// Whether `code` is a reserved transport-failure code rather than a real HTTP status.
#[must_use]
pub const fn is_synthetic(code: u16) -> bool {
    code >= SYNTHETIC_CODE_MIN && code <= SYNTHETIC_CODE_MAX
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseCodeFamily {
    /// One exact status code
    Exact(u16),
    /// All codes of one class: `4` matches 400–499
    Class(u8),
    /// Any of the member families
    Union(Vec<ResponseCodeFamily>),
}

impl ResponseCodeFamily {
    /// `2XX`
    #[must_use]
    pub const fn two_xx() -> Self {
        Self::Class(2)
    }

    /// `4XX`
    #[must_use]
    pub const fn four_xx() -> Self {
        Self::Class(4)
    }

    /// `400|422`: the usual answers to a malformed request.
    #[must_use]
    pub fn four_xx_bad_request() -> Self {
        Self::Union(vec![Self::Exact(400), Self::Exact(422)])
    }

    /// `404`
    #[must_use]
    pub const fn not_found() -> Self {
        Self::Exact(404)
    }

    /// `2XX|4XX`: anything but a server failure
    #[must_use]
    pub fn two_xx_or_four_xx() -> Self {
        Self::Union(vec![Self::Class(2), Self::Class(4)])
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    #[must_use]
    pub fn union<I>(families: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut members: Vec<Self> = Vec::new();
        for family in families {
            let flat = match family {
                Self::Union(inner) => inner,
                other => vec![other],
            };
            for member in flat {
                if !members.contains(&member) {
                    members.push(member);
                }
            }
        }
        if members.len() == 1 {
            if let Some(only) = members.pop() {
                return only;
            }
        }
        Self::Union(members)
    }

    /// Whether `code` belongs to this family. Synthetic codes never match.
    #[must_use]
    pub fn matches(&self, code: u16) -> bool {
        if is_synthetic(code) {
            return false;
        }
        match self {
            Self::Exact(c) => *c == code,
            Self::Class(class) => code / 100 == u16::from(*class),
            Self::Union(members) => members.iter().any(|m| m.matches(code)),
        }
    }

    /// Whether a documented response code label (`"404"`, `"4XX"`, `"default"`)
    /// covers `code`.
    #[must_use]
    pub fn label_covers(label: &str, code: u16) -> bool {
        if label.eq_ignore_ascii_case("default") {
            return !is_synthetic(code);
        }
        label
            .parse::<Self>()
            .is_ok_and(|family| family.matches(code))
    }

    /// Flat list of the labels in this family.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Union(members) => members.iter().flat_map(Self::labels).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl std::fmt::Display for ResponseCodeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(code) => write!(f, "{code}"),
            Self::Class(class) => write!(f, "{class}XX"),
            Self::Union(members) => {
                let joined = members
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("|");
                f.write_str(&joined)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid response code family '{0}'")]
pub struct ParseFamilyError(pub String);

impl FromStr for ResponseCodeFamily {
    type Err = ParseFamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(['|', ',']).map(str::trim).collect();
        if parts.len() > 1 {
            let members = parts
                .iter()
                .map(|p| parse_single(p, s))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::union(members));
        }
        parse_single(s.trim(), s)
    }
}

fn parse_single(part: &str, whole: &str) -> Result<ResponseCodeFamily, ParseFamilyError> {
    let err = || ParseFamilyError(whole.to_string());
    let upper = part.to_ascii_uppercase();
    if let Some(class) = upper.strip_suffix("XX") {
        let digit: u8 = class.parse().map_err(|_| err())?;
        if !(1..=5).contains(&digit) {
            return Err(err());
        }
        return Ok(ResponseCodeFamily::Class(digit));
    }
    let code: u16 = upper.parse().map_err(|_| err())?;
    if !(100..=599).contains(&code) {
        return Err(err());
    }
    Ok(ResponseCodeFamily::Exact(code))
}

impl Serialize for ResponseCodeFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResponseCodeFamily {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for ResponseCodeFamily {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "ResponseCodeFamily".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        String::json_schema(generator)
    }
}
