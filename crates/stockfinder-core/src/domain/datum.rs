use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire marker written in place of a value a provider could not supply.
pub const UNAVAILABLE_MARKER: &str = "N/A";

/// A provider-supplied value or an explicit "unavailable" marker.
///
/// Missing data is never represented as zero: adapters map empty, `"None"`,
/// `"-"` and non-finite values to [`Datum::Unavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Datum<T> {
    Available(T),
    #[default]
    Unavailable,
}

impl<T> Datum<T> {
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub const fn as_ref(&self) -> Datum<&T> {
        match self {
            Self::Available(value) => Datum::Available(value),
            Self::Unavailable => Datum::Unavailable,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Datum<U> {
        match self {
            Self::Available(value) => Datum::Available(f(value)),
            Self::Unavailable => Datum::Unavailable,
        }
    }

    /// Keeps `self` when available, otherwise takes `other`.
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Available(_) => self,
            Self::Unavailable => other,
        }
    }
}

impl Datum<f64> {
    /// Wraps a float, treating NaN and infinities as unavailable.
    pub fn finite(value: f64) -> Self {
        if value.is_finite() {
            Self::Available(value)
        } else {
            Self::Unavailable
        }
    }
}

impl Datum<String> {
    /// Wraps text, treating blank and placeholder strings as unavailable.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || is_placeholder(trimmed) {
            Self::Unavailable
        } else {
            Self::Available(trimmed.to_owned())
        }
    }
}

impl<T> From<Option<T>> for Datum<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Available(value),
            None => Self::Unavailable,
        }
    }
}

/// Placeholder strings providers use for "no value".
pub(crate) fn is_placeholder(value: &str) -> bool {
    matches!(value, "None" | "none" | "null" | "-" | "N/A" | "n/a" | "NaN")
}

impl<T: Serialize> Serialize for Datum<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Available(value) => value.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE_MARKER),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Datum<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Marker(Marker),
            Value(T),
        }

        match Raw::<T>::deserialize(deserializer) {
            Ok(Raw::Marker(_)) => Ok(Self::Unavailable),
            Ok(Raw::Value(value)) => Ok(Self::Available(value)),
            Err(_) => Err(D::Error::custom(format!(
                "expected a value or the \"{UNAVAILABLE_MARKER}\" marker"
            ))),
        }
    }
}

struct Marker;

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value == UNAVAILABLE_MARKER {
            Ok(Self)
        } else {
            Err(D::Error::custom("not the unavailable marker"))
        }
    }
}
