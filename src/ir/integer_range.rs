use num_bigint::BigInt;
use num_traits::One;
use serde::{Deserialize, Serialize};

/// A closed interval of integers with arbitrary precision bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds")]
pub struct IntegerRange {
    #[serde(with = "bigint")]
    minimum: BigInt,
    #[serde(with = "bigint")]
    maximum: BigInt,
}

impl IntegerRange {
    /// Returns `None` if `minimum > maximum`.
    pub fn new(minimum: BigInt, maximum: BigInt) -> Option<Self> {
        (minimum <= maximum).then_some(Self { minimum, maximum })
    }

    pub fn from_bounds(minimum: i64, maximum: i64) -> Self {
        debug_assert!(minimum <= maximum, "empty integer range {minimum}..={maximum}");
        Self {
            minimum: minimum.into(),
            maximum: maximum.into(),
        }
    }

    /// The full range of an unsigned 64 bit integer.
    pub fn u64() -> Self {
        Self {
            minimum: BigInt::from(0),
            maximum: u64::MAX.into(),
        }
    }

    pub fn minimum(&self) -> &BigInt {
        &self.minimum
    }

    pub fn maximum(&self) -> &BigInt {
        &self.maximum
    }

    /// True if every integer of `other` is in `self`.
    pub fn contains(&self, other: &IntegerRange) -> bool {
        self.minimum <= other.minimum && other.maximum <= self.maximum
    }

    pub fn contains_integer(&self, value: &BigInt) -> bool {
        &self.minimum <= value && value <= &self.maximum
    }

    /// The smallest range containing both.
    pub fn combine(&self, other: &IntegerRange) -> IntegerRange {
        IntegerRange {
            minimum: (&self.minimum).min(&other.minimum).clone(),
            maximum: (&self.maximum).max(&other.maximum).clone(),
        }
    }

    /// How many integers are in the range.
    pub fn size(&self) -> BigInt {
        &self.maximum - &self.minimum + BigInt::one()
    }
}

/// The serialized form, validated by [`IntegerRange::new`] when read back.
#[derive(Deserialize)]
struct RangeBounds {
    #[serde(with = "bigint")]
    minimum: BigInt,
    #[serde(with = "bigint")]
    maximum: BigInt,
}

impl TryFrom<RangeBounds> for IntegerRange {
    type Error = String;

    fn try_from(bounds: RangeBounds) -> Result<Self, Self::Error> {
        let description = format!("empty integer range {}..={}", bounds.minimum, bounds.maximum);
        IntegerRange::new(bounds.minimum, bounds.maximum).ok_or(description)
    }
}

/// Integers travel as decimal strings so that program files stay readable.
pub(crate) mod bigint {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| D::Error::custom(format!("invalid integer {text:?}")))
    }
}
