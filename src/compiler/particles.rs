//! Occurrence bounds
//!
//! Every definition in a scope carries `minOccurs`/`maxOccurs` bounds.
//! Bounds are summed when the same name is defined twice in one scope and
//! multiplied when a particle's contents are inlined into an enclosing
//! scope.

use crate::error::{ParseError, Result};
use serde::Serialize;
use std::fmt;
use std::ops::{Add, Mul};

/// Occurrence constraints (minOccurs, maxOccurs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Occurs {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences (None = unbounded)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence constraints
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Exactly once (1, 1)
    pub const fn once() -> Self {
        Self::new(1, Some(1))
    }

    /// Optional (0, 1)
    pub const fn optional() -> Self {
        Self::new(0, Some(1))
    }

    /// Zero or more (0, unbounded)
    pub const fn zero_or_more() -> Self {
        Self::new(0, None)
    }

    /// One or more (1, unbounded)
    pub const fn one_or_more() -> Self {
        Self::new(1, None)
    }

    /// Never allowed (0, 0)
    pub const fn prohibited() -> Self {
        Self::new(0, Some(0))
    }

    /// Check if the upper bound is unbounded
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    /// Check if this can occur zero times
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Same bounds with the lower bound dropped to zero
    pub fn optionalized(self) -> Self {
        Self::new(0, self.max)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Summing: one name defined twice in the same scope
impl Add for Occurs {
    type Output = Occurs;

    fn add(self, other: Occurs) -> Occurs {
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_add(other.min), max)
    }
}

/// Multiplying: a definition inlined through a repeated particle
impl Mul for Occurs {
    type Output = Occurs;

    fn mul(self, other: Occurs) -> Occurs {
        let max = match (self.max, other.max) {
            (Some(0), _) | (_, Some(0)) => Some(0),
            (Some(a), Some(b)) => Some(a.saturating_mul(b)),
            _ => None,
        };
        Occurs::new(self.min.saturating_mul(other.min), max)
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            ParseError::new(format!(
                "minOccurs '{}' is not a valid non-negative integer",
                min_str
            ))
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                ParseError::new(format!(
                    "maxOccurs '{}' must be a non-negative integer or 'unbounded'",
                    max_str
                ))
            })?;
            if occurs.min > max {
                return Err(ParseError::new(format!(
                    "maxOccurs {} is less than minOccurs {}",
                    max, occurs.min
                ))
                .into());
            }
            occurs.max = Some(max);
        }
        // Default maxOccurs is 1, but a larger minOccurs raises it
        None if occurs.min > 1 => occurs.max = Some(occurs.min),
        None => {}
    }

    Ok(occurs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_occurs_defaults() {
        assert_eq!(Occurs::default(), Occurs::once());
        assert!(Occurs::optional().is_emptiable());
        assert!(Occurs::zero_or_more().is_unbounded());
        assert!(!Occurs::one_or_more().is_emptiable());
    }

    #[test]
    fn test_sum_of_bounds() {
        assert_eq!(Occurs::optional() + Occurs::once(), Occurs::new(1, Some(2)));
        assert_eq!(Occurs::once() + Occurs::zero_or_more(), Occurs::one_or_more());
    }

    #[test]
    fn test_product_of_bounds() {
        assert_eq!(
            Occurs::once() * Occurs::zero_or_more(),
            Occurs::zero_or_more()
        );
        assert_eq!(
            Occurs::new(2, Some(3)) * Occurs::new(1, Some(4)),
            Occurs::new(2, Some(12))
        );
        assert_eq!(Occurs::zero_or_more() * Occurs::prohibited(), Occurs::prohibited());
    }

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(
            parse_occurs(Some("0"), Some("unbounded")).unwrap(),
            Occurs::zero_or_more()
        );
        assert_eq!(parse_occurs(Some("3"), None).unwrap(), Occurs::new(3, Some(3)));
        assert!(parse_occurs(Some("-1"), None).is_err());
        assert!(parse_occurs(Some("2"), Some("1")).is_err());
        assert!(parse_occurs(None, Some("many")).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Occurs::once().to_string(), "[1..1]");
        assert_eq!(Occurs::zero_or_more().to_string(), "[0..*]");
    }

    fn occurs_strategy() -> impl Strategy<Value = Occurs> {
        (0u32..100, proptest::option::of(0u32..100))
            .prop_map(|(min, extra)| Occurs::new(min, extra.map(|e| min + e)))
    }

    proptest! {
        #[test]
        fn prop_sum_is_commutative(a in occurs_strategy(), b in occurs_strategy()) {
            prop_assert_eq!(a + b, b + a);
        }

        #[test]
        fn prop_sum_keeps_min_below_max(a in occurs_strategy(), b in occurs_strategy()) {
            let sum = a + b;
            if let Some(max) = sum.max {
                prop_assert!(sum.min <= max);
            }
        }

        #[test]
        fn prop_once_is_identity(a in occurs_strategy()) {
            prop_assert_eq!(a * Occurs::once(), a);
        }

        #[test]
        fn prop_product_keeps_min_below_max(a in occurs_strategy(), b in occurs_strategy()) {
            let product = a * b;
            if let Some(max) = product.max {
                prop_assert!(product.min <= max);
            }
        }
    }
}
