use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of components in a biometric descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

/// Fixed-length biometric feature embedding.
///
/// Descriptor extraction happens on the capture device; Sentinel only
/// compares descriptors. The length is validated when the descriptor is
/// constructed, so two `Descriptor`s are always comparable and a mismatched
/// vector is rejected at the boundary instead of silently never matching.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Descriptor(Box<[f64; DESCRIPTOR_LEN]>);

impl Descriptor {
    /// The all-zero descriptor.
    pub fn zeros() -> Self {
        Self(Box::new([0.0; DESCRIPTOR_LEN]))
    }

    /// Validate and copy a slice into a descriptor.
    pub fn from_slice(values: &[f64]) -> Result<Self, TypeError> {
        Self::try_from(values.to_vec())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0[..]
    }

    /// Euclidean distance to another descriptor.
    pub fn distance(&self, other: &Descriptor) -> f64 {
        euclidean_distance(self.as_slice(), other.as_slice())
    }
}

impl TryFrom<Vec<f64>> for Descriptor {
    type Error = TypeError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(TypeError::DescriptorLength {
                expected: DESCRIPTOR_LEN,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(TypeError::NonFiniteComponent { index });
        }
        let boxed: Box<[f64; DESCRIPTOR_LEN]> =
            values
                .into_boxed_slice()
                .try_into()
                .map_err(|rest: Box<[f64]>| TypeError::DescriptorLength {
                    expected: DESCRIPTOR_LEN,
                    actual: rest.len(),
                })?;
        Ok(Self(boxed))
    }
}

impl From<Descriptor> for Vec<f64> {
    fn from(d: Descriptor) -> Self {
        d.0.to_vec()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Descriptor([{:.3}, {:.3}, {:.3}, ..; {DESCRIPTOR_LEN}])",
            self.0[0], self.0[1], self.0[2]
        )
    }
}

/// Euclidean distance between two vectors.
///
/// Vectors of different length, or an empty vector, are infinitely far
/// apart and can never be selected as a match.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_first(value: f64) -> Descriptor {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[0] = value;
        Descriptor::try_from(values).unwrap()
    }

    #[test]
    fn zeros_distance_is_zero() {
        let d = Descriptor::zeros();
        assert_eq!(d.distance(&d), 0.0);
    }

    #[test]
    fn single_axis_distance() {
        let a = Descriptor::zeros();
        let b = with_first(0.1);
        assert!((a.distance(&b) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Descriptor::try_from(vec![0.0; 127]).unwrap_err();
        assert_eq!(
            err,
            TypeError::DescriptorLength {
                expected: DESCRIPTOR_LEN,
                actual: 127
            }
        );
        assert!(Descriptor::from_slice(&[]).is_err());
    }

    #[test]
    fn rejects_non_finite() {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[5] = f64::NAN;
        assert_eq!(
            Descriptor::try_from(values).unwrap_err(),
            TypeError::NonFiniteComponent { index: 5 }
        );
    }

    #[test]
    fn mismatched_slices_are_infinitely_far() {
        assert_eq!(euclidean_distance(&[0.0, 1.0], &[0.0]), f64::INFINITY);
        assert_eq!(euclidean_distance(&[], &[]), f64::INFINITY);
    }

    #[test]
    fn serde_uses_plain_array() {
        let d = with_first(0.25);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.starts_with("[0.25,0.0"));
        let parsed: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn serde_rejects_short_array() {
        assert!(serde_json::from_str::<Descriptor>("[0.0, 1.0]").is_err());
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(values in prop::collection::vec(-10.0f64..10.0, DESCRIPTOR_LEN)) {
            let d = Descriptor::try_from(values).unwrap();
            prop_assert_eq!(d.distance(&d), 0.0);
        }

        #[test]
        fn distance_is_symmetric(
            a in prop::collection::vec(-1.0f64..1.0, DESCRIPTOR_LEN),
            b in prop::collection::vec(-1.0f64..1.0, DESCRIPTOR_LEN),
        ) {
            let a = Descriptor::try_from(a).unwrap();
            let b = Descriptor::try_from(b).unwrap();
            prop_assert_eq!(a.distance(&b), b.distance(&a));
        }
    }
}
