//! Windowed listing over the catalog.
//!
//! Slices follow Python's slicing rules: `start:stop[:step]` with empty bounds
//! meaning "unbounded", negative bounds counting from the end, and bounds
//! clamped to the table length. A bare `i` selects exactly entry `i`.

use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

/// A parsed slice expression, independent of any table length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceSpec {
    /// Exactly one entry. Negative values count from the end.
    Single(i64),
    /// A half-open range with an optional positive step.
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
}

impl SliceSpec {
    /// The slice covering the whole table.
    pub const fn all() -> Self {
        Self::Range {
            start: None,
            stop: None,
            step: None,
        }
    }

    /// A `start:stop` range.
    pub const fn range(start: i64, stop: i64) -> Self {
        Self::Range {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    /// Resolve against a table of `len` entries.
    pub fn resolve(&self, len: u64) -> SliceRange {
        let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
        match *self {
            Self::Single(i) => {
                let i = if i < 0 { i + signed_len } else { i };
                if (0..signed_len).contains(&i) {
                    SliceRange::new(i as u64, i as u64 + 1, 1)
                } else {
                    SliceRange::empty()
                }
            }
            Self::Range { start, stop, step } => {
                let clamp = |bound: Option<i64>, default: i64| match bound {
                    None => default,
                    Some(b) if b < 0 => (b + signed_len).max(0),
                    Some(b) => b.min(signed_len),
                };
                let start = clamp(start, 0);
                let stop = clamp(stop, signed_len);
                let step = step.unwrap_or(1).max(1);
                if start >= stop {
                    SliceRange::empty()
                } else {
                    SliceRange::new(start as u64, stop as u64, step as u64)
                }
            }
        }
    }
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self::all()
    }
}

fn parse_bound(part: &str, text: &str) -> Result<Option<i64>, TypeError> {
    let part = part.trim();
    if part.is_empty() {
        return Ok(None);
    }
    part.parse()
        .map(Some)
        .map_err(|_| TypeError::InvalidSlice(format!("bad bound {part:?} in {text:?}")))
}

impl FromStr for SliceSpec {
    type Err = TypeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = text.split(':').collect();
        match parts.as_slice() {
            [single] => parse_bound(single, text)?
                .map(Self::Single)
                .ok_or_else(|| TypeError::InvalidSlice("empty slice".into())),
            [start, stop] => Ok(Self::Range {
                start: parse_bound(start, text)?,
                stop: parse_bound(stop, text)?,
                step: None,
            }),
            [start, stop, step] => {
                let step = parse_bound(step, text)?;
                if matches!(step, Some(s) if s <= 0) {
                    return Err(TypeError::InvalidSlice(format!(
                        "step must be positive in {text:?}"
                    )));
                }
                Ok(Self::Range {
                    start: parse_bound(start, text)?,
                    stop: parse_bound(stop, text)?,
                    step,
                })
            }
            _ => Err(TypeError::InvalidSlice(format!(
                "too many components in {text:?}"
            ))),
        }
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
        match *self {
            Self::Single(i) => write!(f, "{i}"),
            Self::Range { start, stop, step: None } => {
                write!(f, "{}:{}", bound(start), bound(stop))
            }
            Self::Range { start, stop, step } => {
                write!(f, "{}:{}:{}", bound(start), bound(stop), bound(step))
            }
        }
    }
}

/// A slice resolved against a concrete length: concrete indices only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceRange {
    pub start: u64,
    pub stop: u64,
    pub step: u64,
}

impl SliceRange {
    fn new(start: u64, stop: u64, step: u64) -> Self {
        Self { start, stop, step }
    }

    fn empty() -> Self {
        Self::new(0, 0, 1)
    }

    /// Number of indices selected.
    pub fn len(&self) -> u64 {
        if self.start >= self.stop {
            0
        } else {
            (self.stop - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The selected indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = u64> {
        (self.start..self.stop).step_by(self.step as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn indices(spec: &str, len: u64) -> Vec<u64> {
        spec.parse::<SliceSpec>().unwrap().resolve(len).indices().collect()
    }

    #[test]
    fn range_is_half_open() {
        assert_eq!(indices("2:5", 10), vec![2, 3, 4]);
    }

    #[test]
    fn single_selects_one_entry() {
        assert_eq!(indices("3", 10), vec![3]);
        assert_eq!(indices("-1", 10), vec![9]);
        assert!(indices("10", 10).is_empty());
        assert!(indices("-11", 10).is_empty());
    }

    #[test]
    fn empty_bounds_are_unbounded() {
        assert_eq!(indices(":3", 10), vec![0, 1, 2]);
        assert_eq!(indices("7:", 10), vec![7, 8, 9]);
        assert_eq!(indices(":", 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn default_is_everything() {
        let all: Vec<u64> = SliceSpec::default().resolve(5).indices().collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn negative_bounds_count_from_end() {
        assert_eq!(indices("-3:", 10), vec![7, 8, 9]);
        assert_eq!(indices(":-8", 10), vec![0, 1]);
        assert_eq!(indices("-100:2", 10), vec![0, 1]);
    }

    #[test]
    fn bounds_clamp_to_length() {
        assert_eq!(indices("8:100", 10), vec![8, 9]);
        assert!(indices("5:2", 10).is_empty());
        assert!(indices("0:5", 0).is_empty());
    }

    #[test]
    fn step_skips_entries() {
        assert_eq!(indices("::3", 10), vec![0, 3, 6, 9]);
        assert_eq!(indices("1:8:2", 10), vec![1, 3, 5, 7]);
        assert_eq!("1:8:2".parse::<SliceSpec>().unwrap().resolve(10).len(), 4);
    }

    #[test]
    fn invalid_slices_are_rejected() {
        for bad in ["", "a:b", "1:2:0", "1:2:-1", "1:2:3:4", "x"] {
            assert!(
                matches!(bad.parse::<SliceSpec>(), Err(TypeError::InvalidSlice(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for text in ["3", "2:5", ":5", "1::2", "-3:"] {
            let spec: SliceSpec = text.parse().unwrap();
            assert_eq!(spec.to_string().parse::<SliceSpec>().unwrap(), spec);
        }
    }

    proptest! {
        #[test]
        fn resolved_indices_stay_in_bounds(
            start in proptest::option::of(-50i64..50),
            stop in proptest::option::of(-50i64..50),
            step in proptest::option::of(1i64..7),
            len in 0u64..40,
        ) {
            let range = SliceSpec::Range { start, stop, step }.resolve(len);
            let indices: Vec<u64> = range.indices().collect();
            prop_assert_eq!(indices.len() as u64, range.len());
            prop_assert!(indices.iter().all(|&i| i < len));
            prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
