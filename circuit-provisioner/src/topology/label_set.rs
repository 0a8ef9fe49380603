/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Ordered VLAN label sets: disjoint inclusive ranges with deterministic
//! normalization and intersection.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A label value or range string that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LabelParseError(String);

/// A set of allocatable label values, kept as sorted, disjoint,
/// non-adjacent inclusive ranges.
///
/// Construction normalizes the input: ranges are sorted and any
/// overlapping or adjacent ranges are merged, so two sets with the same
/// values always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelSet {
    ranges: Vec<(u16, u16)>,
}

impl LabelSet {
    /// Builds a set from arbitrary inclusive ranges, merging as needed.
    pub fn new(ranges: impl IntoIterator<Item = (u16, u16)>) -> Self {
        let mut sorted: Vec<(u16, u16)> = ranges.into_iter().collect();
        sorted.sort_unstable();

        let mut normalized: Vec<(u16, u16)> = Vec::with_capacity(sorted.len());
        for (lo, hi) in sorted {
            match normalized.last_mut() {
                // merge overlapping or adjacent ranges
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => normalized.push((lo, hi)),
            }
        }

        Self { ranges: normalized }
    }

    /// A set holding exactly one value.
    pub fn single(value: u16) -> Self {
        Self {
            ranges: vec![(value, value)],
        }
    }

    /// Parses comma-separated values and ranges, e.g. `1780-1789,2000`.
    ///
    /// Descending ranges and non-integer tokens are rejected; this is a
    /// load-time error, never deferred to request time.
    pub fn parse(text: &str) -> Result<Self, LabelParseError> {
        let mut ranges = Vec::new();
        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(LabelParseError(format!("empty label token in '{text}'")));
            }
            let (lo, hi) = match token.split_once('-') {
                Some((a, b)) => {
                    let lo = parse_value(a)?;
                    let hi = parse_value(b)?;
                    if lo > hi {
                        return Err(LabelParseError(format!(
                            "label range {token} is in descending order"
                        )));
                    }
                    (lo, hi)
                }
                None => {
                    let v = parse_value(token)?;
                    (v, v)
                }
            };
            ranges.push((lo, hi));
        }
        Ok(Self::new(ranges))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of distinct values in the set.
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|(lo, hi)| (hi - lo) as usize + 1)
            .sum()
    }

    pub fn contains(&self, value: u16) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= value && value <= hi)
    }

    /// Smallest value in the set, if any.
    pub fn lowest(&self) -> Option<u16> {
        self.ranges.first().map(|&(lo, _)| lo)
    }

    /// Removes one value, splitting its range where needed. Removing a
    /// value not in the set is a no-op.
    pub fn remove(&mut self, value: u16) {
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &(lo, hi) in &self.ranges {
            if value < lo || value > hi {
                out.push((lo, hi));
                continue;
            }
            if lo < value {
                out.push((lo, value - 1));
            }
            if value < hi {
                out.push((value + 1, hi));
            }
        }
        self.ranges = out;
    }

    /// Values common to both sets; `None` when the intersection is empty.
    pub fn intersect(&self, other: &LabelSet) -> Option<LabelSet> {
        let mut out = Vec::new();
        for &(a_lo, a_hi) in &self.ranges {
            for &(b_lo, b_hi) in &other.ranges {
                let lo = a_lo.max(b_lo);
                let hi = a_hi.min(b_hi);
                if lo <= hi {
                    out.push((lo, hi));
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(LabelSet::new(out))
        }
    }

    /// Ascending iterator over every value in the set.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ranges.iter().flat_map(|&(lo, hi)| lo..=hi)
    }
}

fn parse_value(token: &str) -> Result<u16, LabelParseError> {
    token
        .trim()
        .parse::<u16>()
        .map_err(|_| LabelParseError(format!("label value '{token}' is not an integer")))
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for LabelSet {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
