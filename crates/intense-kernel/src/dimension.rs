//! Dimensions: the ordered keys labelling edges of a context tree.
//!
//! A [`Dimension`] is atomic; a [`CompoundDimension`] is a path of them from
//! some ancestor down to a descendant. Compound dimensions address nodes and
//! are also what participants receive to learn where a change happened.

use crate::error::{IntenseError, Result};
use crate::text;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An atomic, totally ordered key.
///
/// Integers sort before strings. The `quoted` flag only forces quoting in
/// canonical text; it takes no part in equality, order or hashing.
#[derive(Debug, Clone)]
pub enum Dimension {
    Integer(i32),
    String { value: String, quoted: bool },
}

impl Dimension {
    /// A string dimension rendered bare when it is a plain identifier.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
            quoted: false,
        }
    }

    /// A string dimension that always renders quoted.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
            quoted: true,
        }
    }

    pub fn integer(value: i32) -> Self {
        Self::Integer(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String { value, .. } => Some(value),
            Self::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::String { .. } => None,
        }
    }

    /// Whether canonical text must quote this dimension.
    pub fn needs_quotes(&self) -> bool {
        match self {
            Self::Integer(_) => false,
            Self::String { value, quoted } => *quoted || !text::is_bare_identifier(value),
        }
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Dimension {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Dimension {}

impl PartialOrd for Dimension {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dimension {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Integer(_), Self::String { .. }) => Ordering::Less,
            (Self::String { .. }, Self::Integer(_)) => Ordering::Greater,
            (Self::String { value: a, .. }, Self::String { value: b, .. }) => a.cmp(b),
        }
    }
}

impl Hash for Dimension {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Integer(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Self::String { value, .. } => {
                1u8.hash(state);
                value.hash(state);
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::String { value, .. } if self.needs_quotes() => {
                f.write_str(&text::quote(value))
            }
            Self::String { value, .. } => f.write_str(value),
        }
    }
}

impl FromStr for Dimension {
    type Err = IntenseError;

    fn from_str(s: &str) -> Result<Self> {
        text::parse_dimension(s)
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Dimension {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<i32> for Dimension {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An ordered path of dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompoundDimension(Vec<Dimension>);

impl CompoundDimension {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dimension> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Dimension> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Dimension> {
        self.0.last()
    }

    pub fn push(&mut self, dim: Dimension) {
        self.0.push(dim);
    }

    /// Insert `dim` at the front, turning a path relative to a child into a
    /// path relative to its parent.
    pub fn prepend(&mut self, dim: Dimension) {
        self.0.insert(0, dim);
    }

    pub fn join(&self, dim: Dimension) -> Self {
        let mut out = self.clone();
        out.push(dim);
        out
    }

    pub fn concat(&self, other: &CompoundDimension) -> Self {
        let mut out = self.clone();
        out.0.extend(other.0.iter().cloned());
        out
    }

    /// The path with its last element removed, or `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn is_prefix_of(&self, other: &CompoundDimension) -> bool {
        other.0.starts_with(&self.0)
    }

    /// The remainder of `self` after `prefix`, or `None` if `prefix` does not
    /// lead it.
    pub fn strip_prefix(&self, prefix: &CompoundDimension) -> Option<Self> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Self(rest.to_vec()))
    }

    pub fn common_prefix(&self, other: &CompoundDimension) -> Self {
        let shared = self
            .0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Self(self.0[..shared].to_vec())
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl From<Vec<Dimension>> for CompoundDimension {
    fn from(dims: Vec<Dimension>) -> Self {
        Self(dims)
    }
}

impl From<&[Dimension]> for CompoundDimension {
    fn from(dims: &[Dimension]) -> Self {
        Self(dims.to_vec())
    }
}

impl FromIterator<Dimension> for CompoundDimension {
    fn from_iter<I: IntoIterator<Item = Dimension>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CompoundDimension {
    type Item = &'a Dimension;
    type IntoIter = std::slice::Iter<'a, Dimension>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for CompoundDimension {
    type Output = Dimension;

    fn index(&self, index: usize) -> &Dimension {
        &self.0[index]
    }
}

impl fmt::Display for CompoundDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{dim}")?;
        }
        Ok(())
    }
}

impl FromStr for CompoundDimension {
    type Err = IntenseError;

    fn from_str(s: &str) -> Result<Self> {
        text::parse_compound(s)
    }
}

impl Serialize for CompoundDimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompoundDimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_sort_before_strings() {
        let mut dims = vec![
            Dimension::string("b"),
            Dimension::integer(10),
            Dimension::string("a"),
            Dimension::integer(-2),
        ];
        dims.sort();
        let rendered: Vec<String> = dims.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["-2", "10", "a", "b"]);
    }

    #[test]
    fn quote_flag_is_rendering_only() {
        let bare = Dimension::string("temp");
        let quoted = Dimension::quoted("temp");
        assert_eq!(bare, quoted);
        assert_eq!(bare.to_string(), "temp");
        assert_eq!(quoted.to_string(), "\"temp\"");
    }

    #[test]
    fn non_identifiers_are_always_quoted() {
        assert_eq!(Dimension::string("two words").to_string(), "\"two words\"");
        assert_eq!(Dimension::string("9lives").to_string(), "\"9lives\"");
        assert_eq!(Dimension::string("").to_string(), "\"\"");
    }

    #[test]
    fn compound_text_roundtrip() {
        let path: CompoundDimension = "reactor:core:temp".parse().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[2], Dimension::string("temp"));
        assert_eq!(path.to_string(), "reactor:core:temp");

        let mixed: CompoundDimension = "\"a b\":3".parse().unwrap();
        assert_eq!(mixed[1], Dimension::integer(3));
        assert_eq!(mixed.to_string().parse::<CompoundDimension>().unwrap(), mixed);
    }

    #[test]
    fn empty_compound_is_empty_string() {
        let path: CompoundDimension = "".parse().unwrap();
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn prefix_helpers() {
        let long: CompoundDimension = "a:b:c".parse().unwrap();
        let short: CompoundDimension = "a:b".parse().unwrap();
        let other: CompoundDimension = "a:x".parse().unwrap();

        assert!(short.is_prefix_of(&long));
        assert!(!long.is_prefix_of(&short));
        assert_eq!(long.strip_prefix(&short).unwrap().to_string(), "c");
        assert!(long.strip_prefix(&other).is_none());
        assert_eq!(long.common_prefix(&other).to_string(), "a");
        assert_eq!(long.parent().unwrap(), short);
        assert!(CompoundDimension::new().parent().is_none());

        let mut relative: CompoundDimension = "c".parse().unwrap();
        relative.prepend(Dimension::string("b"));
        assert_eq!(relative.to_string(), "b:c");
    }

    #[test]
    fn serde_uses_canonical_text() {
        let path: CompoundDimension = "x:1".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"x:1\"");
        let back: CompoundDimension = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
