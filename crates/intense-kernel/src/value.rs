//! Base values: the scalar payload a context node may carry.
//!
//! The kind set is closed. `Alpha` is the universal bottom (it refines to
//! everything) and `Omega` the universal top (everything refines to it). The
//! flat kinds refine only to themselves and to `Omega`.

use crate::error::{IntenseError, Result};
use crate::text;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Kind tag, numbered as on the wire (0 is reserved for "no value").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Alpha = 1,
    Omega = 2,
    Number = 3,
    String = 4,
    Binary = 5,
    Bound = 6,
}

impl ValueKind {
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::Alpha),
            2 => Some(Self::Omega),
            3 => Some(Self::Number),
            4 => Some(Self::String),
            5 => Some(Self::Binary),
            6 => Some(Self::Bound),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alpha => "alpha",
            Self::Omega => "omega",
            Self::Number => "number",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Bound => "bound",
        };
        f.write_str(name)
    }
}

/// Packs host objects into bytes for `Bound` values and back.
pub trait Binder: Send + Sync {
    fn pack(&self, object: &(dyn Any + Send + Sync)) -> Option<Vec<u8>>;
    fn unpack(&self, bytes: &[u8]) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// An externally packed payload, optionally resolved to a host object.
///
/// Identity is the packed bytes; the resolved object is a convenience view.
#[derive(Clone)]
pub struct BoundValue {
    packed: Vec<u8>,
    object: Option<Arc<dyn Any + Send + Sync>>,
}

impl BoundValue {
    /// Pack `object` with `binder`.
    pub fn pack(object: Arc<dyn Any + Send + Sync>, binder: &dyn Binder) -> Result<Self> {
        let packed = binder
            .pack(object.as_ref())
            .ok_or_else(|| IntenseError::structural("binder could not pack bound object"))?;
        Ok(Self {
            packed,
            object: Some(object),
        })
    }

    /// Wrap packed bytes, resolving them if a binder is supplied and accepts
    /// them. Without a binder the bytes stay unresolved.
    pub fn from_packed(packed: Vec<u8>, binder: Option<&dyn Binder>) -> Self {
        let object = binder.and_then(|b| b.unpack(&packed));
        Self { packed, object }
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn is_resolved(&self) -> bool {
        self.object.is_some()
    }

    pub fn object(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.object.as_ref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.as_deref()?.downcast_ref::<T>()
    }

    /// Resolve unresolved bytes after the fact. Returns whether an object is
    /// now available.
    pub fn resolve(&mut self, binder: &dyn Binder) -> bool {
        if self.object.is_none() {
            self.object = binder.unpack(&self.packed);
        }
        self.object.is_some()
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundValue")
            .field("packed", &hex::encode(&self.packed))
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// The scalar payload of a context node.
#[derive(Debug, Clone)]
pub enum BaseValue {
    Alpha,
    Omega,
    Number(f64),
    String(String),
    Binary(Vec<u8>),
    Bound(BoundValue),
}

impl BaseValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Alpha => ValueKind::Alpha,
            Self::Omega => ValueKind::Omega,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Binary(_) => ValueKind::Binary,
            Self::Bound(_) => ValueKind::Bound,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            Self::Bound(b) => Some(b.packed()),
            _ => None,
        }
    }

    /// The partial "is at least as defined as" order on values.
    pub fn refines_to(&self, other: &BaseValue) -> bool {
        matches!(self, Self::Alpha) || matches!(other, Self::Omega) || self == other
    }

    pub fn less_than(&self, other: &BaseValue) -> bool {
        self.cmp(other) == Ordering::Less
    }

    /// Replace the payload in place. Only legal between values of the same
    /// kind.
    pub fn assign(&mut self, other: &BaseValue) -> Result<()> {
        if self.kind() != other.kind() {
            return Err(IntenseError::structural(format!(
                "cannot assign {} value to {} value",
                other.kind(),
                self.kind()
            )));
        }
        *self = other.clone();
        Ok(())
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

fn cmp_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

impl PartialEq for BaseValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BaseValue {}

impl PartialOrd for BaseValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BaseValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Alpha, Self::Alpha) | (Self::Omega, Self::Omega) => Ordering::Equal,
            (Self::Number(a), Self::Number(b)) => cmp_numbers(*a, *b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            (Self::Bound(a), Self::Bound(b)) => a.packed.cmp(&b.packed),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

impl fmt::Display for BaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => f.write_str("~"),
            Self::Omega => f.write_str("^"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(&text::quote(s)),
            Self::Binary(b) => write!(f, "#{}", hex::encode(b)),
            Self::Bound(b) => write!(f, "@{}", hex::encode(&b.packed)),
        }
    }
}

impl From<f64> for BaseValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for BaseValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for BaseValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for BaseValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Utf8Binder;

    impl Binder for Utf8Binder {
        fn pack(&self, object: &(dyn Any + Send + Sync)) -> Option<Vec<u8>> {
            object.downcast_ref::<String>().map(|s| s.as_bytes().to_vec())
        }

        fn unpack(&self, bytes: &[u8]) -> Option<Arc<dyn Any + Send + Sync>> {
            let s = String::from_utf8(bytes.to_vec()).ok()?;
            Some(Arc::new(s))
        }
    }

    #[test]
    fn alpha_and_omega_bound_everything() {
        let values = [
            BaseValue::Alpha,
            BaseValue::Omega,
            BaseValue::Number(1.5),
            BaseValue::string("x"),
            BaseValue::Binary(vec![1, 2]),
        ];
        for v in &values {
            assert!(BaseValue::Alpha.refines_to(v));
            assert!(v.refines_to(&BaseValue::Omega));
            assert!(v.refines_to(v));
        }
        assert!(!BaseValue::Omega.refines_to(&BaseValue::Alpha));
    }

    #[test]
    fn flat_kinds_refine_only_to_equal() {
        assert!(!BaseValue::Number(1.0).refines_to(&BaseValue::Number(2.0)));
        assert!(!BaseValue::string("1").refines_to(&BaseValue::Number(1.0)));
    }

    #[test]
    fn cross_kind_order_follows_tags() {
        assert!(BaseValue::Alpha.less_than(&BaseValue::Omega));
        assert!(BaseValue::Omega.less_than(&BaseValue::Number(-1e9)));
        assert!(BaseValue::Number(1e9).less_than(&BaseValue::string("")));
        assert!(BaseValue::string("zzz").less_than(&BaseValue::Binary(vec![])));
    }

    #[test]
    fn nan_is_equal_to_itself_and_greatest() {
        let nan = BaseValue::Number(f64::NAN);
        assert_eq!(nan, BaseValue::Number(f64::NAN));
        assert!(BaseValue::Number(f64::INFINITY).less_than(&nan));
    }

    #[test]
    fn canonical_text() {
        assert_eq!(BaseValue::Number(50.0).to_string(), "50");
        assert_eq!(BaseValue::Number(-0.25).to_string(), "-0.25");
        assert_eq!(BaseValue::string("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
        assert_eq!(BaseValue::Binary(vec![0x0a, 0xff]).to_string(), "#0aff");
        assert_eq!(BaseValue::Alpha.to_string(), "~");
        assert_eq!(BaseValue::Omega.to_string(), "^");
    }

    #[test]
    fn assign_requires_same_kind() {
        let mut v = BaseValue::Number(1.0);
        v.assign(&BaseValue::Number(2.0)).unwrap();
        assert_eq!(v, BaseValue::Number(2.0));
        let err = v.assign(&BaseValue::string("x")).unwrap_err();
        assert!(matches!(err, IntenseError::Structural(_)));
    }

    #[test]
    fn bound_values_pack_and_resolve() {
        let object: Arc<dyn Any + Send + Sync> = Arc::new(String::from("payload"));
        let bound = BoundValue::pack(object, &Utf8Binder).unwrap();
        assert_eq!(bound.packed(), b"payload");
        assert_eq!(bound.downcast_ref::<String>().unwrap(), "payload");

        let mut raw = BoundValue::from_packed(b"payload".to_vec(), None);
        assert!(!raw.is_resolved());
        assert_eq!(BaseValue::Bound(raw.clone()), BaseValue::Bound(bound));
        assert!(raw.resolve(&Utf8Binder));
        assert_eq!(raw.downcast_ref::<String>().unwrap(), "payload");
    }

    #[test]
    fn unpackable_objects_are_rejected() {
        let object: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
        assert!(BoundValue::pack(object, &Utf8Binder).is_err());
    }
}
