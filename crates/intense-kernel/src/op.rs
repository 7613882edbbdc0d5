//! Context operations: structured deltas over contexts.
//!
//! An op node may set a base, clear the base (`clear_base`), and reset
//! dimensions (`clear_dims`), then recurses over its listed children. Applying
//! an op under a `clear_dims` ancestor is *forced*: every node below deletes
//! the dimensions it does not list, whether or not it carries the flag
//! itself. Ops compose so that applying `compose(a, b)` equals applying `a`
//! then `b`.
//!
//! # Canonical form
//!
//! ```text
//! [---+5+d:[1]]     clear base, clear dims, set base 5, set d's base to 1
//! [--+d:[1]]        keep the base, replace the dims with {d}
//! <d:<1>>          short form of a node carrying both flags
//! ```
//!
//! Stored children are normalized against the effective flag of their parent:
//! under a clearing region a child that only re-clears (`[---]`, vanilla) is
//! redundant, elsewhere a child that does nothing (`[]`) is. Both are pruned.

use crate::context::Context;
use crate::dimension::{CompoundDimension, Dimension};
use crate::error::{IntenseError, Result};
use crate::text;
use crate::value::BaseValue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, OnceLock};

static CLEAR_OP: LazyLock<ContextOp> = LazyLock::new(ContextOp::clear_all);

/// The shared `[---]` op.
pub fn clear_op() -> &'static ContextOp {
    &CLEAR_OP
}

#[derive(Clone, Default)]
pub struct ContextOp {
    base: Option<BaseValue>,
    dims: BTreeMap<Dimension, ContextOp>,
    clear_base: bool,
    clear_dims: bool,
    basecount: u64,
    blankcount: u64,
    canonical: OnceLock<String>,
    short: OnceLock<String>,
}

impl ContextOp {
    /// The no-op `[]`.
    pub fn new() -> Self {
        Self::default()
    }

    /// `[---]`: delete everything at and below the node it is applied to.
    pub fn clear_all() -> Self {
        Self {
            clear_base: true,
            clear_dims: true,
            blankcount: 2,
            ..Self::default()
        }
    }

    /// The op that makes any context identical to `ctx`.
    pub fn vset(ctx: &Context) -> Self {
        let dims = ctx
            .children()
            .map(|(dim, child)| (dim.clone(), Self::vset(child)))
            .collect();
        Self::from_parts(ctx.base().cloned(), true, true, dims)
    }

    /// Assemble a node from parts. Counts are summed from the children as
    /// given; nothing is pruned, so the finished root must be normalized.
    pub(crate) fn from_parts(
        base: Option<BaseValue>,
        clear_base: bool,
        clear_dims: bool,
        dims: BTreeMap<Dimension, ContextOp>,
    ) -> Self {
        let basecount = u64::from(base.is_some()) + dims.values().map(|c| c.basecount).sum::<u64>();
        let blankcount = u64::from(clear_base)
            + u64::from(clear_dims)
            + dims.values().map(|c| c.blankcount).sum::<u64>();
        Self {
            base,
            dims,
            clear_base,
            clear_dims,
            basecount,
            blankcount,
            ..Self::default()
        }
    }

    pub fn with_base(mut self, value: impl Into<BaseValue>) -> Self {
        self.set_base(value);
        self
    }

    pub fn with_clear_base(mut self) -> Self {
        self.set_clear_base_flag(&CompoundDimension::new());
        self
    }

    pub fn with_clear_dims(mut self) -> Self {
        self.set_clear_dims_flag(&CompoundDimension::new());
        self
    }

    /// Builder: attach `child` under `dim`, replacing any previous child.
    pub fn with_dim(mut self, dim: impl Into<Dimension>, child: ContextOp) -> Self {
        let dim = dim.into();
        let clear = self.clear_dims;
        self.with_child(&dim, clear, clear, |slot| {
            *slot = child;
            slot.normalize(clear);
        });
        self
    }

    pub fn base(&self) -> Option<&BaseValue> {
        self.base.as_ref()
    }

    pub fn basecount(&self) -> u64 {
        self.basecount
    }

    /// Number of set flags in the subtree.
    pub fn blankcount(&self) -> u64 {
        self.blankcount
    }

    pub fn clear_base(&self) -> bool {
        self.clear_base
    }

    pub fn clear_dims(&self) -> bool {
        self.clear_dims
    }

    /// No flags, no base, no children: `[]`.
    pub fn is_noop(&self) -> bool {
        !self.clear_base && !self.clear_dims && self.base.is_none() && self.dims.is_empty()
    }

    /// Both flags, no base, no children: `[---]`.
    pub fn is_vanilla(&self) -> bool {
        self.clear_base && self.clear_dims && self.base.is_none() && self.dims.is_empty()
    }

    pub fn child(&self, dim: &Dimension) -> Option<&ContextOp> {
        self.dims.get(dim)
    }

    pub fn get(&self, path: &CompoundDimension) -> Option<&ContextOp> {
        let mut node = self;
        for dim in path {
            node = node.child(dim)?;
        }
        Some(node)
    }

    pub fn children(&self) -> btree_map::Iter<'_, Dimension, ContextOp> {
        self.dims.iter()
    }

    pub fn dim_count(&self) -> usize {
        self.dims.len()
    }

    pub fn set_base(&mut self, value: impl Into<BaseValue>) -> &mut Self {
        if self.base.replace(value.into()).is_none() {
            self.basecount += 1;
        }
        self.invalidate();
        self
    }

    pub fn set_base_at(&mut self, path: &CompoundDimension, value: impl Into<BaseValue>) -> &mut Self {
        let value = value.into();
        self.edit_at(path.dims(), false, |node, _| {
            node.set_base(value);
        });
        self
    }

    pub fn set_clear_base_flag(&mut self, path: &CompoundDimension) -> &mut Self {
        self.edit_at(path.dims(), false, |node, _| {
            if !node.clear_base {
                node.clear_base = true;
                node.blankcount += 1;
            }
        });
        self
    }

    pub fn reset_clear_base_flag(&mut self, path: &CompoundDimension) -> &mut Self {
        self.edit_at(path.dims(), false, |node, _| {
            if node.clear_base {
                node.clear_base = false;
                node.blankcount -= 1;
            }
        });
        self
    }

    pub fn set_clear_dims_flag(&mut self, path: &CompoundDimension) -> &mut Self {
        self.edit_at(path.dims(), false, |node, forced| {
            if !node.clear_dims {
                node.clear_dims = true;
                node.normalize(forced);
            }
        });
        self
    }

    pub fn reset_clear_dims_flag(&mut self, path: &CompoundDimension) -> &mut Self {
        self.edit_at(path.dims(), false, |node, forced| {
            if node.clear_dims {
                node.clear_dims = false;
                node.normalize(forced);
            }
        });
        self
    }

    /// Replace this op with a deep copy of `other`.
    pub fn assign(&mut self, other: &ContextOp) -> &mut Self {
        *self = other.clone();
        self
    }

    /// Reset to the no-op.
    pub fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    /// Fold `op` into this one so that the result behaves like applying
    /// `self` and then `op`.
    pub fn apply(&mut self, op: &ContextOp) -> &mut Self {
        self.compose_into(op, false, false);
        self
    }

    pub fn apply_at(&mut self, path: &CompoundDimension, op: &ContextOp) -> &mut Self {
        self.edit_at(path.dims(), false, |node, forced| {
            node.compose_into(op, forced, false);
        });
        self
    }

    /// `first` then `second`, as a single op.
    pub fn compose(first: &ContextOp, second: &ContextOp) -> ContextOp {
        let mut out = first.clone();
        out.apply(second);
        out
    }

    /// Full canonical text: `[` marker, base, `dim:child` joined by `+`, `]`.
    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| {
            let mut out = String::from("[");
            let mut first = true;
            if let Some(marker) = self.marker() {
                out.push_str(marker);
                first = false;
            }
            if let Some(value) = &self.base {
                if !first {
                    out.push('+');
                }
                out.push_str(&value.to_string());
                first = false;
            }
            for (dim, child) in &self.dims {
                if !first {
                    out.push('+');
                }
                out.push_str(&dim.to_string());
                out.push(':');
                out.push_str(child.canonical());
                first = false;
            }
            out.push(']');
            out
        })
    }

    /// Canonical text using the `<...>` shorthand wherever a node and its
    /// whole subtree carry both flags.
    pub fn short_canonical(&self) -> &str {
        self.short.get_or_init(|| {
            let children: Vec<(&Dimension, &str)> = self
                .dims
                .iter()
                .map(|(dim, child)| (dim, child.short_canonical()))
                .collect();
            let collapses = self.clear_base
                && self.clear_dims
                && children.iter().all(|(_, text)| text.starts_with('<'));
            if collapses {
                return crate::context::render_context(self.base.as_ref(), children.into_iter());
            }

            let mut out = String::from("[");
            let mut first = true;
            if let Some(marker) = self.marker() {
                out.push_str(marker);
                first = false;
            }
            if let Some(value) = &self.base {
                if !first {
                    out.push('+');
                }
                out.push_str(&value.to_string());
                first = false;
            }
            for (dim, text) in children {
                if !first {
                    out.push('+');
                }
                out.push_str(&dim.to_string());
                out.push(':');
                out.push_str(text);
                first = false;
            }
            out.push(']');
            out
        })
    }

    fn marker(&self) -> Option<&'static str> {
        match (self.clear_base, self.clear_dims) {
            (true, true) => Some("---"),
            (false, true) => Some("--"),
            (true, false) => Some("-"),
            (false, false) => None,
        }
    }

    fn invalidate(&mut self) {
        self.canonical = OnceLock::new();
        self.short = OnceLock::new();
    }

    fn redundant_under(&self, parent_clear: bool) -> bool {
        if parent_clear {
            self.is_vanilla()
        } else {
            self.is_noop()
        }
    }

    /// Recompute counts bottom-up and prune redundant children. `forced` is
    /// whether an ancestor clears dimensions.
    pub(crate) fn normalize(&mut self, forced: bool) {
        let clear = self.clear_dims || forced;
        let mut basecount = u64::from(self.base.is_some());
        let mut blankcount = u64::from(self.clear_base) + u64::from(self.clear_dims);
        self.dims.retain(|_, child| {
            child.normalize(clear);
            let keep = !child.redundant_under(clear);
            if keep {
                basecount += child.basecount;
                blankcount += child.blankcount;
            }
            keep
        });
        self.basecount = basecount;
        self.blankcount = blankcount;
        self.invalidate();
    }

    /// Run `f` on the child at `dim`, folding its count changes into this
    /// node and pruning it if it became redundant. A missing child starts as
    /// the explicit form of absence: `[---]` when `absent_clears`, else `[]`.
    fn with_child<R>(
        &mut self,
        dim: &Dimension,
        absent_clears: bool,
        parent_clear: bool,
        f: impl FnOnce(&mut ContextOp) -> R,
    ) -> R {
        let existing = self.dims.remove(dim);
        let (base_before, blank_before) = existing
            .as_ref()
            .map_or((0, 0), |c| (c.basecount, c.blankcount));
        let mut child = existing.unwrap_or_else(|| {
            if absent_clears {
                Self::clear_all()
            } else {
                Self::new()
            }
        });
        let out = f(&mut child);
        self.basecount -= base_before;
        self.blankcount -= blank_before;
        if !child.redundant_under(parent_clear) {
            self.basecount += child.basecount;
            self.blankcount += child.blankcount;
            self.dims.insert(dim.clone(), child);
        }
        self.invalidate();
        out
    }

    fn edit_at<R>(
        &mut self,
        path: &[Dimension],
        forced: bool,
        f: impl FnOnce(&mut ContextOp, bool) -> R,
    ) -> R {
        match path.split_first() {
            None => {
                let out = f(self, forced);
                self.invalidate();
                out
            }
            Some((head, rest)) => {
                let clear = self.clear_dims || forced;
                self.with_child(head, clear, clear, |child| child.edit_at(rest, clear, f))
            }
        }
    }

    /// Sequential composition at one node. `self_forced` and `op_forced` are
    /// whether an ancestor clears dimensions on the respective side.
    fn compose_into(&mut self, op: &ContextOp, self_forced: bool, op_forced: bool) {
        let self_clear = self.clear_dims || self_forced;
        let op_clear = op.clear_dims || op_forced;

        if op.clear_base {
            if !self.clear_base {
                self.clear_base = true;
                self.blankcount += 1;
            }
            if self.base.take().is_some() {
                self.basecount -= 1;
            }
        }
        if let Some(value) = &op.base {
            if self.base.replace(value.clone()).is_none() {
                self.basecount += 1;
            }
            if !op.clear_base && self.clear_base {
                self.clear_base = false;
                self.blankcount -= 1;
            }
        }
        if op.clear_dims && !self.clear_dims {
            self.clear_dims = true;
            self.blankcount += 1;
        }

        let clear = self_clear || op_clear;
        if op_clear {
            let (mut bases, mut blanks) = (0, 0);
            self.dims.retain(|dim, child| {
                let keep = op.dims.contains_key(dim);
                if !keep {
                    bases += child.basecount;
                    blanks += child.blankcount;
                }
                keep
            });
            self.basecount -= bases;
            self.blankcount -= blanks;
        }
        for (dim, child_op) in &op.dims {
            self.with_child(dim, self_clear, clear, |child| {
                child.compose_into(child_op, self_clear, op_clear)
            });
        }
        self.invalidate();
    }

    fn eq_under(&self, other: &ContextOp, forced: bool) -> bool {
        if self.clear_base != other.clear_base
            || self.clear_dims != other.clear_dims
            || self.base != other.base
        {
            return false;
        }
        let clear = self.clear_dims || forced;
        let mut left = self.dims.iter().filter(|(_, c)| !c.redundant_under(clear));
        let mut right = other.dims.iter().filter(|(_, c)| !c.redundant_under(clear));
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some((da, ca)), Some((db, cb))) => {
                    if da != db || !ca.eq_under(cb, clear) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl PartialEq for ContextOp {
    fn eq(&self, other: &Self) -> bool {
        self.eq_under(other, false)
    }
}

impl Eq for ContextOp {}

impl fmt::Debug for ContextOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextOp({})", self.canonical())
    }
}

impl fmt::Display for ContextOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl FromStr for ContextOp {
    type Err = IntenseError;

    fn from_str(s: &str) -> Result<Self> {
        text::parse_op(s, &crate::config::Limits::default())
    }
}

impl Serialize for ContextOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for ContextOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
