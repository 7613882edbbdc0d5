//! Contexts: the recursive tree value.
//!
//! A context node holds an optional [`BaseValue`] and an ordered map from
//! [`Dimension`] to child contexts. Each node caches `basecount`, the number
//! of base values in its subtree, and memoizes its canonical text.
//!
//! A node never stores a link to its parent. Anything that has to touch
//! ancestors is addressed from the node the caller holds, by a path; the
//! recursion carries count deltas and cache invalidation back out, so every
//! ancestor is adjusted exactly once per operation. [`NodeRef`] gives the
//! read-only navigation (depth, ancestry, common roots) on the same basis.
//!
//! Empty subtrees are pruned eagerly: a stored child always has
//! `basecount > 0`.

use crate::dimension::{CompoundDimension, Dimension};
use crate::error::{IntenseError, Result};
use crate::op::ContextOp;
use crate::text;
use crate::value::BaseValue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Read access shared by every context-shaped tree (plain contexts and
/// AEther nodes), so order, refinement and rendering can mix them.
pub trait ContextView: Sized {
    fn base(&self) -> Option<&BaseValue>;

    fn basecount(&self) -> u64;

    fn children(&self) -> btree_map::Iter<'_, Dimension, Self>;

    fn child(&self, dim: &Dimension) -> Option<&Self>;

    fn is_empty(&self) -> bool {
        self.basecount() == 0
    }

    fn get(&self, path: &CompoundDimension) -> Option<&Self> {
        let mut node = self;
        for dim in path {
            node = node.child(dim)?;
        }
        Some(node)
    }
}

fn live_children<T: ContextView>(node: &T) -> impl Iterator<Item = (&Dimension, &T)> {
    node.children().filter(|(_, child)| !child.is_empty())
}

/// Total order: bases first (absent < present), then non-empty dimensions
/// pairwise in order. When one side's dimensions are a strict prefix of the
/// other's, the longer side is greater only if the basecounts differ.
pub(crate) fn compare_views<A: ContextView, B: ContextView>(a: &A, b: &B) -> Ordering {
    match (a.base(), b.base()) {
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Equal => {}
            other => return other,
        },
        (None, None) => {}
    }

    let mut left = live_children(a);
    let mut right = live_children(b);
    loop {
        match (left.next(), right.next()) {
            (Some((da, ca)), Some((db, cb))) => {
                match da.cmp(db) {
                    Ordering::Equal => {}
                    other => return other,
                }
                match compare_views(ca, cb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            (None, None) => return Ordering::Equal,
            (Some(_), None) => {
                return if a.basecount() != b.basecount() {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                };
            }
            (None, Some(_)) => {
                return if a.basecount() != b.basecount() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                };
            }
        }
    }
}

/// Partial refinement order: `a` is at least as defined as required by `b`.
pub(crate) fn refines_views<A: ContextView, B: ContextView>(a: &A, b: &B) -> bool {
    if a.is_empty() {
        return true;
    }
    if b.is_empty() {
        return false;
    }
    if let Some(x) = a.base() {
        match b.base() {
            Some(y) if x.refines_to(y) => {}
            _ => return false,
        }
    }
    live_children(a).all(|(dim, ca)| match b.child(dim) {
        Some(cb) if !cb.is_empty() => refines_views(ca, cb),
        _ => false,
    })
}

/// Canonical `<...>` text from a base and already-rendered children.
pub(crate) fn render_context<'a>(
    base: Option<&BaseValue>,
    children: impl Iterator<Item = (&'a Dimension, &'a str)>,
) -> String {
    let mut out = String::from("<");
    let mut first = true;
    if let Some(value) = base {
        out.push_str(&value.to_string());
        first = false;
    }
    for (dim, child) in children {
        if !first {
            out.push('+');
        }
        out.push_str(&dim.to_string());
        out.push(':');
        out.push_str(child);
        first = false;
    }
    out.push('>');
    out
}

/// A context tree node.
#[derive(Clone, Default)]
pub struct Context {
    base: Option<BaseValue>,
    dims: BTreeMap<Dimension, Context>,
    basecount: u64,
    canonical: OnceLock<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_base(value: impl Into<BaseValue>) -> Self {
        Self {
            base: Some(value.into()),
            basecount: 1,
            ..Self::default()
        }
    }

    /// Builder: attach `child` under `dim`, replacing any previous child.
    /// Empty children are dropped.
    pub fn with_dim(mut self, dim: impl Into<Dimension>, child: Context) -> Self {
        self.with_child(&dim.into(), |slot| *slot = child);
        self
    }

    pub fn base(&self) -> Option<&BaseValue> {
        self.base.as_ref()
    }

    pub fn basecount(&self) -> u64 {
        self.basecount
    }

    pub fn is_empty(&self) -> bool {
        self.basecount == 0
    }

    pub fn child(&self, dim: &Dimension) -> Option<&Context> {
        self.dims.get(dim)
    }

    pub fn get(&self, path: &CompoundDimension) -> Option<&Context> {
        ContextView::get(self, path)
    }

    pub fn children(&self) -> btree_map::Iter<'_, Dimension, Context> {
        self.dims.iter()
    }

    pub fn dim_count(&self) -> usize {
        self.dims.len()
    }

    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| {
            render_context(
                self.base.as_ref(),
                self.dims.iter().map(|(d, c)| (d, c.canonical())),
            )
        })
    }

    /// Lowercase-hex SHA-256 of the canonical text.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.canonical().as_bytes());
        format!("{hash:x}")
    }

    /// Navigation handle for this node as the root of its tree.
    pub fn as_node(&self) -> NodeRef<'_, Context> {
        NodeRef::root_of(self)
    }

    /// Navigation handle for the descendant at `path`.
    pub fn node(&self, path: &CompoundDimension) -> Option<NodeRef<'_, Context>> {
        NodeRef::new(self, path.clone())
    }

    pub fn compare(&self, other: &impl ContextView) -> Ordering {
        compare_views(self, other)
    }

    pub fn refines_to(&self, other: &Context) -> bool {
        if self.basecount == other.basecount && self == other {
            return true;
        }
        refines_views(self, other)
    }

    /// Refinement against any context-shaped tree.
    pub fn refines_to_view(&self, other: &impl ContextView) -> bool {
        refines_views(self, other)
    }

    /// Merge `op` into this context.
    pub fn apply(&mut self, op: &ContextOp) -> &mut Self {
        self.merge(op, false);
        self
    }

    /// Merge `op` into the descendant at `path`, creating it if needed.
    pub fn apply_at(&mut self, path: &CompoundDimension, op: &ContextOp) -> &mut Self {
        self.edit_at(path.dims(), |node| node.merge(op, false));
        self
    }

    /// Replace this context with a deep copy of `other`.
    pub fn assign(&mut self, other: &Context) -> &mut Self {
        *self = other.clone();
        self
    }

    pub fn assign_at(&mut self, path: &CompoundDimension, other: &Context) -> &mut Self {
        self.edit_at(path.dims(), |node| *node = other.clone());
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    pub fn clear_at(&mut self, path: &CompoundDimension) -> &mut Self {
        self.edit_at(path.dims(), |node| {
            node.clear();
        });
        self
    }

    /// Store `value` as the base, replacing any previous one whatever its
    /// kind. See [`Context::assign_base`] for the kind-preserving form.
    pub fn set_base(&mut self, value: impl Into<BaseValue>) -> &mut Self {
        self.put_base(value.into());
        self.invalidate();
        self
    }

    /// Overwrite the base in place. An existing base only accepts a value of
    /// its own kind; a mismatch is a structural error and leaves the context
    /// unchanged. Without a base the value is simply stored.
    pub fn assign_base(&mut self, value: &BaseValue) -> Result<&mut Self> {
        match self.base.as_mut() {
            Some(current) => current.assign(value)?,
            None => self.put_base(value.clone()),
        }
        self.invalidate();
        Ok(self)
    }

    pub fn set_base_at(&mut self, path: &CompoundDimension, value: impl Into<BaseValue>) -> &mut Self {
        let value = value.into();
        self.edit_at(path.dims(), |node| {
            node.put_base(value);
            node.invalidate();
        });
        self
    }

    pub fn clear_base(&mut self) -> &mut Self {
        self.take_base();
        self.invalidate();
        self
    }

    fn put_base(&mut self, value: BaseValue) {
        if self.base.replace(value).is_none() {
            self.basecount += 1;
        }
    }

    fn take_base(&mut self) {
        if self.base.take().is_some() {
            self.basecount -= 1;
        }
    }

    fn invalidate(&mut self) {
        self.canonical = OnceLock::new();
    }

    fn merge(&mut self, op: &ContextOp, forced: bool) {
        if op.clear_base() {
            self.take_base();
        }
        if let Some(value) = op.base() {
            self.put_base(value.clone());
        }

        let replace = op.clear_dims() || forced;
        if replace {
            let mut removed = 0;
            self.dims.retain(|dim, child| {
                let keep = op.child(dim).is_some();
                if !keep {
                    removed += child.basecount;
                }
                keep
            });
            self.basecount -= removed;
        }
        for (dim, child_op) in op.children() {
            self.with_child(dim, |child| child.merge(child_op, replace));
        }
        self.invalidate();
    }

    /// Run `f` on the child at `dim` (created empty if absent), then fold its
    /// basecount change into this node and prune it if it ended up empty.
    fn with_child<R>(&mut self, dim: &Dimension, f: impl FnOnce(&mut Context) -> R) -> R {
        let mut child = self.dims.remove(dim).unwrap_or_default();
        let before = child.basecount;
        let out = f(&mut child);
        self.basecount = self.basecount - before + child.basecount;
        if !child.is_empty() {
            self.dims.insert(dim.clone(), child);
        }
        self.invalidate();
        out
    }

    fn edit_at<R>(&mut self, path: &[Dimension], f: impl FnOnce(&mut Context) -> R) -> R {
        match path.split_first() {
            None => f(self),
            Some((head, rest)) => self.with_child(head, |child| child.edit_at(rest, f)),
        }
    }
}

impl ContextView for Context {
    fn base(&self) -> Option<&BaseValue> {
        self.base.as_ref()
    }

    fn basecount(&self) -> u64 {
        self.basecount
    }

    fn children(&self) -> btree_map::Iter<'_, Dimension, Self> {
        self.dims.iter()
    }

    fn child(&self, dim: &Dimension) -> Option<&Self> {
        self.dims.get(dim)
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        compare_views(self, other) == Ordering::Equal
    }
}

impl Eq for Context {}

impl PartialOrd for Context {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Context {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_views(self, other)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.canonical())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

impl FromStr for Context {
    type Err = IntenseError;

    fn from_str(s: &str) -> Result<Self> {
        text::parse_context(s, &crate::config::Limits::default())
    }
}

impl From<&ContextOp> for Context {
    /// The context produced by applying `op` to the empty context.
    fn from(op: &ContextOp) -> Self {
        let mut out = Context::new();
        out.apply(op);
        out
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical())
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A borrowed node inside a tree, identified by its path from the root.
///
/// Two handles belong to the same tree when they borrow the same root.
pub struct NodeRef<'a, T> {
    root: &'a T,
    node: &'a T,
    path: CompoundDimension,
}

impl<'a, T> Clone for NodeRef<'a, T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            node: self.node,
            path: self.path.clone(),
        }
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for NodeRef<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path.to_string())
            .field("node", self.node)
            .finish()
    }
}

impl<'a, T: ContextView> NodeRef<'a, T> {
    pub fn root_of(root: &'a T) -> Self {
        Self {
            root,
            node: root,
            path: CompoundDimension::new(),
        }
    }

    /// Handle for the node at `path` under `root`, if it exists.
    pub fn new(root: &'a T, path: CompoundDimension) -> Option<Self> {
        let node = root.get(&path)?;
        Some(Self { root, node, path })
    }

    pub fn node(&self) -> &'a T {
        self.node
    }

    pub fn root(&self) -> NodeRef<'a, T> {
        Self::root_of(self.root)
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The path from the root down to this node.
    pub fn ancestry(&self) -> &CompoundDimension {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn parent(&self) -> Option<NodeRef<'a, T>> {
        Self::new(self.root, self.path.parent()?)
    }

    pub fn child(&self, dim: &Dimension) -> Option<NodeRef<'a, T>> {
        let node = self.node.child(dim)?;
        Some(Self {
            root: self.root,
            node,
            path: self.path.join(dim.clone()),
        })
    }

    pub fn same_tree(&self, other: &NodeRef<'_, T>) -> bool {
        std::ptr::eq(self.root, other.root)
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor(&self, other: &NodeRef<'_, T>) -> bool {
        self.same_tree(other)
            && self.path.len() < other.path.len()
            && self.path.is_prefix_of(&other.path)
    }

    /// The deepest node that is an ancestor-or-self of both handles.
    pub fn least_common_root(&self, other: &NodeRef<'_, T>) -> Result<NodeRef<'a, T>> {
        if !self.same_tree(other) {
            return Err(IntenseError::structural(format!(
                "nodes '{}' and '{}' do not share a root",
                self.path, other.path
            )));
        }
        let shared = self.path.common_prefix(&other.path);
        Self::new(self.root, shared.clone()).ok_or_else(|| {
            IntenseError::structural(format!("common root '{shared}' no longer exists"))
        })
    }

    /// Path from `self` down to `descendant` (empty when they coincide).
    pub fn find_path_to(&self, descendant: &NodeRef<'_, T>) -> Result<CompoundDimension> {
        if !self.same_tree(descendant) {
            return Err(IntenseError::structural(format!(
                "node '{}' is not in the tree of '{}'",
                descendant.path, self.path
            )));
        }
        descendant.path.strip_prefix(&self.path).ok_or_else(|| {
            IntenseError::structural(format!(
                "'{}' is not a descendant of '{}'",
                descendant.path, self.path
            ))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Recompute every basecount from scratch and check the cached ones.
    pub(crate) fn audit(ctx: &Context) -> u64 {
        let mut count = u64::from(ctx.base().is_some());
        for (dim, child) in ctx.children() {
            assert!(!child.is_empty(), "empty child '{dim}' was not pruned");
            count += audit(child);
        }
        assert_eq!(count, ctx.basecount(), "stale basecount at {ctx}");
        count
    }

    fn ctx(text: &str) -> Context {
        text.parse().unwrap()
    }

    fn op(text: &str) -> ContextOp {
        text.parse().unwrap()
    }

    fn path(text: &str) -> CompoundDimension {
        text.parse().unwrap()
    }

    #[test]
    fn assign_base_keeps_the_kind() {
        let mut c = ctx("<1+a:<2>>");
        c.assign_base(&BaseValue::Number(5.0)).unwrap();
        assert_eq!(c.canonical(), "<5+a:<2>>");

        let err = c.assign_base(&BaseValue::string("five")).unwrap_err();
        assert!(matches!(err, IntenseError::Structural(_)));
        assert_eq!(c.canonical(), "<5+a:<2>>");

        let mut empty = Context::new();
        empty.assign_base(&BaseValue::string("x")).unwrap();
        assert_eq!(empty.basecount(), 1);
        audit(&empty);

        c.set_base("text");
        assert_eq!(c.base(), Some(&BaseValue::string("text")));
    }

    #[test]
    fn canonical_roundtrip() {
        for text in [
            "<>",
            "<1>",
            "<\"one\">",
            "<a:<1>>",
            "<3+a:<\"x\">+b:<#00ff+c:<~>>>",
            "<1:<^>+name:<-2.5>>",
        ] {
            let parsed = ctx(text);
            assert_eq!(parsed.canonical(), text);
            assert_eq!(ctx(parsed.canonical()), parsed);
            audit(&parsed);
        }
    }

    #[test]
    fn bare_identifier_bases_render_quoted() {
        let parsed = ctx("<d1:<d1val>+d2:<d2val+d21:<d21val>>>");
        insta::assert_snapshot!(
            parsed.canonical(),
            @r#"<d1:<"d1val">+d2:<"d2val"+d21:<"d21val">>>"#
        );
        assert_eq!(parsed.basecount(), 3);
    }

    #[test]
    fn empty_children_are_pruned_on_parse() {
        let parsed = ctx("<a:<>+b:<c:<>>+d:<1>>");
        assert_eq!(parsed.canonical(), "<d:<1>>");
        audit(&parsed);
    }

    #[test]
    fn clear_all_yields_empty() {
        let mut c = ctx("<1+a:<2>+b:<c:<3>>>");
        c.apply(&op("[---]"));
        assert_eq!(c.canonical(), "<>");
        assert_eq!(c.basecount(), 0);
        audit(&c);
    }

    #[test]
    fn clearing_a_missing_leaf_is_a_no_op() {
        let mut c = ctx("<d1:<d1val>+d2:<d2val+d21:<d21val>>>");
        let before = c.clone();
        c.apply(&op("[d2:[d22:[-]]]"));
        assert_eq!(c, before);
        assert!(c.get(&path("d2:d22")).is_none());
        audit(&c);
    }

    #[test]
    fn clearing_a_leaf_base_prunes_it() {
        let mut c = ctx("<d1:<d1val>+d2:<d2val+d21:<d21val>>>");
        c.apply(&op("[d2:[d21:[-]]]"));
        assert_eq!(c.canonical(), "<d1:<\"d1val\">+d2:<\"d2val\">>");
        assert_eq!(c.basecount(), 2);
        audit(&c);
    }

    #[test]
    fn clearing_a_base_keeps_a_node_with_content() {
        let mut c = ctx("<d2:<d21:<1+x:<2>>>>");
        c.apply(&op("[d2:[d21:[-]]]"));
        assert_eq!(c.canonical(), "<d2:<d21:<x:<2>>>>");
        audit(&c);
    }

    #[test]
    fn vmod_leaves_unlisted_dimensions() {
        let mut c = ctx("<a:<1>+b:<2>>");
        c.apply(&op("[b:[3]+c:[4]]"));
        assert_eq!(c.canonical(), "<a:<1>+b:<3>+c:<4>>");
        audit(&c);
    }

    #[test]
    fn vset_replaces_dimensions() {
        let mut c = ctx("<9+a:<1>+b:<2+x:<5>>>");
        c.apply(&op("[--+b:[3]+c:[4]]"));
        // base survives (no clear-base), dims replaced, and the replace is
        // forced below: b loses x
        assert_eq!(c.canonical(), "<9+b:<3>+c:<4>>");
        audit(&c);
    }

    #[test]
    fn vset_shorthand_replaces_everything() {
        let mut c = ctx("<9+a:<1>+b:<2+x:<5>>>");
        c.apply(&op("<b:<3>>"));
        assert_eq!(c.canonical(), "<b:<3>>");
        audit(&c);
    }

    #[test]
    fn clear_base_then_set_base() {
        let mut c = ctx("<1>");
        c.apply(&op("[-+2]"));
        assert_eq!(c.canonical(), "<2>");
        c.apply(&op("[-]"));
        assert_eq!(c.canonical(), "<>");
    }

    #[test]
    fn apply_at_reaches_descendants() {
        let mut c = ctx("<a:<1>>");
        c.apply_at(&path("x:y"), &op("[7]"));
        assert_eq!(c.canonical(), "<a:<1>+x:<y:<7>>>");
        c.apply_at(&path("x:y"), &op("[-]"));
        assert_eq!(c.canonical(), "<a:<1>>");
        audit(&c);
    }

    #[test]
    fn ancestor_caches_are_invalidated() {
        let mut c = ctx("<a:<b:<1>>>");
        assert_eq!(c.canonical(), "<a:<b:<1>>>");
        c.set_base_at(&path("a:b"), 2.0);
        assert_eq!(c.canonical(), "<a:<b:<2>>>");
        c.clear_at(&path("a"));
        assert_eq!(c.canonical(), "<>");
        audit(&c);
    }

    #[test]
    fn assign_deep_copies() {
        let source = ctx("<1+a:<2>>");
        let mut target = ctx("<b:<3>>");
        target.assign_at(&path("b:c"), &source);
        assert_eq!(target.canonical(), "<b:<3+c:<1+a:<2>>>>");
        target.assign(&source);
        assert_eq!(target, source);
        audit(&target);
    }

    #[test]
    fn set_and_clear_base() {
        let mut c = Context::new();
        c.set_base("x");
        assert_eq!(c.basecount(), 1);
        c.set_base(1.0);
        assert_eq!(c.basecount(), 1);
        c.clear_base();
        assert!(c.is_empty());
    }

    #[test]
    fn compare_orders_bases_first() {
        assert_eq!(ctx("<>").compare(&ctx("<1>")), Ordering::Less);
        assert_eq!(ctx("<2>").compare(&ctx("<1+a:<1>>")), Ordering::Greater);
        assert_eq!(ctx("<1+a:<1>>").compare(&ctx("<1+b:<1>>")), Ordering::Less);
        assert_eq!(ctx("<a:<2>>").compare(&ctx("<a:<1>>")), Ordering::Greater);
        assert_eq!(ctx("<1:<x>>").compare(&ctx("<a:<x>>")), Ordering::Less);
    }

    #[test]
    fn compare_prefix_tie_break() {
        let short = ctx("<a:<1>>");
        let long = ctx("<a:<1>+b:<2>>");
        assert_eq!(short.compare(&long), Ordering::Less);
        assert_eq!(long.compare(&short), Ordering::Greater);
        assert_eq!(long.compare(&long.clone()), Ordering::Equal);
    }

    #[test]
    fn compare_is_a_total_order_on_small_fixtures() {
        let fixtures: Vec<Context> = [
            "<>", "<1>", "<2>", "<a:<1>>", "<a:<2>>", "<b:<1>>", "<1+a:<1>>",
            "<a:<1>+b:<1>>", "<a:<1+c:<1>>>", "<0:<1>>", "<\"s\">", "<~>", "<^>",
        ]
        .iter()
        .map(|t| ctx(t))
        .collect();

        for a in &fixtures {
            for b in &fixtures {
                let ab = a.compare(b);
                assert_eq!(ab, b.compare(a).reverse(), "{a} vs {b}");
                assert_eq!(ab == Ordering::Equal, a.canonical() == b.canonical());
                for c in &fixtures {
                    if ab == Ordering::Less && b.compare(c) == Ordering::Less {
                        assert_eq!(a.compare(c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn refinement_rules() {
        let empty = ctx("<>");
        let a = ctx("<a:<\"one\">>");
        let ab = ctx("<a:<\"one\">+b:<\"two\">>");
        let abc = ctx("<a:<\"one\">+b:<\"two\">+c:<\"x\">>");

        assert!(empty.refines_to(&a));
        assert!(!a.refines_to(&empty));
        assert!(empty.refines_to(&empty));
        assert!(a.refines_to(&a));
        assert!(a.refines_to(&ab));
        assert!(ab.refines_to(&abc));
        assert!(a.refines_to(&abc));
        assert!(!ab.refines_to(&a));
    }

    #[test]
    fn refinement_on_bases() {
        assert!(ctx("<~>").refines_to(&ctx("<1>")));
        assert!(ctx("<1>").refines_to(&ctx("<^>")));
        assert!(!ctx("<1>").refines_to(&ctx("<2>")));
        // a base cannot refine to a node without one
        assert!(!ctx("<1+a:<1>>").refines_to(&ctx("<a:<1>>")));
        // a node without a base refines to one with
        assert!(ctx("<a:<1>>").refines_to(&ctx("<5+a:<1>>")));
    }

    #[test]
    fn navigation_helpers() {
        let tree = ctx("<a:<b:<c:<1>>+d:<2>>>");
        let c = tree.node(&path("a:b:c")).unwrap();
        let d = tree.node(&path("a:d")).unwrap();
        let a = tree.node(&path("a")).unwrap();

        assert_eq!(c.depth(), 3);
        assert_eq!(c.root().depth(), 0);
        assert!(a.is_ancestor(&c));
        assert!(!c.is_ancestor(&a));
        assert!(!a.is_ancestor(&a));
        assert_eq!(c.least_common_root(&d).unwrap().ancestry(), &path("a"));
        assert_eq!(a.find_path_to(&c).unwrap(), path("b:c"));
        assert_eq!(c.find_path_to(&c).unwrap(), CompoundDimension::new());
        assert!(c.find_path_to(&d).is_err());
        assert_eq!(c.parent().unwrap().ancestry(), &path("a:b"));
        assert_eq!(a.child(&Dimension::string("d")).unwrap().node().canonical(), "<2>");
        assert!(tree.node(&path("a:zz")).is_none());
    }

    #[test]
    fn unrelated_trees_have_no_common_root() {
        let one = ctx("<a:<1>>");
        let two = one.clone();
        let x = one.node(&path("a")).unwrap();
        let y = two.node(&path("a")).unwrap();
        assert!(matches!(
            x.least_common_root(&y),
            Err(IntenseError::Structural(_))
        ));
        assert!(x.find_path_to(&y).is_err());
        assert!(!x.root().is_ancestor(&y));
    }

    #[test]
    fn digest_follows_canonical_text() {
        let a = ctx("<a:<1>>");
        let b = Context::new().with_dim("a", Context::from_base(1.0));
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_ne!(a.digest(), ctx("<a:<2>>").digest());
    }

    #[test]
    fn builder_drops_empty_children() {
        let built = Context::from_base("root")
            .with_dim("gone", Context::new())
            .with_dim(3, Context::from_base(1.0));
        assert_eq!(built.canonical(), "<\"root\"+3:<1>>");
        audit(&built);
    }
}
