//! AEther: a context tree that announces its own changes.
//!
//! Each node can carry participants. A mutation addressed at some path runs in
//! two phases:
//!
//! 1. every existing strict ancestor of the target is told about the whole
//!    change, nearest ancestor first, with the path from that ancestor down to
//!    the target;
//! 2. the change is then carried out recursively, and each node's own
//!    participants hear about their part of it (with no path) just before that
//!    node is modified.
//!
//! Nodes that lose all content are kept as empty shells while participants
//! remain attached anywhere below them.
//!
//! An `AEther` is a single-writer value. Concurrent callers share it behind a
//! lock held for the whole call, notification fan-out included.

use crate::context::{Context, ContextView, NodeRef, compare_views, refines_views, render_context};
use crate::dimension::{CompoundDimension, Dimension};
use crate::error::Result;
use crate::op::{ContextOp, clear_op};
use crate::participant::{Origin, Participant, ParticipantError};
use crate::value::BaseValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Clone, Copy)]
enum Event<'a> {
    Apply(&'a ContextOp),
    Assign(&'a Context),
    Clear,
}

/// Delivers notifications for one mutation and remembers the first failure.
/// After a failure nothing further is delivered, but the mutation itself
/// still runs to completion.
struct Fanout<'a> {
    origin: Option<&'a Origin>,
    failure: Option<ParticipantError>,
}

impl<'a> Fanout<'a> {
    fn new(origin: Option<&'a Origin>) -> Self {
        Self {
            origin,
            failure: None,
        }
    }

    fn deliver(
        &mut self,
        participants: &[Arc<dyn Participant>],
        event: Event<'_>,
        path: Option<&CompoundDimension>,
    ) {
        if !participants.is_empty() {
            tracing::trace!(count = participants.len(), path = ?path.map(ToString::to_string), "notifying participants");
        }
        let mut vset: Option<ContextOp> = None;
        for participant in participants {
            if self.failure.is_some() {
                return;
            }
            let outcome = match event {
                Event::Apply(op) => participant.apply_notify(self.origin, op, path),
                Event::Assign(ctx) if participant.is_pure() => {
                    let op = vset.get_or_insert_with(|| ContextOp::vset(ctx));
                    participant.apply_notify(self.origin, op, path)
                }
                Event::Assign(ctx) => participant.assign_notify(self.origin, ctx, path),
                Event::Clear if participant.is_pure() => {
                    participant.apply_notify(self.origin, clear_op(), path)
                }
                Event::Clear => participant.clear_notify(self.origin, path),
            };
            self.record(outcome);
        }
    }

    fn kick(&mut self, participant: &Arc<dyn Participant>) {
        if self.failure.is_none() {
            let outcome = participant.kick_notify(self.origin);
            self.record(outcome);
        }
    }

    fn record(&mut self, outcome: std::result::Result<(), ParticipantError>) {
        if let Err(e) = outcome {
            tracing::warn!("participant notification failed, skipping the rest: {e}");
            self.failure = Some(e);
        }
    }

    fn finish(self) -> Result<()> {
        match self.failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct AEther {
    base: Option<BaseValue>,
    dims: BTreeMap<Dimension, AEther>,
    basecount: u64,
    headcount: u64,
    participants: Vec<Arc<dyn Participant>>,
    canonical: OnceLock<String>,
}

impl AEther {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> Option<&BaseValue> {
        self.base.as_ref()
    }

    pub fn basecount(&self) -> u64 {
        self.basecount
    }

    /// Participants attached at this node or anywhere below it.
    pub fn headcount(&self) -> u64 {
        self.headcount
    }

    pub fn is_empty(&self) -> bool {
        self.basecount == 0
    }

    pub fn participants(&self) -> &[Arc<dyn Participant>] {
        &self.participants
    }

    pub fn child(&self, dim: &Dimension) -> Option<&AEther> {
        self.dims.get(dim)
    }

    pub fn get(&self, path: &CompoundDimension) -> Option<&AEther> {
        ContextView::get(self, path)
    }

    /// All stored children, empty shells included.
    pub fn children(&self) -> btree_map::Iter<'_, Dimension, AEther> {
        self.dims.iter()
    }

    pub fn node(&self, path: &CompoundDimension) -> Option<NodeRef<'_, AEther>> {
        NodeRef::new(self, path.clone())
    }

    /// Canonical text of the content; empty shells do not appear.
    pub fn canonical(&self) -> &str {
        self.canonical.get_or_init(|| {
            render_context(
                self.base.as_ref(),
                self.dims
                    .iter()
                    .filter(|(_, child)| !child.is_empty())
                    .map(|(dim, child)| (dim, child.canonical())),
            )
        })
    }

    /// The content as a plain context.
    pub fn snapshot(&self) -> Context {
        let mut out = match &self.base {
            Some(value) => Context::from_base(value.clone()),
            None => Context::new(),
        };
        for (dim, child) in &self.dims {
            if !child.is_empty() {
                out = out.with_dim(dim.clone(), child.snapshot());
            }
        }
        out
    }

    pub fn compare(&self, other: &impl ContextView) -> Ordering {
        compare_views(self, other)
    }

    pub fn refines_to(&self, other: &impl ContextView) -> bool {
        refines_views(self, other)
    }

    /// Merge `op` into the whole tree.
    pub fn apply(&mut self, op: &ContextOp, origin: Option<&Origin>) -> Result<()> {
        self.apply_at(&CompoundDimension::new(), op, origin)
    }

    /// Make the whole tree equal to `context`.
    pub fn assign(&mut self, context: &Context, origin: Option<&Origin>) -> Result<()> {
        self.assign_at(&CompoundDimension::new(), context, origin)
    }

    pub fn clear(&mut self, origin: Option<&Origin>) -> Result<()> {
        self.clear_at(&CompoundDimension::new(), origin)
    }

    /// Merge `op` into the node at `path`.
    pub fn apply_at(&mut self, path: &CompoundDimension, op: &ContextOp, origin: Option<&Origin>) -> Result<()> {
        let mut fanout = Fanout::new(origin);
        self.notify_ancestors(path, Event::Apply(op), &mut fanout);
        self.edit_at(path.dims(), |node| node.apply_local(op, false, &mut fanout));
        fanout.finish()
    }

    /// Make the node at `path` equal to `context`.
    pub fn assign_at(&mut self, path: &CompoundDimension, context: &Context, origin: Option<&Origin>) -> Result<()> {
        let mut fanout = Fanout::new(origin);
        self.notify_ancestors(path, Event::Assign(context), &mut fanout);
        self.edit_at(path.dims(), |node| node.assign_local(context, &mut fanout));
        fanout.finish()
    }

    /// Remove all content at and below `path`, keeping attached participants.
    pub fn clear_at(&mut self, path: &CompoundDimension, origin: Option<&Origin>) -> Result<()> {
        let mut fanout = Fanout::new(origin);
        self.notify_ancestors(path, Event::Clear, &mut fanout);
        self.edit_at(path.dims(), |node| node.clear_local(&mut fanout));
        fanout.finish()
    }

    /// Attach `participant` at `path`, creating empty shells on the way.
    pub fn attach(&mut self, path: &CompoundDimension, participant: Arc<dyn Participant>) {
        self.edit_at(path.dims(), |node| {
            node.participants.push(participant);
            node.headcount += 1;
        });
        tracing::debug!(path = %path, "participant attached");
    }

    /// Detach one participant from the node at `path`. Returns whether it was
    /// attached there.
    pub fn detach(&mut self, path: &CompoundDimension, participant: &Arc<dyn Participant>) -> bool {
        if self.get(path).is_none() {
            return false;
        }
        self.edit_at(path.dims(), |node| {
            let found = node
                .participants
                .iter()
                .position(|p| std::ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(participant)));
            match found {
                Some(index) => {
                    node.participants.remove(index);
                    node.headcount -= 1;
                    true
                }
                None => false,
            }
        })
    }

    /// Remove every participant at `path` (and below it when `recursive`),
    /// calling `kick_notify` on each. Returns how many were removed.
    pub fn kick(&mut self, path: &CompoundDimension, recursive: bool, origin: Option<&Origin>) -> Result<usize> {
        if self.get(path).is_none() {
            return Ok(0);
        }
        let mut fanout = Fanout::new(origin);
        let removed = self.edit_at(path.dims(), |node| node.kick_local(recursive, &mut fanout));
        tracing::debug!(path = %path, removed, "participants kicked");
        fanout.finish()?;
        Ok(removed)
    }

    fn is_live(&self) -> bool {
        self.basecount > 0 || self.headcount > 0
    }

    fn invalidate(&mut self) {
        self.canonical = OnceLock::new();
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

    fn notify_ancestors(&self, path: &CompoundDimension, event: Event<'_>, fanout: &mut Fanout<'_>) {
        let dims = path.dims();
        let mut chain: Vec<(&AEther, usize)> = Vec::new();
        let mut node = self;
        for (depth, dim) in dims.iter().enumerate() {
            if node.headcount == 0 {
                break;
            }
            chain.push((node, depth));
            match node.dims.get(dim) {
                Some(next) => node = next,
                None => break,
            }
        }
        for (ancestor, depth) in chain.into_iter().rev() {
            if ancestor.participants.is_empty() {
                continue;
            }
            let suffix = CompoundDimension::from(&dims[depth..]);
            fanout.deliver(&ancestor.participants, event, Some(&suffix));
        }
    }

    /// Run `f` on the child at `dim` (an empty shell if absent), fold its
    /// count changes into this node and drop it if nothing is left.
    fn with_child<R>(&mut self, dim: &Dimension, f: impl FnOnce(&mut AEther) -> R) -> R {
        let mut child = self.dims.remove(dim).unwrap_or_default();
        let (bases, heads) = (child.basecount, child.headcount);
        let out = f(&mut child);
        self.basecount = self.basecount - bases + child.basecount;
        self.headcount = self.headcount - heads + child.headcount;
        if child.is_live() {
            self.dims.insert(dim.clone(), child);
        }
        self.invalidate();
        out
    }

    fn edit_at<R>(&mut self, path: &[Dimension], f: impl FnOnce(&mut AEther) -> R) -> R {
        match path.split_first() {
            None => {
                let out = f(self);
                self.invalidate();
                out
            }
            Some((head, rest)) => self.with_child(head, |child| child.edit_at(rest, f)),
        }
    }

    /// `forced` is whether an ancestor op clears dimensions, which clears
    /// this node's unlisted dimensions too. Local participants then get `op`
    /// with its own clear-dims flag raised, so the op they see has the
    /// effect this node actually undergoes.
    fn apply_local(&mut self, op: &ContextOp, forced: bool, fanout: &mut Fanout<'_>) {
        if forced && !op.clear_dims() && !self.participants.is_empty() {
            let mut effective = op.clone();
            effective.set_clear_dims_flag(&CompoundDimension::new());
            fanout.deliver(&self.participants, Event::Apply(&effective), None);
        } else {
            fanout.deliver(&self.participants, Event::Apply(op), None);
        }

        if op.clear_base() {
            self.take_base();
        }
        if let Some(value) = op.base() {
            self.put_base(value.clone());
        }

        let replace = op.clear_dims() || forced;
        if replace {
            self.clear_children_except(|dim| op.child(dim).is_some(), fanout);
        }
        for (dim, child_op) in op.children() {
            self.with_child(dim, |child| child.apply_local(child_op, replace, fanout));
        }
        self.invalidate();
    }

    fn assign_local(&mut self, context: &Context, fanout: &mut Fanout<'_>) {
        fanout.deliver(&self.participants, Event::Assign(context), None);

        match context.base() {
            Some(value) => self.put_base(value.clone()),
            None => self.take_base(),
        }
        self.clear_children_except(|dim| context.child(dim).is_some(), fanout);
        for (dim, child_ctx) in context.children() {
            self.with_child(dim, |child| child.assign_local(child_ctx, fanout));
        }
        self.invalidate();
    }

    fn clear_local(&mut self, fanout: &mut Fanout<'_>) {
        fanout.deliver(&self.participants, Event::Clear, None);

        self.take_base();
        self.clear_children_except(|_| false, fanout);
        self.invalidate();
    }

    /// Clear every child not `listed`. Children without content are empty
    /// shells already and hear nothing.
    fn clear_children_except(&mut self, listed: impl Fn(&Dimension) -> bool, fanout: &mut Fanout<'_>) {
        let doomed: Vec<Dimension> = self
            .dims
            .iter()
            .filter(|(dim, child)| !child.is_empty() && !listed(dim))
            .map(|(dim, _)| dim.clone())
            .collect();
        for dim in &doomed {
            self.with_child(dim, |child| child.clear_local(fanout));
        }
    }

    fn kick_local(&mut self, recursive: bool, fanout: &mut Fanout<'_>) -> usize {
        let kicked: Vec<Arc<dyn Participant>> = self.participants.drain(..).collect();
        for participant in &kicked {
            fanout.kick(participant);
        }
        let mut removed = kicked.len();
        self.headcount -= kicked.len() as u64;
        if recursive {
            let dims: Vec<Dimension> = self.dims.keys().cloned().collect();
            for dim in &dims {
                removed += self.with_child(dim, |child| child.kick_local(true, fanout));
            }
        }
        removed
    }
}

impl ContextView for AEther {
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

impl fmt::Debug for AEther {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AEther")
            .field("content", &self.canonical())
            .field("headcount", &self.headcount)
            .finish()
    }
}
