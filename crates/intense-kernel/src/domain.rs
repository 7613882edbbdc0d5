//! Best-fit resolution over a set of context versions.
//!
//! A domain holds candidate contexts ("versions"). Given a request, the
//! versions that refine to it survive; the best fit is the survivor every
//! other survivor refines to. When no such survivor exists, the near fits are
//! the maximal survivors under refinement.

use crate::context::Context;
use crate::error::{IntenseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of resolving a request against a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Best { context: Context },
    Near { contexts: Vec<Context> },
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextDomain {
    versions: BTreeSet<Context>,
}

/// Result of the single scan: a provisional best and the survivors that were
/// not yet shown to refine to it.
struct Scan<'a> {
    best: &'a Context,
    seconds: Vec<&'a Context>,
}

impl ContextDomain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version. Returns false if an equal version was already present.
    pub fn insert(&mut self, version: Context) -> bool {
        self.versions.insert(version)
    }

    /// Swap `old` for `new`. Returns false (and leaves the domain unchanged)
    /// if `old` is not present.
    pub fn replace(&mut self, old: &Context, new: Context) -> bool {
        if !self.versions.remove(old) {
            return false;
        }
        self.versions.insert(new);
        true
    }

    pub fn remove(&mut self, version: &Context) -> bool {
        self.versions.remove(version)
    }

    pub fn contains(&self, version: &Context) -> bool {
        self.versions.contains(version)
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.versions.iter()
    }

    fn scan(&self, requested: &Context) -> Option<Scan<'_>> {
        let mut survivors = self.versions.iter().filter(|v| v.refines_to(requested));
        let mut scan = Scan {
            best: survivors.next()?,
            seconds: Vec::new(),
        };
        for version in survivors {
            if scan.best.refines_to(version) {
                let previous = std::mem::replace(&mut scan.best, version);
                scan.seconds.push(previous);
            } else if !version.refines_to(scan.best) {
                scan.seconds.push(version);
            }
        }
        Some(scan)
    }

    /// The unique best fit for `requested`, if there is one.
    pub fn best(&self, requested: &Context) -> Option<&Context> {
        let scan = self.scan(requested)?;
        let unique = scan.seconds.iter().all(|c| c.refines_to(scan.best));
        unique.then_some(scan.best)
    }

    /// Like [`best`](Self::best), but a missing best fit is an error.
    pub fn require_best(&self, requested: &Context) -> Result<&Context> {
        self.best(requested).ok_or_else(|| {
            IntenseError::Resolution(format!("no unique best fit for {requested}"))
        })
    }

    /// The unique best fit alone if it exists, otherwise every survivor that
    /// is not strictly below another survivor.
    pub fn near(&self, requested: &Context) -> Vec<&Context> {
        let Some(scan) = self.scan(requested) else {
            return Vec::new();
        };
        if scan.seconds.iter().all(|c| c.refines_to(scan.best)) {
            return vec![scan.best];
        }

        let mut candidates = scan.seconds;
        candidates.push(scan.best);
        candidates.sort();
        candidates
            .iter()
            .copied()
            .filter(|c| {
                !candidates
                    .iter()
                    .any(|d| c.refines_to(d) && !d.refines_to(c))
            })
            .collect()
    }

    pub fn resolve(&self, requested: &Context) -> Resolution {
        let resolution = match self.best(requested) {
            Some(best) => Resolution::Best {
                context: best.clone(),
            },
            None => {
                let near = self.near(requested);
                if near.is_empty() {
                    Resolution::None
                } else {
                    Resolution::Near {
                        contexts: near.into_iter().cloned().collect(),
                    }
                }
            }
        };
        tracing::debug!(
            requested = %requested,
            versions = self.versions.len(),
            outcome = ?resolution,
            "resolved request"
        );
        resolution
    }
}

impl FromIterator<Context> for ContextDomain {
    fn from_iter<I: IntoIterator<Item = Context>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

impl Extend<Context> for ContextDomain {
    fn extend<I: IntoIterator<Item = Context>>(&mut self, iter: I) {
        self.versions.extend(iter);
    }
}
