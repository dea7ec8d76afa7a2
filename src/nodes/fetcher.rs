//! Expression-driven selection.
//!
//! [`Fetcher`] runs an `XPath` expression against the members of a node-set
//! and post-processes the result: per-context reversal, a keep filter, a
//! stop condition, and document-order de-duplication.

use tracing::trace;

use crate::error::{Error, Result};
use crate::tree::{Node, NodeId};
use crate::xpath::XPathValue;

use super::Nodes;

/// Predicate over a candidate node and its index within one context's
/// result list.
pub type NodePredicate<'f> = &'f dyn Fn(&Node, usize) -> bool;

/// Options for [`Fetcher::fetch`]. All flags default to `false`.
///
/// ```
/// use fluentxml::FetchOptions;
///
/// let opts = FetchOptions::default().reverse().include_stop();
/// assert!(opts.reverse && opts.include_stop && !opts.unique);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FetchOptions {
    /// Reverse each context's result before filtering.
    pub reverse: bool,
    /// Keep the node that triggered the stop condition (if it passes the
    /// filter).
    pub include_stop: bool,
    /// De-duplicate and sort the result when there are several contexts.
    pub unique: bool,
    /// Evaluate once against the document instead of per member.
    pub ignore_context: bool,
    /// Always de-duplicate and sort the result.
    pub force_sort: bool,
}

impl FetchOptions {
    /// Sets [`FetchOptions::reverse`].
    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Sets [`FetchOptions::include_stop`].
    #[must_use]
    pub fn include_stop(mut self) -> Self {
        self.include_stop = true;
        self
    }

    /// Sets [`FetchOptions::unique`].
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets [`FetchOptions::ignore_context`].
    #[must_use]
    pub fn ignore_context(mut self) -> Self {
        self.ignore_context = true;
        self
    }

    /// Sets [`FetchOptions::force_sort`].
    #[must_use]
    pub fn force_sort(mut self) -> Self {
        self.force_sort = true;
        self
    }
}

/// Runs selections on behalf of a node-set.
#[derive(Debug, Clone, Copy)]
pub struct Fetcher<'a> {
    nodes: &'a Nodes,
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher for the members of `nodes`.
    #[must_use]
    pub fn new(nodes: &'a Nodes) -> Self {
        Self { nodes }
    }

    /// Evaluates `expression` and filters the result.
    ///
    /// Absolute expressions (starting with `/`) and
    /// [`FetchOptions::ignore_context`] evaluate once against the document.
    /// Otherwise the expression runs once per member, in member order, and
    /// the per-member results are concatenated.
    ///
    /// For each candidate, `filter` decides whether it is kept and
    /// `stop_at` whether scanning of the current context ends there. The
    /// callbacks run with no borrow of the document held.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidExpression`] for an empty expression
    /// - [`Error::NotANodeSet`] if the expression yields a scalar
    /// - [`Error::XPath`] if the expression is malformed
    pub fn fetch(
        &self,
        expression: &str,
        filter: Option<NodePredicate<'_>>,
        stop_at: Option<NodePredicate<'_>>,
        options: FetchOptions,
    ) -> Result<Vec<NodeId>> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidExpression);
        }
        let contexts: Vec<Option<NodeId>> = if options.ignore_context || trimmed.starts_with('/')
        {
            vec![None]
        } else {
            self.nodes.ids().iter().copied().map(Some).collect()
        };

        let mut result = Vec::new();
        for context in contexts {
            let mut found = self.evaluate(expression, context)?;
            if options.reverse {
                found.reverse();
            }
            trace!(expression, ?context, found = found.len(), "fetch");
            for (index, id) in found.into_iter().enumerate() {
                let node = self.nodes.document().node(id);
                let keep = filter.map_or(true, |f| f(&node, index));
                if stop_at.is_some_and(|f| f(&node, index)) {
                    if keep && options.include_stop {
                        result.push(id);
                    }
                    break;
                }
                if keep {
                    result.push(id);
                }
            }
        }

        if options.force_sort || (self.nodes.len() > 1 && options.unique) {
            result = self.nodes.unique(&result)?;
        }
        Ok(result)
    }

    fn evaluate(&self, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
        match self.nodes.evaluate(expression, context)? {
            XPathValue::NodeSet(ids) => Ok(ids),
            other => Err(Error::NotANodeSet {
                expression: expression.to_string(),
                found: other.type_name(),
            }),
        }
    }
}
