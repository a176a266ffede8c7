//! Hierarchical weighted progress reporting with cooperative cancellation.
//!
//! A [`ProgressNode`] is declared a fixed number of weighted steps
//! (`begin`), each of which may itself be a [`ProgressNode`] (`get_child`).
//! Completing a step (`done`) advances the parent's percentage by that
//! step's share of the total weight. The tree always sums to 100% once the
//! root is fully `done`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("node has not been begun")]
    NotBegun,
    #[error("node has already completed all of its steps")]
    Overflow,
    #[error("operation was cancelled")]
    Cancelled,
}

/// Shared, cheaply cloneable cancellation flag. Checked cooperatively by
/// long-running operations between steps; nothing here preempts a thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Fresh,
    Begun,
    Completed,
}

/// A point-in-time sub-action within a step, reported for UI purposes only
/// (it does not affect percent calculation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Downloading,
    Checking,
    Spawning,
    Writing,
    Loading,
    Parsing,
}

/// A node in the progress tree. Each node is declared a list of step
/// weights via [`ProgressNode::begin`]; each step may be subdivided further
/// via [`ProgressNode::get_child`].
pub struct ProgressNode {
    state: NodeState,
    weights: Vec<u32>,
    current_step: usize,
    children: Vec<Option<ProgressNode>>,
    action: Option<ActionKind>,
    cancel: CancelToken,
}

impl ProgressNode {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            state: NodeState::Fresh,
            weights: Vec::new(),
            current_step: 0,
            children: Vec::new(),
            action: None,
            cancel,
        }
    }

    pub fn root() -> Self {
        Self::new(CancelToken::new())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Declare this node's steps and their relative weights. Weights need
    /// not sum to 100 — they are normalized against their own total.
    pub fn begin(&mut self, weights: &[u32]) -> Result<(), ProgressError> {
        if self.cancel.is_cancelled() {
            return Err(ProgressError::Cancelled);
        }
        self.state = NodeState::Begun;
        self.weights = weights.to_vec();
        self.current_step = 0;
        self.children = (0..weights.len()).map(|_| None).collect();
        Ok(())
    }

    /// Obtain (creating if necessary) the child node for the step at
    /// `index`, inheriting this node's cancellation token.
    pub fn get_child(&mut self, index: usize) -> Result<&mut ProgressNode, ProgressError> {
        if self.state != NodeState::Begun {
            return Err(ProgressError::NotBegun);
        }
        if index >= self.weights.len() {
            return Err(ProgressError::Overflow);
        }
        if self.children[index].is_none() {
            self.children[index] = Some(ProgressNode::new(self.cancel.clone()));
        }
        Ok(self.children[index].as_mut().unwrap())
    }

    /// Complete the current step and advance. Once every step is done the
    /// node transitions to [`NodeState::Completed`].
    pub fn done(&mut self) -> Result<(), ProgressError> {
        if self.cancel.is_cancelled() {
            return Err(ProgressError::Cancelled);
        }
        if self.state != NodeState::Begun {
            return Err(ProgressError::NotBegun);
        }
        if self.current_step >= self.weights.len() {
            return Err(ProgressError::Overflow);
        }
        self.current_step += 1;
        if self.current_step == self.weights.len() {
            self.state = NodeState::Completed;
        }
        Ok(())
    }

    pub fn action_start(&mut self, kind: ActionKind) {
        self.action = Some(kind);
    }

    pub fn action_stop(&mut self) {
        self.action = None;
    }

    pub fn current_action(&self) -> Option<ActionKind> {
        self.action
    }

    /// Reset this node back to [`NodeState::Fresh`], dropping all children.
    pub fn reset(&mut self) {
        self.state = NodeState::Fresh;
        self.weights.clear();
        self.current_step = 0;
        self.children.clear();
        self.action = None;
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A node is valid if its internal bookkeeping is self-consistent:
    /// the current step never exceeds the declared step count and the
    /// child vector always matches the declared weight count.
    pub fn valid(&self) -> bool {
        self.current_step <= self.weights.len() && self.children.len() == self.weights.len()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Overall completion percentage of this node, 0-100, accounting for
    /// partial progress of the currently active child.
    pub fn percent(&self) -> u8 {
        match self.state {
            NodeState::Fresh => 0,
            NodeState::Completed => 100,
            NodeState::Begun => {
                let total: u64 = self.weights.iter().map(|w| *w as u64).sum();
                if total == 0 {
                    return 0;
                }
                let completed_weight: u64 =
                    self.weights[..self.current_step].iter().map(|w| *w as u64).sum();
                let mut fraction_numer = completed_weight * 100;
                if self.current_step < self.weights.len() {
                    let active_weight = self.weights[self.current_step] as u64;
                    let child_percent = self.children[self.current_step]
                        .as_ref()
                        .map(|c| c.percent() as u64)
                        .unwrap_or(0);
                    fraction_numer += active_weight * child_percent;
                }
                (fraction_numer / total).min(100) as u8
            }
        }
    }
}
