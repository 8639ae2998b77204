//! Deferred callbacks that run once a variable's gradient is known.
//!
//! A hook subscribes to a [`VariableId`]; whoever drives the backward pass
//! takes the hooks for that id and runs them with the gradient. Taking a
//! subscription removes it, so every hook runs at most once.

use std::collections::HashMap;

use ndarray::ArrayViewD;

use crate::error::MetricsError;
use crate::variable::VariableId;

/// Callback receiving a context (usually the metrics session) and the gradient
pub type GradientHook<C> =
    Box<dyn FnOnce(&mut C, ArrayViewD<'_, f32>) -> Result<(), MetricsError>>;

pub struct GradientHooks<C> {
    hooks: HashMap<VariableId, Vec<GradientHook<C>>>,
}

impl<C> Default for GradientHooks<C> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<C> GradientHooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, id: VariableId, hook: F)
    where
        F: FnOnce(&mut C, ArrayViewD<'_, f32>) -> Result<(), MetricsError> + 'static,
    {
        self.hooks.entry(id).or_default().push(Box::new(hook));
    }

    /// Removes and returns every hook subscribed to `id`, in subscription order
    pub fn take(&mut self, id: VariableId) -> Vec<GradientHook<C>> {
        self.hooks.remove(&id).unwrap_or_default()
    }

    pub fn is_subscribed(&self, id: VariableId) -> bool {
        self.hooks.contains_key(&id)
    }

    /// Number of hooks that have not fired yet
    pub fn pending(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Drops all subscriptions, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending();
        self.hooks.clear();
        dropped
    }
}

/// Runs `hooks` against `ctx`. Every hook runs even if an earlier one fails;
/// the first error is returned.
pub fn fire_all<C>(
    ctx: &mut C,
    hooks: Vec<GradientHook<C>>,
    grad: ArrayViewD<'_, f32>,
) -> Result<usize, MetricsError> {
    let mut fired = 0;
    let mut first_error = None;
    for hook in hooks {
        fired += 1;
        if let Err(e) = hook(&mut *ctx, grad.view()) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(fired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;
    use ndarray::array;

    #[test]
    fn test_hook_fires_once() {
        let x = Variable::with_grad(array![1.0f32, 2.0]);
        let mut hooks: GradientHooks<Vec<f32>> = GradientHooks::new();
        hooks.subscribe(x.id(), |seen, grad| {
            seen.extend(grad.iter().copied());
            Ok(())
        });
        assert_eq!(hooks.pending(), 1);
        assert!(hooks.is_subscribed(x.id()));

        let grad = array![0.5f32, -0.5].into_dyn();
        let mut seen = Vec::new();
        let taken = hooks.take(x.id());
        assert_eq!(fire_all(&mut seen, taken, grad.view()).unwrap(), 1);
        assert_eq!(seen, vec![0.5, -0.5]);

        // Auto-unsubscribed after firing
        assert_eq!(hooks.pending(), 0);
        assert!(hooks.take(x.id()).is_empty());
    }

    #[test]
    fn test_hooks_keyed_by_identity() {
        let a = Variable::with_grad(array![1.0f32]);
        let b = Variable::with_grad(array![1.0f32]);
        let mut hooks: GradientHooks<Vec<&'static str>> = GradientHooks::new();
        hooks.subscribe(a.id(), |log, _grad| {
            log.push("a");
            Ok(())
        });
        hooks.subscribe(b.id(), |log, _grad| {
            log.push("b");
            Ok(())
        });

        let grad = array![1.0f32].into_dyn();
        let mut log = Vec::new();
        let taken = hooks.take(b.id());
        fire_all(&mut log, taken, grad.view()).unwrap();
        assert_eq!(log, vec!["b"]);
        assert!(hooks.is_subscribed(a.id()));
        assert_eq!(hooks.clear(), 1);
        assert_eq!(hooks.pending(), 0);
    }

    #[test]
    fn test_fire_all_runs_every_hook_and_reports_first_error() {
        let x = Variable::with_grad(array![1.0f32]);
        let mut hooks: GradientHooks<usize> = GradientHooks::new();
        hooks.subscribe(x.id(), |_count, _grad| {
            Err(MetricsError::InvalidKey("first".to_string()))
        });
        hooks.subscribe(x.id(), |count, _grad| {
            *count += 1;
            Ok(())
        });

        let grad = array![1.0f32].into_dyn();
        let mut count = 0;
        let taken = hooks.take(x.id());
        let err = fire_all(&mut count, taken, grad.view()).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidKey(ref k) if k == "first"));
        assert_eq!(count, 1);
    }
}
