//! Tunable limits for the compile driver (§4.9, §10.3).

use pc_tokens::TokenEstimator;
use std::sync::Arc;

/// Defaults mirror `pc-reconciler::ReconcileOptions`: 10 retries, a
/// render-count warning at 10, and 10 compile iterations before
/// `compile_until_stable` forces stability.
#[derive(Clone)]
pub struct CompilerOptions {
    /// Max `compile_until_stable` iterations before forcing stability (§7).
    pub max_iterations: u32,
    /// Max retries for a composite stuck returning `Pending` (§4.3).
    pub max_suspend_retries: u32,
    /// Render-count-per-composite threshold that triggers a loop warning (§4.4).
    pub render_count_warn_threshold: u32,
    /// Token estimator used by the annotation pass; `None` skips
    /// annotation entirely (§4.8, §8 invariant 8).
    pub token_estimator: Option<Arc<dyn TokenEstimator>>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_suspend_retries: 10,
            render_count_warn_threshold: 10,
            token_estimator: None,
        }
    }
}

impl CompilerOptions {
    /// Set the max `compile_until_stable` iteration count.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the max suspend-retry count passed to the reconciler.
    pub fn with_max_suspend_retries(mut self, max_suspend_retries: u32) -> Self {
        self.max_suspend_retries = max_suspend_retries;
        self
    }

    /// Set the render-count warning threshold passed to the reconciler.
    pub fn with_render_count_warn_threshold(mut self, render_count_warn_threshold: u32) -> Self {
        self.render_count_warn_threshold = render_count_warn_threshold;
        self
    }

    /// Enable token annotation with the given estimator.
    pub fn with_token_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.token_estimator = Some(Arc::new(estimator));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reconcile_options_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.max_iterations, 10);
        assert_eq!(options.max_suspend_retries, 10);
        assert_eq!(options.render_count_warn_threshold, 10);
        assert!(options.token_estimator.is_none());
    }

    #[test]
    fn with_token_estimator_enables_annotation() {
        let options = CompilerOptions::default().with_token_estimator(pc_tokens::DefaultEstimator);
        assert!(options.token_estimator.is_some());
    }
}
