#![deny(missing_docs)]
//! Default in-process sequential [`EffectRunner`] (§4.5 "Commit / Effect Engine").
//!
//! Creates run one at a time, in the order `pc-effects-core::order_creates`
//! already established, awaiting each before starting the next (§4.5,
//! "they await in sequence, not parallel"). A create that fails is
//! logged with its phase and debug label and does not stop the batch
//! (§7 "Effect error").

use pc_effects_core::{EffectError, EffectOutcome, EffectRunner, PendingDestroy, PendingEffect};
use std::future::Future;
use std::pin::Pin;

/// The default effect runner: awaits every create/destroy sequentially
/// in the current task.
#[derive(Debug, Default)]
pub struct SequentialEffectRunner;

impl SequentialEffectRunner {
    /// Construct a new sequential runner. Stateless — every call to
    /// `run_creates`/`run_destroys` is independent.
    pub fn new() -> Self {
        Self
    }
}

impl EffectRunner for SequentialEffectRunner {
    fn run_creates<'a>(
        &'a self,
        effects: Vec<PendingEffect>,
    ) -> Pin<Box<dyn Future<Output = Vec<EffectOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let mut outcomes = Vec::with_capacity(effects.len());
            for effect in effects {
                let span = tracing::debug_span!(
                    "effect_create",
                    fiber = %effect.fiber_id,
                    debug_name = %effect.debug_name,
                    phase = ?effect.phase,
                );
                let _entered = span.enter();
                match effect.future.await {
                    Ok(cleanup) => outcomes.push(EffectOutcome::Ok(cleanup)),
                    Err(err) => {
                        let message = err.to_string();
                        tracing::error!(
                            fiber = %effect.fiber_id,
                            debug_name = %effect.debug_name,
                            phase = ?effect.phase,
                            %message,
                            "effect create failed"
                        );
                        outcomes.push(EffectOutcome::Failed(EffectError::CreateFailed {
                            fiber: effect.fiber_id,
                            debug_name: effect.debug_name,
                            phase: effect.phase,
                            message,
                        }));
                    }
                }
            }
            outcomes
        })
    }

    fn run_destroys<'a>(
        &'a self,
        destroys: Vec<PendingDestroy>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            for destroy in destroys {
                tracing::debug!(
                    fiber = %destroy.fiber_id,
                    debug_name = %destroy.debug_name,
                    "running effect cleanup"
                );
                (destroy.cleanup)().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::EffectPhase;
    use pc_core::FiberId;

    fn create_ok(preorder: u64) -> PendingEffect {
        PendingEffect {
            fiber_id: FiberId(0),
            debug_name: "comp".into(),
            phase: EffectPhase::Mount,
            preorder,
            future: Box::pin(async { Ok(None) }),
        }
    }

    fn create_failing(preorder: u64) -> PendingEffect {
        PendingEffect {
            fiber_id: FiberId(1),
            debug_name: "broken".into(),
            phase: EffectPhase::Mount,
            preorder,
            future: Box::pin(async { Err("boom".into()) }),
        }
    }

    #[tokio::test]
    async fn failing_create_does_not_stop_the_batch() {
        let runner = SequentialEffectRunner::new();
        let outcomes = runner
            .run_creates(vec![create_failing(0), create_ok(1)])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], EffectOutcome::Failed(_)));
        assert!(matches!(outcomes[1], EffectOutcome::Ok(_)));
    }
}
