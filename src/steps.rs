//! Ordered convergence steps
//!
//! A convergence pass is a fixed list of steps, each bringing one dependent
//! into existence. Steps are lazily evaluated futures: [`run_in_order`] polls
//! them one at a time and stops at the first step that created something,
//! found a kind not yet served, or failed. Steps past the stopping point are
//! dropped without being polled, so they never touch the API server.

use std::fmt;

use futures::future::BoxFuture;
use tracing::debug;

use crate::Error;

/// Position in the convergence sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Target namespace exists and is active
    EnsuringNamespace,
    /// OperatorGroup exists in the target namespace
    EnsuringOperatorGroup,
    /// OLM Subscription exists
    EnsuringSubscription,
    /// CheCluster watch is registered
    RegisteringWatch,
    /// Workload custom resource (CheCluster) exists
    EnsuringWorkload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::EnsuringNamespace => "ensure namespace",
            Stage::EnsuringOperatorGroup => "ensure operator group",
            Stage::EnsuringSubscription => "ensure subscription",
            Stage::RegisteringWatch => "register CheCluster watch",
            Stage::EnsuringWorkload => "ensure CheCluster",
        };
        f.write_str(s)
    }
}

/// Result of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Already in the desired state, continue with the next step
    Satisfied,
    /// Created a dependent; the pass ends and is requeued
    Created,
    /// The kind the step needs is not served yet; poll again later
    AwaitingKind,
}

impl StepOutcome {
    /// Outcome of an ensurer call (`true` when it created the object)
    pub fn from_created(created: bool) -> Self {
        if created {
            StepOutcome::Created
        } else {
            StepOutcome::Satisfied
        }
    }
}

/// A stage paired with the deferred work that converges it
pub struct Step<'a> {
    stage: Stage,
    run: BoxFuture<'a, Result<StepOutcome, Error>>,
}

impl<'a> Step<'a> {
    /// Create a step. `run` is not polled until the step is reached.
    pub fn new<F>(stage: Stage, run: F) -> Self
    where
        F: std::future::Future<Output = Result<StepOutcome, Error>> + Send + 'a,
    {
        Self {
            stage,
            run: Box::pin(run),
        }
    }

    /// Stage this step converges
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

/// How far a pass got
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Every step reported `Satisfied`
    Converged,
    /// A step created its dependent
    Created {
        /// Stage that created something
        stage: Stage,
    },
    /// A step is waiting for its kind to be registered
    AwaitingKind {
        /// Stage that is waiting
        stage: Stage,
    },
}

/// Run steps in order, stopping at the first one that did not report
/// `Satisfied`.
///
/// A failing step's error is wrapped with its stage and `namespace`.
pub async fn run_in_order(namespace: &str, steps: Vec<Step<'_>>) -> Result<Progress, Error> {
    for step in steps {
        let stage = step.stage();
        match step.run.await {
            Ok(StepOutcome::Satisfied) => {
                debug!(%stage, %namespace, "step satisfied");
            }
            Ok(StepOutcome::Created) => return Ok(Progress::Created { stage }),
            Ok(StepOutcome::AwaitingKind) => return Ok(Progress::AwaitingKind { stage }),
            Err(e) => return Err(e.in_stage(stage, namespace)),
        }
    }
    Ok(Progress::Converged)
}
