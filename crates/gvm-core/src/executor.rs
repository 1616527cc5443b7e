//! Runs reconciliation plans against a provider and keeps the local record
//! in step with confirmed provider state.
//!
//! The record is only rewritten after the provider reports an operation as
//! complete; a failed or interrupted operation leaves it untouched. That
//! replaces the original scripts' edit-the-file-then-hope pattern, which
//! could leave the record claiming a state the provider never reached.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::provider::VmProvider;
use crate::reconcile::{Op, Plan, reconcile_for_create};
use crate::record;
use crate::types::{DesiredConfig, InstanceState, ObservedState, VmStatus};
use crate::{Error, Result};

pub struct Executor {
    provider: Arc<dyn VmProvider>,
    record_path: PathBuf,
}

impl Executor {
    pub fn new(provider: Arc<dyn VmProvider>, record_path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            record_path: record_path.into(),
        }
    }

    /// Current provider-reported state. No side effects; NOT_FOUND is a
    /// valid answer, not an error.
    pub async fn status(&self, desired: &DesiredConfig) -> Result<ObservedState> {
        self.provider.get_instance(&desired.vm_ref()).await
    }

    /// Converge toward the declared configuration: create if absent, fix
    /// the power state if it drifted, refresh metadata if it already
    /// exists. Safe to re-run.
    pub async fn create(&self, desired: &DesiredConfig) -> Result<ObservedState> {
        let observed = self.provider.get_instance(&desired.vm_ref()).await?;

        if observed.status.is_transitional() {
            return Err(Error::Conflict(format!(
                "instance is {}; wait for the transition to settle and re-run",
                observed.status
            )));
        }

        let plan = reconcile_for_create(desired, &observed);
        if plan.is_none() {
            info!(vm = %desired.vm_name, "nothing to do");
            return Ok(observed);
        }

        info!(vm = %desired.vm_name, plan = %plan, "applying plan");
        self.apply(&plan, desired).await
    }

    /// Execute a plan's operations in order, then return a fresh snapshot.
    ///
    /// A confirmed START or STOP commits the new `instance_state` to the
    /// record before the next operation runs; any error aborts the rest of
    /// the plan with the record reflecting only what actually happened.
    pub async fn apply(&self, plan: &Plan, desired: &DesiredConfig) -> Result<ObservedState> {
        let vm = desired.vm_ref();

        for op in &plan.ops {
            match op {
                Op::Create => {
                    // Firewall first so the tag is effective the moment the
                    // instance comes up. Skipped entirely when HTTP is off.
                    if desired.enable_http_server {
                        self.provider.ensure_firewall_rule(desired).await?;
                    }
                    self.provider.create_instance(desired).await?;
                }
                Op::Start => {
                    self.provider.start_instance(&vm).await?;
                    self.commit_state(desired, InstanceState::Running)?;
                }
                Op::Stop => {
                    self.provider.stop_instance(&vm).await?;
                    self.commit_state(desired, InstanceState::Terminated)?;
                }
                Op::Restart => {
                    self.provider.reset_instance(&vm).await?;
                }
                Op::UpdateMetadata => {
                    self.provider.update_metadata(desired).await?;
                }
            }
        }

        self.provider.get_instance(&vm).await
    }

    pub async fn start(&self, desired: &DesiredConfig) -> Result<ObservedState> {
        let vm = desired.vm_ref();
        let observed = self.provider.get_instance(&vm).await?;

        if !observed.exists {
            return Err(Error::NotFound(format!(
                "instance {} does not exist; run create first",
                vm.name
            )));
        }
        if observed.status.is_transitional() {
            return Err(Error::Conflict(format!("instance is {}", observed.status)));
        }
        if observed.status == VmStatus::Running {
            warn!(vm = %vm.name, "instance is already running");
            return Ok(observed);
        }

        self.apply(&Plan { ops: vec![Op::Start] }, desired).await
    }

    pub async fn stop(&self, desired: &DesiredConfig) -> Result<ObservedState> {
        let vm = desired.vm_ref();
        let observed = self.provider.get_instance(&vm).await?;

        if !observed.exists {
            return Err(Error::NotFound(format!(
                "instance {} does not exist",
                vm.name
            )));
        }
        if observed.status.is_transitional() {
            return Err(Error::Conflict(format!("instance is {}", observed.status)));
        }
        if observed.status == VmStatus::Terminated {
            warn!(vm = %vm.name, "instance is already stopped");
            return Ok(observed);
        }

        self.apply(&Plan { ops: vec![Op::Stop] }, desired).await
    }

    /// Hard reset. Leaves the declared state alone: a restarted running
    /// instance is still RUNNING.
    pub async fn restart(&self, desired: &DesiredConfig) -> Result<ObservedState> {
        let vm = desired.vm_ref();
        let observed = self.provider.get_instance(&vm).await?;

        if !observed.exists {
            return Err(Error::NotFound(format!(
                "instance {} does not exist",
                vm.name
            )));
        }
        if observed.status.is_transitional() {
            return Err(Error::Conflict(format!("instance is {}", observed.status)));
        }

        self.apply(&Plan { ops: vec![Op::Restart] }, desired).await
    }

    /// Delete the instance. Already-absent instances are a no-op success.
    pub async fn destroy(&self, desired: &DesiredConfig) -> Result<()> {
        self.provider.delete_instance(&desired.vm_ref()).await
    }

    fn commit_state(&self, desired: &DesiredConfig, state: InstanceState) -> Result<()> {
        let mut applied = desired.clone();
        applied.instance_state = state;
        record::save(&self.record_path, &applied)
    }
}
