//! Pure planning step: desired + observed in, operations out. No I/O.

use std::fmt;

use crate::types::{DesiredConfig, InstanceState, ObservedState, VmStatus};

/// A single provider operation the executor knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Start,
    Stop,
    Restart,
    UpdateMetadata,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("CREATE"),
            Self::Start => f.write_str("START"),
            Self::Stop => f.write_str("STOP"),
            Self::Restart => f.write_str("RESTART"),
            Self::UpdateMetadata => f.write_str("UPDATE_METADATA"),
        }
    }
}

/// Ordered operations that converge observed state to desired state.
/// The empty plan means nothing to do. Derived fresh each run, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub ops: Vec<Op>,
}

impl Plan {
    pub fn none() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn is_none(&self) -> bool {
        self.ops.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for op in &self.ops {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{op}")?;
            first = false;
        }
        Ok(())
    }
}

/// Compute the minimal operation sequence for one desired/observed pair.
///
/// A transitional observed status (STARTING, STOPPING) always yields the
/// empty plan: a competing operation is never issued while a transition is
/// in flight. The caller backs off and re-queries.
pub fn reconcile(desired: &DesiredConfig, observed: &ObservedState) -> Plan {
    let ops = match (&observed.status, desired.instance_state) {
        (VmStatus::NotFound, InstanceState::Running) => vec![Op::Create],
        (VmStatus::NotFound, InstanceState::Terminated) => vec![Op::Create, Op::Stop],
        (VmStatus::Running, InstanceState::Running) => vec![],
        (VmStatus::Running, InstanceState::Terminated) => vec![Op::Stop],
        (VmStatus::Terminated, InstanceState::Terminated) => vec![],
        (VmStatus::Terminated, InstanceState::Running) => vec![Op::Start],
        (VmStatus::Starting | VmStatus::Stopping, _) => vec![],
        // An unrecognized status is treated like a transition: observe,
        // don't act.
        (VmStatus::Other(_), _) => vec![],
    };
    Plan { ops }
}

/// Planner for the `create` command: the base plan, plus a metadata refresh
/// when the instance already exists in a settled state. Re-running create
/// against a live instance then reconverges labels instead of failing.
pub fn reconcile_for_create(desired: &DesiredConfig, observed: &ObservedState) -> Plan {
    let mut plan = reconcile(desired, observed);
    if observed.exists && !observed.status.is_transitional() {
        plan.ops.push(Op::UpdateMetadata);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MachineType, OsChoice, Region};

    fn desired(state: InstanceState) -> DesiredConfig {
        DesiredConfig {
            project_id: "demo-project".into(),
            region: Region::UsCentral1,
            zone: None,
            vm_name: "demo-vm".into(),
            machine_type: MachineType::E2Micro,
            os_choice: OsChoice::Ubuntu,
            disk_size_gb: 20,
            enable_http_server: true,
            enable_monitoring: false,
            instance_state: state,
            preemptible: false,
            auto_restart: true,
            auto_start: true,
        }
    }

    fn observed(status: VmStatus) -> ObservedState {
        ObservedState {
            exists: status != VmStatus::NotFound,
            status,
            external_ip: None,
            internal_ip: None,
            instance_id: None,
            self_link: None,
        }
    }

    #[test]
    fn decision_table() {
        let cases = [
            (VmStatus::NotFound, InstanceState::Running, vec![Op::Create]),
            (
                VmStatus::NotFound,
                InstanceState::Terminated,
                vec![Op::Create, Op::Stop],
            ),
            (VmStatus::Running, InstanceState::Running, vec![]),
            (VmStatus::Running, InstanceState::Terminated, vec![Op::Stop]),
            (VmStatus::Terminated, InstanceState::Terminated, vec![]),
            (VmStatus::Terminated, InstanceState::Running, vec![Op::Start]),
        ];
        for (status, state, ops) in cases {
            let plan = reconcile(&desired(state), &observed(status.clone()));
            assert_eq!(plan.ops, ops, "status {status}, desired {state}");
        }
    }

    #[test]
    fn transitional_status_yields_none() {
        for status in [VmStatus::Starting, VmStatus::Stopping] {
            for state in [InstanceState::Running, InstanceState::Terminated] {
                assert!(reconcile(&desired(state), &observed(status.clone())).is_none());
            }
        }
    }

    #[test]
    fn unknown_status_yields_none() {
        let plan = reconcile(
            &desired(InstanceState::Running),
            &observed(VmStatus::Other("REPAIRING".into())),
        );
        assert!(plan.is_none());
    }

    #[test]
    fn create_before_stop_for_absent_terminated() {
        let plan = reconcile(
            &desired(InstanceState::Terminated),
            &observed(VmStatus::NotFound),
        );
        assert_eq!(plan.ops, vec![Op::Create, Op::Stop]);
    }

    #[test]
    fn reconcile_is_deterministic() {
        let d = desired(InstanceState::Terminated);
        let o = observed(VmStatus::Running);
        let first = reconcile(&d, &o);
        for _ in 0..10 {
            assert_eq!(reconcile(&d, &o), first);
        }
    }

    #[test]
    fn matching_states_are_idempotent() {
        // Reconciling twice against an unchanged provider state gives NONE
        // both times.
        let d = desired(InstanceState::Running);
        let o = observed(VmStatus::Running);
        assert!(reconcile(&d, &o).is_none());
        assert!(reconcile(&d, &o).is_none());
    }

    #[test]
    fn create_path_refreshes_metadata_on_existing() {
        let plan = reconcile_for_create(
            &desired(InstanceState::Running),
            &observed(VmStatus::Running),
        );
        assert_eq!(plan.ops, vec![Op::UpdateMetadata]);

        // Missing instance: plain create, no metadata op.
        let plan = reconcile_for_create(
            &desired(InstanceState::Running),
            &observed(VmStatus::NotFound),
        );
        assert_eq!(plan.ops, vec![Op::Create]);

        // In-flight transition: hands off entirely.
        let plan = reconcile_for_create(
            &desired(InstanceState::Running),
            &observed(VmStatus::Stopping),
        );
        assert!(plan.is_none());
    }

    #[test]
    fn plan_display() {
        assert_eq!(Plan::none().to_string(), "NONE");
        let plan = Plan {
            ops: vec![Op::Create, Op::Stop],
        };
        assert_eq!(plan.to_string(), "CREATE, STOP");
    }
}
