use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Fully-qualified reference to one VM: project, zone, name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub project: String,
    pub zone: String,
    pub name: String,
}

/// Machine shapes the tool will provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineType {
    F1Micro,
    E2Micro,
    E2Small,
    E2Medium,
    N1Standard1,
    N1Standard2,
    N2Standard2,
}

impl MachineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F1Micro => "f1-micro",
            Self::E2Micro => "e2-micro",
            Self::E2Small => "e2-small",
            Self::E2Medium => "e2-medium",
            Self::N1Standard1 => "n1-standard-1",
            Self::N1Standard2 => "n1-standard-2",
            Self::N2Standard2 => "n2-standard-2",
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f1-micro" => Ok(Self::F1Micro),
            "e2-micro" => Ok(Self::E2Micro),
            "e2-small" => Ok(Self::E2Small),
            "e2-medium" => Ok(Self::E2Medium),
            "n1-standard-1" => Ok(Self::N1Standard1),
            "n1-standard-2" => Ok(Self::N1Standard2),
            "n2-standard-2" => Ok(Self::N2Standard2),
            other => Err(Error::Validation(format!("unknown machine_type: {other}"))),
        }
    }
}

/// Regions the tool will deploy into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    UsCentral1,
    UsEast1,
    UsWest1,
    UsWest2,
    EuropeWest1,
    EuropeWest2,
    AsiaSoutheast1,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsCentral1 => "us-central1",
            Self::UsEast1 => "us-east1",
            Self::UsWest1 => "us-west1",
            Self::UsWest2 => "us-west2",
            Self::EuropeWest1 => "europe-west1",
            Self::EuropeWest2 => "europe-west2",
            Self::AsiaSoutheast1 => "asia-southeast1",
        }
    }

    /// The `-a` zone of this region, used when no zone is declared.
    pub fn default_zone(&self) -> String {
        format!("{}-a", self.as_str())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "us-central1" => Ok(Self::UsCentral1),
            "us-east1" => Ok(Self::UsEast1),
            "us-west1" => Ok(Self::UsWest1),
            "us-west2" => Ok(Self::UsWest2),
            "europe-west1" => Ok(Self::EuropeWest1),
            "europe-west2" => Ok(Self::EuropeWest2),
            "asia-southeast1" => Ok(Self::AsiaSoutheast1),
            other => Err(Error::Validation(format!("unknown region: {other}"))),
        }
    }
}

/// Supported boot OS, each pinned to a fixed source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsChoice {
    Ubuntu,
    Debian,
    Centos,
    Rhel,
}

impl OsChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::Debian => "debian",
            Self::Centos => "centos",
            Self::Rhel => "rhel",
        }
    }

    pub fn image_uri(&self) -> &'static str {
        match self {
            Self::Ubuntu => {
                "projects/ubuntu-os-cloud/global/images/ubuntu-minimal-2504-plucky-amd64-v20250624"
            }
            Self::Debian => "projects/debian-cloud/global/images/family/debian-12",
            Self::Centos => "projects/centos-cloud/global/images/family/centos-stream-9",
            Self::Rhel => "projects/rhel-cloud/global/images/family/rhel-9",
        }
    }
}

impl fmt::Display for OsChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ubuntu" => Ok(Self::Ubuntu),
            "debian" => Ok(Self::Debian),
            "centos" => Ok(Self::Centos),
            "rhel" => Ok(Self::Rhel),
            other => Err(Error::Validation(format!("unknown os_choice: {other}"))),
        }
    }
}

/// Declared power state for the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Running,
    Terminated,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "TERMINATED" => Ok(Self::Terminated),
            other => Err(Error::Validation(format!(
                "unknown instance_state: {other} (expected RUNNING or TERMINATED)"
            ))),
        }
    }
}

/// The operator's declared target configuration for the VM.
///
/// Loaded from the record file, validated once, and never mutated during a
/// reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub project_id: String,
    pub region: Region,
    pub zone: Option<String>,
    pub vm_name: String,
    pub machine_type: MachineType,
    pub os_choice: OsChoice,
    pub disk_size_gb: u32,
    pub enable_http_server: bool,
    pub enable_monitoring: bool,
    pub instance_state: InstanceState,
    pub preemptible: bool,
    pub auto_restart: bool,
    pub auto_start: bool,
}

pub const MIN_DISK_SIZE_GB: u32 = 10;
pub const MAX_DISK_SIZE_GB: u32 = 100;

impl DesiredConfig {
    /// Effective zone: the declared one, or the region's `-a` zone.
    pub fn zone(&self) -> String {
        self.zone
            .clone()
            .unwrap_or_else(|| self.region.default_zone())
    }

    pub fn vm_ref(&self) -> VmRef {
        VmRef {
            project: self.project_id.clone(),
            zone: self.zone(),
            name: self.vm_name.clone(),
        }
    }

    /// Name of the HTTP ingress firewall rule for this VM.
    pub fn firewall_rule_name(&self) -> String {
        format!("{}-allow-http", self.vm_name)
    }

    /// Labels stamped on the instance at create and metadata refresh.
    pub fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("managed-by".into(), "gvm".into()),
            ("os-type".into(), self.os_choice.as_str().into()),
            (
                "instance-state".into(),
                self.instance_state.as_str().to_lowercase(),
            ),
            ("preemptible".into(), self.preemptible.to_string()),
        ])
    }

    /// Range and cross-field checks the enum types cannot express.
    /// Runs at record load, before any provider call.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(Error::Validation("project_id must be set".into()));
        }
        if self.vm_name.is_empty() {
            return Err(Error::Validation("vm_name must be set".into()));
        }
        if !(MIN_DISK_SIZE_GB..=MAX_DISK_SIZE_GB).contains(&self.disk_size_gb) {
            return Err(Error::Validation(format!(
                "disk_size_gb must be between {MIN_DISK_SIZE_GB} and {MAX_DISK_SIZE_GB}, got {}",
                self.disk_size_gb
            )));
        }
        if let Some(zone) = &self.zone
            && !zone.starts_with(&format!("{}-", self.region))
        {
            return Err(Error::Validation(format!(
                "zone {zone} does not belong to region {}",
                self.region
            )));
        }
        Ok(())
    }
}

/// Provider-reported instance status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmStatus {
    Running,
    Terminated,
    Stopping,
    Starting,
    NotFound,
    Other(String),
}

impl VmStatus {
    /// Map a raw Compute Engine status string.
    ///
    /// PROVISIONING and STAGING are the create-side half of STARTING;
    /// STOPPED is the legacy spelling of TERMINATED.
    pub fn from_api(status: &str) -> Self {
        match status {
            "RUNNING" => Self::Running,
            "TERMINATED" | "STOPPED" => Self::Terminated,
            "STOPPING" | "SUSPENDING" => Self::Stopping,
            "STARTING" | "PROVISIONING" | "STAGING" => Self::Starting,
            other => Self::Other(other.to_string()),
        }
    }

    /// STARTING/STOPPING: an operation is in flight, do not act.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::Terminated => f.write_str("TERMINATED"),
            Self::Stopping => f.write_str("STOPPING"),
            Self::Starting => f.write_str("STARTING"),
            Self::NotFound => f.write_str("NOT_FOUND"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Snapshot of the VM as the provider reports it. Fetched fresh at the
/// start of every operation; never cached across commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub exists: bool,
    pub status: VmStatus,
    pub external_ip: Option<String>,
    pub internal_ip: Option<String>,
    pub instance_id: Option<String>,
    pub self_link: Option<String>,
}

impl ObservedState {
    pub fn not_found() -> Self {
        Self {
            exists: false,
            status: VmStatus::NotFound,
            external_ip: None,
            internal_ip: None,
            instance_id: None,
            self_link: None,
        }
    }

    pub fn from_instance(instance: &gce_api::Instance) -> Self {
        Self {
            exists: true,
            status: instance
                .status
                .as_deref()
                .map(VmStatus::from_api)
                .unwrap_or(VmStatus::Other("UNKNOWN".into())),
            external_ip: instance.external_ip().map(str::to_string),
            internal_ip: instance.internal_ip().map(str::to_string),
            instance_id: instance.id.clone(),
            self_link: instance.self_link.clone(),
        }
    }
}
