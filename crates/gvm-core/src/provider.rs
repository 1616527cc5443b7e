//! Provider seam and the Compute Engine implementation.
//!
//! All mutating calls submit a request, then block on the returned
//! long-running operation until the API reports DONE, with a bounded wait.
//! Transient failures (429, 5xx, connection errors) are retried with
//! exponential backoff up to a fixed attempt budget before escalating.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gce_api::{
    AccessConfig, AttachedDisk, AttachedDiskInitializeParams, Firewall, FirewallAllowed,
    GceClient, Instance, Metadata, MetadataItem, NetworkInterface, Scheduling, ServiceAccount,
    SetLabelsRequest, Tags,
};
use tracing::{debug, info, warn};

use crate::startup;
use crate::types::{DesiredConfig, ObservedState, VmRef};
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Backend-agnostic interface for the lifecycle operations the executor
/// runs. One VM at a time; every call is synchronous from the caller's
/// point of view and resolves to the operation's terminal result.
#[async_trait]
pub trait VmProvider: Send + Sync {
    /// Fetch the current state. A missing instance is not an error here;
    /// it comes back as `ObservedState::not_found()`.
    async fn get_instance(&self, vm: &VmRef) -> Result<ObservedState>;

    /// Create the instance described by the declared configuration and
    /// wait for the create operation to finish.
    async fn create_instance(&self, desired: &DesiredConfig) -> Result<()>;

    async fn start_instance(&self, vm: &VmRef) -> Result<()>;

    async fn stop_instance(&self, vm: &VmRef) -> Result<()>;

    /// Provider-level hard reset. A restarted running instance stays
    /// RUNNING; the declared state is untouched.
    async fn reset_instance(&self, vm: &VmRef) -> Result<()>;

    /// Delete the instance. Deleting an already-absent instance succeeds.
    async fn delete_instance(&self, vm: &VmRef) -> Result<()>;

    /// Create the HTTP ingress rule if it does not already exist.
    async fn ensure_firewall_rule(&self, desired: &DesiredConfig) -> Result<()>;

    /// Re-push the declared labels onto an existing instance.
    async fn update_metadata(&self, desired: &DesiredConfig) -> Result<()>;
}

/// Compute Engine provider over the typed REST client.
pub struct GceProvider {
    client: GceClient,
}

impl GceProvider {
    /// Build a client for the config's project and zone, with the bearer
    /// token from `GCE_ACCESS_TOKEN`.
    pub fn from_env(config: &DesiredConfig) -> Result<Self> {
        dotenvy::dotenv().ok();

        let token = std::env::var("GCE_ACCESS_TOKEN").map_err(|_| {
            Error::Auth(
                "GCE_ACCESS_TOKEN is not set (try `gcloud auth print-access-token`)".into(),
            )
        })?;

        Ok(Self {
            client: GceClient::new(token, &config.project_id, config.zone()),
        })
    }

    pub fn new(client: GceClient) -> Self {
        Self { client }
    }

    /// Poll an operation until DONE, bounded by `OPERATION_TIMEOUT`.
    async fn wait_operation(&self, mut op: gce_api::Operation, what: &str) -> Result<()> {
        let started = Instant::now();
        loop {
            if op.is_done() {
                if let Some(err) = op.error {
                    let message = err
                        .errors
                        .first()
                        .and_then(|d| d.message.clone())
                        .unwrap_or_else(|| "operation failed".into());
                    return Err(Error::Api(format!("{what}: {message}")));
                }
                debug!("{what}: operation complete");
                return Ok(());
            }

            if started.elapsed() >= OPERATION_TIMEOUT {
                return Err(Error::Timeout {
                    what: what.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            debug!(progress = op.progress, "{what}: in progress");
            tokio::time::sleep(POLL_INTERVAL).await;

            // Poll fetches get the same retry budget as every other call;
            // a transient blip mid-wait must not abort the whole operation.
            op = if op.is_zonal() {
                with_retry("get zone operation", || {
                    self.client.get_zone_operation(&op.name)
                })
                .await?
            } else {
                with_retry("get global operation", || {
                    self.client.get_global_operation(&op.name)
                })
                .await?
            };
        }
    }
}

/// Run an API call, retrying transient failures with exponential backoff.
/// Retries are silent below info level; the final failure surfaces as-is.
async fn with_retry<T, F, Fut>(what: &'static str, call: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = gce_api::Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                debug!(attempt, error = %e, "{what}: transient failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Assemble the full `instances.insert` body from the declared config.
fn build_instance(desired: &DesiredConfig) -> Instance {
    let zone = desired.zone();

    let mut tags = vec!["gvm-managed".to_string()];
    if desired.enable_http_server {
        tags.push("http-server".into());
    }

    // Preemptible instances cannot auto-restart and must terminate on
    // host maintenance.
    let scheduling = Scheduling {
        preemptible: Some(desired.preemptible),
        automatic_restart: Some(desired.auto_restart && !desired.preemptible),
        on_host_maintenance: Some(
            if desired.preemptible { "TERMINATE" } else { "MIGRATE" }.into(),
        ),
    };

    let service_accounts = if desired.enable_monitoring {
        vec![ServiceAccount {
            email: "default".into(),
            scopes: vec![
                "https://www.googleapis.com/auth/monitoring.write".into(),
                "https://www.googleapis.com/auth/logging.write".into(),
            ],
        }]
    } else {
        Vec::new()
    };

    Instance {
        name: desired.vm_name.clone(),
        machine_type: Some(format!(
            "zones/{zone}/machineTypes/{}",
            desired.machine_type
        )),
        disks: vec![AttachedDisk {
            auto_delete: Some(true),
            boot: Some(true),
            device_name: Some("boot-disk".into()),
            initialize_params: Some(AttachedDiskInitializeParams {
                source_image: Some(desired.os_choice.image_uri().into()),
                disk_size_gb: Some(desired.disk_size_gb.to_string()),
                disk_type: Some(format!("zones/{zone}/diskTypes/pd-standard")),
            }),
        }],
        network_interfaces: vec![NetworkInterface {
            network: Some(format!(
                "projects/{}/global/networks/default",
                desired.project_id
            )),
            network_ip: None,
            access_configs: vec![AccessConfig {
                kind: Some("ONE_TO_ONE_NAT".into()),
                name: Some("External NAT".into()),
                nat_ip: None,
            }],
        }],
        scheduling: Some(scheduling),
        service_accounts,
        metadata: Some(Metadata {
            items: vec![
                MetadataItem {
                    key: "startup-script".into(),
                    value: startup::render(desired),
                },
                MetadataItem {
                    key: "enable-oslogin".into(),
                    value: "true".into(),
                },
            ],
        }),
        tags: Some(Tags { items: tags }),
        labels: desired.labels(),
        ..Default::default()
    }
}

#[async_trait]
impl VmProvider for GceProvider {
    async fn get_instance(&self, vm: &VmRef) -> Result<ObservedState> {
        match with_retry("get instance", || self.client.get_instance(&vm.name)).await {
            Ok(instance) => Ok(ObservedState::from_instance(&instance)),
            Err(Error::NotFound(_)) => Ok(ObservedState::not_found()),
            Err(e) => Err(e),
        }
    }

    async fn create_instance(&self, desired: &DesiredConfig) -> Result<()> {
        let instance = build_instance(desired);
        let op = with_retry("insert instance", || self.client.insert_instance(&instance)).await?;
        self.wait_operation(op, "instance creation").await?;
        info!(vm = %desired.vm_name, zone = %desired.zone(), "instance created");
        Ok(())
    }

    async fn start_instance(&self, vm: &VmRef) -> Result<()> {
        let op = with_retry("start instance", || self.client.start_instance(&vm.name)).await?;
        self.wait_operation(op, "instance start").await?;
        info!(vm = %vm.name, "instance started");
        Ok(())
    }

    async fn stop_instance(&self, vm: &VmRef) -> Result<()> {
        let op = with_retry("stop instance", || self.client.stop_instance(&vm.name)).await?;
        self.wait_operation(op, "instance stop").await?;
        info!(vm = %vm.name, "instance stopped");
        Ok(())
    }

    async fn reset_instance(&self, vm: &VmRef) -> Result<()> {
        let op = with_retry("reset instance", || self.client.reset_instance(&vm.name)).await?;
        self.wait_operation(op, "instance reset").await?;
        info!(vm = %vm.name, "instance reset");
        Ok(())
    }

    async fn delete_instance(&self, vm: &VmRef) -> Result<()> {
        let resp = with_retry("delete instance", || self.client.delete_instance(&vm.name)).await?;
        match resp {
            Some(op) => {
                self.wait_operation(op, "instance deletion").await?;
                info!(vm = %vm.name, "instance deleted");
                Ok(())
            }
            None => {
                warn!(vm = %vm.name, "instance already absent");
                Ok(())
            }
        }
    }

    async fn ensure_firewall_rule(&self, desired: &DesiredConfig) -> Result<()> {
        let name = desired.firewall_rule_name();

        let existing = with_retry("get firewall", || self.client.get_firewall(&name)).await?;
        if existing.is_some() {
            debug!(rule = %name, "firewall rule already exists");
            return Ok(());
        }

        let firewall = Firewall {
            name: name.clone(),
            direction: Some("INGRESS".into()),
            priority: Some(1000),
            source_ranges: vec!["0.0.0.0/0".into()],
            target_tags: vec!["http-server".into()],
            allowed: vec![FirewallAllowed {
                ip_protocol: "tcp".into(),
                ports: vec!["80".into(), "443".into()],
            }],
        };

        let op = with_retry("insert firewall", || self.client.insert_firewall(&firewall)).await?;
        self.wait_operation(op, "firewall rule creation").await?;
        info!(rule = %name, "firewall rule created");
        Ok(())
    }

    async fn update_metadata(&self, desired: &DesiredConfig) -> Result<()> {
        // setLabels needs the current fingerprint, so fetch first.
        let instance = with_retry("get instance", || {
            self.client.get_instance(&desired.vm_name)
        })
        .await?;
        let fingerprint = instance
            .label_fingerprint
            .ok_or_else(|| Error::Api("instance has no label fingerprint".into()))?;

        let req = SetLabelsRequest {
            labels: desired.labels(),
            label_fingerprint: fingerprint,
        };
        let op = with_retry("set labels", || {
            self.client.set_labels(&desired.vm_name, &req)
        })
        .await?;
        self.wait_operation(op, "label update").await?;
        info!(vm = %desired.vm_name, "labels updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::types::{InstanceState, MachineType, OsChoice, Region};

    fn config() -> DesiredConfig {
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
            instance_state: InstanceState::Running,
            preemptible: false,
            auto_restart: true,
            auto_start: true,
        }
    }

    #[test]
    fn build_instance_body() {
        let instance = build_instance(&config());

        assert_eq!(
            instance.machine_type.as_deref(),
            Some("zones/us-central1-a/machineTypes/e2-micro")
        );

        let params = instance.disks[0].initialize_params.as_ref().unwrap();
        assert_eq!(params.disk_size_gb.as_deref(), Some("20"));
        assert!(params.source_image.as_ref().unwrap().contains("ubuntu"));

        let tags = &instance.tags.as_ref().unwrap().items;
        assert!(tags.contains(&"http-server".to_string()));

        let keys: Vec<_> = instance
            .metadata
            .as_ref()
            .unwrap()
            .items
            .iter()
            .map(|i| i.key.as_str())
            .collect();
        assert_eq!(keys, vec!["startup-script", "enable-oslogin"]);

        // Monitoring disabled: no service accounts attached.
        assert!(instance.service_accounts.is_empty());
    }

    #[test]
    fn preemptible_disables_auto_restart() {
        let mut cfg = config();
        cfg.preemptible = true;
        cfg.auto_restart = true;

        let scheduling = build_instance(&cfg).scheduling.unwrap();
        assert_eq!(scheduling.preemptible, Some(true));
        assert_eq!(scheduling.automatic_restart, Some(false));
        assert_eq!(scheduling.on_host_maintenance.as_deref(), Some("TERMINATE"));
    }

    #[test]
    fn http_server_flag_controls_tag() {
        let mut cfg = config();
        cfg.enable_http_server = false;
        let tags = build_instance(&cfg).tags.unwrap().items;
        assert_eq!(tags, vec!["gvm-managed".to_string()]);
    }

    #[test]
    fn monitoring_attaches_write_scopes() {
        let mut cfg = config();
        cfg.enable_monitoring = true;
        let accounts = build_instance(&cfg).service_accounts;
        assert_eq!(accounts.len(), 1);
        assert!(
            accounts[0]
                .scopes
                .iter()
                .any(|s| s.ends_with("monitoring.write"))
        );
    }

    fn api_error(status: u16) -> gce_api::Error {
        gce_api::Error::Api {
            endpoint: "instances",
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            body: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("get instance", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 { Err(api_error(503)) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_escalates_after_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("stop instance", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(503)) }
        })
        .await;

        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("insert instance", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(400)) }
        })
        .await;

        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
