use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Instance types ───────────────────────────────────────────────────

/// A Compute Engine instance, as sent to `instances.insert` and returned
/// by `instances.get`. Only the fields the tool reads or writes are typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_platform: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<AttachedDisk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<Scheduling>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_fingerprint: Option<String>,
}

impl Instance {
    /// First NIC's internal address.
    pub fn internal_ip(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.network_ip.as_deref())
    }

    /// First NIC's NAT address, when an external access config exists.
    pub fn external_ip(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.access_configs.first())
            .and_then(|ac| ac.nat_ip.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<AttachedDiskInitializeParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskInitializeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    /// int64 on the wire, serialized as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(rename = "networkIP", skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "natIP", skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preemptible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_restart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_host_maintenance: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub email: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLabelsRequest {
    pub labels: HashMap<String, String>,
    pub label_fingerprint: String,
}

// ── Firewall types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Firewall {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<FirewallAllowed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallAllowed {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

// ── Operation types ──────────────────────────────────────────────────

/// A long-running operation handle. Mutating calls return one of these;
/// callers poll until `status == "DONE"` and then inspect `error`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// Zone operations carry a zone URL; global ones (firewalls) do not.
    pub fn is_zonal(&self) -> bool {
        self.zone.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_serializes_camel_case() {
        let instance = Instance {
            name: "demo-vm".into(),
            machine_type: Some("zones/us-central1-a/machineTypes/e2-micro".into()),
            disks: vec![AttachedDisk {
                auto_delete: Some(true),
                boot: Some(true),
                device_name: Some("boot-disk".into()),
                initialize_params: Some(AttachedDiskInitializeParams {
                    source_image: Some("projects/debian-cloud/global/images/family/debian-12".into()),
                    disk_size_gb: Some("20".into()),
                    disk_type: Some("zones/us-central1-a/diskTypes/pd-standard".into()),
                }),
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["machineType"], "zones/us-central1-a/machineTypes/e2-micro");
        assert_eq!(json["disks"][0]["initializeParams"]["diskSizeGb"], "20");
        // Unset optional fields must not appear in the request body.
        assert!(json.get("status").is_none());
        assert!(json.get("labels").is_none());
    }

    #[test]
    fn instance_ips_from_first_nic() {
        let body = serde_json::json!({
            "name": "demo-vm",
            "status": "RUNNING",
            "networkInterfaces": [{
                "network": "global/networks/default",
                "networkIP": "10.128.0.2",
                "accessConfigs": [{"type": "ONE_TO_ONE_NAT", "natIP": "34.1.2.3"}]
            }]
        });
        let instance: Instance = serde_json::from_value(body).unwrap();
        assert_eq!(instance.internal_ip(), Some("10.128.0.2"));
        assert_eq!(instance.external_ip(), Some("34.1.2.3"));
    }

    #[test]
    fn operation_done_with_error() {
        let body = serde_json::json!({
            "name": "operation-123",
            "status": "DONE",
            "zone": "projects/p/zones/us-central1-a",
            "error": {"errors": [{"code": "QUOTA_EXCEEDED", "message": "over quota"}]}
        });
        let op: Operation = serde_json::from_value(body).unwrap();
        assert!(op.is_done());
        assert!(op.is_zonal());
        assert_eq!(
            op.error.unwrap().errors[0].code.as_deref(),
            Some("QUOTA_EXCEEDED")
        );
    }

    #[test]
    fn firewall_allowed_uses_ip_protocol_key() {
        let fw = Firewall {
            name: "demo-vm-allow-http".into(),
            direction: Some("INGRESS".into()),
            priority: Some(1000),
            source_ranges: vec!["0.0.0.0/0".into()],
            target_tags: vec!["http-server".into()],
            allowed: vec![FirewallAllowed {
                ip_protocol: "tcp".into(),
                ports: vec!["80".into(), "443".into()],
            }],
        };
        let json = serde_json::to_value(&fw).unwrap();
        assert_eq!(json["allowed"][0]["IPProtocol"], "tcp");
        assert_eq!(json["sourceRanges"][0], "0.0.0.0/0");
    }
}
