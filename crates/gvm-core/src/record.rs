//! The local record file: the last-known-applied declared configuration.
//!
//! Flat `key = "value"` assignments, one per line, `#` comments. Keys are
//! exactly the `DesiredConfig` field names. Missing keys fall back to
//! defaults; invalid values are rejected at load, before any provider call.
//!
//! Saves go through a temp file and an atomic rename, so a crash mid-write
//! can never leave a half-written record behind.

use std::fs;
use std::path::Path;

use crate::types::{DesiredConfig, InstanceState, MachineType, OsChoice, Region};
use crate::{Error, Result};

pub const DEFAULT_PATH: &str = "vm.tfvars";

pub fn load(path: &Path) -> Result<DesiredConfig> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<DesiredConfig> {
    let mut project_id: Option<String> = None;
    let mut region = Region::UsCentral1;
    let mut zone: Option<String> = None;
    let mut vm_name = String::from("gvm-managed-vm");
    let mut machine_type = MachineType::E2Micro;
    let mut os_choice = OsChoice::Ubuntu;
    let mut disk_size_gb: u32 = 20;
    let mut enable_http_server = true;
    let mut enable_monitoring = false;
    let mut instance_state = InstanceState::Running;
    let mut preemptible = false;
    let mut auto_restart = true;
    let mut auto_start = true;

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::Validation(format!("line {}: expected `key = \"value\"`", lineno + 1))
        })?;
        let key = key.trim();
        let value = unquote(value.trim());

        match key {
            "project_id" => project_id = Some(value.to_string()),
            "region" => region = value.parse()?,
            "zone" => {
                zone = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "vm_name" => vm_name = value.to_string(),
            "machine_type" => machine_type = value.parse()?,
            "os_choice" => os_choice = value.parse()?,
            "disk_size_gb" => {
                disk_size_gb = value.parse().map_err(|_| {
                    Error::Validation(format!("disk_size_gb must be an integer, got {value:?}"))
                })?
            }
            "enable_http_server" => enable_http_server = parse_bool(key, value)?,
            "enable_monitoring" => enable_monitoring = parse_bool(key, value)?,
            "instance_state" => instance_state = value.parse()?,
            "preemptible" => preemptible = parse_bool(key, value)?,
            "auto_restart" => auto_restart = parse_bool(key, value)?,
            "auto_start" => auto_start = parse_bool(key, value)?,
            other => {
                return Err(Error::Validation(format!(
                    "line {}: unknown key {other:?}",
                    lineno + 1
                )));
            }
        }
    }

    let config = DesiredConfig {
        project_id: project_id
            .ok_or_else(|| Error::Validation("project_id must be set".into()))?,
        region,
        zone,
        vm_name,
        machine_type,
        os_choice,
        disk_size_gb,
        enable_http_server,
        enable_monitoring,
        instance_state,
        preemptible,
        auto_restart,
        auto_start,
    };
    config.validate()?;
    Ok(config)
}

/// Write a complete new record and swap it into place. Called only after
/// the provider has confirmed the operation that changed the state.
pub fn save(path: &Path, config: &DesiredConfig) -> Result<()> {
    let tmp = path.with_extension("tfvars.tmp");
    fs::write(&tmp, render(config))?;
    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), "record saved");
    Ok(())
}

pub fn render(config: &DesiredConfig) -> String {
    let mut out = String::from("# Managed by gvm. Rewritten after every confirmed state change.\n");
    out.push_str(&format!("project_id = \"{}\"\n", config.project_id));
    out.push_str(&format!("region = \"{}\"\n", config.region));
    if let Some(zone) = &config.zone {
        out.push_str(&format!("zone = \"{zone}\"\n"));
    }
    out.push_str(&format!("vm_name = \"{}\"\n", config.vm_name));
    out.push_str(&format!("machine_type = \"{}\"\n", config.machine_type));
    out.push_str(&format!("os_choice = \"{}\"\n", config.os_choice));
    out.push_str(&format!("disk_size_gb = {}\n", config.disk_size_gb));
    out.push_str(&format!(
        "enable_http_server = {}\n",
        config.enable_http_server
    ));
    out.push_str(&format!("enable_monitoring = {}\n", config.enable_monitoring));
    out.push_str(&format!(
        "instance_state = \"{}\"\n",
        config.instance_state
    ));
    out.push_str(&format!("preemptible = {}\n", config.preemptible));
    out.push_str(&format!("auto_restart = {}\n", config.auto_restart));
    out.push_str(&format!("auto_start = {}\n", config.auto_start));
    out
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::Validation(format!(
            "{key} must be true or false, got {other:?}"
        ))),
    }
}
