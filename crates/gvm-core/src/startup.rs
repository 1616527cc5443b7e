//! Startup-script payloads embedded in the instance at create time.
//!
//! One fixed template per (OS, HTTP) variant; the only dynamic parts are
//! the VM name, zone, and machine type interpolated into the served page.
//! Every step appends to the startup log on the instance.

use crate::types::{DesiredConfig, OsChoice};

pub const STARTUP_LOG: &str = "/var/log/startup.log";

/// The four payload variants. New OS/feature combinations are added as new
/// variants, not as deeper branching inside the templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupTemplate {
    /// Package-list refresh only; no services installed.
    Baseline,
    UbuntuApache,
    DebianNginx,
    RhelHttpd,
}

pub fn variant(os: OsChoice, http_server: bool) -> StartupTemplate {
    if !http_server {
        return StartupTemplate::Baseline;
    }
    match os {
        OsChoice::Ubuntu => StartupTemplate::UbuntuApache,
        OsChoice::Debian => StartupTemplate::DebianNginx,
        OsChoice::Centos | OsChoice::Rhel => StartupTemplate::RhelHttpd,
    }
}

/// Render the full startup script for a declared configuration.
pub fn render(config: &DesiredConfig) -> String {
    let vm_name = &config.vm_name;
    let zone = config.zone();
    let machine_type = config.machine_type;
    let os = config.os_choice;

    let mut script = format!(
        r#"#!/bin/bash
echo "=== Starting {os} VM setup ===" | tee -a {STARTUP_LOG}
echo "Timestamp: $(date)" | tee -a {STARTUP_LOG}
echo "VM Name: {vm_name}" | tee -a {STARTUP_LOG}
echo "Machine Type: {machine_type}" | tee -a {STARTUP_LOG}
echo "Zone: {zone}" | tee -a {STARTUP_LOG}
"#
    );

    match variant(os, config.enable_http_server) {
        StartupTemplate::Baseline => {
            // dnf check-update exits 100 when updates exist; group it with
            // `|| true` so the redirection applies to the whole pipeline.
            let refresh = match os {
                OsChoice::Ubuntu | OsChoice::Debian => "apt-get update",
                OsChoice::Centos | OsChoice::Rhel => "(dnf check-update || true)",
            };
            script.push_str(&format!(
                r#"echo "Refreshing package lists..." | tee -a {STARTUP_LOG}
{refresh} 2>&1 | tee -a {STARTUP_LOG}
"#
            ));
        }
        StartupTemplate::UbuntuApache => {
            script.push_str(&format!(
                r#"echo "Updating package lists..." | tee -a {STARTUP_LOG}
apt-get update 2>&1 | tee -a {STARTUP_LOG}
echo "Installing Apache2..." | tee -a {STARTUP_LOG}
apt-get install -y apache2 2>&1 | tee -a {STARTUP_LOG}
echo "Writing landing page..." | tee -a {STARTUP_LOG}
mkdir -p /var/www/html
cat > /var/www/html/index.html << 'EOF'
{page}
EOF
echo "Starting Apache2..." | tee -a {STARTUP_LOG}
systemctl start apache2 2>&1 | tee -a {STARTUP_LOG}
systemctl enable apache2 2>&1 | tee -a {STARTUP_LOG}
"#,
                page = landing_page(vm_name, &zone, machine_type.as_str()),
            ));
        }
        StartupTemplate::DebianNginx => {
            script.push_str(&format!(
                r#"echo "Updating package lists..." | tee -a {STARTUP_LOG}
apt-get update 2>&1 | tee -a {STARTUP_LOG}
echo "Installing Nginx..." | tee -a {STARTUP_LOG}
apt-get install -y nginx 2>&1 | tee -a {STARTUP_LOG}
echo "Writing landing page..." | tee -a {STARTUP_LOG}
mkdir -p /var/www/html
cat > /var/www/html/index.html << 'EOF'
{page}
EOF
systemctl start nginx 2>&1 | tee -a {STARTUP_LOG}
systemctl enable nginx 2>&1 | tee -a {STARTUP_LOG}
"#,
                page = landing_page(vm_name, &zone, machine_type.as_str()),
            ));
        }
        StartupTemplate::RhelHttpd => {
            script.push_str(&format!(
                r#"echo "Installing httpd..." | tee -a {STARTUP_LOG}
dnf install -y httpd 2>&1 | tee -a {STARTUP_LOG}
echo "Writing landing page..." | tee -a {STARTUP_LOG}
mkdir -p /var/www/html
cat > /var/www/html/index.html << 'EOF'
{page}
EOF
systemctl start httpd 2>&1 | tee -a {STARTUP_LOG}
systemctl enable httpd 2>&1 | tee -a {STARTUP_LOG}
"#,
                page = landing_page(vm_name, &zone, machine_type.as_str()),
            ));
        }
    }

    script.push_str(&format!(
        "echo \"=== {os} VM setup complete ===\" | tee -a {STARTUP_LOG}\n"
    ));
    script
}

fn landing_page(vm_name: &str, zone: &str, machine_type: &str) -> String {
    format!(
        r#"<html>
<head><title>gvm-managed VM</title></head>
<body>
<h1>Hello, World!</h1>
<p>VM: {vm_name}</p>
<p>Zone: {zone}</p>
<p>Machine Type: {machine_type}</p>
<p>Managed by: gvm</p>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DesiredConfig, InstanceState, MachineType, Region};

    fn config(os: OsChoice, http: bool) -> DesiredConfig {
        DesiredConfig {
            project_id: "demo-project".into(),
            region: Region::UsCentral1,
            zone: None,
            vm_name: "demo-vm".into(),
            machine_type: MachineType::E2Micro,
            os_choice: os,
            disk_size_gb: 20,
            enable_http_server: http,
            enable_monitoring: false,
            instance_state: InstanceState::Running,
            preemptible: false,
            auto_restart: true,
            auto_start: true,
        }
    }

    #[test]
    fn variant_lookup() {
        assert_eq!(variant(OsChoice::Ubuntu, false), StartupTemplate::Baseline);
        assert_eq!(variant(OsChoice::Rhel, false), StartupTemplate::Baseline);
        assert_eq!(variant(OsChoice::Ubuntu, true), StartupTemplate::UbuntuApache);
        assert_eq!(variant(OsChoice::Debian, true), StartupTemplate::DebianNginx);
        assert_eq!(variant(OsChoice::Centos, true), StartupTemplate::RhelHttpd);
        assert_eq!(variant(OsChoice::Rhel, true), StartupTemplate::RhelHttpd);
    }

    #[test]
    fn http_disabled_installs_nothing() {
        let script = render(&config(OsChoice::Ubuntu, false));
        assert!(script.contains("apt-get update"));
        assert!(!script.contains("apache2"));
        assert!(!script.contains("index.html"));
    }

    #[test]
    fn ubuntu_http_serves_interpolated_page() {
        let script = render(&config(OsChoice::Ubuntu, true));
        assert!(script.contains("apt-get install -y apache2"));
        assert!(script.contains("<p>VM: demo-vm</p>"));
        assert!(script.contains("<p>Zone: us-central1-a</p>"));
        assert!(script.contains("<p>Machine Type: e2-micro</p>"));
    }

    #[test]
    fn rhel_refresh_logs_despite_nonzero_exit() {
        // Ungrouped, `|| true 2>&1 | tee` binds the redirection to `true`
        // and the dnf output never reaches the log.
        let script = render(&config(OsChoice::Rhel, false));
        assert!(
            script.contains(&format!(
                "(dnf check-update || true) 2>&1 | tee -a {STARTUP_LOG}"
            )),
            "refresh step not grouped:\n{script}"
        );
    }

    #[test]
    fn every_step_appends_to_the_startup_log() {
        const COMMANDS: [&str; 5] = ["echo ", "apt-get ", "dnf ", "(dnf ", "systemctl "];

        for (os, http) in [
            (OsChoice::Ubuntu, true),
            (OsChoice::Debian, true),
            (OsChoice::Rhel, true),
            (OsChoice::Ubuntu, false),
            (OsChoice::Centos, false),
        ] {
            let script = render(&config(os, http));
            let steps = script
                .lines()
                .filter(|l| COMMANDS.iter().any(|c| l.starts_with(c)));
            let mut seen = 0;
            for line in steps {
                assert!(
                    line.ends_with(&format!("| tee -a {STARTUP_LOG}")),
                    "unlogged step: {line}"
                );
                seen += 1;
            }
            assert!(seen >= 7, "template for {os:?} lost its logging steps");
        }
    }
}
