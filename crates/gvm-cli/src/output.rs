//! Human-readable command output. Everything here prints; nothing fails.

use gvm_core::{DesiredConfig, ObservedState};

pub fn print_status(desired: &DesiredConfig, observed: &ObservedState) {
    if !observed.exists {
        println!(
            "Instance {} not found in zone {}",
            desired.vm_name,
            desired.zone()
        );
        return;
    }

    println!("=== Instance Status ===");
    println!("Name: {}", desired.vm_name);
    println!("Status: {}", observed.status);
    println!("Zone: {}", desired.zone());
    println!("Machine Type: {}", desired.machine_type);
    if let Some(ip) = &observed.internal_ip {
        println!("Internal IP: {ip}");
    }
    if let Some(ip) = &observed.external_ip {
        println!("External IP: {ip}");
    }
    if let Some(id) = &observed.instance_id {
        println!("Instance ID: {id}");
    }
    if let Some(link) = &observed.self_link {
        println!("Self Link: {link}");
    }
}

pub fn print_access_info(desired: &DesiredConfig, observed: &ObservedState) {
    println!("=== Access Information ===");
    println!("SSH Command:");
    println!(
        "  gcloud compute ssh {} --zone={} --project={}",
        desired.vm_name,
        desired.zone(),
        desired.project_id
    );

    if let Some(ip) = &observed.external_ip {
        println!("External IP: {ip}");
        if desired.enable_http_server {
            println!("Web URL: http://{ip}");
        }
    }
}

pub fn print_summary(desired: &DesiredConfig, observed: &ObservedState) {
    println!("=== Deployment Summary ===");
    println!("VM Name: {}", desired.vm_name);
    println!("Project: {}", desired.project_id);
    println!("Zone: {}", desired.zone());
    println!("Machine Type: {}", desired.machine_type);
    println!("OS Choice: {}", desired.os_choice);
    println!("Disk Size: {} GB", desired.disk_size_gb);
    println!("HTTP Server: {}", desired.enable_http_server);
    println!("Monitoring: {}", desired.enable_monitoring);
    println!("Declared State: {}", desired.instance_state);
    println!("Preemptible: {}", desired.preemptible);
    println!("Auto Restart: {}", desired.auto_restart);
    println!("Current Status: {}", observed.status);
}
