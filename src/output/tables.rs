//! Table output for the CLI.

use super::terminal::{format_field, or_dash, status_label, usage_bar};
use crate::conflicts::{Conflict, Severity};
use crate::hosts::HostView;
use crate::models::{Address, AddressStats, AuditEntry, Host, IpHistoryEntry, SubnetInfo};
use crate::ranges::RangeUsage;
use crate::registry::SubnetUsage;
use crate::response::MutationResponse;
use colored::Colorize;

pub fn print_response(response: &MutationResponse) {
    if response.success {
        let message = response.message.as_deref().unwrap_or("OK");
        match &response.id {
            Some(id) => println!("{} {message} (ID: {id})", "OK".green()),
            None => println!("{} {message}", "OK".green()),
        }
        if let Some(warning) = &response.warning {
            println!("{} {warning}", "WARN".on_yellow());
        }
    } else {
        eprintln!(
            "{} {} [{}]",
            "ERROR".on_red(),
            or_dash(response.error.as_deref()),
            or_dash(response.code.as_deref())
        );
    }
}

pub fn print_subnets(subnets: &[SubnetUsage]) {
    if subnets.is_empty() {
        println!("No subnets configured.");
        return;
    }
    println!(
        "{} {} {} {} {} {}",
        format_field("ID", 12),
        format_field("CIDR", 20),
        format_field("NAME", 20),
        format_field("VLAN", 6),
        format_field("USED/TOTAL", 14),
        "USAGE"
    );
    println!("{}", "-".repeat(90));
    for s in subnets {
        let used = (s.assigned + s.reserved) as u128;
        println!(
            "{} {} {} {} {} {}",
            format_field(&s.subnet.id, 12),
            format_field(s.subnet.cidr(), 20).bold(),
            format_field(or_dash(s.subnet.name.as_deref()), 20),
            format_field(or_dash(s.subnet.vlan_id.as_deref()), 6),
            format_field(format!("{used}/{}", s.total), 14),
            usage_bar(used, s.total, 20)
        );
    }
}

pub fn print_subnet(usage: &SubnetUsage) {
    let s = &usage.subnet;
    println!("{} {}", "Subnet".bold(), s.cidr().to_string().bold());
    println!("  ID:          {}", s.id);
    println!("  Name:        {}", or_dash(s.name.as_deref()));
    println!("  Description: {}", or_dash(s.description.as_deref()));
    println!("  VLAN:        {}", or_dash(s.vlan_id.as_deref()));
    println!(
        "  Gateway:     {}",
        s.gateway.map_or("-".to_string(), |g| g.to_string())
    );
    if !s.dns_servers.is_empty() {
        let dns: Vec<String> = s.dns_servers.iter().map(ToString::to_string).collect();
        println!("  DNS:         {}", dns.join(", "));
    }
    println!(
        "  Usage:       {} assigned, {} reserved, {} available of {}",
        usage.assigned, usage.reserved, usage.available, usage.total
    );
}

pub fn print_addresses(addresses: &[Address]) {
    if addresses.is_empty() {
        println!("No address records.");
        return;
    }
    println!(
        "{} {} {} {} {}",
        format_field("IP", 40),
        format_field("STATUS", 10),
        format_field("HOST", 14),
        format_field("MAC", 18),
        "DNS NAME"
    );
    println!("{}", "-".repeat(100));
    for a in addresses {
        println!(
            "{} {} {} {} {}",
            format_field(a.ip, 40),
            status_label(a.status, 10),
            format_field(or_dash(a.host_id.as_deref()), 14),
            format_field(or_dash(a.mac_address.as_deref()), 18),
            or_dash(a.dns_name.as_deref())
        );
    }
}

pub fn print_address(a: &Address) {
    println!("{} {}", "Address".bold(), a.ip.to_string().bold());
    println!("  Status:  {}", status_label(a.status, 0));
    println!("  Subnet:  {}", or_dash(a.subnet_id.as_deref()));
    println!("  Host:    {}", or_dash(a.host_id.as_deref()));
    println!("  MAC:     {}", or_dash(a.mac_address.as_deref()));
    println!("  DNS:     {}", or_dash(a.dns_name.as_deref()));
    if let Some(kind) = &a.reservation_type {
        match &a.reservation_description {
            Some(description) => println!("  Reason:  {kind} ({description})"),
            None => println!("  Reason:  {kind}"),
        }
    }
    println!("  Updated: {}", a.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

pub fn print_stats(stats: &AddressStats) {
    println!(
        "{} total, {} assigned, {} reserved, {} available",
        stats.total,
        stats.assigned.to_string().yellow(),
        stats.reserved.to_string().cyan(),
        stats.available.to_string().green()
    );
}

pub fn print_hosts(hosts: &[Host]) {
    if hosts.is_empty() {
        println!("No hosts.");
        return;
    }
    println!(
        "{} {} {} {} {}",
        format_field("ID", 12),
        format_field("NAME", 24),
        format_field("TYPE", 10),
        format_field("OS", 16),
        "NODE"
    );
    println!("{}", "-".repeat(80));
    for h in hosts {
        let name = if h.favorite {
            format_field(format!("*{}", h.vm_name), 24)
        } else {
            format_field(&h.vm_name, 24)
        };
        println!(
            "{} {} {} {} {}",
            format_field(&h.id, 12),
            name,
            format_field(&h.host_type, 10),
            format_field(or_dash(h.operating_system.as_deref()), 16),
            or_dash(h.node.as_deref())
        );
    }
}

pub fn print_ranges(ranges: &[RangeUsage]) {
    if ranges.is_empty() {
        println!("No IP ranges.");
        return;
    }
    println!(
        "{} {} {} {} {} {}",
        format_field("ID", 12),
        format_field("RANGE", 34),
        format_field("PURPOSE", 12),
        format_field("NAME", 16),
        format_field("USED/TOTAL", 12),
        "USAGE"
    );
    println!("{}", "-".repeat(100));
    for r in ranges {
        println!(
            "{} {} {} {} {} {}",
            format_field(&r.range.id, 12),
            format_field(r.range.label(), 34).bold(),
            format_field(&r.range.purpose, 12),
            format_field(or_dash(r.range.name.as_deref()), 16),
            format_field(format!("{}/{}", r.used, r.total), 12),
            usage_bar(r.used as u128, r.total, 20)
        );
    }
}

pub fn print_host(view: &HostView) {
    let h = &view.host;
    println!("{} {}", "Host".bold(), h.vm_name.bold());
    println!("  ID:    {}", h.id);
    println!("  Type:  {}", h.host_type);
    println!("  OS:    {}", or_dash(h.operating_system.as_deref()));
    println!("  Node:  {}", or_dash(h.node.as_deref()));
    println!("  State: {}", or_dash(h.state.as_deref()));
    println!("  Notes: {}", or_dash(h.notes.as_deref()));
    println!();
    print_addresses(&view.addresses);
}

pub fn print_audit(entries: &[AuditEntry]) {
    if entries.is_empty() {
        println!("Audit log is empty.");
        return;
    }
    for e in entries {
        println!(
            "{} {} {} {} {}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_field(e.action, 8).bold(),
            format_field(e.entity_type, 8),
            format_field(&e.entity_id, 16),
            e.details
        );
    }
}

pub fn print_history(entries: &[IpHistoryEntry]) {
    if entries.is_empty() {
        println!("No history.");
        return;
    }
    for e in entries {
        let owner = match (&e.host_id, &e.previous_host_id) {
            (Some(host), Some(prev)) if host != prev => format!("{prev} -> {host}"),
            (Some(host), _) => host.clone(),
            (None, Some(prev)) => format!("from {prev}"),
            (None, None) => "-".to_string(),
        };
        println!(
            "{} {} {} {}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format_field(e.ip, 40),
            format_field(e.action, 9),
            owner
        );
    }
}

pub fn print_conflicts(conflicts: &[Conflict]) {
    if conflicts.is_empty() {
        println!("{} No conflicts found.", "OK".green());
        return;
    }
    for c in conflicts {
        let severity = match c.severity {
            Severity::Error => format_field(c.severity, 8).red(),
            Severity::Warning => format_field(c.severity, 8).yellow(),
        };
        println!("{severity} {}", c.message);
    }
}

pub fn print_subnet_info(info: &SubnetInfo) {
    let host = |ip: Option<std::net::IpAddr>| ip.map_or("-".to_string(), |ip| ip.to_string());
    println!("{} {}", "Network".bold(), info.notation.bold());
    println!("  Address:   {}", info.input_ip);
    println!("  Netmask:   {}", info.netmask);
    println!("  Wildcard:  {}", info.wildcard);
    println!("  Broadcast: {}", info.broadcast);
    println!("  First:     {}", host(info.first_usable));
    println!("  Last:      {}", host(info.last_usable));
    println!("  Addresses: {}", info.total_addresses);
    println!("  Usable:    {}", info.usable_hosts);
    println!(
        "  Private:   {}",
        if info.is_private { "yes" } else { "no" }
    );
}
