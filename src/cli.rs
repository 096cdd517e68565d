//! Command line front end.
//!
//! Every command calls the same registry/allocator operations a route layer
//! would and prints the outcome, either as tables or as JSON (`--json`).

use crate::allocator::{AddressAllocator, AssignRequest};
use crate::audit::{AuditRecorder, Recorded};
use crate::config::{Config, ENV_CAPACITY_POLICY, ENV_DB_PATH};
use crate::conflicts::ConflictDetector;
use crate::error::{Error, Result};
use crate::history::IpHistory;
use crate::hosts::{HostFilter, HostRegistry, HostSort};
use crate::models::{
    AddressStatus, AddressUpdate, CapacityPolicy, Cidr, NewHost, NewRange, RangeUpdate,
    SubnetInfo, SubnetMetadata, SubnetUpdate,
};
use crate::output;
use crate::ranges::RangeRegistry;
use crate::registry::SubnetRegistry;
use crate::response::MutationResponse;
use crate::store::Database;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ipam")]
#[command(version, about = "IP address management: subnets, addresses and hosts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON store file
    #[arg(long, global = true, env = ENV_DB_PATH)]
    pub db: Option<PathBuf>,

    /// Usable host policy for /31 and /32 (conventional, point-to-point)
    #[arg(long, global = true, env = ENV_CAPACITY_POLICY)]
    pub policy: Option<CapacityPolicy>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subnet definitions
    Subnet {
        #[command(subcommand)]
        command: SubnetCommand,
    },

    /// Address allocation
    Ip {
        #[command(subcommand)]
        command: IpCommand,
    },

    /// Hosts that own addresses
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },

    /// Purpose-tagged ranges inside subnets
    Range {
        #[command(subcommand)]
        command: RangeCommand,
    },

    /// Audit trail
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },

    /// Check stored records for allocation conflicts
    Conflicts,
}

#[derive(Args, Debug, Default)]
pub struct SubnetFields {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub vlan: Option<String>,

    #[arg(long)]
    pub gateway: Option<String>,

    /// Comma separated DNS servers
    #[arg(long, value_delimiter = ',')]
    pub dns: Option<Vec<String>>,
}

#[derive(Subcommand, Debug)]
pub enum SubnetCommand {
    /// Register a subnet, e.g. 10.0.0.0/24
    Add {
        cidr: String,
        #[command(flatten)]
        fields: SubnetFields,
    },

    /// List subnets with usage
    List,

    Show { id: String },

    /// Change descriptive fields (an empty value clears a field)
    Update {
        id: String,
        #[command(flatten)]
        fields: SubnetFields,
    },

    /// Delete a subnet with no assigned addresses
    Delete { id: String },

    /// Find the subnet containing an address
    Find { ip: String },

    /// Calculate block details without storing anything
    Calc {
        cidr: String,

        /// Also list the child blocks of this prefix
        #[arg(long)]
        split: Option<u8>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IpCommand {
    /// Suggest the next free address of a subnet
    Next { subnet_id: String },

    Assign {
        ip: String,
        host_id: String,

        #[arg(long)]
        subnet: Option<String>,

        #[arg(long)]
        mac: Option<String>,

        #[arg(long)]
        dns_name: Option<String>,
    },

    Release { ip: String },

    /// Hold an unassigned address out of the pool
    Reserve {
        ip: String,

        #[arg(long)]
        dns_name: Option<String>,

        /// What the address is kept for, e.g. gateway or dhcp
        #[arg(long = "type")]
        reservation_type: Option<String>,

        #[arg(long, requires = "reservation_type")]
        description: Option<String>,
    },

    Show { ip: String },

    /// List address records of a subnet or a host
    List {
        #[arg(long, conflicts_with = "host", required_unless_present = "host")]
        subnet: Option<String>,

        #[arg(long)]
        host: Option<String>,

        /// available, assigned or reserved
        #[arg(long)]
        status: Option<AddressStatus>,
    },

    /// Status counts across all records
    Stats,

    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Address to show; recent activity when omitted
    pub ip: Option<String>,

    #[arg(long, conflicts_with = "ip")]
    pub host: Option<String>,

    #[arg(long, conflicts_with_all = ["ip", "host"])]
    pub subnet: Option<String>,

    /// Ownership periods instead of raw events
    #[arg(long, requires = "ip")]
    pub timeline: bool,

    /// Summary counters
    #[arg(long)]
    pub stats: bool,

    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum HostCommand {
    Add {
        name: String,

        #[arg(long = "type")]
        host_type: Option<String>,

        #[arg(long)]
        os: Option<String>,

        #[arg(long)]
        node: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        favorite: bool,
    },

    List {
        /// Only hosts in this state, e.g. running
        #[arg(long)]
        state: Option<String>,

        /// Match name, operating system or node
        #[arg(long)]
        search: Option<String>,

        /// vm_name, state, node or operating_system
        #[arg(long, default_value_t = HostSort::Name)]
        sort: HostSort,
    },

    Show { id: String },

    /// Release the host's addresses and delete it
    Delete { id: String },
}

#[derive(Args, Debug, Default)]
pub struct RangeFields {
    /// e.g. servers, printers, dhcp
    #[arg(long)]
    pub purpose: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RangeCommand {
    /// Add an inclusive start..end range to a subnet
    Add {
        subnet_id: String,
        start: String,
        end: String,
        #[command(flatten)]
        fields: RangeFields,
    },

    /// Ranges with usage, all or of one subnet
    List {
        #[arg(long)]
        subnet: Option<String>,
    },

    Show { id: String },

    /// Change descriptive fields (an empty value clears name or description)
    Update {
        id: String,
        #[command(flatten)]
        fields: RangeFields,
    },

    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Newest entries first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete every audit entry
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Split `a.b.c.d/len` into its parts.
fn split_cidr(cidr: &str) -> Result<(&str, u8)> {
    let (network, prefix) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| Error::Validation(format!("Expected network/prefix, got {cidr}")))?;
    let prefix = prefix
        .parse()
        .map_err(|_| Error::Validation(format!("Invalid prefix length: {prefix}")))?;
    Ok((network, prefix))
}

struct App {
    db: Database,
    subnets: SubnetRegistry,
    addresses: AddressAllocator,
    hosts: HostRegistry,
    ranges: RangeRegistry,
    audit: AuditRecorder,
    history: IpHistory,
    conflicts: ConflictDetector,
    policy: CapacityPolicy,
    limit: usize,
    json: bool,
}

impl App {
    fn new(config: &Config, json: bool) -> Result<App> {
        let db = Database::open(&config.db_path)?;
        let audit = AuditRecorder::default();
        let policy = config.capacity_policy;
        Ok(App {
            db,
            subnets: SubnetRegistry::new(policy, audit.clone()),
            addresses: AddressAllocator::new(policy, audit.clone()),
            hosts: HostRegistry::new(audit.clone()),
            ranges: RangeRegistry::new(audit.clone()),
            audit,
            history: IpHistory,
            conflicts: ConflictDetector::new(policy),
            policy,
            limit: config.audit_limit,
            json,
        })
    }

    /// Print a mutation outcome; returns the exit code.
    fn mutation<T, F>(&self, result: Result<Recorded<T>>, describe: F) -> i32
    where
        F: FnOnce(&T) -> String,
    {
        self.respond(MutationResponse::from_result(result, describe))
    }

    fn respond(&self, response: MutationResponse) -> i32 {
        let code = if response.success { 0 } else { 1 };
        if self.json {
            if let Err(e) = output::print_json(&response) {
                log::error!("Could not print response: {e}");
                return 1;
            }
        } else {
            output::print_response(&response);
        }
        code
    }

    /// Print a read result as JSON or with `table`; returns the exit code.
    fn show<T, F>(&self, result: Result<T>, table: F) -> i32
    where
        T: Serialize,
        F: FnOnce(&T),
    {
        let printed = result.and_then(|value| {
            if self.json {
                output::print_json(&value)
            } else {
                table(&value);
                Ok(())
            }
        });
        match printed {
            Ok(()) => 0,
            Err(e) => self.respond(MutationResponse::failure(&e)),
        }
    }

    fn subnet(&self, command: SubnetCommand) -> i32 {
        match command {
            SubnetCommand::Add { cidr, fields } => {
                let result = split_cidr(&cidr).and_then(|(network, prefix)| {
                    let metadata = SubnetMetadata {
                        name: fields.name,
                        description: fields.description,
                        vlan_id: fields.vlan,
                        gateway: fields.gateway,
                        dns_servers: fields.dns.unwrap_or_default(),
                    };
                    self.subnets.create(&self.db, network, prefix, metadata)
                });
                self.respond(MutationResponse::created(result, "Subnet"))
            }
            SubnetCommand::List => self.show(self.subnets.list(&self.db), |s| {
                output::print_subnets(s)
            }),
            SubnetCommand::Show { id } => {
                self.show(self.subnets.get(&self.db, &id), output::print_subnet)
            }
            SubnetCommand::Update { id, fields } => {
                let update = SubnetUpdate {
                    name: fields.name.map(Some),
                    description: fields.description.map(Some),
                    vlan_id: fields.vlan.map(Some),
                    gateway: fields.gateway.map(Some),
                    dns_servers: fields.dns,
                };
                self.mutation(self.subnets.update(&self.db, &id, update), |s| {
                    format!("Subnet {} updated", s.cidr())
                })
            }
            SubnetCommand::Delete { id } => {
                self.mutation(self.subnets.delete(&self.db, &id), |removed| {
                    format!("Subnet deleted, {removed} address record(s) removed")
                })
            }
            SubnetCommand::Find { ip } => {
                self.show(self.subnets.find_containing(&self.db, &ip), |found| {
                    match found {
                        Some(subnet) => {
                            println!("{} {} ({})", subnet.cidr(), subnet.label(), subnet.id)
                        }
                        None => println!("No subnet contains {ip}"),
                    }
                })
            }
            SubnetCommand::Calc { cidr, split } => {
                let info = split_cidr(&cidr)
                    .and_then(|(ip, prefix)| SubnetInfo::calculate(ip, prefix, self.policy));
                let code = self.show(info, output::print_subnet_info);
                match split {
                    Some(new_prefix) if code == 0 => {
                        let children = Cidr::new(&cidr).and_then(|c| c.split(new_prefix));
                        self.show(children, |blocks| {
                            for block in blocks {
                                println!("  {block}");
                            }
                        })
                    }
                    _ => code,
                }
            }
        }
    }

    fn ip(&self, command: IpCommand) -> i32 {
        match command {
            IpCommand::Next { subnet_id } => {
                self.show(self.addresses.next_available(&self.db, &subnet_id), |next| {
                    match next {
                        Some(ip) => println!("{ip}"),
                        None => println!("Subnet {subnet_id} is full"),
                    }
                })
            }
            IpCommand::Assign {
                ip,
                host_id,
                subnet,
                mac,
                dns_name,
            } => {
                let request = AssignRequest {
                    ip,
                    host_id,
                    subnet_id: subnet,
                    mac_address: mac,
                    dns_name,
                };
                self.mutation(self.addresses.assign(&self.db, request), |a| {
                    format!("{} assigned to {}", a.ip, output::or_dash(a.host_id.as_deref()))
                })
            }
            IpCommand::Release { ip } => {
                self.mutation(self.addresses.release(&self.db, &ip), |a| {
                    format!("{} released", a.ip)
                })
            }
            IpCommand::Reserve {
                ip,
                dns_name,
                reservation_type,
                description,
            } => {
                let update = AddressUpdate {
                    dns_name: dns_name.map(Some),
                    reservation_type: reservation_type.map(Some),
                    reservation_description: description.map(Some),
                    ..AddressUpdate::reserve()
                };
                self.mutation(self.addresses.update_record(&self.db, &ip, update), |a| {
                    format!("{} reserved", a.ip)
                })
            }
            IpCommand::Show { ip } => {
                self.show(self.addresses.get(&self.db, &ip), output::print_address)
            }
            IpCommand::List {
                subnet,
                host,
                status,
            } => {
                let records = match (subnet, host) {
                    (Some(subnet), _) => self.addresses.list_by_subnet(&self.db, &subnet, status),
                    (None, Some(host)) => self.addresses.list_by_host(&self.db, &host).map(|list| {
                        list.into_iter()
                            .filter(|a| status.map_or(true, |s| a.status == s))
                            .collect()
                    }),
                    (None, None) => Err(Error::Validation(
                        "Either --subnet or --host is required".to_string(),
                    )),
                };
                self.show(records, |list| output::print_addresses(list))
            }
            IpCommand::Stats => self.show(self.addresses.stats(&self.db), output::print_stats),
            IpCommand::History(args) => self.history(args),
        }
    }

    fn history(&self, args: HistoryArgs) -> i32 {
        let limit = args.limit.unwrap_or(self.limit);
        if args.stats {
            return self.show(self.history.stats(&self.db), |s| {
                println!(
                    "{} entries for {} addresses: {} assignments, {} releases, {} in the last 30 days",
                    s.total_entries,
                    s.unique_ips,
                    s.total_assignments,
                    s.total_releases,
                    s.recent_activity
                )
            });
        }
        match (&args.ip, args.timeline) {
            (Some(ip), true) => self.show(self.history.timeline(&self.db, ip), |spans| {
                for span in spans {
                    let end = span
                        .end
                        .map_or("now".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
                    println!(
                        "{} .. {}  {}",
                        span.start.format("%Y-%m-%d %H:%M:%S"),
                        end,
                        output::or_dash(span.host_id.as_deref())
                    );
                }
            }),
            (Some(ip), false) => self.show(self.history.by_ip(&self.db, ip, limit), |e| {
                output::print_history(e)
            }),
            (None, _) => {
                let entries = match (&args.host, &args.subnet) {
                    (Some(host), _) => self.history.by_host(&self.db, host, limit),
                    (None, Some(subnet)) => self.history.by_subnet(&self.db, subnet, limit),
                    (None, None) => self.history.recent(&self.db, limit),
                };
                self.show(entries, |e| output::print_history(e))
            }
        }
    }

    fn host(&self, command: HostCommand) -> i32 {
        match command {
            HostCommand::Add {
                name,
                host_type,
                os,
                node,
                notes,
                favorite,
            } => {
                let new = NewHost {
                    host_type,
                    operating_system: os,
                    node,
                    notes,
                    favorite,
                    ..NewHost::named(&name)
                };
                self.respond(MutationResponse::created(
                    self.hosts.create(&self.db, new),
                    "Host",
                ))
            }
            HostCommand::List {
                state,
                search,
                sort,
            } => {
                let filter = HostFilter {
                    state,
                    search,
                    sort,
                };
                self.show(self.hosts.list(&self.db, &filter), |h| output::print_hosts(h))
            }
            HostCommand::Show { id } => self.show(self.hosts.get(&self.db, &id), output::print_host),
            HostCommand::Delete { id } => {
                self.mutation(self.hosts.delete(&self.db, &id), |released| {
                    format!("Host deleted, {} address(es) released", released.len())
                })
            }
        }
    }

    fn range(&self, command: RangeCommand) -> i32 {
        match command {
            RangeCommand::Add {
                subnet_id,
                start,
                end,
                fields,
            } => {
                let new = NewRange {
                    purpose: fields.purpose,
                    name: fields.name,
                    description: fields.description,
                    ..NewRange::new(&subnet_id, &start, &end)
                };
                self.respond(MutationResponse::created(
                    self.ranges.create(&self.db, new),
                    "IP range",
                ))
            }
            RangeCommand::List { subnet } => self.show(
                self.ranges.list(&self.db, subnet.as_deref()),
                |r| output::print_ranges(r),
            ),
            RangeCommand::Show { id } => self.show(self.ranges.get(&self.db, &id), |r| {
                output::print_ranges(std::slice::from_ref(r));
                if let Some(description) = &r.range.description {
                    println!("  {description}");
                }
            }),
            RangeCommand::Update { id, fields } => {
                let update = RangeUpdate {
                    purpose: fields.purpose,
                    name: fields.name.map(Some),
                    description: fields.description.map(Some),
                };
                self.mutation(self.ranges.update(&self.db, &id, update), |r| {
                    format!("Range {} updated", r.label())
                })
            }
            RangeCommand::Delete { id } => {
                self.mutation(self.ranges.delete(&self.db, &id), |r| {
                    format!("Range {} deleted", r.label())
                })
            }
        }
    }

    fn audit(&self, command: AuditCommand) -> i32 {
        match command {
            AuditCommand::List { limit } => {
                let limit = limit.unwrap_or(self.limit);
                self.show(self.audit.list(&self.db, limit), |e| output::print_audit(e))
            }
            AuditCommand::Clear { yes } => {
                if !yes {
                    return self.respond(MutationResponse::failure(&Error::Validation(
                        "Refusing to clear the audit log without --yes".to_string(),
                    )));
                }
                match self.audit.clear(&self.db) {
                    Ok(removed) => self.respond(MutationResponse {
                        success: true,
                        message: Some(format!("{removed} audit entries removed")),
                        ..Default::default()
                    }),
                    Err(e) => self.respond(MutationResponse::failure(&e)),
                }
            }
        }
    }

    fn conflicts(&self) -> i32 {
        match self.conflicts.detect(&self.db) {
            Ok(found) => {
                let code = if found.is_empty() { 0 } else { 1 };
                if self.json {
                    if let Err(e) = output::print_json(&found) {
                        log::error!("Could not print conflicts: {e}");
                        return 1;
                    }
                } else {
                    output::print_conflicts(&found);
                }
                code
            }
            Err(e) => self.respond(MutationResponse::failure(&e)),
        }
    }
}

/// Run one command against the configured store; returns the exit code.
pub fn run(cli: Cli, mut config: Config) -> i32 {
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(policy) = cli.policy {
        config.capacity_policy = policy;
    }
    log::info!(
        "Using store {} ({} capacity)",
        config.db_path.display(),
        config.capacity_policy
    );

    let app = match App::new(&config, cli.json) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Could not open store {}: {e}", config.db_path.display());
            eprintln!("Could not open store {}: {e}", config.db_path.display());
            return 1;
        }
    };

    match cli.command {
        Command::Subnet { command } => app.subnet(command),
        Command::Ip { command } => app.ip(command),
        Command::Host { command } => app.host(command),
        Command::Range { command } => app.range(command),
        Command::Audit { command } => app.audit(command),
        Command::Conflicts => app.conflicts(),
    }
}
