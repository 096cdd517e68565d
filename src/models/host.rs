//! CMDB host data model.

use super::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server or VM that can own addresses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Host {
    pub id: String,
    pub vm_name: String,
    /// "vm", "physical", "container", ...
    pub host_type: String,
    #[serde(default)]
    pub operating_system: Option<String>,
    /// Hypervisor node or physical location.
    #[serde(default)]
    pub node: Option<String>,
    /// Power state as reported by the hypervisor.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_total_gb: Option<f64>,
    #[serde(default)]
    pub disk_size_gb: Option<f64>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a host is created.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewHost {
    pub vm_name: String,
    #[serde(default)]
    pub host_type: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_total_gb: Option<f64>,
    #[serde(default)]
    pub disk_size_gb: Option<f64>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewHost {
    pub fn named(vm_name: &str) -> Self {
        NewHost {
            vm_name: vm_name.to_string(),
            ..Default::default()
        }
    }
}

/// Field-by-field host patch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HostUpdate {
    #[serde(default)]
    pub vm_name: Option<String>,
    #[serde(default)]
    pub host_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub operating_system: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub node: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cpu_count: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub memory_total_gb: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub disk_size_gb: Option<Option<f64>>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl Host {
    pub fn from_new(id: String, new: NewHost, now: DateTime<Utc>) -> Self {
        Host {
            id,
            vm_name: new.vm_name,
            host_type: new.host_type.unwrap_or_else(|| "vm".to_string()),
            operating_system: new.operating_system,
            node: new.node,
            state: new.state,
            cpu_count: new.cpu_count,
            memory_total_gb: new.memory_total_gb,
            disk_size_gb: new.disk_size_gb,
            favorite: new.favorite,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply every field present in `update`. Returns true if anything was set.
    pub fn apply(&mut self, update: HostUpdate) -> bool {
        let mut changed = false;
        if let Some(v) = update.vm_name {
            self.vm_name = v;
            changed = true;
        }
        if let Some(v) = update.host_type {
            self.host_type = v;
            changed = true;
        }
        if let Some(v) = update.operating_system {
            self.operating_system = v;
            changed = true;
        }
        if let Some(v) = update.node {
            self.node = v;
            changed = true;
        }
        if let Some(v) = update.state {
            self.state = v;
            changed = true;
        }
        if let Some(v) = update.cpu_count {
            self.cpu_count = v;
            changed = true;
        }
        if let Some(v) = update.memory_total_gb {
            self.memory_total_gb = v;
            changed = true;
        }
        if let Some(v) = update.disk_size_gb {
            self.disk_size_gb = v;
            changed = true;
        }
        if let Some(v) = update.favorite {
            self.favorite = v;
            changed = true;
        }
        if let Some(v) = update.notes {
            self.notes = v;
            changed = true;
        }
        changed
    }
}
