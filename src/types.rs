use serde::{Deserialize, Serialize};

/// Outbound command object. `parameter` is omitted from the JSON when unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameter: Option<String>,
}

impl CommandEnvelope {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameter: None,
        }
    }

    pub fn with_parameter(command: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            parameter: Some(parameter.into()),
        }
    }
}

/// One entry of the `STATUS` array every reply carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StatusRecord {
    /// "S" success, "I" info, "W" warning, "E" error, "F" fatal.
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "Code")]
    pub code: i64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Msg")]
    pub msg: String,
    #[serde(rename = "When")]
    pub when: i64,
}

impl StatusRecord {
    pub fn is_success(&self) -> bool {
        self.status == "S"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Summary {
    #[serde(rename = "Accepted")]
    pub accepted: i64,
    #[serde(rename = "Best Share")]
    pub best_share: f64,
    #[serde(rename = "Device Hardware%")]
    pub device_hardware_percent: f64,
    #[serde(rename = "Device Rejected%")]
    pub device_rejected_percent: f64,
    #[serde(rename = "Difficulty Accepted")]
    pub difficulty_accepted: f64,
    #[serde(rename = "Difficulty Rejected")]
    pub difficulty_rejected: f64,
    #[serde(rename = "Difficulty Stale")]
    pub difficulty_stale: f64,
    #[serde(rename = "Discarded")]
    pub discarded: i64,
    #[serde(rename = "Elapsed")]
    pub elapsed: i64,
    #[serde(rename = "Found Blocks")]
    pub found_blocks: i64,
    #[serde(rename = "Get Failures")]
    pub get_failures: i64,
    #[serde(rename = "Getworks")]
    pub getworks: i64,
    #[serde(rename = "Hardware Errors")]
    pub hardware_errors: i64,
    #[serde(rename = "Local Work")]
    pub local_work: i64,
    #[serde(rename = "Last Getwork")]
    pub last_getwork: i64,
    #[serde(rename = "MHS 5s")]
    pub mhs_5s: f64,
    #[serde(rename = "MHS av")]
    pub mhs_av: f64,
    #[serde(rename = "MHS 1m")]
    pub mhs_1m: f64,
    #[serde(rename = "MHS 5m")]
    pub mhs_5m: f64,
    #[serde(rename = "MHS 15m")]
    pub mhs_15m: f64,
    #[serde(rename = "Network Blocks")]
    pub network_blocks: i64,
    #[serde(rename = "Pool Rejected%")]
    pub pool_rejected_percent: f64,
    #[serde(rename = "Pool Stale%")]
    pub pool_stale_percent: f64,
    #[serde(rename = "Rejected")]
    pub rejected: i64,
    #[serde(rename = "Remote Failures")]
    pub remote_failures: i64,
    #[serde(rename = "Stale")]
    pub stale: i64,
    #[serde(rename = "Total MH")]
    pub total_mh: f64,
    #[serde(rename = "Utility")]
    pub utility: f64,
    #[serde(rename = "Work Utility")]
    pub work_utility: f64,
}

/// One entry of the `DEVS` reply (GPU, ASC or PGA).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Device {
    #[serde(rename = "GPU")]
    pub gpu: i64,
    #[serde(rename = "ASC")]
    pub asc: i64,
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Enabled")]
    pub enabled: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Fan Speed")]
    pub fan_speed: i64,
    #[serde(rename = "Fan Percent")]
    pub fan_percent: i64,
    #[serde(rename = "GPU Clock")]
    pub gpu_clock: i64,
    #[serde(rename = "Memory Clock")]
    pub memory_clock: i64,
    #[serde(rename = "GPU Voltage")]
    pub gpu_voltage: f64,
    #[serde(rename = "Powertune")]
    pub powertune: i64,
    #[serde(rename = "MHS av")]
    pub mhs_av: f64,
    #[serde(rename = "MHS 5s")]
    pub mhs_5s: f64,
    #[serde(rename = "MHS 1m")]
    pub mhs_1m: f64,
    #[serde(rename = "MHS 5m")]
    pub mhs_5m: f64,
    #[serde(rename = "MHS 15m")]
    pub mhs_15m: f64,
    #[serde(rename = "Accepted")]
    pub accepted: i64,
    #[serde(rename = "Rejected")]
    pub rejected: i64,
    #[serde(rename = "Hardware Errors")]
    pub hardware_errors: i64,
    #[serde(rename = "Utility")]
    pub utility: f64,
    /// "D" (dynamic) or a level; builds disagree on string vs number.
    #[serde(rename = "Intensity")]
    pub intensity: serde_json::Value,
    #[serde(rename = "Last Share Pool")]
    pub last_share_pool: i64,
    #[serde(rename = "Last Share Time")]
    pub last_share_time: i64,
    #[serde(rename = "Total MH")]
    pub total_mh: f64,
    #[serde(rename = "Diff1 Work")]
    pub diff1_work: f64,
    #[serde(rename = "Difficulty Accepted")]
    pub difficulty_accepted: f64,
    #[serde(rename = "Difficulty Rejected")]
    pub difficulty_rejected: f64,
    #[serde(rename = "Last Share Difficulty")]
    pub last_share_difficulty: f64,
    #[serde(rename = "Last Valid Work")]
    pub last_valid_work: i64,
    #[serde(rename = "Device Hardware%")]
    pub device_hardware_percent: f64,
    #[serde(rename = "Device Rejected%")]
    pub device_rejected_percent: f64,
    #[serde(rename = "Device Elapsed")]
    pub device_elapsed: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Pool {
    /// Pool index used by enablepool/disablepool/removepool/switchpool.
    #[serde(rename = "POOL")]
    pub pool: i64,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Priority")]
    pub priority: i64,
    #[serde(rename = "Quota")]
    pub quota: i64,
    #[serde(rename = "Long Poll")]
    pub long_poll: String,
    #[serde(rename = "Getworks")]
    pub getworks: i64,
    #[serde(rename = "Accepted")]
    pub accepted: i64,
    #[serde(rename = "Rejected")]
    pub rejected: i64,
    #[serde(rename = "Works")]
    pub works: i64,
    #[serde(rename = "Discarded")]
    pub discarded: i64,
    #[serde(rename = "Stale")]
    pub stale: i64,
    #[serde(rename = "Get Failures")]
    pub get_failures: i64,
    #[serde(rename = "Remote Failures")]
    pub remote_failures: i64,
    #[serde(rename = "Diff1 Shares")]
    pub diff1_shares: f64,
    #[serde(rename = "Proxy Type")]
    pub proxy_type: String,
    #[serde(rename = "Proxy")]
    pub proxy: String,
    #[serde(rename = "Difficulty Accepted")]
    pub difficulty_accepted: f64,
    #[serde(rename = "Difficulty Rejected")]
    pub difficulty_rejected: f64,
    #[serde(rename = "Difficulty Stale")]
    pub difficulty_stale: f64,
    #[serde(rename = "Last Share Difficulty")]
    pub last_share_difficulty: f64,
    #[serde(rename = "Last Share Time")]
    pub last_share_time: i64,
    #[serde(rename = "Has Stratum")]
    pub has_stratum: bool,
    #[serde(rename = "Stratum Active")]
    pub stratum_active: bool,
    #[serde(rename = "Stratum URL")]
    pub stratum_url: String,
    #[serde(rename = "Has GBT")]
    pub has_gbt: bool,
    #[serde(rename = "Best Share")]
    pub best_share: f64,
    #[serde(rename = "Pool Rejected%")]
    pub pool_rejected_percent: f64,
    #[serde(rename = "Pool Stale%")]
    pub pool_stale_percent: f64,
}

/// Reply of the `config` command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MinerConfig {
    #[serde(rename = "GPU Count")]
    pub gpu_count: i64,
    #[serde(rename = "ASC Count")]
    pub asc_count: i64,
    #[serde(rename = "PGA Count")]
    pub pga_count: i64,
    #[serde(rename = "Pool Count")]
    pub pool_count: i64,
    /// "Y" or "N".
    #[serde(rename = "ADL")]
    pub adl: String,
    #[serde(rename = "ADL in use")]
    pub adl_in_use: String,
    #[serde(rename = "Strategy")]
    pub strategy: String,
    #[serde(rename = "Log Interval")]
    pub log_interval: i64,
    /// Space separated list of compiled-in device drivers.
    #[serde(rename = "Device Code")]
    pub device_code: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "Failover-Only")]
    pub failover_only: bool,
    #[serde(rename = "ScanTime")]
    pub scan_time: i64,
    #[serde(rename = "Queue")]
    pub queue: i64,
    #[serde(rename = "Expiry")]
    pub expiry: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Version {
    #[serde(rename = "CGMiner")]
    pub cgminer: String,
    #[serde(rename = "API")]
    pub api: String,
}

/// What a `--query` pass learned about one live host.
#[derive(Serialize, Debug, Clone, Default)]
pub struct HostReport {
    pub ip: String,
    pub summary: Option<Summary>,
    pub devices: Vec<Device>,
    pub pools: Vec<Pool>,
    /// First error hit while querying, if any.
    pub error: Option<String>,
}

/// Aggregate output of one run, written with `--output`.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub timestamp: String,
    pub targets: Vec<String>,
    pub ports: Vec<u16>,
    pub addresses_probed: u64,
    pub live_hosts: Vec<String>,
    pub hosts: Vec<HostReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_omitted_when_unused() {
        let bare = serde_json::to_string(&CommandEnvelope::new("summary")).unwrap();
        assert_eq!(bare, r#"{"command":"summary"}"#);
        let with = serde_json::to_string(&CommandEnvelope::with_parameter("switchpool", "1")).unwrap();
        assert_eq!(with, r#"{"command":"switchpool","parameter":"1"}"#);
    }

    #[test]
    fn status_record_uses_wire_names() {
        let s: StatusRecord = serde_json::from_str(
            r#"{"STATUS":"E","When":1532052885,"Code":14,"Msg":"Invalid command","Description":"cgminer 4.9.0"}"#,
        )
        .unwrap();
        assert!(!s.is_success());
        assert_eq!(s.code, 14);
        assert_eq!(s.msg, "Invalid command");
    }
}
