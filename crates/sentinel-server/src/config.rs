use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sentinel_ledger::{ContractConfig, FieldLimits};
use sentinel_pipeline::PipelineConfig;
use sentinel_session::DEFAULT_MATCH_THRESHOLD;
use sentinel_store::Gateway;
use sentinel_types::CompanyPin;

use crate::error::{ServerError, ServerResult};

/// Top-level configuration, loaded from TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Facility PINs allowed to record events.
    pub facilities: Vec<String>,
    pub server: ServerSection,
    pub pipeline: PipelineSection,
    pub ledger: LedgerSection,
    pub storage: StorageSection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub recent_limit_max: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3070)),
            max_body_bytes: 10 * 1024 * 1024,
            recent_limit_max: 200,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub match_threshold: f64,
    pub candidate_window: usize,
    pub upload_timeout_ms: u64,
    pub ledger_timeout_ms: u64,
    pub max_nonce_retries: u32,
    pub max_close_retries: u32,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            candidate_window: 200,
            upload_timeout_ms: 15_000,
            ledger_timeout_ms: 20_000,
            max_nonce_retries: 3,
            max_close_retries: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    pub fee: u64,
    /// Hex-encoded Ed25519 secret. A fresh key is generated when absent.
    pub signing_key_hex: Option<String>,
    /// Whether the ledger reports event ids in its broadcast response.
    pub assigns_event_ids: bool,
}

impl Default for LedgerSection {
    fn default() -> Self {
        let contract = ContractConfig::default();
        Self {
            contract_address: contract.contract_address,
            contract_name: contract.contract_name,
            function_name: contract.function_name,
            fee: contract.fee,
            signing_key_hex: None,
            assigns_event_ids: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Fs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Object directory for the `fs` backend.
    pub root: PathBuf,
    pub gateway_url: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root: PathBuf::from("./sentinel-objects"),
            gateway_url: Gateway::DEFAULT_BASE.to_string(),
        }
    }
}

impl SentinelConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            match_threshold: p.match_threshold,
            candidate_window: p.candidate_window,
            upload_timeout: Duration::from_millis(p.upload_timeout_ms),
            ledger_timeout: Duration::from_millis(p.ledger_timeout_ms),
            max_nonce_retries: p.max_nonce_retries,
            max_close_retries: p.max_close_retries,
        }
    }

    pub fn contract_config(&self) -> ContractConfig {
        let call_timeout = Duration::from_millis(self.pipeline.ledger_timeout_ms);
        ContractConfig {
            contract_address: self.ledger.contract_address.clone(),
            contract_name: self.ledger.contract_name.clone(),
            function_name: self.ledger.function_name.clone(),
            fee: self.ledger.fee,
            limits: FieldLimits::ACCESS_LOG,
            nonce_timeout: call_timeout,
            broadcast_timeout: call_timeout,
        }
    }

    /// Parsed facility PINs. Any malformed PIN fails the whole config.
    pub fn facility_pins(&self) -> ServerResult<Vec<CompanyPin>> {
        self.facilities
            .iter()
            .map(|pin| {
                CompanyPin::parse(pin)
                    .map_err(|e| ServerError::Config(format!("facility {pin:?}: {e}")))
            })
            .collect()
    }

    /// Reject settings no deployment can run with.
    pub fn validate(&self) -> ServerResult<()> {
        let p = &self.pipeline;
        if !p.match_threshold.is_finite() || p.match_threshold < 0.0 {
            return Err(ServerError::Config(format!(
                "pipeline.match_threshold must be a non-negative number, got {}",
                p.match_threshold
            )));
        }
        if p.candidate_window == 0 {
            return Err(ServerError::Config("pipeline.candidate_window must be at least 1".into()));
        }
        if self.server.recent_limit_max == 0 {
            return Err(ServerError::Config("server.recent_limit_max must be at least 1".into()));
        }
        self.facility_pins()?;
        Ok(())
    }
}
