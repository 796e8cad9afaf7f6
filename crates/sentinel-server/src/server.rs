use std::sync::Arc;

use sentinel_crypto::SigningKey;
use sentinel_ledger::{ContractLedgerClient, FieldLimits, InMemoryLedgerNetwork};
use sentinel_pipeline::{Collaborators, EventPipeline};
use sentinel_session::{InMemoryFacilityDirectory, InMemorySessionStore};
use sentinel_store::{FsObjectStore, Gateway, InMemoryObjectStore, ObjectStore};
use tokio::net::TcpListener;

use crate::config::{SentinelConfig, StorageBackend};
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// Sentinel HTTP server with its pipeline wired to concrete backends.
pub struct SentinelServer {
    config: SentinelConfig,
    pipeline: EventPipeline,
    ledger: Arc<InMemoryLedgerNetwork>,
}

impl SentinelServer {
    /// Validate `config` and build every backend it names.
    pub async fn from_config(config: SentinelConfig) -> ServerResult<Self> {
        config.validate()?;

        let gateway = Gateway::new(config.storage.gateway_url.clone());
        let objects: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryObjectStore::with_gateway(gateway)),
            StorageBackend::Fs => {
                Arc::new(FsObjectStore::open(config.storage.root.clone(), gateway).await?)
            }
        };

        let ledger = Arc::new(InMemoryLedgerNetwork::with_options(
            config.ledger.assigns_event_ids,
            FieldLimits::ACCESS_LOG,
        ));
        let client = ContractLedgerClient::new(ledger.clone(), config.contract_config());

        let signing_key = match config.ledger.signing_key_hex.as_deref() {
            Some(hex) => SigningKey::from_hex(hex)
                .map_err(|e| ServerError::Config(format!("ledger.signing_key_hex: {e}")))?,
            None => {
                let key = SigningKey::generate();
                tracing::warn!(
                    sender = %key.sender_address(),
                    "no ledger signing key configured, generated an ephemeral one"
                );
                key
            }
        };

        let deps = Collaborators {
            objects,
            ledger: Arc::new(client),
            sessions: Arc::new(InMemorySessionStore::new()),
            facilities: Arc::new(InMemoryFacilityDirectory::new(config.facility_pins()?)),
        };
        let pipeline = EventPipeline::new(deps, signing_key, config.pipeline_config());

        Ok(Self {
            config,
            pipeline,
            ledger,
        })
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &EventPipeline {
        &self.pipeline
    }

    /// The ledger network the pipeline broadcasts to.
    pub fn ledger_network(&self) -> &Arc<InMemoryLedgerNetwork> {
        &self.ledger
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(
            AppState {
                pipeline: self.pipeline.clone(),
                recent_limit_max: self.config.server.recent_limit_max,
            },
            self.config.server.max_body_bytes,
        )
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let addr = self.config.server.bind_addr;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            %addr,
            facilities = self.config.facilities.len(),
            sender = %self.pipeline.sender_address(),
            "sentinel server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
