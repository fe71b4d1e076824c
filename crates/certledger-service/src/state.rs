//! Application state.

use std::sync::Arc;

use certledger_mirror::{MirrorClient, MirrorQuery};
use certledger_store::TransactionLogStore;
use certledger_sync::{
    ConfirmationTasks, Reconciler, RecoverySweep, ResilienceConfig, ResilientExecutor,
};

use crate::config::ServiceConfig;
use crate::scheduler::SweepRunner;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The transaction log.
    pub store: Arc<dyn TransactionLogStore>,

    /// Mirror client for the configured network.
    pub mirror: Arc<MirrorClient>,

    /// Executor for ledger operations issued by code embedding this service.
    pub executor: Arc<ResilientExecutor>,

    /// Batch recovery sweeps, shared by the endpoint and the scheduler.
    pub sweeps: SweepRunner,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn TransactionLogStore>,
        mirror: Arc<MirrorClient>,
        config: ServiceConfig,
    ) -> Self {
        let mirror_query: Arc<dyn MirrorQuery> = Arc::clone(&mirror) as Arc<dyn MirrorQuery>;

        let resilience = ResilienceConfig {
            reconciliation: config.reconcile_policy(),
            ..ResilienceConfig::default()
        };
        let executor = Arc::new(ResilientExecutor::with_config(
            Arc::clone(&store),
            mirror_query,
            resilience,
            Arc::new(ConfirmationTasks::new()),
        ));

        let sweeps = SweepRunner::new(RecoverySweep::new(
            Arc::clone(&store),
            executor.reconciler().clone(),
        ));

        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not set - recovery endpoints are disabled");
        }
        if config.auth_jwt_secret.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not set - user endpoints are disabled");
        }

        Self {
            store,
            mirror,
            executor,
            sweeps,
            config,
        }
    }

    /// The reconciler shared by the executor and the sweep.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        self.executor.reconciler()
    }

    /// Outstanding asynchronous confirmations.
    #[must_use]
    pub fn confirmations(&self) -> &Arc<ConfirmationTasks> {
        self.executor.confirmations()
    }
}
