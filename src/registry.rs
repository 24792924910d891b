use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::Value;
use tracing::info;

use crate::backends::braintree::{BraintreeAdmin, BraintreeBackend, BraintreeHttp};
use crate::backends::stripe::StripeBackend;
use crate::backends::{AdminOps, BackendName, PaymentBackend};
use crate::config::{BraintreeConfig, StripeConfig};
use crate::core::{AppError, Result};

#[derive(Clone)]
struct ActiveBackend {
    backend: Arc<dyn PaymentBackend>,
    admin: Option<Arc<dyn AdminOps>>,
}

/// Holds the currently configured backend and routes adapter calls to it.
///
/// Reconfiguring swaps the handle for subsequent `current()` calls only;
/// swapping while requests are in flight is the caller's responsibility to
/// avoid. Callers that want explicit wiring hold their own `Registry` (or
/// the `Arc<dyn PaymentBackend>` that `configure` returns) instead of the
/// process-wide default.
pub struct Registry {
    active: RwLock<Option<ActiveBackend>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
        }
    }

    /// Validate `name` against the supported set, build the backend's native
    /// client from `config`, and make it the active backend. Fails without
    /// touching the previously active backend.
    pub fn configure(
        &self,
        name: &str,
        config: Value,
        description: Option<&str>,
    ) -> Result<Arc<dyn PaymentBackend>> {
        let name: BackendName = name.parse()?;

        let (backend, admin): (Arc<dyn PaymentBackend>, Option<Arc<dyn AdminOps>>) = match name {
            BackendName::Stripe => {
                let config: StripeConfig = serde_json::from_value(config)
                    .map_err(|e| AppError::Configuration(format!("Invalid stripe config: {}", e)))?;
                (Arc::new(StripeBackend::new(&config)), None)
            }
            BackendName::Braintree => {
                let config: BraintreeConfig = serde_json::from_value(config).map_err(|e| {
                    AppError::Configuration(format!("Invalid braintree config: {}", e))
                })?;
                let api = Arc::new(BraintreeHttp::new(&config));
                (
                    Arc::new(BraintreeBackend::with_api(api.clone())),
                    Some(Arc::new(BraintreeAdmin::with_api(api)) as Arc<dyn AdminOps>),
                )
            }
        };

        info!(
            backend = %name,
            description = description.unwrap_or(""),
            "Configured payment backend"
        );
        self.install(backend.clone(), admin);
        Ok(backend)
    }

    /// Make an already-built backend active (test doubles, custom backends)
    pub fn install(
        &self,
        backend: Arc<dyn PaymentBackend>,
        admin: Option<Arc<dyn AdminOps>>,
    ) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = Some(ActiveBackend { backend, admin });
    }

    /// The active backend. Resolved at call time by adapters, never cached.
    pub fn current(&self) -> Result<Arc<dyn PaymentBackend>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| active.backend.clone())
            .ok_or(AppError::NotConfigured)
    }

    /// The raw administrative handle of the active backend, when it has one
    pub fn admin(&self) -> Result<Arc<dyn AdminOps>> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            None => Err(AppError::NotConfigured),
            Some(active) => active.admin.clone().ok_or_else(|| {
                AppError::Configuration(format!(
                    "The {} backend exposes no administrative handle",
                    active.backend.name()
                ))
            }),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-wide default registry, a convenience over explicit handles
pub fn default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}

/// Configure the process-wide default backend. See [`Registry::configure`].
pub fn configure(
    name: &str,
    config: Value,
    description: Option<&str>,
) -> Result<Arc<dyn PaymentBackend>> {
    DEFAULT_REGISTRY.configure(name, config, description)
}

/// The process-wide active backend
pub fn current_backend() -> Result<Arc<dyn PaymentBackend>> {
    DEFAULT_REGISTRY.current()
}

/// The process-wide active backend's administrative handle
pub fn admin_handle() -> Result<Arc<dyn AdminOps>> {
    DEFAULT_REGISTRY.admin()
}
