pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod services;
pub mod startup;

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::proxy::{ResponseRewriter, UpstreamClient};
use crate::services::{ClaimsService, JwtService, ServiceIndexClient, SessionStore, Store};

pub use startup::build_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub store: Arc<Store>,
    pub jwt: Arc<JwtService>,
    pub claims: ClaimsService,
    pub sessions: SessionStore,
    pub upstream: UpstreamClient,
    pub rewriter: ResponseRewriter,
    pub service_index: ServiceIndexClient,
}

impl AppState {
    pub fn new(config: ProxyConfig, store: Store, jwt: JwtService) -> Result<Self, anyhow::Error> {
        let store = Arc::new(store);
        let jwt = Arc::new(jwt);
        let claims = ClaimsService::new(store.clone(), jwt.clone());

        let upstream = UpstreamClient::new(&config)?;
        let rewriter = ResponseRewriter::new(&config.common.host, config.common.port)?;
        let service_index = ServiceIndexClient::new(&config, claims.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            jwt,
            claims,
            sessions: SessionStore::new(),
            upstream,
            rewriter,
            service_index,
        })
    }
}
