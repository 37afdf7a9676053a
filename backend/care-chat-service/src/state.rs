use crate::{
    config::Config,
    identity::{JwtIdentityResolver, SharedResolver},
    services::{ConversationService, MessageRouter, UploadStore},
    store::SharedStore,
    websocket::ConnectionRegistry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub resolver: SharedResolver,
    pub registry: ConnectionRegistry,
    pub router: MessageRouter,
    pub conversations: ConversationService,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Wire the services around `store` with a JWT resolver built from `config`.
    pub fn new(config: Config, store: SharedStore) -> Self {
        let resolver: SharedResolver =
            Arc::new(JwtIdentityResolver::new(&config.jwt_secret, store.clone()));
        let registry = ConnectionRegistry::new();
        let uploads = Arc::new(UploadStore::new(
            config.upload_dir,
            &config.public_base_url,
            config.max_upload_bytes,
        ));
        Self {
            router: MessageRouter::new(store.clone(), registry.clone()),
            conversations: ConversationService::new(store),
            resolver,
            registry,
            uploads,
        }
    }
}
