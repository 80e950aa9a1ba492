use std::sync::Arc;

use crate::auth::CredentialService;
use crate::config::Config;
use crate::mail::Mailer;
use crate::meetings::MeetingRegistry;
use crate::ws::ConnectionsManager;

/// Shared application state. Each service is constructed once at
/// process start; nothing here survives a restart.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialService>,
    pub meetings: Arc<MeetingRegistry>,
    pub connections: Arc<ConnectionsManager>,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Mailer) -> Self {
        let credentials = CredentialService::new(config.code_ttl_seconds, config.token_ttl_seconds);
        let meetings =
            MeetingRegistry::new(config.meeting_ttl_seconds, config.empty_meeting_grace());

        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            meetings: Arc::new(meetings),
            connections: Arc::new(ConnectionsManager::new()),
            mailer: Arc::new(mailer),
        }
    }
}
