use std::sync::Arc;

use super::guard::DeadlineGuard;
use super::session::SessionStore;
use crate::config::BotConfig;
use crate::db::CredentialStore;
use crate::deadlines::DeadlineAggregator;
use crate::lms::LmsApi;
use crate::telegram::TelegramApi;

/// Shared handles every update handler works with.
#[derive(Clone)]
pub struct BotContext {
    pub telegram: Arc<dyn TelegramApi>,
    pub aggregator: Arc<DeadlineAggregator>,
    pub store: CredentialStore,
    pub sessions: SessionStore,
    pub guard: DeadlineGuard,
    pub config: Arc<BotConfig>,
}

impl BotContext {
    pub fn new(
        config: Arc<BotConfig>,
        telegram: Arc<dyn TelegramApi>,
        lms: Arc<dyn LmsApi>,
        store: CredentialStore,
    ) -> Self {
        Self {
            telegram,
            aggregator: Arc::new(DeadlineAggregator::new(
                lms,
                config.max_concurrent_requests,
            )),
            store,
            sessions: SessionStore::new(config.session_ttl()),
            guard: DeadlineGuard::new(),
            config,
        }
    }
}
