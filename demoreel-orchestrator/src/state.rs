//! Shared application state
//!
//! Cloned into every API handler and stage worker. Stage workers build
//! their pipeline components fresh per job; the components are thin
//! wrappers over shared HTTP clients and config.

use std::sync::Arc;

use demoreel_browser::BrowserConfig;
use demoreel_pipeline::executor::Executor;
use demoreel_pipeline::llm::ChatClient;
use demoreel_pipeline::narration::Synthesizer;
use demoreel_pipeline::planner::Planner;
use demoreel_pipeline::tts::SpeechClient;
use sqlx::PgPool;

use crate::config::Config;
use crate::queue::JobQueues;
use crate::service::events::EventBus;
use crate::service::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<Config>,
    queues: JobQueues,
    events: EventBus,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Arc<Config>,
        queues: JobQueues,
        events: EventBus,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            pool,
            config,
            queues,
            events,
            sessions,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn queues(&self) -> &JobQueues {
        &self.queues
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            chrome_binary: self.config.chrome_binary.clone(),
            headless: self.config.headless,
            ..BrowserConfig::default()
        }
    }

    pub fn planner(&self) -> Planner {
        let llm = ChatClient::new(
            &self.config.model_api_base,
            &self.config.model_api_key,
            &self.config.model_name,
        );
        Planner::new(llm, self.browser_config())
    }

    pub fn executor(&self) -> Executor {
        Executor::new(self.browser_config())
    }

    pub fn synthesizer(&self) -> Synthesizer {
        let speech = SpeechClient::new(
            &self.config.tts_api_base,
            self.config.tts_api_key.clone(),
            &self.config.tts_model,
            &self.config.tts_voice,
        );
        Synthesizer::new(speech)
    }
}
