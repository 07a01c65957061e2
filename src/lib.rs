pub mod app;
pub mod config;
pub mod domain;
pub mod events;
pub mod http;
pub mod infra;
pub mod pagination;

use crate::infra::broker::EventProducer;
use crate::infra::cache::RedisCache;
use crate::infra::db::Db;
use crate::infra::fanout::NotificationFanout;
use crate::infra::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub mailer: Mailer,
    pub producer: EventProducer,
    pub fanout: NotificationFanout,
    pub frontend_base_url: String,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub reset_token_ttl_minutes: u64,
}
