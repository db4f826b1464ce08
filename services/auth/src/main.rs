use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

mod config;
mod database;
mod error;
mod middleware;
mod models;
mod otp;
mod rate_limiter;
mod repositories;
mod routes;
mod sms;
mod state;
mod validation;

use common::{SessionTokens, TokenConfig, cache};

use crate::{
    config::{AttendanceBackend, AuthConfig, CodeStoreBackend, SmsProvider},
    otp::{CodeStore, MemoryCodeStore, OtpManager, RandomCodeGenerator, RedisCodeStore},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{
        AttendanceLogger, AttendanceRepository, MemoryAttendanceRepository, PgAttendanceRepository,
    },
    sms::{LogSender, SmsSender, TwilioConfig, TwilioSender},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    // Session tokens are shared with the kiosk
    let token_config = TokenConfig::from_env()?;
    let session_tokens = SessionTokens::new(&token_config)?;

    let code_store: Arc<dyn CodeStore> = match config.code_store {
        CodeStoreBackend::Memory => Arc::new(MemoryCodeStore::new(chrono::Duration::seconds(
            i64::try_from(config.otp_ttl_seconds)?,
        ))),
        CodeStoreBackend::Redis => {
            let redis_config = cache::RedisConfig::from_env()?;
            let redis_pool = cache::RedisPool::new(&redis_config).await?;
            if !redis_pool.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            info!("Redis connection successful");
            Arc::new(RedisCodeStore::new(redis_pool, config.otp_ttl_seconds))
        }
    };

    let repository: Arc<dyn AttendanceRepository> = match config.attendance_store {
        AttendanceBackend::Postgres => {
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool(&db_config).await?;

            // Check database connectivity
            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            database::ensure_schema(&pool).await?;
            Arc::new(PgAttendanceRepository::new(pool))
        }
        AttendanceBackend::Memory => {
            info!("Using in-memory attendance store; entries are lost on restart");
            Arc::new(MemoryAttendanceRepository::new())
        }
    };

    let sms_sender: Arc<dyn SmsSender> = match config.sms_provider {
        SmsProvider::Twilio => Arc::new(TwilioSender::new(TwilioConfig::from_env()?)),
        SmsProvider::Log => Arc::new(LogSender),
    };

    let otp_manager = OtpManager::new(code_store, sms_sender, Arc::new(RandomCodeGenerator));
    let attempt_limiter = RateLimiter::new(RateLimiterConfig::from_env());

    let app_state = AppState {
        otp_manager: otp_manager.clone(),
        attendance: AttendanceLogger::new(repository),
        session_tokens,
        attempt_limiter: attempt_limiter.clone(),
    };

    // Sweep expired codes and finished attempt counters in the background
    let purge_every = Duration::from_secs(config.purge_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            match otp_manager.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired codes", purged),
                Err(e) => error!("Failed to purge expired codes: {}", e),
            }
            let released = attempt_limiter.purge_expired().await;
            if released > 0 {
                info!("Released {} attempt counters", released);
            }
        }
    });

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Authentication service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
