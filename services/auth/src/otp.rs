//! One-time code generation, storage, delivery and verification
//!
//! At most one pending code exists per phone. Generating a new one
//! replaces the previous value, a correct verification consumes it, and a
//! wrong one leaves it in place so the user can retry without a resend.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::cache::RedisPool;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{models::PendingCode, sms::SmsSender};

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// The code was stored but could not be handed to the delivery capability
#[derive(Error, Debug)]
#[error("Failed to deliver code to {phone}: {reason}")]
pub struct DeliveryError {
    pub phone: String,
    pub reason: String,
}

/// Keyed storage of pending codes
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store `pending` for its phone, replacing any previous code
    async fn put(&self, pending: PendingCode) -> Result<()>;

    /// Atomically delete the phone's code if it equals `code` and has not expired
    async fn take_if_equal(&self, phone: &str, code: u32) -> Result<bool>;

    /// Drop expired codes, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}

/// Process-local code store with TTL eviction
#[derive(Clone)]
pub struct MemoryCodeStore {
    ttl: Duration,
    codes: Arc<Mutex<HashMap<String, PendingCode>>>,
}

impl MemoryCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Pending code for a phone, if one is live
    pub async fn get(&self, phone: &str) -> Option<PendingCode> {
        let codes = self.codes.lock().await;
        codes
            .get(phone)
            .filter(|p| !p.is_expired(self.ttl, Utc::now()))
            .cloned()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn put(&self, pending: PendingCode) -> Result<()> {
        let mut codes = self.codes.lock().await;
        if codes.insert(pending.phone.clone(), pending).is_some() {
            debug!("Replaced previous pending code");
        }
        Ok(())
    }

    async fn take_if_equal(&self, phone: &str, code: u32) -> Result<bool> {
        let mut codes = self.codes.lock().await;

        let Some(pending) = codes.get(phone) else {
            return Ok(false);
        };

        if pending.is_expired(self.ttl, Utc::now()) {
            codes.remove(phone);
            info!("Pending code for {} expired", phone);
            return Ok(false);
        }

        if pending.code != code {
            return Ok(false);
        }

        codes.remove(phone);
        Ok(true)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut codes = self.codes.lock().await;
        let now = Utc::now();
        let before = codes.len();
        codes.retain(|_, pending| !pending.is_expired(self.ttl, now));
        Ok(before - codes.len())
    }
}

/// Redis-backed code store shared by every service instance
#[derive(Clone)]
pub struct RedisCodeStore {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisCodeStore {
    pub fn new(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }

    fn key(phone: &str) -> String {
        format!("otp:{}", phone)
    }
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn put(&self, pending: PendingCode) -> Result<()> {
        self.pool
            .set(
                &Self::key(&pending.phone),
                &pending.code.to_string(),
                Some(self.ttl_seconds),
            )
            .await
    }

    async fn take_if_equal(&self, phone: &str, code: u32) -> Result<bool> {
        self.pool
            .take_if_equal(&Self::key(phone), &code.to_string())
            .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        // Redis evicts keys on their own TTL
        Ok(0)
    }
}

/// Source of fresh codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> u32;
}

/// Uniform six-digit codes from the thread RNG
#[derive(Clone, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> u32 {
        rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX)
    }
}

/// One-time code manager
#[derive(Clone)]
pub struct OtpManager {
    store: Arc<dyn CodeStore>,
    sender: Arc<dyn SmsSender>,
    generator: Arc<dyn CodeGenerator>,
}

impl OtpManager {
    pub fn new(
        store: Arc<dyn CodeStore>,
        sender: Arc<dyn SmsSender>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            store,
            sender,
            generator,
        }
    }

    /// Draw a fresh code for `phone` and store it, replacing any previous one
    pub async fn generate_and_store(&self, phone: &str) -> Result<u32> {
        let code = self.generator.generate();
        self.store.put(PendingCode::new(phone, code)).await?;
        info!("Generated one-time code for {}", phone);
        Ok(code)
    }

    /// Hand the code to the delivery capability
    ///
    /// The stored code is left in place when delivery fails.
    pub async fn deliver(&self, phone: &str, code: u32) -> Result<(), DeliveryError> {
        let body = format!("Your OTP is: {}", code);
        self.sender.send(phone, &body).await.map_err(|e| {
            error!("Failed to deliver one-time code to {}: {}", phone, e);
            DeliveryError {
                phone: phone.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Check a submitted code, consuming the pending one on a match
    ///
    /// The submission is compared numerically; anything that does not parse
    /// as a number never matches.
    pub async fn verify(&self, phone: &str, submitted: &str) -> Result<bool> {
        let Ok(code) = submitted.trim().parse::<u32>() else {
            debug!("Submitted code for {} is not numeric", phone);
            return Ok(false);
        };

        let accepted = self.store.take_if_equal(phone, code).await?;
        info!(
            "Verification for {} {}",
            phone,
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(accepted)
    }

    /// Drop expired codes from the store
    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Hands out queued codes in order
    pub(crate) struct FixedCodeGenerator(pub StdMutex<Vec<u32>>);

    impl FixedCodeGenerator {
        pub(crate) fn new(codes: &[u32]) -> Self {
            let mut queue = codes.to_vec();
            queue.reverse();
            Self(StdMutex::new(queue))
        }
    }

    impl CodeGenerator for FixedCodeGenerator {
        fn generate(&self) -> u32 {
            self.0.lock().unwrap().pop().expect("no queued code")
        }
    }

    /// Records delivered messages; fails every send when `fail` is set
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub sent: StdMutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl SmsSender for RecordingSender {
        async fn send(&self, phone: &str, body: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("provider unavailable");
            }
            self.sent
                .lock()
                .unwrap()
                .push((phone.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn manager(codes: &[u32], ttl: Duration) -> (OtpManager, MemoryCodeStore) {
        let store = MemoryCodeStore::new(ttl);
        let manager = OtpManager::new(
            Arc::new(store.clone()),
            Arc::new(RecordingSender::default()),
            Arc::new(FixedCodeGenerator::new(codes)),
        );
        (manager, store)
    }

    #[test]
    fn test_random_codes_are_six_digits() {
        let generator = RandomCodeGenerator;
        for _ in 0..1000 {
            let code = generator.generate();
            assert!((CODE_MIN..=CODE_MAX).contains(&code));
        }
    }

    #[tokio::test]
    async fn test_correct_code_verifies_exactly_once() {
        let (manager, _) = manager(&[482913], Duration::seconds(300));
        let phone = "5551234567";

        let code = manager.generate_and_store(phone).await.unwrap();
        assert_eq!(code, 482913);

        assert!(manager.verify(phone, "482913").await.unwrap());
        assert!(!manager.verify(phone, "482913").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_pending_code() {
        let (manager, store) = manager(&[482913], Duration::seconds(300));
        let phone = "5551234567";
        manager.generate_and_store(phone).await.unwrap();
        let before = store.get(phone).await.unwrap();

        assert!(!manager.verify(phone, "111111").await.unwrap());
        assert!(!manager.verify(phone, "not-a-code").await.unwrap());
        assert_eq!(store.get(phone).await, Some(before));

        assert!(manager.verify(phone, " 482913 ").await.unwrap());
    }

    #[tokio::test]
    async fn test_new_code_replaces_previous() {
        let (manager, _) = manager(&[111111, 222222], Duration::seconds(300));
        let phone = "5551234567";

        manager.generate_and_store(phone).await.unwrap();
        manager.generate_and_store(phone).await.unwrap();

        assert!(!manager.verify(phone, "111111").await.unwrap());
        assert!(manager.verify(phone, "222222").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_phone_is_rejected() {
        let (manager, _) = manager(&[], Duration::seconds(300));
        assert!(!manager.verify("5550000000", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_purged() {
        let (manager, store) = manager(&[482913, 654321], Duration::seconds(0));

        manager.generate_and_store("a").await.unwrap();
        assert!(!manager.verify("a", "482913").await.unwrap());

        manager.generate_and_store("b").await.unwrap();
        assert_eq!(manager.purge_expired().await.unwrap(), 1);
        assert!(store.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_code_verifiable() {
        let store = MemoryCodeStore::new(Duration::seconds(300));
        let manager = OtpManager::new(
            Arc::new(store),
            Arc::new(RecordingSender {
                fail: true,
                ..Default::default()
            }),
            Arc::new(FixedCodeGenerator::new(&[482913])),
        );
        let phone = "5551234567";

        let code = manager.generate_and_store(phone).await.unwrap();
        let err = manager.deliver(phone, code).await.unwrap_err();
        assert_eq!(err.phone, phone);

        assert!(manager.verify(phone, "482913").await.unwrap());
    }

    #[tokio::test]
    async fn test_delivery_message_carries_code() {
        let sender = Arc::new(RecordingSender::default());
        let manager = OtpManager::new(
            Arc::new(MemoryCodeStore::new(Duration::seconds(300))),
            sender.clone(),
            Arc::new(FixedCodeGenerator::new(&[482913])),
        );

        let code = manager.generate_and_store("5551234567").await.unwrap();
        manager.deliver("5551234567", code).await.unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[(
                "5551234567".to_string(),
                "Your OTP is: 482913".to_string()
            )]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verification_consumes_once() {
        for round in 0..50 {
            let (manager, _) = manager(&[482913], Duration::seconds(300));
            let phone = format!("555{:07}", round);
            manager.generate_and_store(&phone).await.unwrap();

            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let manager = manager.clone();
                    let phone = phone.clone();
                    let barrier = barrier.clone();
                    tokio::spawn(async move {
                        barrier.wait().await;
                        manager.verify(&phone, "482913").await.unwrap()
                    })
                })
                .collect();

            let mut accepted = 0;
            for task in tasks {
                if task.await.unwrap() {
                    accepted += 1;
                }
            }
            assert_eq!(accepted, 1, "round {} accepted {} times", round, accepted);
        }
    }
}
