//! Integration test common infrastructure.
//!
//! Provides an in-memory gateway and a harness wiring it to a pool manager
//! backed by an in-memory claim cache.

pub mod gateway;

#[allow(unused_imports)]
pub use gateway::MockGateway;

use helppool::config::Config;
use helppool::db::Database;
use helppool::gateway::{CategoryId, ChannelId, Gateway, MemberId};
use helppool::pool::PoolManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Guild member ids the tests use. The mock gateway's bot is member 1.
#[allow(dead_code)]
pub const ALICE: MemberId = MemberId(10);
#[allow(dead_code)]
pub const BOB: MemberId = MemberId(11);
#[allow(dead_code)]
pub const MOD: MemberId = MemberId(12);

/// A pool manager over an in-memory gateway and claim cache.
pub struct TestHarness {
    pub config: Config,
    pub gateway: Arc<MockGateway>,
    pub db: Database,
    pub manager: Arc<PoolManager>,
}

impl TestHarness {
    /// Build a harness from the default test configuration.
    #[allow(dead_code)]
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Build a harness from a custom configuration.
    #[allow(dead_code)]
    pub async fn with_config(config: Config) -> Self {
        // Honors RUST_LOG when a test needs tracing output.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let gateway = Arc::new(MockGateway::new());
        // The staff notification channel lives outside the managed categories.
        gateway.add_channel_with_id(config.notifications.channel, CategoryId(900), "staff-pings");
        let db = Database::new(":memory:")
            .await
            .expect("Failed to open in-memory claim cache");
        let manager = PoolManager::new(
            config.clone(),
            Arc::clone(&gateway) as Arc<dyn Gateway>,
            db.clone(),
        );
        Self {
            config,
            gateway,
            db,
            manager,
        }
    }

    /// Seed `count` channels into the Dormant category.
    #[allow(dead_code)]
    pub fn seed_dormant(&self, count: usize) -> Vec<ChannelId> {
        (0..count)
            .map(|i| {
                self.gateway
                    .add_channel(self.config.categories.dormant, &format!("help-seed-{i}"))
            })
            .collect()
    }

    /// Number of channels currently in `category`.
    #[allow(dead_code)]
    pub fn count(&self, category: CategoryId) -> usize {
        self.gateway.channels_in_category(category).len()
    }
}

/// Default test configuration: two Available channels, categories 100/200/300,
/// cooldown role 400, moderator whitelist role 450, staff channel 500.
#[allow(dead_code)]
pub fn test_config() -> Config {
    let toml = r#"
names = ["oak", "elm", "ivy", "fern"]

[pool]
max_available = 2
idle_minutes = 30
deleted_idle_minutes = 5
claim_minutes = 15

[categories]
available = 100
in_use = 200
dormant = 300

[roles]
cooldown = 400
command_whitelist = [450]
notify = [460]

[notifications]
channel = 500
"#;
    toml::from_str(toml).expect("Test config failed to parse")
}

/// Give detached tasks (pool replenishment) a moment to run.
#[allow(dead_code)]
pub async fn settle() {
    sleep(Duration::from_millis(80)).await;
}
