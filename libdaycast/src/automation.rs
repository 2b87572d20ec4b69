//! Automation facade
//!
//! Wires the content generator, image library, platform client, and
//! scheduler together, validates configuration up front, and exposes the
//! small surface the CLI drives: start, stop, status, post-now.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, Secrets};
use crate::content::{ContentGenerator, ContentSource};
use crate::error::Result;
use crate::images::{ImageLibrary, ImageSupplier};
use crate::platforms::twitter::{TwitterClient, TwitterCredentials};
use crate::scheduler::PostScheduler;
use crate::types::{ComponentReport, FireTime, PostOutcome};

/// Snapshot of the whole automation for status output
#[derive(Debug)]
pub struct AutomationStatus {
    pub version: &'static str,
    pub running: bool,
    pub active_jobs: usize,
    pub cached_images: usize,
    /// The next few upcoming fire times, soonest first
    pub next_posts: Vec<FireTime>,
    pub topics: Vec<String>,
}

/// Owns every component for the lifetime of the process
pub struct Automation {
    content: Arc<ContentGenerator>,
    images: Arc<ImageLibrary>,
    scheduler: PostScheduler,
}

impl std::fmt::Debug for Automation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Automation").finish_non_exhaustive()
    }
}

impl Automation {
    /// Validate configuration and secrets, then construct all components
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError::MissingKeys` listing every absent environment
    /// variable, or `ConfigError::Invalid` for unusable tunables. Both are
    /// fatal at startup.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let secrets = Secrets::from_env()?;
        info!("Configuration validated");

        let content = Arc::new(ContentGenerator::new(
            &config.llm,
            &config.content,
            config.twitter.high_limit,
            secrets.llm_api_key.clone(),
        ));
        let images = Arc::new(ImageLibrary::new(&config.images)?);
        let platform = Arc::new(TwitterClient::new(
            TwitterCredentials::from(&secrets),
            config.twitter.high_limit,
            config.content.max_post_chars,
        ));

        let scheduler = PostScheduler::new(
            content.clone(),
            images.clone(),
            platform,
            config.content.posting_hours.clone(),
            config.content.random_delay_minutes,
        );

        Ok(Self {
            content,
            images,
            scheduler,
        })
    }

    /// Probe components, then arm the daily schedule
    ///
    /// Failed probes are reported but do not prevent startup; the scheduler
    /// degrades at execution time instead.
    pub async fn start(&self) {
        info!("Starting daycast automation v{}", env!("CARGO_PKG_VERSION"));

        let report = self.scheduler.test_components().await;
        if !report.all_passing() {
            warn!(
                "Components failed their probe: {}",
                report.failed().join(", ")
            );
            warn!("Automation will start but may have limited functionality");
        }

        self.scheduler.arm_daily_schedule();

        for (index, fire) in self.scheduler.next_fire_times().iter().enumerate() {
            info!(
                "  {}. {} ({} minutes from now)",
                index + 1,
                fire.at.format("%Y-%m-%d %H:%M"),
                fire.until.num_minutes()
            );
        }

        info!("Daycast automation is running");
    }

    /// Stop every scheduled job
    pub fn stop(&self) {
        info!("Stopping daycast automation");
        self.scheduler.stop_all();
    }

    /// Post immediately, optionally steered to a topic
    pub async fn post_now(&self, topic: Option<&str>) -> PostOutcome {
        self.scheduler.run_once(topic).await
    }

    /// Probe content generation, image acquisition, and platform access
    pub async fn test_components(&self) -> ComponentReport {
        self.scheduler.test_components().await
    }

    pub fn status(&self) -> AutomationStatus {
        let scheduler = self.scheduler.status();
        AutomationStatus {
            version: env!("CARGO_PKG_VERSION"),
            running: scheduler.running,
            active_jobs: scheduler.active_jobs,
            cached_images: self.images.cached_count(),
            next_posts: self
                .scheduler
                .next_fire_times()
                .into_iter()
                .take(3)
                .collect(),
            topics: self.content.topics(),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.content.topics()
    }
}
