//! Daily post scheduling
//!
//! One tokio task per configured posting hour: sleep until the target time,
//! run the pipeline, then repeat every 24 hours under the same job id. Timer
//! tasks never propagate errors; a static message is the last resort when
//! the pipeline fails. The interactive path (`run_once`) returns a typed
//! outcome instead, since a caller is waiting.

use chrono::{DateTime, Duration as TimeDelta, Local};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::content::ContentSource;
use crate::error::Result;
use crate::images::ImageSupplier;
use crate::platforms::Platform;
use crate::types::{ComponentReport, FireTime, GeneratedPost, PostOutcome};

const RECURRENCE: Duration = Duration::from_secs(24 * 60 * 60);

/// Last-resort message when a scheduled pipeline fails end to end
pub const FALLBACK_TEXT: &str = "Privacy-first infrastructure keeps moving forward. \
Encrypted computation is quietly becoming the default for sensitive workloads. \
#privacy #encryption";

/// Scheduler state visible to status commands
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_jobs: usize,
    pub job_ids: Vec<String>,
    pub posting_hours: Vec<u32>,
}

/// The pipeline pieces a timer task needs, shared across jobs
struct SchedulerCore {
    content: Arc<dyn ContentSource>,
    images: Arc<dyn ImageSupplier>,
    platform: Arc<dyn Platform>,
}

impl SchedulerCore {
    /// Generate, normalize, acquire an image, and publish with fallback
    async fn compose_and_publish(&self, topic: Option<&str>) -> Result<GeneratedPost> {
        let generated = self.content.generate(topic).await?;
        let text = self.content.normalize(&generated.text);
        info!(
            "Generated {} content: {}...",
            generated.topic,
            text.chars().take(80).collect::<String>()
        );

        let image = self.images.acquire().await;
        match &image {
            Some(path) => info!("Posting with media {}", path.display()),
            None => info!("Posting text-only"),
        }

        self.platform
            .publish_with_fallback(&text, image.as_deref())
            .await?;

        Ok(GeneratedPost { text, ..generated })
    }

    /// Fire-and-forget execution for timer tasks; absorbs every error
    async fn execute_post(&self, job_id: &str) {
        info!("Executing scheduled post: {}", job_id);

        match self.compose_and_publish(None).await {
            Ok(post) => info!("Post completed for {} ({})", job_id, post.topic),
            Err(e) => {
                error!("Scheduled post {} failed: {}", job_id, e);

                match self.platform.publish(FALLBACK_TEXT, None).await {
                    Ok(_) => info!("Fallback message posted for {}", job_id),
                    Err(fallback_err) => {
                        error!("Even the fallback post failed for {}: {}", job_id, fallback_err)
                    }
                }
            }
        }
    }
}

/// Owns the job registry and the timer tasks behind it
pub struct PostScheduler {
    core: Arc<SchedulerCore>,
    posting_hours: Vec<u32>,
    random_delay_minutes: u32,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    running: AtomicBool,
}

impl PostScheduler {
    pub fn new(
        content: Arc<dyn ContentSource>,
        images: Arc<dyn ImageSupplier>,
        platform: Arc<dyn Platform>,
        posting_hours: Vec<u32>,
        random_delay_minutes: u32,
    ) -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                content,
                images,
                platform,
            }),
            posting_hours,
            random_delay_minutes,
            jobs: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Arm one recurring job per configured posting hour
    ///
    /// Idempotent: re-arming aborts any previous task registered under the
    /// same job id before installing the new one.
    pub fn arm_daily_schedule(&self) {
        info!("Setting up daily posting schedule");
        let now = Local::now();

        for (index, &hour) in self.posting_hours.iter().enumerate() {
            let minute = rand::thread_rng().gen_range(0..self.random_delay_minutes);
            let target = next_fire_after(now, hour, minute);
            let delay = (target - now).to_std().unwrap_or(Duration::ZERO);
            let job_id = format!("daily-post-{}-{}", index + 1, hour);

            let core = Arc::clone(&self.core);
            let id = job_id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                loop {
                    core.execute_post(&id).await;
                    tokio::time::sleep(RECURRENCE).await;
                }
            });

            self.install_job(job_id.clone(), handle);
            info!(
                "Scheduled {} for {}",
                job_id,
                target.format("%Y-%m-%d %H:%M:%S")
            );
        }

        self.running.store(true, Ordering::SeqCst);
        info!(
            "Scheduled {} posts per day at hours {:?}",
            self.posting_hours.len(),
            self.posting_hours
        );
    }

    fn install_job(&self, job_id: String, handle: JoinHandle<()>) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(previous) = jobs.insert(job_id, handle) {
            previous.abort();
        }
    }

    /// Run the pipeline once for an interactive caller
    pub async fn run_once(&self, topic: Option<&str>) -> PostOutcome {
        match topic {
            Some(tag) => info!("Posting immediately ({})", tag),
            None => info!("Posting immediately"),
        }

        match self.core.compose_and_publish(topic).await {
            Ok(post) => PostOutcome::ok(post),
            Err(e) => {
                error!("Immediate post failed: {}", e);
                PostOutcome::failed(e.to_string())
            }
        }
    }

    /// Abort every timer task and empty the registry
    pub fn stop_all(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        for (job_id, handle) in jobs.drain() {
            handle.abort();
            info!("Stopped job: {}", job_id);
        }
        self.running.store(false, Ordering::SeqCst);
        info!("All scheduled jobs stopped");
    }

    /// Probe each capability independently
    ///
    /// A failing probe never prevents the remaining probes from running.
    pub async fn test_components(&self) -> ComponentReport {
        let mut report = ComponentReport::default();

        match self.core.content.generate(None).await {
            Ok(_) => {
                info!("Content generation working");
                report.content = true;
            }
            Err(e) => warn!("Content generation failed: {}", e),
        }

        if self.core.images.acquire().await.is_some() {
            info!("Image acquisition working");
            report.image = true;
        } else {
            warn!("Image acquisition produced nothing");
        }

        match self.core.platform.verify_credentials().await {
            Ok(()) => {
                info!("Platform connection working");
                report.twitter = true;
            }
            Err(e) => warn!("Platform connection failed: {}", e),
        }

        report
    }

    /// The next absolute fire time for each configured hour, soonest first
    pub fn next_fire_times(&self) -> Vec<FireTime> {
        let now = Local::now();
        let mut times: Vec<FireTime> = self
            .posting_hours
            .iter()
            .map(|&hour| {
                let minute = rand::thread_rng().gen_range(0..self.random_delay_minutes);
                let at = next_fire_after(now, hour, minute);
                FireTime {
                    hour,
                    at,
                    until: at - now,
                }
            })
            .collect();
        times.sort_by_key(|t| t.until);
        times
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SchedulerStatus {
        let jobs = self.jobs.lock().unwrap();
        let mut job_ids: Vec<String> = jobs.keys().cloned().collect();
        job_ids.sort();
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            active_jobs: jobs.len(),
            job_ids,
            posting_hours: self.posting_hours.clone(),
        }
    }
}

/// Next local time at `hour:minute:00` strictly after `now`
pub(crate) fn next_fire_after(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    for day_offset in 0..=1 {
        let date = now.date_naive() + TimeDelta::days(day_offset);
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            if let Some(candidate) = naive.and_local_timezone(Local).earliest() {
                if candidate > now {
                    return candidate;
                }
            }
        }
    }
    // Only reachable when both days land in a DST gap
    now + TimeDelta::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::platforms::mock::MockPlatform;
    use async_trait::async_trait;
    use chrono::{TimeZone, Timelike};
    use std::path::PathBuf;

    struct StubContent {
        fail: bool,
    }

    #[async_trait]
    impl ContentSource for StubContent {
        async fn generate(&self, topic: Option<&str>) -> Result<GeneratedPost> {
            if self.fail {
                return Err(GenerationError::EmptyCompletion.into());
            }
            Ok(GeneratedPost {
                text: "stub post".to_string(),
                topic: topic.unwrap_or("privacy").to_string(),
                model: "stub-model".to_string(),
            })
        }

        fn normalize(&self, text: &str) -> String {
            text.trim().to_string()
        }

        fn topics(&self) -> Vec<String> {
            vec!["privacy".to_string()]
        }
    }

    struct StubImages {
        path: Option<PathBuf>,
    }

    #[async_trait]
    impl ImageSupplier for StubImages {
        async fn acquire(&self) -> Option<PathBuf> {
            self.path.clone()
        }

        fn cached_count(&self) -> usize {
            usize::from(self.path.is_some())
        }
    }

    fn scheduler(
        content_fails: bool,
        image: Option<PathBuf>,
        platform: Arc<MockPlatform>,
    ) -> PostScheduler {
        PostScheduler::new(
            Arc::new(StubContent {
                fail: content_fails,
            }),
            Arc::new(StubImages { path: image }),
            platform,
            vec![9, 12, 15, 18, 21],
            20,
        )
    }

    #[test]
    fn test_next_fire_after_rolls_past_hours_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();

        let past = next_fire_after(now, 9, 5);
        assert_eq!(past.date_naive(), now.date_naive() + TimeDelta::days(1));
        assert_eq!(past.hour(), 9);
        assert_eq!(past.minute(), 5);

        let future = next_fire_after(now, 15, 0);
        assert_eq!(future.date_naive(), now.date_naive());
        assert_eq!(future.hour(), 15);
    }

    #[test]
    fn test_next_fire_after_equal_time_rolls_over() {
        let now = Local.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let next = next_fire_after(now, 10, 0);
        assert_eq!(next.date_naive(), now.date_naive() + TimeDelta::days(1));
    }

    #[tokio::test]
    async fn test_run_once_success() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(false, None, platform.clone());

        let outcome = sched.run_once(Some("privacy")).await;
        assert!(outcome.success);
        assert_eq!(outcome.content.unwrap().text, "stub post");

        let publishes = platform.publishes();
        assert_eq!(publishes, vec![("stub post".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_run_once_returns_error_to_caller() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(true, None, platform.clone());

        let outcome = sched.run_once(None).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("empty completion"));
        assert_eq!(platform.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_run_once_surfaces_publish_failure() {
        let platform = MockPlatform::publish_failure("twitter", "service down");
        let sched = scheduler(false, None, platform.clone());

        let outcome = sched.run_once(None).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("service down"));
    }

    #[tokio::test]
    async fn test_execute_post_publishes_static_fallback_on_failure() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(true, None, platform.clone());

        sched.core.execute_post("daily-post-1-9").await;

        let publishes = platform.publishes();
        assert_eq!(publishes.len(), 1);
        assert_eq!(publishes[0], (FALLBACK_TEXT.to_string(), None));
    }

    #[tokio::test]
    async fn test_execute_post_absorbs_even_fallback_failure() {
        let platform = MockPlatform::publish_failure("twitter", "everything is down");
        let sched = scheduler(true, None, platform.clone());

        // Must not panic or propagate
        sched.core.execute_post("daily-post-1-9").await;
        assert_eq!(platform.publish_count(), 1);
    }

    #[tokio::test]
    async fn test_test_components_probes_independently() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(true, Some(PathBuf::from("/tmp/img.jpg")), platform);

        let report = sched.test_components().await;
        assert_eq!(
            report,
            ComponentReport {
                content: false,
                image: true,
                twitter: true,
            }
        );
    }

    #[tokio::test]
    async fn test_test_components_all_failing() {
        let platform = MockPlatform::verify_failure("twitter");
        let sched = scheduler(true, None, platform);

        let report = sched.test_components().await;
        assert!(!report.content);
        assert!(!report.image);
        assert!(!report.twitter);
        assert_eq!(report.failed(), vec!["content", "image", "twitter"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_daily_schedule_fires_and_rearms() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(false, None, platform.clone());

        sched.arm_daily_schedule();

        let status = sched.status();
        assert!(status.running);
        assert_eq!(status.active_jobs, 5);
        assert!(status.job_ids.contains(&"daily-post-1-9".to_string()));
        assert!(status.job_ids.contains(&"daily-post-5-21".to_string()));

        // A virtual day passes: every job fires at least once and stays registered
        tokio::time::sleep(Duration::from_secs(25 * 3600)).await;
        assert!(platform.publish_count() >= 5);
        assert_eq!(sched.status().active_jobs, 5);

        sched.stop_all();
        assert_eq!(sched.status().active_jobs, 0);
        assert!(!sched.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_keeps_one_handle_per_job_id() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(false, None, platform);

        sched.arm_daily_schedule();
        sched.arm_daily_schedule();

        let status = sched.status();
        assert_eq!(status.active_jobs, 5);

        sched.stop_all();
    }

    #[tokio::test]
    async fn test_next_fire_times_sorted_and_complete() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(false, None, platform);

        let times = sched.next_fire_times();
        assert_eq!(times.len(), 5);

        let now = Local::now();
        for fire in &times {
            assert!(fire.at > now - TimeDelta::minutes(1));
            assert!(sched.posting_hours.contains(&fire.hour));
        }
        assert!(times.windows(2).all(|w| w[0].until <= w[1].until));
    }

    #[tokio::test]
    async fn test_status_before_arming() {
        let platform = MockPlatform::success("twitter");
        let sched = scheduler(false, None, platform);

        let status = sched.status();
        assert!(!status.running);
        assert_eq!(status.active_jobs, 0);
        assert_eq!(status.posting_hours, vec![9, 12, 15, 18, 21]);
    }
}
