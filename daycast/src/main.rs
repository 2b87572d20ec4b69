//! daycast - scheduled AI content posting bot
//!
//! Thin CLI over the automation facade: start the daily schedule, inspect
//! status, probe components, or post immediately.

use clap::{Parser, Subcommand};
use libdaycast::{Automation, BotError, Config, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "daycast")]
#[command(version)]
#[command(about = "Scheduled AI content posting bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the automation and keep posting on schedule
    Start,
    /// Stop all scheduled jobs
    Stop,
    /// Show automation status
    Status,
    /// Probe content generation, image fetching, and platform access
    Test,
    /// Post immediately, optionally steered to a topic tag
    Post {
        /// Topic tag; run `status` to list the available tags
        topic: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libdaycast::logging::init_default();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let automation = Automation::new(config)?;

    match cli.command.unwrap_or(Command::Start) {
        Command::Start => {
            automation.start().await;
            wait_for_shutdown().await?;
            automation.stop();
        }
        Command::Stop => {
            automation.stop();
            println!("All scheduled jobs stopped");
        }
        Command::Status => {
            print_status(&automation);
        }
        Command::Test => {
            let report = automation.test_components().await;
            println!("content: {}", mark(report.content));
            println!("image:   {}", mark(report.image));
            println!("twitter: {}", mark(report.twitter));
        }
        Command::Post { topic } => {
            let outcome = automation.post_now(topic.as_deref()).await;
            match outcome.content {
                Some(content) if outcome.success => {
                    println!("Posted {} content ({} chars)", content.topic, content.text.chars().count());
                }
                _ => {
                    eprintln!(
                        "Post failed: {}",
                        outcome.error.unwrap_or_else(|| "unknown error".to_string())
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Wait until SIGINT or SIGTERM arrives
async fn wait_for_shutdown() -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let shutdown = Arc::new(AtomicBool::new(false));

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| BotError::InvalidInput(format!("Signal setup failed: {}", e)))?;
    let flag = shutdown.clone();
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            flag.store(true, Ordering::Relaxed);
        }
    });

    println!("Daycast is running. Press Ctrl+C to stop.");

    while !shutdown.load(Ordering::Relaxed) {
        sleep(Duration::from_secs(1)).await;
    }

    info!("Received shutdown signal, stopping gracefully");
    Ok(())
}

fn print_status(automation: &Automation) {
    let status = automation.status();

    println!("Version: {}", status.version);
    println!("Running: {}", if status.running { "yes" } else { "no" });
    println!("Active jobs: {}", status.active_jobs);
    println!("Cached images: {}", status.cached_images);

    if !status.next_posts.is_empty() {
        println!();
        println!("Next posts:");
        for (index, fire) in status.next_posts.iter().enumerate() {
            println!(
                "  {}. {} ({} minutes from now)",
                index + 1,
                fire.at.format("%Y-%m-%d %H:%M"),
                fire.until.num_minutes()
            );
        }
    }

    println!();
    println!("Topics: {}", status.topics.join(", "));
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}
