//! Background service that closes edit sessions nobody has touched in a while.
//!
//! Clients that vanish without sending LEAVE (closed laptop, dropped network)
//! would otherwise show up as editors forever.

use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info};

use super::session_tracker::SessionTracker;

#[derive(Debug, Clone)]
pub struct SessionSweeperConfig {
    /// How often to sweep (default: 1 minute)
    pub sweep_interval: StdDuration,
    /// Sessions idle for longer than this are removed (default: 5 minutes)
    pub idle_threshold: Duration,
}

impl Default for SessionSweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: StdDuration::from_secs(60),
            idle_threshold: Duration::minutes(5),
        }
    }
}

pub fn spawn_session_sweeper(tracker: SessionTracker, config: SessionSweeperConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(config.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match tracker.sweep(config.idle_threshold).await {
                Ok(removed) if removed > 0 => {
                    info!(
                        removed,
                        idle_secs = config.idle_threshold.num_seconds(),
                        "Removed inactive edit sessions"
                    );
                }
                Ok(_) => debug!("No inactive edit sessions"),
                Err(e) => error!(error = ?e, "Failed to sweep edit sessions"),
            }
        }
    })
}
