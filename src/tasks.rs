use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limit::{RateLimit, Throttle};

/// Shortest pause between rate-limiter sweeps.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let throttle = match rocket.state::<Arc<Throttle>>() {
            Some(t) => Arc::clone(t),
            None => return,
        };
        let window = match throttle.rate {
            RateLimit::PerWindow { window, .. } => window,
            RateLimit::Unlimited => return,
        };
        log::info!("setting webserver rate-limit to {}", throttle.rate);

        // Rate-limiter eviction task
        let interval = window.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let evicted = throttle.sweep();
                if evicted > 0 {
                    log::debug!(
                        "[task] Evicted {} idle rate-limit entries ({} tracked)",
                        evicted,
                        throttle.limiter.tracked()
                    );
                }
            }
        });
    }
}
