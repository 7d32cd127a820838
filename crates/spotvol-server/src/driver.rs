use std::sync::Arc;
use std::time::Duration;

use spotvol_core::PriceService;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Run the cached fetch-and-store every `period` until the handle is aborted.
///
/// The first pass starts immediately. Failed passes are logged and the loop
/// carries on with the next tick.
pub fn spawn_refresh_loop(service: Arc<PriceService>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "refresh driver started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_tick(&service).await;
        }
    })
}

/// One scheduled refresh. Returns whether it succeeded.
pub async fn run_tick(service: &PriceService) -> bool {
    match service.refresh().await {
        Ok(snapshot) => {
            debug!(captured_at = %snapshot.captured_at, "scheduled refresh done");
            true
        }
        Err(err) => {
            error!(code = err.code(), error = %err, "scheduled refresh failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{service_with_source, StubSource};

    #[tokio::test]
    async fn tick_reports_success_and_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (service, _, warehouse) = service_with_source(&temp, StubSource::healthy());
        assert!(run_tick(&service).await);
        assert_eq!(warehouse.sample_count(None).expect("count"), 8);

        let temp = tempfile::tempdir().expect("tempdir");
        let (service, _, _) = service_with_source(&temp, StubSource::failing());
        assert!(!run_tick(&service).await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_do_not_stop_the_loop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (service, source, _) = service_with_source(&temp, StubSource::failing());

        let handle = spawn_refresh_loop(service, Duration::from_secs(120));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.request_count(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.request_count(), 2);

        handle.abort();
    }
}
