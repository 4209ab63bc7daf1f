//! Background expiry sweeper.
//!
//! Expired records are already invisible to queries; the sweeper only
//! reclaims them. It runs `Engine::sweep_expired` on a fixed tokio interval
//! until its handle is stopped or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Handle to a running sweeper task.
///
/// Dropping the handle also stops the task, at its next wake-up.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Ask the task to stop and wait for it to finish.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone; that's fine.
            let _ = shutdown.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| EngineError::Sweeper(e.to_string()))
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task sweeping `engine` every `interval`.
///
/// Must be called from within a tokio runtime. The first sweep happens one
/// full interval after spawning.
pub fn spawn_sweeper(engine: Arc<Engine>, interval: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(interval_ms = interval.as_millis() as u64, "sweeper started");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    engine.sweep_expired();
                }
            }
        }
        tracing::info!("sweeper stopped");
    });

    SweeperHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ManualClock, PermissionRecord, PrincipalId};

    use crate::config::EngineConfig;

    #[tokio::test]
    async fn test_sweeper_removes_expired_records() {
        let clock = Arc::new(ManualClock::new(0));
        let engine =
            Arc::new(Engine::with_clock(EngineConfig::default(), clock.clone()).unwrap());
        let p = PrincipalId::from("p");
        engine
            .set_direct_permission(&p, PermissionRecord::allow("fly").expires_at(10))
            .unwrap();
        clock.set(11);

        let handle = spawn_sweeper(engine.clone(), Duration::from_millis(5));

        let mut swept = false;
        for _ in 0..200 {
            if engine.direct_permissions_of(&p).is_empty() {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(swept);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let engine = Arc::new(Engine::new(EngineConfig::default()).unwrap());
        let handle = engine.spawn_sweeper();
        assert!(!handle.is_finished());
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_ends_task() {
        let engine = Arc::new(Engine::new(EngineConfig::default()).unwrap());
        let handle = spawn_sweeper(engine.clone(), Duration::from_millis(5));
        drop(handle);

        // Only our reference remains once the task exits.
        for _ in 0..200 {
            if Arc::strong_count(&engine) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sweeper task still holds the engine");
    }
}
