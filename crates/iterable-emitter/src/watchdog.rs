//! Inactivity watchdog.
//!
//! A re-armed heartbeat rather than an absolute deadline: any data event
//! within a window keeps the stream alive for the next one.

use crate::bridge::Bridge;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Spawns the periodic check on `runtime`.
///
/// The task exits when the stream is done, when it raises a stall, or when
/// the adapter and all of its handles have been dropped.
pub(crate) fn spawn<A, T>(
    runtime: &Handle,
    bridge: Weak<Bridge<A, T>>,
    period: Duration,
) -> AbortHandle
where
    A: 'static,
    T: Send + 'static,
{
    let task = runtime.spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let Some(bridge) = bridge.upgrade() else {
                break;
            };
            if !bridge.watchdog_tick() {
                break;
            }
        }
    });
    task.abort_handle()
}
