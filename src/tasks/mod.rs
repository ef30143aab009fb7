// BreatheRight — Task Loops
//
// Every long-running job is a named std::thread (a FreeRTOS task on
// ESP-IDF) that owns its drivers and shares an `Arc<SharedState>`.

pub mod cloud;
pub mod inference;
pub mod led;
pub mod microphone;
pub mod particulate;
pub mod sample;

use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Spawn a task thread with an explicit name and stack size.
pub fn spawn<F>(name: &str, stack_size: usize, body: F) -> anyhow::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.into())
        .stack_size(stack_size)
        .spawn(body)?;
    Ok(handle)
}

/// Run `body` once per `period` until it breaks.
///
/// Sleeps for the remainder of each period, so a slow tick shortens the
/// next sleep rather than drifting the schedule. A tick that overruns the
/// period starts the next one immediately.
pub fn every<F>(period: Duration, mut body: F)
where
    F: FnMut() -> ControlFlow<()>,
{
    loop {
        let tick_start = Instant::now();

        if body().is_break() {
            return;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < period {
            thread::sleep(period - elapsed);
        }
    }
}
