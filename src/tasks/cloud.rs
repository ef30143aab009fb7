// BreatheRight — Cloud Reporting Task
//
// Once a minute: snapshot both readings, drain the cough/sneeze counters and
// push one shadow report. A failed publish gives the drained counts back to
// the store so they go out with the next report.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::config::*;
use crate::ports::CloudSync;
use crate::shadow::ShadowReport;
use crate::state::SharedState;

pub struct Reporter<C> {
    cloud: C,
    state: Arc<SharedState>,
}

impl<C: CloudSync> Reporter<C> {
    pub fn new(cloud: C, state: Arc<SharedState>) -> Self {
        Self { cloud, state }
    }

    pub fn report_once(&mut self) -> anyhow::Result<ShadowReport> {
        let env = self.state.snapshot_environmental();
        let pm = self.state.snapshot_particulate();
        let events = self.state.drain_events();

        let report = ShadowReport::new(env, pm, events, self.state.hqi_status());

        if let Err(e) = self.cloud.report(&report) {
            self.state.increment_events(events.coughs, events.sneezes);
            return Err(e);
        }

        log::info!(
            "Shadow reported: PM2.5={} µg/m³, {:.2} °C, {} cough(s), {} sneeze(s), hqiStatus={}",
            report.pm2_5,
            report.temperature,
            report.coughs,
            report.sneezes,
            report.hqi_status
        );
        Ok(report)
    }
}

pub fn cloud_task<C: CloudSync>(cloud: C, state: Arc<SharedState>) {
    log::info!("Cloud task started (every {} s)", CLOUD_REPORT_INTERVAL_MS / 1000);

    let mut reporter = Reporter::new(cloud, state);
    let period = Duration::from_millis(CLOUD_REPORT_INTERVAL_MS);

    // First report after one full period, once the sensors have settled.
    std::thread::sleep(period);
    super::every(period, || {
        if let Err(e) = reporter.report_once() {
            log::warn!("Shadow update failed, retrying next cycle: {}", e);
        }
        ControlFlow::Continue(())
    });
}
