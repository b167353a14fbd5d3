//! Poll-loop service, the application core.
//!
//! Owns the immutable sensor list and node identity, and drives one
//! tick: read every enabled sensor through its driver, apply the
//! calibration corrections, render the payload lines, and hand them to
//! the publisher. Failures are per-sensor and never abort the tick.
//!
//! ```text
//!  RegisterBus ──▶ ┌──────────────────────┐ ──▶ LinePublisher
//!  (w1 sysfs)  ──▶ │     PollService      │ ──▶ stdout/stderr
//!                  └──────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{NodeConfig, Sensor};
use crate::drivers::{self, ReadingOutcome};
use crate::format;
use crate::schedule::PollSchedule;

use super::ports::{LinePublisher, RegisterBus};

/// Granularity at which the inter-tick wait re-checks the shutdown flag.
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// One rendered payload line plus where it belongs on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLine {
    pub text: String,
    pub is_error: bool,
}

/// The sensor-polling core. Constructed once from the validated config;
/// sensor state never mutates after that.
pub struct PollService {
    node: String,
    sensors: Vec<Sensor>,
    w1_root: PathBuf,
}

impl PollService {
    pub fn new(config: &NodeConfig, w1_root: PathBuf) -> Self {
        Self {
            node: config.node.clone(),
            sensors: config.sensors.clone(),
            w1_root,
        }
    }

    /// Render the payload lines for one sensor's outcome. Pure; used by
    /// the tick and directly testable.
    pub fn render(&self, sensor: &Sensor, outcome: &ReadingOutcome) -> Vec<PayloadLine> {
        match outcome {
            Ok(raws) => sensor
                .values
                .iter()
                .zip(raws)
                .map(|(value, raw)| PayloadLine {
                    text: format::reading_line(
                        &value.measurand,
                        &sensor.location,
                        &self.node,
                        sensor.kind,
                        raw + value.correction,
                    ),
                    is_error: false,
                })
                .collect(),
            Err(e) => vec![PayloadLine {
                text: format::error_line(&sensor.location, &self.node, sensor.kind, e),
                is_error: true,
            }],
        }
    }

    /// One full pass over the configured sensors. Disabled sensors are
    /// not touched at all: no read, no line.
    pub fn tick<B: RegisterBus, P: LinePublisher>(
        &self,
        mut bus: Option<&mut B>,
        publisher: &mut P,
    ) {
        for sensor in self.sensors.iter().filter(|s| s.is_enabled()) {
            debug!("polling {} at {}", sensor.kind, sensor.location);
            let reborrowed = bus.as_mut().map(|b| &mut **b);
            let outcome = drivers::read_sensor(sensor, reborrowed, &self.w1_root);

            for line in self.render(sensor, &outcome) {
                if line.is_error {
                    eprintln!("{}", line.text);
                } else {
                    println!("{}", line.text);
                }
                if let Err(e) = publisher.publish(&line.text) {
                    // Steady-state delivery is the transport's problem;
                    // surfacing it as a sensor error would be wrong.
                    warn!("{e}");
                }
            }
        }
    }

    /// Run ticks on the fixed cadence until `shutdown` is raised, then
    /// close the publisher cleanly.
    pub fn run<B: RegisterBus, P: LinePublisher>(
        &self,
        mut bus: Option<B>,
        mut publisher: P,
        interval: Duration,
        shutdown: &AtomicBool,
    ) {
        let mut schedule = PollSchedule::new(interval, Instant::now());
        while !shutdown.load(Ordering::SeqCst) {
            self.tick(bus.as_mut(), &mut publisher);

            let mut wait = schedule.wait_after_tick(Instant::now());
            while wait > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
                let slice = wait.min(WAIT_SLICE);
                std::thread::sleep(slice);
                wait -= slice;
            }
        }
        publisher.shutdown();
    }
}
