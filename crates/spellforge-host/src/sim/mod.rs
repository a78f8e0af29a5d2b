//! In-memory simulated host.
//!
//! [`SimHost`] bundles a [`SimWorld`], a [`SimClock`], and a
//! [`RecordingLog`] and hands them out as a [`Services`] bundle. Time and
//! physics only advance when [`SimHost::advance`] is called, which makes
//! delayed spell behaviour fully deterministic under test.

mod clock;
mod world;

use std::sync::Arc;

pub use clock::SimClock;
pub use world::{SimEffect, SimObject, SimWorld, SimWorldConfig};

use crate::journal::RecordingLog;
use crate::Services;

/// Clears pending continuations when the last host clone goes away.
///
/// Contact listeners and timers usually capture a [`Services`] bundle that
/// points back at the same world and clock, so they would otherwise keep
/// each other alive.
#[derive(Debug)]
struct Teardown {
    world: Arc<SimWorld>,
    clock: Arc<SimClock>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let listeners = self.world.clear_listeners();
        let timers = self.clock.clear();
        if listeners + timers > 0 {
            tracing::debug!(listeners, timers, "simulated host dropped with pending work");
        }
    }
}

/// A complete simulated host.
///
/// Clones share the same world, clock, and log. When the last clone is
/// dropped, contact listeners that never fired and timers that never ran
/// are discarded; [`Services`] handed out earlier keep working otherwise.
///
/// # Example
///
/// ```
/// use spellforge_host::sim::SimHost;
///
/// let host = SimHost::new();
/// host.advance(0.5);
/// assert!((host.clock().now() - 0.5).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct SimHost {
    world: Arc<SimWorld>,
    clock: Arc<SimClock>,
    log: Arc<RecordingLog>,
    _teardown: Arc<Teardown>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Creates a host with an empty world at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SimWorldConfig::default())
    }

    /// Creates a host whose world uses `config`.
    #[must_use]
    pub fn with_config(config: SimWorldConfig) -> Self {
        let world = Arc::new(SimWorld::with_config(config));
        let clock = Arc::new(SimClock::new());
        Self {
            _teardown: Arc::new(Teardown {
                world: Arc::clone(&world),
                clock: Arc::clone(&clock),
            }),
            world,
            clock,
            log: Arc::new(RecordingLog::new()),
        }
    }

    /// The simulated world.
    #[must_use]
    pub fn world(&self) -> &Arc<SimWorld> {
        &self.world
    }

    /// The simulated clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<SimClock> {
        &self.clock
    }

    /// The spell log recorder.
    #[must_use]
    pub fn log(&self) -> &Arc<RecordingLog> {
        &self.log
    }

    /// Capability bundle backed by this host.
    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            objects: self.world.clone(),
            contacts: self.world.clone(),
            effects: self.world.clone(),
            scheduler: self.clock.clone(),
            log: self.log.clone(),
        }
    }

    /// Steps physics by `dt`, then runs every scheduled action that fell due.
    pub fn advance(&self, dt: f32) {
        self.world.step(dt);
        self.clock.advance(f64::from(dt));
    }

    /// Advances in steps of `dt` until `total` seconds have elapsed.
    pub fn run_for(&self, total: f32, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let mut elapsed = 0.0_f32;
        while elapsed + dt <= total + f32::EPSILON {
            self.advance(dt);
            elapsed += dt;
        }
    }
}
