//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use warden::{Engine, EngineConfig};
use warden_core::{ManualClock, PermissionRecord, PrincipalId, Timestamp};

/// Fixed start time for fixtures: 2026-01-14T12:00:00Z.
pub const FIXTURE_EPOCH: Timestamp = 1_768_392_000_000;

/// A test fixture with an engine on a manual clock.
pub struct TestFixture {
    pub engine: Arc<Engine>,
    pub clock: Arc<ManualClock>,
}

impl TestFixture {
    /// Create a fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a fixture with a custom configuration.
    ///
    /// # Panics
    ///
    /// If the configuration is invalid.
    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));
        let engine = Engine::with_clock(config, clock.clone()).expect("fixture config is valid");
        Self {
            engine: Arc::new(engine),
            clock,
        }
    }

    /// The four reference principals:
    ///
    /// - `p1`: default group only
    /// - `p2`: moderator (inherits default)
    /// - `p3`: admin (`*`)
    /// - `p4`: admin, with a direct deny on `admin.kick`
    pub fn populated() -> Self {
        let fixture = Self::new();
        let engine = &fixture.engine;

        engine.get_or_create(&principal("p1")).expect("p1");
        engine.add_to_group(&principal("p2"), "moderator").expect("p2");
        engine.add_to_group(&principal("p3"), "admin").expect("p3");
        engine.add_to_group(&principal("p4"), "admin").expect("p4");
        engine
            .set_direct_permission(
                &principal("p4"),
                PermissionRecord::deny("admin.kick").reason("probation"),
            )
            .expect("p4 deny");

        fixture
    }

    /// Current fixture time.
    pub fn now(&self) -> Timestamp {
        self.engine.now()
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a principal id.
pub fn principal(id: &str) -> PrincipalId {
    PrincipalId::from(id)
}
