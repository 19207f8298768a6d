use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

pub const GEOLOCATION_TIMEOUT_MS: u64 = 10_000;
pub const GEOLOCATION_MAX_AGE_MS: u64 = 300_000;

/// Ask the shell for a single position fix from the platform's location
/// service. The core never polls for position continuously; the dashboard
/// only needs a fix at the moment location filtering is switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOperation {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    /// A cached fix no older than this is acceptable.
    pub max_age_ms: u64,
}

impl Default for LocationOperation {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: GEOLOCATION_TIMEOUT_MS,
            max_age_ms: GEOLOCATION_MAX_AGE_MS,
        }
    }
}

/// Outcome of a fix request. Denial and unavailability are distinct
/// outcomes rather than errors: the core treats both as "no coordinates"
/// and never substitutes a made-up position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationOutput {
    Fix { latitude: f64, longitude: f64 },
    PermissionDenied,
    Unavailable { message: String },
}

impl Operation for LocationOperation {
    type Output = LocationOutput;
}

#[derive(crux_core::macros::Capability)]
pub struct Location<Ev> {
    context: CapabilityContext<LocationOperation, Ev>,
}

impl<Ev> Clone for Location<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Location<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<LocationOperation, Ev>) -> Self {
        Self { context }
    }

    /// Request one position fix with the default options.
    pub fn current_position<F>(&self, make_event: F)
    where
        F: FnOnce(LocationOutput) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let fix = context
                .request_from_shell(LocationOperation::default())
                .await;
            context.update_app(make_event(fix));
        });
    }
}
