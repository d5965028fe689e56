use crate::dto::HealthRes;

/// Simple health service used by the REST API and the combined runner.
///
/// Provides a standardised way to check the health status of the UQM system.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "UQM is alive".into(),
        }
    }
}
