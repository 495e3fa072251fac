use crate::dto::HealthRes;

/// Health check shared by every HTTP entry point.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static check; the service holds no state.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "PhysiHome is alive".into(),
        }
    }
}
