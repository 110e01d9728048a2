use berth_allocation::EngineError;

pub const EXIT_INTERNAL: u8 = 1;
pub const EXIT_VALIDATION: u8 = 2;
pub const EXIT_EXHAUSTED: u8 = 3;
pub const EXIT_IDENTITY: u8 = 4;
/// EX_TEMPFAIL from sysexits.h; the caller may retry.
pub const EXIT_RETRY: u8 = 75;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid input: {0:#}")]
    Input(anyhow::Error),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl AdminError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AdminError::Engine(err) => match err {
                EngineError::Validation(_) => EXIT_VALIDATION,
                EngineError::NoCapacity | EngineError::NoBerthAvailable { .. } => EXIT_EXHAUSTED,
                EngineError::NotFound(_)
                | EngineError::AlreadyReleased(_)
                | EngineError::StillAdmitted(_) => EXIT_IDENTITY,
                EngineError::TemporarilyUnavailable(_) => EXIT_RETRY,
                EngineError::Internal(_) => {
                    tracing::error!("Internal engine error: {}", err);
                    EXIT_INTERNAL
                }
            },
            AdminError::Input(_) => EXIT_VALIDATION,
            AdminError::Output(_) => EXIT_INTERNAL,
        }
    }
}
