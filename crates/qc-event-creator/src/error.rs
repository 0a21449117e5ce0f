use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreatorError {
    #[error("event built but its registration into the shadow graph was rejected: {outcome:?}")]
    RegistrationRejected { outcome: qc_shadow_graph::InsertOutcome },
    #[error(transparent)]
    Event(#[from] qc_event_core::EventError),
}
