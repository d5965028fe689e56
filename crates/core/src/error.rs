/// Typed failures surfaced by the queue-management core.
///
/// Every state-machine operation returns one of these as a typed result; there
/// is no silent mutation on failure paths. Callers (the REST surface) translate
/// the taxonomy into status codes.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// A referenced ticket, counter, room, journey template or open
    /// department visit does not exist. Never retried automatically.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// The requested state change violates the state machine. The caller must
    /// not retry without changing the request.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    /// A uniqueness or exclusivity invariant would be violated (double counter
    /// claim, duplicate room, already-cleared payment, racing writer losing a
    /// conditional update). Safe to retry after re-reading current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The record store failed in a way the core cannot interpret. The
    /// operation is left unmutated.
    #[error("store failure: {0}")]
    Store(String),
    /// A request parameter failed validation before any state was touched.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read journey catalogue: {0}")]
    CatalogueRead(std::io::Error),
    #[error("failed to parse journey catalogue: {0}")]
    CatalogueParse(serde_yaml::Error),
    #[error("failed to read snapshot file: {0}")]
    SnapshotRead(std::io::Error),
    #[error("failed to write snapshot file: {0}")]
    SnapshotWrite(std::io::Error),
    #[error("failed to deserialize snapshot: {0}")]
    SnapshotParse(serde_json::Error),
    #[error("failed to serialize snapshot: {0}")]
    SnapshotSerialize(serde_json::Error),
}

impl QueueError {
    /// Shorthand for a `NotFound` over any id type that renders to a string.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        QueueError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether re-reading current state and re-issuing the request can
    /// succeed. Only `Conflict` qualifies; everything else needs a changed
    /// request or operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Conflict(_))
    }
}

impl From<uqm_types::TypeError> for QueueError {
    fn from(err: uqm_types::TypeError) -> Self {
        QueueError::InvalidInput(err.to_string())
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
