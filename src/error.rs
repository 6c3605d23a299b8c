/// Errors returned by the experiment service and its components.
///
/// Every error carries enough context to be reported back to the API caller;
/// use [`Error::kind`] to branch on the category without matching every
/// variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a point lies outside the declared domain.
    #[error("point outside domain: {0}")]
    Domain(String),

    /// Returned when the objective function fails for a point.
    ///
    /// The epoch is aborted; history is left untouched and the epoch may be
    /// retried.
    #[error("objective evaluation failed at epoch {epoch}: {reason}")]
    ObjectiveEvaluation {
        /// The epoch index that was being evaluated.
        epoch: u64,
        /// Why the evaluation failed.
        reason: String,
    },

    /// Returned when an operation is not allowed in the experiment's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Returned when requesting the best observation of an empty history.
    #[error("no observations recorded")]
    EmptyHistory,

    /// Returned when a session token is missing, expired, or not allowed to
    /// act on the experiment.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    /// Returned when an experiment configuration payload is rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Returned when an experiment id is not known to the service.
    #[error("experiment not found: {0}")]
    NotFound(String),

    /// Returned when the surrogate model cannot be fitted.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),

    /// Returned when a storage operation fails.
    #[cfg(feature = "journal")]
    #[error("storage error: {0}")]
    Storage(String),
}

/// Reasons an authentication check can fail.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// No user is registered under this id.
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// The user exists but the password does not match.
    #[error("invalid password")]
    InvalidPassword,

    /// A registration reused an existing user id.
    #[error("user '{0}' already registered")]
    AlreadyRegistered(String),

    /// The registration payload is malformed (e.g. passwords differ).
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    /// The session token is not known to the service.
    #[error("invalid session token")]
    InvalidToken,

    /// The session token was valid once but has expired.
    #[error("session token expired")]
    ExpiredToken,

    /// The session belongs to a user who does not own the experiment.
    #[error("user '{user}' may not access experiment {experiment}")]
    Forbidden {
        /// The user attached to the session.
        user: String,
        /// The experiment that was requested.
        experiment: String,
    },
}

/// Coarse error categories reported to API callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::Domain`].
    Domain,
    /// See [`Error::ObjectiveEvaluation`].
    ObjectiveEvaluation,
    /// See [`Error::InvalidState`].
    InvalidState,
    /// See [`Error::EmptyHistory`].
    EmptyHistory,
    /// See [`Error::Auth`].
    Auth,
    /// See [`Error::Config`].
    Config,
    /// See [`Error::NotFound`].
    NotFound,
    /// Model fitting, storage, task, or internal failures.
    Internal,
}

impl Error {
    /// Return the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(_) => ErrorKind::Domain,
            Self::ObjectiveEvaluation { .. } => ErrorKind::ObjectiveEvaluation,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::EmptyHistory => ErrorKind::EmptyHistory,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ModelFit(_) | Self::Internal(_) => ErrorKind::Internal,
            #[cfg(feature = "async")]
            Self::TaskError(_) => ErrorKind::Internal,
            #[cfg(feature = "journal")]
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ObjectiveEvaluation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
