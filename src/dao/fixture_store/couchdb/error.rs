//! Error types shared by the CouchDB storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            // Conflicts are transient: the next cycle re-reads the revision.
            CouchDaoError::RequestStatus { ref path, status }
                if status.is_client_error() && status != StatusCode::CONFLICT =>
            {
                StorageError::rejected(format!("CouchDB refused `{path}` with status {status}"))
            }
            other => StorageError::unavailable("CouchDB request failed".into(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_become_rejections_except_conflicts() {
        let rejected: StorageError = CouchDaoError::RequestStatus {
            path: "goal::fx:1".into(),
            status: StatusCode::BAD_REQUEST,
        }
        .into();
        assert!(matches!(rejected, StorageError::Rejected { .. }));

        let conflict: StorageError = CouchDaoError::RequestStatus {
            path: "goal::fx:1".into(),
            status: StatusCode::CONFLICT,
        }
        .into();
        assert!(matches!(conflict, StorageError::Unavailable { .. }));

        let server: StorageError = CouchDaoError::RequestStatus {
            path: "goal::fx:1".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
        .into();
        assert!(matches!(server, StorageError::Unavailable { .. }));
    }
}
