use std::{env, time::Duration};

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "touchline";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration describing how to connect to CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upper bound for a single request, so a hung server cannot stall a sync cycle.
    pub request_timeout: Duration,
}

impl CouchConfig {
    /// Construct a configuration from explicit base URL and database name.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a configuration from `COUCH_BASE_URL`, `COUCH_DB` and optional credentials.
    ///
    /// `COUCH_BASE_URL` is mandatory; the database defaults to `touchline`.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let mut config = Self::new(base_url, database);

        if let (Ok(username), Ok(password)) =
            (env::var("COUCH_USERNAME"), env::var("COUCH_PASSWORD"))
        {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}
