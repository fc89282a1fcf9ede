use std::time::Duration;
use thiserror::Error;
use url::form_urlencoded::byte_serialize;

pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "unicorn_ecommerce_dev";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required DocumentDB environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value '{value}' for {var}")]
    Invalid {
        var: &'static str,
        value: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentDbConfig {
    pub uri: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_ca_certs: Option<String>,
}

impl DocumentDbConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = get("DOCUMENTDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let ssl_ca_certs = get("DOCUMENTDB_SSL_CA_CERTS");

        if let Some(uri) = get("DOCUMENTDB_URI") {
            return Ok(Self {
                uri: Some(uri),
                host: String::new(),
                port: DEFAULT_PORT,
                username: String::new(),
                password: String::new(),
                database,
                ssl_ca_certs,
            });
        }

        let host = get("DOCUMENTDB_HOST");
        let username = get("DOCUMENTDB_USERNAME");
        let password = get("DOCUMENTDB_PASSWORD");

        let mut missing = Vec::new();
        if host.is_none() {
            missing.push("DOCUMENTDB_HOST");
        }
        if username.is_none() {
            missing.push("DOCUMENTDB_USERNAME");
        }
        if password.is_none() {
            missing.push("DOCUMENTDB_PASSWORD");
        }
        let (Some(host), Some(username), Some(password)) = (host, username, password) else {
            return Err(ConfigError::Missing(missing));
        };

        let port = match get("DOCUMENTDB_PORT") {
            Some(raw) =>
                raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                    var: "DOCUMENTDB_PORT",
                    value: raw.clone(),
                })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            uri: None,
            host,
            port,
            username,
            password,
            database,
            ssl_ca_certs,
        })
    }

    pub fn connection_uri(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.clone();
        }
        let user = percent_encode(&self.username);
        let pass = percent_encode(&self.password);

        let tls = match &self.ssl_ca_certs {
            Some(ca) => {
                format!("tls=true&tlsCAFile={}", percent_encode(ca))
            }
            None => "tls=true&tlsAllowInvalidCertificates=true".to_string(),
        };

        format!(
            "mongodb://{}:{}@{}:{}/{}?{}&replicaSet=rs0&readPreference=secondaryPreferred&retryWrites=false",
            user,
            pass,
            self.host,
            self.port,
            self.database,
            tls
        )
    }

    pub fn redacted_target(&self) -> String {
        match &self.uri {
            Some(_) => format!("<DOCUMENTDB_URI>/{}", self.database),
            None => format!("{}@{}:{}/{}", self.username, self.host, self.port, self.database),
        }
    }
}

/// The driver percent-decodes URI components but reads `+` literally, so
/// the form encoding of a space has to be spelled `%20`.
fn percent_encode(raw: &str) -> String {
    byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
