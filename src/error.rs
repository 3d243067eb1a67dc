use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use reqwest::StatusCode;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, CourierError>;

#[derive(Debug, ThisError)]
pub enum CourierError {
    #[error("message {id} is already recorded in the ledger")]
    DuplicateRecord { id: String },

    #[error("schema migration failed: {0}")]
    SchemaMigration(String),

    #[error("failed to load credential: {0}")]
    CredentialLoad(String),

    #[error("authorization grant exchange failed: {0}")]
    GrantExchange(String),

    #[error("no folder id could be derived from location reference: {url}")]
    InvalidLocationReference { url: String },

    #[error("upload rejected with status {status}: {body}")]
    UploadRejected { status: StatusCode, body: String },

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl CourierError {
    /// True when the error only says the message was handled before.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CourierError::DuplicateRecord { .. })
    }

    /// Whether the caller should abort the current operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CourierError::DuplicateRecord { .. } | CourierError::SchemaMigration(_)
        )
    }
}

impl From<figment::Error> for CourierError {
    fn from(e: figment::Error) -> Self {
        CourierError::Config(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for CourierError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                let detail = err
                    .error_description()
                    .map(|d| format!("{}: {}", err.error(), d))
                    .unwrap_or_else(|| err.error().to_string());
                CourierError::GrantExchange(detail)
            }
            RequestTokenError::Request(req_e) => {
                CourierError::GrantExchange(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                CourierError::GrantExchange(format!("unreadable token response: {}", parse_err))
            }
            RequestTokenError::Other(s) => CourierError::GrantExchange(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_and_migration_errors_are_not_fatal() {
        let dup = CourierError::DuplicateRecord { id: "m1".into() };
        assert!(dup.is_duplicate());
        assert!(!dup.is_fatal());

        let migration = CourierError::SchemaMigration("disk I/O error".into());
        assert!(!migration.is_duplicate());
        assert!(!migration.is_fatal());
    }

    #[test]
    fn location_and_grant_errors_are_fatal() {
        let loc = CourierError::InvalidLocationReference {
            url: "https://drive.google.com/shared/x".into(),
        };
        assert!(loc.is_fatal());
        assert!(loc.to_string().contains("https://drive.google.com/shared/x"));

        assert!(CourierError::GrantExchange("invalid_grant".into()).is_fatal());
        assert!(CourierError::CredentialLoad("bad json".into()).is_fatal());
    }
}
