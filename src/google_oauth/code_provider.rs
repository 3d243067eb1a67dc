use crate::error::{CourierError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

/// Supplies the authorization code for the interactive grant.
///
/// Called at most once per grant; implementations may block for as long as
/// the operator needs.
#[async_trait]
pub trait CodeProvider: Send + Sync {
    async fn request_code(&self, authorize_url: &Url) -> Result<String>;
}

/// Shows the consent URL on stderr and reads the code from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinCodeProvider;

#[async_trait]
impl CodeProvider for StdinCodeProvider {
    async fn request_code(&self, authorize_url: &Url) -> Result<String> {
        eprintln!("Open this link in a browser to authorize access:\n\n  {authorize_url}\n");
        eprintln!("Paste the authorization code (or the full redirect URL):");

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(CourierError::GrantExchange(
                "stdin closed before an authorization code was entered".to_string(),
            ));
        }
        Ok(line.trim().to_string())
    }
}

/// Pull the code out of operator input, which may be the bare code or the
/// URL the browser was redirected to. A `state` parameter, when present,
/// must match `expected_state`.
pub(super) fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CourierError::GrantExchange(
            "empty authorization code".to_string(),
        ));
    }

    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => {
                return Err(CourierError::GrantExchange(format!(
                    "authorization denied: {v}"
                )));
            }
            _ => {}
        }
    }

    if let Some(state) = state
        && state != expected_state
    {
        return Err(CourierError::GrantExchange(
            "state mismatch in redirect URL".to_string(),
        ));
    }

    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        CourierError::GrantExchange("redirect URL carries no `code` parameter".to_string())
    })
}
