//! Release source implementations

pub mod gitea;
pub mod github;

pub use gitea::GiteaSource;
pub use github::GitHubSource;

use crate::version::error::SourceError;

/// Maps the statuses every forge API shares onto [`SourceError`]
fn check_status(response: &reqwest::Response, repo: &str, url: &str) -> Result<(), SourceError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(repo.to_string()));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(SourceError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        tracing::warn!("Source API returned status {}: {}", status, url);
        return Err(SourceError::InvalidResponse(format!(
            "Unexpected status: {}",
            status
        )));
    }

    Ok(())
}
