use crate::config::OwnershipCheck;
use crate::errors::UpstreamError;
use crate::fetch::Fetch;
use crate::types::{GamepassId, UserId};
use serde_json::Value as JsonValue;

/// Whether `user` holds `gamepass`, going by a non-empty inventory listing.
///
/// Any failure is returned as an error and must never be read as "not owned".
pub async fn check_ownership(
    fetcher: &dyn Fetch,
    check: &OwnershipCheck,
    user: UserId,
    gamepass: GamepassId,
) -> Result<bool, UpstreamError> {
    let user = user.to_string();
    let gamepass = gamepass.to_string();
    let url = check.url.render(&[
        ("userId", user.as_str()),
        ("gamepassId", gamepass.as_str()),
    ])?;
    let url_string = url.to_string();

    let body = fetcher.get_json(url, check.authenticated).await?;
    let owned = check
        .list
        .lookup(&body)
        .and_then(JsonValue::as_array)
        .map(|entries| !entries.is_empty())
        .ok_or_else(|| UpstreamError::Decode {
            url: url_string,
            message: format!("expected an array at `{}`", check.list),
        })?;

    Ok(owned)
}
