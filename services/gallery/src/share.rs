//! Shareable link construction
//!
//! Links have the stable form `{origin}/view-project/{id}?access_token={token}`.
//! Links already handed to clients depend on this shape.

use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Path segment of the client-side project viewer
pub const VIEW_PATH: &str = "view-project";

/// Query parameter carrying the access token
pub const TOKEN_PARAM: &str = "access_token";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShareLinkError {
    #[error("origin must not be empty")]
    EmptyOrigin,

    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("access token must not be empty")]
    EmptyToken,
}

/// Parse and check an origin that share links can be rooted at.
pub fn parse_origin(origin: &str) -> Result<Url, ShareLinkError> {
    let origin = origin.trim();
    if origin.is_empty() {
        return Err(ShareLinkError::EmptyOrigin);
    }

    let url = Url::parse(origin).map_err(|e| ShareLinkError::InvalidOrigin(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ShareLinkError::InvalidOrigin(origin.to_string()));
    }

    Ok(url)
}

/// Build the shareable link for `id` unlocked by `token`.
pub fn build_share_link(origin: &str, id: Uuid, token: &str) -> Result<String, ShareLinkError> {
    let mut url = parse_origin(origin)?;
    if token.is_empty() {
        return Err(ShareLinkError::EmptyToken);
    }

    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/{}/{}", base, VIEW_PATH, id));
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut().append_pair(TOKEN_PARAM, token);

    Ok(url.into())
}

/// Extract the item id and token from a shareable link.
pub fn parse_share_link(link: &str) -> Option<(Uuid, String)> {
    let url = Url::parse(link).ok()?;
    let mut segments = url.path_segments()?.rev();
    let id = segments.next()?.parse().ok()?;
    if segments.next()? != VIEW_PATH {
        return None;
    }

    let token = url
        .query_pairs()
        .find(|(k, _)| k == TOKEN_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|t| !t.is_empty())?;

    Some((id, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_share_link() {
        let id = Uuid::parse_str("7f0e8c1a-3b52-4c1e-9d4e-2a8f6b1c0d9e").unwrap();
        let link = build_share_link("https://studio.example", id, "abc123").unwrap();
        assert_eq!(
            link,
            "https://studio.example/view-project/7f0e8c1a-3b52-4c1e-9d4e-2a8f6b1c0d9e?access_token=abc123"
        );
    }

    #[test]
    fn test_origin_with_trailing_slash_and_base_path() {
        let id = Uuid::new_v4();

        let link = build_share_link("http://localhost:3000/", id, "t").unwrap();
        assert_eq!(link, format!("http://localhost:3000/view-project/{}?access_token=t", id));

        let link = build_share_link("https://example.com/portal/", id, "t").unwrap();
        assert_eq!(
            link,
            format!("https://example.com/portal/view-project/{}?access_token=t", id)
        );
    }

    #[test]
    fn test_rejects_malformed_inputs() {
        let id = Uuid::new_v4();
        assert_eq!(build_share_link("", id, "t"), Err(ShareLinkError::EmptyOrigin));
        assert_eq!(
            build_share_link("https://example.com", id, ""),
            Err(ShareLinkError::EmptyToken)
        );
        assert!(matches!(
            build_share_link("not a url", id, "t"),
            Err(ShareLinkError::InvalidOrigin(_))
        ));
        assert!(matches!(
            build_share_link("mailto:studio@example.com", id, "t"),
            Err(ShareLinkError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn test_parse_share_link() {
        let id = Uuid::new_v4();
        let link = build_share_link("https://example.com", id, "xyz789").unwrap();
        assert_eq!(parse_share_link(&link), Some((id, "xyz789".to_string())));

        assert_eq!(
            parse_share_link(&format!("https://example.com/view-project/{}", id)),
            None
        );
        assert_eq!(
            parse_share_link(&format!("https://example.com/other/{}?access_token=t", id)),
            None
        );
    }
}
