use crate::config::ShedConfig;

/// Builds the clone URL for a repository. When a requesting username is
/// supplied it is embedded as userinfo so clients clone authenticated.
#[must_use]
pub fn clone_url(config: &ShedConfig, username: Option<&str>, owner: &str, name: &str) -> String {
    let base = config.base_url.trim_end_matches('/');
    match (username, base.split_once("://")) {
        (Some(username), Some((protocol, rest))) => {
            format!("{protocol}://{username}@{rest}/repos/{owner}/{name}")
        }
        _ => format!("{base}/repos/{owner}/{name}"),
    }
}

/// Builds the URL for sharing a repository, optionally pinned to a
/// changeset revision.
#[must_use]
pub fn sharable_url(
    config: &ShedConfig,
    owner: &str,
    name: &str,
    changeset_revision: Option<&str>,
) -> String {
    let base = config.base_url.trim_end_matches('/');
    let mut url = format!("{base}/view/{owner}/{name}");
    if let Some(changeset_revision) = changeset_revision {
        url.push('/');
        url.push_str(changeset_revision);
    }
    url
}

/// Strips the protocol and any userinfo from a clone URL, leaving
/// `host[:port]/path`.
fn strip_protocol_and_user(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => &rest[at + 1..],
        None => rest,
    }
}

/// Extracts the tool shed host from a clone URL: everything before the
/// `/repos/` segment.
#[must_use]
pub fn shed_from_clone_url(clone_url: &str) -> Option<&str> {
    let cleaned = strip_protocol_and_user(clone_url);
    cleaned.split_once("/repos/").map(|(shed, _)| shed)
}

/// Extracts the repository owner from a clone URL: the first path segment
/// after `/repos/`.
#[must_use]
pub fn owner_from_clone_url(clone_url: &str) -> Option<&str> {
    let cleaned = strip_protocol_and_user(clone_url);
    let (_, path) = cleaned.split_once("/repos/")?;
    path.split('/').find(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ShedConfig {
        ShedConfig::new("./data", "http://shed.example.org:9009/")
    }

    #[test]
    fn test_clone_url() {
        let config = config();
        assert_eq!(
            clone_url(&config, None, "alice", "my_tool"),
            "http://shed.example.org:9009/repos/alice/my_tool"
        );
        assert_eq!(
            clone_url(&config, Some("bob"), "alice", "my_tool"),
            "http://bob@shed.example.org:9009/repos/alice/my_tool"
        );
    }

    #[test]
    fn test_sharable_url() {
        let config = config();
        assert_eq!(
            sharable_url(&config, "alice", "my_tool", None),
            "http://shed.example.org:9009/view/alice/my_tool"
        );
        assert_eq!(
            sharable_url(&config, "alice", "my_tool", Some("abc123def456")),
            "http://shed.example.org:9009/view/alice/my_tool/abc123def456"
        );
    }

    #[test]
    fn test_parsing_round_trips() {
        let config = config();
        let url = clone_url(&config, Some("bob"), "alice", "my_tool");

        assert_eq!(shed_from_clone_url(&url), Some("shed.example.org:9009"));
        assert_eq!(owner_from_clone_url(&url), Some("alice"));
    }

    #[test]
    fn test_parsing_tolerates_bare_urls() {
        assert_eq!(
            shed_from_clone_url("shed.example.org/repos/alice/my_tool"),
            Some("shed.example.org")
        );
        assert_eq!(
            owner_from_clone_url("shed.example.org/repos/alice/my_tool"),
            Some("alice")
        );
        assert_eq!(shed_from_clone_url("shed.example.org/alice/my_tool"), None);
        assert_eq!(owner_from_clone_url("not a clone url"), None);
    }
}
