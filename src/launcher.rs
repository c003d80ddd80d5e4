use crate::config::Config;
use crate::peer::types::PeerId;
use tracing::{debug, info};
use url::Url;

/// Which component the UI mounts for a page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The page was opened from a sharing link: view that streamer directly
    Viewer(PeerId),
    /// No link: let the user pick share or view
    Chooser,
}

/// Pick the role from the page URL's `link_param` query value. The id is
/// taken as-is; a malformed one surfaces later as a failed dial.
pub fn select_role(page: &Url, config: &Config) -> Role {
    let remote = page
        .query_pairs()
        .find(|(key, _)| key == config.link_param.as_str())
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match remote {
        Some(id) => {
            info!("page links to {}, starting viewer", id);
            Role::Viewer(PeerId::from_remote(id))
        }
        None => {
            debug!("no {} in {}, showing chooser", config.link_param, page);
            Role::Chooser
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_selects_viewer() {
        let page = Url::parse("https://example.org/?otherPeerId=RemoteDesktop004211").unwrap();
        assert_eq!(
            select_role(&page, &Config::default()),
            Role::Viewer(PeerId::from_remote("RemoteDesktop004211"))
        );
    }

    #[test]
    fn test_plain_page_selects_chooser() {
        let config = Config::default();
        for raw in [
            "https://example.org/",
            "https://example.org/?foo=bar",
            "https://example.org/?otherPeerId=",
        ] {
            let page = Url::parse(raw).unwrap();
            assert_eq!(select_role(&page, &config), Role::Chooser, "{}", raw);
        }
    }

    #[test]
    fn test_custom_link_param() {
        let config = Config {
            link_param: "peer".into(),
            ..Config::default()
        };
        let page =
            Url::parse("https://example.org/?otherPeerId=A1&peer=RemoteDesktop000001").unwrap();
        assert_eq!(
            select_role(&page, &config),
            Role::Viewer(PeerId::from_remote("RemoteDesktop000001"))
        );
    }
}
