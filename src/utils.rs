use crate::peer::types::{PeerId, ID_DIGITS};
use rand::Rng;
use url::Url;

/// Random 6-digit, zero-padded id suffix
pub fn random_suffix() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = ID_DIGITS)
}

/// Page URL with its query replaced by `?<param>=<id>`
pub fn sharing_link(page: &Url, param: &str, id: &PeerId) -> String {
    let mut link = page.clone();
    link.set_query(None);
    link.query_pairs_mut().append_pair(param, id.as_str());
    link.to_string()
}

/// Build a remote id from a typed sharing code, keeping digits only.
/// Returns `None` when no digits remain.
pub fn peer_id_from_code(prefix: &str, input: &str) -> Option<PeerId> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(PeerId::from_remote(format!("{}{}", prefix, digits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_suffix_is_padded() {
        for _ in 0..64 {
            let s = random_suffix();
            assert_eq!(s.len(), 6);
            assert!(s.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_sharing_link_replaces_query() {
        let page = Url::parse("https://example.org/desk/?foo=bar#top").unwrap();
        let id = PeerId::from_remote("RemoteDesktop000123");
        assert_eq!(
            sharing_link(&page, "otherPeerId", &id),
            "https://example.org/desk/?otherPeerId=RemoteDesktop000123#top"
        );
    }

    #[test]
    fn test_peer_id_from_code() {
        let id = peer_id_from_code("RemoteDesktop", " 12-34 56x").unwrap();
        assert_eq!(id.as_str(), "RemoteDesktop123456");
        assert!(peer_id_from_code("RemoteDesktop", "abc").is_none());
    }
}
