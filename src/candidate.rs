use crate::FrontierError;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::{Position, Url};

/// A parsed, normalized absolute URL offered to the frontier.
///
/// Two candidates are equal only when their full URLs are equal, fragment
/// included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateUrl {
    url: Url,
}

impl CandidateUrl {
    /// Parses `input` as an absolute URL.
    ///
    /// Blank input is [`FrontierError::MissingUrl`]; anything that does not
    /// parse as an absolute URL, relative references included, is
    /// [`FrontierError::InvalidUrl`]. The scheme is not checked here.
    pub fn parse(input: &str) -> Result<Self, FrontierError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FrontierError::MissingUrl);
        }

        let url = Url::parse(trimmed).map_err(|e| FrontierError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { url })
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn is_web(&self) -> bool {
        is_web_scheme(self.url.scheme())
    }

    /// Host in lower case, as normalized by the parser.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Host, failing for URLs that have none.
    pub fn require_host(&self) -> Result<&str, FrontierError> {
        self.host()
            .ok_or_else(|| FrontierError::MissingHost(self.url.to_string()))
    }

    /// Scheme, authority, path and query, without the fragment.
    pub fn without_fragment(&self) -> &str {
        &self.url[..Position::AfterQuery]
    }

    /// Path followed by the query string, if any.
    pub fn path_and_query(&self) -> &str {
        &self.url[Position::BeforePath..Position::AfterQuery]
    }

    /// Hash of the fragment-less URL; candidates that differ only by fragment
    /// share it.
    pub fn diversity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.without_fragment().hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for CandidateUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl TryFrom<&str> for CandidateUrl {
    type Error = FrontierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        CandidateUrl::parse(value)
    }
}

impl From<Url> for CandidateUrl {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

fn is_web_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_is_missing() {
        assert!(matches!(CandidateUrl::parse(""), Err(FrontierError::MissingUrl)));
        assert!(matches!(CandidateUrl::parse("   "), Err(FrontierError::MissingUrl)));
    }

    #[test]
    fn test_parse_relative_is_invalid() {
        assert!(matches!(
            CandidateUrl::parse("/docs/page"),
            Err(FrontierError::InvalidUrl { .. })
        ));
        assert!(matches!(
            CandidateUrl::parse("not a url"),
            Err(FrontierError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_keeps_other_schemes() {
        let url = CandidateUrl::parse("javascript:void(0);").unwrap();
        assert!(!url.is_web());
        assert_eq!(url.host(), None);
    }

    #[test]
    fn test_host_is_normalized() {
        let url = CandidateUrl::parse("HTTP://Example.COM/Path").unwrap();
        assert_eq!(url.host(), Some("example.com"));
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_fragment_is_part_of_identity() {
        let a = CandidateUrl::parse("http://example.com/page#a").unwrap();
        let b = CandidateUrl::parse("http://example.com/page#b").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.diversity_hash(), b.diversity_hash());
        assert_eq!(a.without_fragment(), "http://example.com/page");
    }

    #[test]
    fn test_path_and_query() {
        let url = CandidateUrl::parse("https://example.com/watch?v=video1#t=10").unwrap();
        assert_eq!(url.path_and_query(), "/watch?v=video1");
    }
}
