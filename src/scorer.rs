//! Priority scoring for candidate URLs.
//!
//! Scores are plain additive integers. They are never clamped and may go
//! negative; the frontier only ever compares them with each other.

use crate::{CandidateUrl, FrontierError, HostRegistry, PolitenessGate, PolitenessVerdict};
use std::collections::HashMap;
use tokio::time::Instant;

pub const SEARCH_TERM_BONUS: i64 = 30;
pub const DIVERSITY_BONUS: i64 = 5;
pub const VIDEO_BONUS: i64 = 10;

/// Frontier state a scorer may read, plus the host bookkeeping it updates.
pub struct ScoringContext<'a> {
    pub hosts: &'a mut HostRegistry,
    pub gate: &'a dyn PolitenessGate,
    /// Pending entry count per [`CandidateUrl::diversity_hash`]
    pub pending_diversity: &'a HashMap<u64, usize>,
    pub now: Instant,
}

/// A computed score, split so the politeness part can be recomputed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// Terms that depend only on the URL and the queue contents
    pub content: i64,
    pub politeness: PolitenessVerdict,
}

impl Score {
    pub fn priority(&self) -> i64 {
        self.content + self.politeness.total()
    }

    /// Neutral score used when scoring fails.
    pub fn fallback() -> Self {
        Self {
            content: 0,
            politeness: PolitenessVerdict {
                interval_term: 0,
                threshold_term: 0,
                over_threshold: false,
            },
        }
    }
}

pub trait PriorityScorer: Send + Sync {
    fn score(&self, url: &CandidateUrl, ctx: ScoringContext<'_>) -> Result<Score, FrontierError>;
}

/// The standard rule set: search term, diversity, video content, politeness.
#[derive(Debug, Clone, Default)]
pub struct BaselineScorer {
    search_term: String,
}

impl BaselineScorer {
    pub fn new(search_term: &str) -> Self {
        Self {
            search_term: search_term.trim().to_lowercase(),
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    fn content_score(&self, url: &CandidateUrl, pending_diversity: &HashMap<u64, usize>) -> i64 {
        let mut score = 0;

        if !self.search_term.is_empty()
            && url.without_fragment().to_lowercase().contains(&self.search_term)
        {
            score += SEARCH_TERM_BONUS;
        }

        let already_pending = pending_diversity
            .get(&url.diversity_hash())
            .map_or(false, |count| *count > 0);
        if !already_pending {
            score += DIVERSITY_BONUS;
        }

        if url.path_and_query().contains("video") {
            score += VIDEO_BONUS;
        }

        score
    }
}

impl PriorityScorer for BaselineScorer {
    fn score(&self, url: &CandidateUrl, ctx: ScoringContext<'_>) -> Result<Score, FrontierError> {
        let host = url.require_host()?;
        let content = self.content_score(url, ctx.pending_diversity);

        let state = ctx.hosts.get_or_insert(host, ctx.now);
        let politeness = ctx.gate.observe(state, ctx.now);

        Ok(Score {
            content,
            politeness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntervalGate;
    use std::time::Duration;

    struct Fixture {
        hosts: HostRegistry,
        gate: IntervalGate,
        pending: HashMap<u64, usize>,
        now: Instant,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                hosts: HostRegistry::new(),
                gate: IntervalGate::new(Duration::from_secs(15), 100),
                pending: HashMap::new(),
                now: Instant::now(),
            }
        }

        fn score(&mut self, scorer: &BaselineScorer, url: &str) -> Score {
            let url = CandidateUrl::parse(url).unwrap();
            scorer
                .score(
                    &url,
                    ScoringContext {
                        hosts: &mut self.hosts,
                        gate: &self.gate,
                        pending_diversity: &self.pending,
                        now: self.now,
                    },
                )
                .unwrap()
        }
    }

    #[test]
    fn test_plain_url_on_fresh_host() {
        let mut fixture = Fixture::new();
        let score = fixture.score(&BaselineScorer::default(), "http://example.com/page");
        // diversity + unseen host
        assert_eq!(score.content, 5);
        assert_eq!(score.priority(), 15);
    }

    #[test]
    fn test_search_term_is_case_insensitive() {
        let mut fixture = Fixture::new();
        let scorer = BaselineScorer::new("Rust");
        let score = fixture.score(&scorer, "http://example.com/learn-RUST?page=2");
        assert_eq!(score.content, 35);
    }

    #[test]
    fn test_search_term_ignores_fragment() {
        let mut fixture = Fixture::new();
        let scorer = BaselineScorer::new("rust");
        let score = fixture.score(&scorer, "http://example.com/page#rust");
        assert_eq!(score.content, 5);
    }

    #[test]
    fn test_video_bonus_in_path_or_query() {
        let mut fixture = Fixture::new();
        let scorer = BaselineScorer::default();
        assert_eq!(fixture.score(&scorer, "http://a.com/video/1").content, 15);
        assert_eq!(fixture.score(&scorer, "http://b.com/watch?type=video").content, 15);
        assert_eq!(fixture.score(&scorer, "http://video.c.com/watch").content, 5);
    }

    #[test]
    fn test_diversity_bonus_needs_no_pending_twin() {
        let mut fixture = Fixture::new();
        let twin = CandidateUrl::parse("http://example.com/page#other").unwrap();
        fixture.pending.insert(twin.diversity_hash(), 1);

        let score = fixture.score(&BaselineScorer::default(), "http://example.com/page#mine");
        assert_eq!(score.content, 0);
    }

    #[test]
    fn test_repeated_host_is_penalized() {
        let mut fixture = Fixture::new();
        let scorer = BaselineScorer::default();
        let first = fixture.score(&scorer, "http://example.com/a");
        let second = fixture.score(&scorer, "http://example.com/b");

        assert_eq!(first.politeness.interval_term, 10);
        assert_eq!(second.politeness.interval_term, -10);
        assert_eq!(fixture.hosts.get("example.com").unwrap().access_count, 2);
    }

    #[test]
    fn test_url_without_host_fails() {
        let mut fixture = Fixture::new();
        let url = CandidateUrl::parse("mailto:someone@example.com").unwrap();
        let result = BaselineScorer::default().score(
            &url,
            ScoringContext {
                hosts: &mut fixture.hosts,
                gate: &fixture.gate,
                pending_diversity: &fixture.pending,
                now: fixture.now,
            },
        );
        assert!(matches!(result, Err(FrontierError::MissingHost(_))));
    }
}
