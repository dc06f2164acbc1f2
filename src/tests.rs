#[cfg(test)]
mod integration_tests {
    use crate::{
        Admission, CandidateUrl, CapacityPolicy, Config, CrawlWorkerPool, FetchError, Frontier,
        FrontierError, IntervalGate, PageFetcher, PriorityScorer, RejectReason, Score,
        ScoringContext,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};
    use tokio_util::sync::CancellationToken;

    fn config() -> Config {
        Config {
            snapshot_path: None,
            ..Default::default()
        }
    }

    fn frontier(config: Config) -> Arc<Frontier> {
        Arc::new(Frontier::new(&config).unwrap())
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.host_fetch_interval, Duration::from_secs(15));
        assert_eq!(config.hard_host_request_threshold, 100);
        assert_eq!(config.rebalance_interval, Duration::from_secs(30));
        assert_eq!(config.capacity_policy, CapacityPolicy::StayClosed);
        assert!(config.host_exclusions.contains(&"facebook.com".to_string()));
        assert!(config.host_exclusions.contains(&"pineapplesupport.org".to_string()));
        assert!(config.follow_external_links);
        assert!(config.url_fragment_filters.contains(&"mailto".to_string()));
        assert!(config.worker_count > 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let invalid = [
            Config { queue_capacity: 0, ..Default::default() },
            Config { worker_count: 0, ..Default::default() },
            Config { hard_host_request_threshold: 0, ..Default::default() },
            Config { rebalance_interval: Duration::ZERO, ..Default::default() },
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(FrontierError::Configuration(_))));
            assert!(Frontier::new(&config).is_err());
        }
    }

    #[test]
    fn test_config_from_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.json");
        std::fs::write(
            &path,
            r#"{"queue_capacity": 5, "search_term": "rust", "capacity_policy": "reopen_below_capacity"}"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.search_term, "rust");
        assert_eq!(config.capacity_policy, CapacityPolicy::ReopenBelowCapacity);
        assert_eq!(config.hard_host_request_threshold, 100);
    }

    #[test]
    fn test_blank_url_is_an_error() {
        let frontier = frontier(config());

        assert!(matches!(frontier.add(""), Err(FrontierError::MissingUrl)));
        assert!(matches!(frontier.add("   "), Err(FrontierError::MissingUrl)));
        assert_eq!(frontier.size(), 0);
    }

    #[test]
    fn test_relative_and_non_web_urls_are_not_queued() {
        let frontier = frontier(config());

        let relative = frontier.add("/relative/path");
        assert!(matches!(relative, Err(FrontierError::InvalidUrl { .. })));
        assert!(relative.unwrap_err().is_caller_error());

        let script = frontier.add("javascript:void(0);").unwrap();
        assert_eq!(script.reject_reason(), Some(RejectReason::UnsupportedScheme));
        assert_eq!(frontier.size(), 0);
    }

    #[test]
    fn test_excluded_host_is_not_queued() {
        let frontier = frontier(config());
        let admission = frontier.add("https://www.facebook.com/some/page").unwrap();

        assert_eq!(admission, Admission::Rejected(RejectReason::ExcludedHost));
        assert_eq!(frontier.size(), 0);
    }

    #[test]
    fn test_filtered_fragment_is_not_queued() {
        let frontier = frontier(config());
        let admission = frontier.add("http://example.com/contact?link=mailto:me").unwrap();

        assert_eq!(admission, Admission::Rejected(RejectReason::FilteredFragment));
        assert_eq!(frontier.size(), 0);
    }

    #[test]
    fn test_same_url_twice() {
        let frontier = frontier(config());

        assert!(frontier.add("http://example.com/page").unwrap().is_accepted());
        assert_eq!(
            frontier.add("http://example.com/page").unwrap(),
            Admission::Rejected(RejectReason::Duplicate)
        );
        assert_eq!(frontier.size(), 1);
    }

    #[test]
    fn test_added_url_is_pending() {
        let frontier = frontier(config());
        frontier.add("http://example.com/page").unwrap();

        assert_eq!(frontier.size(), 1);
        assert_eq!(
            frontier.pending_urls(),
            vec![CandidateUrl::parse("http://example.com/page").unwrap()]
        );
    }

    #[test]
    fn test_capacity_closes_frontier() {
        let frontier = frontier(Config {
            queue_capacity: 1,
            ..config()
        });

        assert!(frontier.add("http://example.com/page1").unwrap().is_accepted());
        assert_eq!(
            frontier.add("http://example.com/page2").unwrap(),
            Admission::Rejected(RejectReason::AtCapacity)
        );
        assert_eq!(frontier.size(), 1);
        assert!(!frontier.is_open());

        frontier.try_dequeue().unwrap();
        assert_eq!(
            frontier.add("http://example.com/page3").unwrap(),
            Admission::Rejected(RejectReason::Closed)
        );
        assert!(!frontier.is_open());
    }

    #[test]
    fn test_reopen_policy_reopens_after_dequeue() {
        let frontier = frontier(Config {
            queue_capacity: 1,
            capacity_policy: CapacityPolicy::ReopenBelowCapacity,
            ..config()
        });

        frontier.add("http://example.com/page1").unwrap();
        frontier.add("http://example.com/page2").unwrap();
        assert!(!frontier.is_open());

        frontier.try_dequeue().unwrap();
        assert!(frontier.is_open());
        assert!(frontier.add("http://example.com/page3").unwrap().is_accepted());
    }

    #[test]
    fn test_snapshot_written_when_capacity_reached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier_queue.bak");
        let frontier = frontier(Config {
            queue_capacity: 2,
            snapshot_path: Some(path.clone()),
            ..Default::default()
        });

        frontier.add("http://a.com/").unwrap();
        frontier.add("http://b.com/video").unwrap();
        assert!(!path.exists());

        frontier.add("http://c.com/").unwrap();
        let snapshot = std::fs::read_to_string(&path).unwrap();
        assert_eq!(snapshot, "http://b.com/video\nhttp://a.com/\n");
    }

    #[test]
    fn test_snapshot_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let frontier = frontier(Config {
            queue_capacity: 1,
            snapshot_path: Some(dir.path().join("missing").join("queue.bak")),
            ..Default::default()
        });

        frontier.add("http://a.com/").unwrap();
        assert_eq!(
            frontier.add("http://b.com/").unwrap(),
            Admission::Rejected(RejectReason::AtCapacity)
        );
        assert_eq!(frontier.size(), 1);
    }

    #[test]
    fn test_write_snapshot_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.txt");
        let frontier = frontier(config());
        frontier.seed(["http://a.com/", "http://b.com/video", "not a url"]);

        assert_eq!(frontier.write_snapshot(&path).unwrap(), 2);
        let lines: Vec<String> = crate::parse_url_list(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(lines, vec!["http://b.com/video", "http://a.com/"]);
    }

    #[test]
    fn test_dequeue_order_follows_priority() {
        let frontier = frontier(Config {
            search_term: "rust".to_string(),
            ..config()
        });

        assert_eq!(frontier.add("http://plain.com/page").unwrap(), Admission::Accepted { priority: 15 });
        assert_eq!(frontier.add("http://b.com/video").unwrap(), Admission::Accepted { priority: 25 });
        assert_eq!(frontier.add("http://c.com/rust").unwrap(), Admission::Accepted { priority: 45 });

        let order: Vec<String> = std::iter::from_fn(|| frontier.try_dequeue())
            .map(|entry| entry.url.to_string())
            .collect();
        assert_eq!(order, vec!["http://c.com/rust", "http://b.com/video", "http://plain.com/page"]);
    }

    #[test]
    fn test_equal_priorities_dequeue_in_arrival_order() {
        let frontier = frontier(config());
        frontier.seed(["http://a.com/", "http://b.com/", "http://c.com/"]);

        let order: Vec<String> = std::iter::from_fn(|| frontier.try_dequeue())
            .map(|entry| entry.url.to_string())
            .collect();
        assert_eq!(order, vec!["http://a.com/", "http://b.com/", "http://c.com/"]);
    }

    #[test]
    fn test_host_over_threshold_has_no_pending_entries() {
        let frontier = frontier(Config {
            hard_host_request_threshold: 3,
            ..config()
        });

        frontier.add("http://busy.com/1").unwrap();
        frontier.add("http://other.com/").unwrap();
        frontier.add("http://busy.com/2").unwrap();
        assert_eq!(
            frontier.add("http://busy.com/3").unwrap(),
            Admission::Rejected(RejectReason::HostOverThreshold)
        );
        assert_eq!(
            frontier.add("http://busy.com/4").unwrap(),
            Admission::Rejected(RejectReason::HostOverThreshold)
        );

        assert!(frontier
            .pending_urls()
            .iter()
            .all(|url| url.host() != Some("busy.com")));
        assert_eq!(frontier.size(), 1);
        assert!(frontier.host_state("busy.com").unwrap().over_threshold);
        assert_eq!(frontier.stats().hosts_over_threshold, 1);
    }

    struct FailingScorer;

    impl PriorityScorer for FailingScorer {
        fn score(&self, url: &CandidateUrl, _ctx: ScoringContext<'_>) -> Result<Score, FrontierError> {
            Err(FrontierError::MissingHost(url.to_string()))
        }
    }

    #[test]
    fn test_scoring_failure_falls_back_to_zero() {
        let config = config();
        let frontier = Frontier::with_strategies(
            &config,
            Box::new(FailingScorer),
            Box::new(IntervalGate::from_config(&config)),
        )
        .unwrap();

        assert_eq!(
            frontier.add("http://example.com/").unwrap(),
            Admission::Accepted { priority: 0 }
        );
        assert_eq!(frontier.stats().scoring_failures, 1);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_add() {
        let frontier = frontier(config());
        let cancel = CancellationToken::new();

        let mut task = tokio_test::task::spawn(frontier.dequeue(&cancel));
        assert_pending!(task.poll());

        frontier.add("http://example.com/late").unwrap();
        assert!(task.is_woken());

        let entry = assert_ready!(task.poll()).unwrap();
        assert_eq!(entry.url.as_str(), "http://example.com/late");
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_when_cancelled() {
        let frontier = frontier(config());
        let cancel = CancellationToken::new();

        let mut task = tokio_test::task::spawn(frontier.dequeue(&cancel));
        assert_pending!(task.poll());

        cancel.cancel();
        assert!(task.is_woken());
        assert!(assert_ready!(task.poll()).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_of_one_url() {
        let frontier = frontier(config());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let frontier = frontier.clone();
                tokio::spawn(async move { frontier.add("http://example.com/same").unwrap() })
            })
            .collect();

        let accepted = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|result| result.as_ref().unwrap().is_accepted())
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(frontier.size(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dequeues_are_distinct() {
        let frontier = frontier(config());
        let accepted = frontier.seed((0..20).map(|i| format!("http://host{}.com/", i)));
        assert_eq!(accepted, 20);

        let cancel = CancellationToken::new();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let frontier = frontier.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { frontier.dequeue(&cancel).await })
            })
            .collect();

        let urls: HashSet<String> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap().unwrap().url.to_string())
            .collect();

        assert_eq!(urls.len(), 10);
        assert_eq!(frontier.size(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_retention_forgets_old_urls() {
        let frontier = frontier(Config {
            dedup_retention: Some(Duration::from_secs(60)),
            ..config()
        });

        frontier.add("http://example.com/once").unwrap();
        frontier.add("http://example.com/kept").unwrap();
        frontier.try_dequeue().unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let report = frontier.rebalance();
        assert_eq!(report.pruned, 1);

        // the dequeued URL may be discovered again, the pending one may not
        assert!(frontier.add("http://example.com/once").unwrap().is_accepted());
        assert_eq!(
            frontier.add("http://example.com/kept").unwrap(),
            Admission::Rejected(RejectReason::Duplicate)
        );
        assert_eq!(frontier.size(), 2);
    }

    struct PanickyFetcher;

    #[async_trait]
    impl PageFetcher for PanickyFetcher {
        async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError> {
            if url.host() == Some("boom.com") {
                panic!("fetcher exploded on {}", url);
            }
            Ok(String::new())
        }

        fn extract_links(&self, _page: &CandidateUrl, _content: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_panicking_fetcher_does_not_stop_pool() {
        let frontier = frontier(config());
        frontier.seed(["http://boom.com/", "http://fine.com/", "http://also-fine.com/"]);

        let pool = CrawlWorkerPool::start(
            frontier.clone(),
            Arc::new(PanickyFetcher),
            1,
            CancellationToken::new(),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while pool.total_processed() < 2 || pool.total_errors() < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(pool.active_workers(), 1);
        let stats = pool.shutdown().await;
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.total_errors, 1);
        assert!(frontier.is_empty());
    }
}
