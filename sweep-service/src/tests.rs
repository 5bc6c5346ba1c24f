#[cfg(test)]
mod tests {
    use crate::{
        process_crosspost, ReplyOutcome, RemovalSweepEngine, Scheduler, StickiedReplyWatcher,
        StreamEvent, SubmissionStream, SweepTarget,
    };
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use sweeper_core::{
        Comment, Config, CoreError, PlatformFacade, RedditApiError, RemovalCategory,
        StickiedReplyConfig, Submission, SubmissionSnapshot,
    };

    /// Scripted in-memory platform. Hot windows and user feeds are served
    /// from queues; everything else from maps keyed by submission id.
    #[derive(Default)]
    struct MockPlatform {
        windows: Mutex<VecDeque<Result<Vec<Submission>, CoreError>>>,
        reloads: Mutex<HashMap<String, Submission>>,
        originals: Mutex<HashMap<String, Submission>>,
        comments: Mutex<HashMap<String, Comment>>,
        user_feed: Mutex<VecDeque<Result<Vec<Submission>, CoreError>>>,
        published: Mutex<Vec<(String, String, String)>>,
        replies: Mutex<Vec<(String, String)>>,
        fail_reload: AtomicBool,
        fail_publish: AtomicBool,
        hang_fetch: AtomicBool,
    }

    impl MockPlatform {
        fn push_window(&self, window: Vec<Submission>) {
            self.windows.lock().unwrap().push_back(Ok(window));
        }

        fn push_window_error(&self, error: CoreError) {
            self.windows.lock().unwrap().push_back(Err(error));
        }

        fn set_reloaded(&self, submission: Submission) {
            self.reloads
                .lock()
                .unwrap()
                .insert(submission.id.clone(), submission);
        }

        fn push_feed(&self, feed: Vec<Submission>) {
            self.user_feed.lock().unwrap().push_back(Ok(feed));
        }

        fn push_feed_error(&self, error: CoreError) {
            self.user_feed.lock().unwrap().push_back(Err(error));
        }

        fn feed_remaining(&self) -> usize {
            self.user_feed.lock().unwrap().len()
        }

        fn published(&self) -> Vec<(String, String, String)> {
            self.published.lock().unwrap().clone()
        }

        fn replies(&self) -> Vec<(String, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlatformFacade for MockPlatform {
        async fn fetch_hot_window(
            &self,
            _subreddit: &str,
            _minimum_rank: u32,
            _maximum_rank: u32,
        ) -> Result<SubmissionSnapshot, CoreError> {
            if self.hang_fetch.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let next = self.windows.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
                .map(SubmissionSnapshot::new)
        }

        async fn reload(&self, ids: &[String]) -> Result<Vec<Submission>, CoreError> {
            if self.fail_reload.load(Ordering::SeqCst) {
                return Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: 503,
                }));
            }
            let reloads = self.reloads.lock().unwrap();
            Ok(ids.iter().filter_map(|id| reloads.get(id).cloned()).collect())
        }

        async fn fetch_submission(&self, id: &str) -> Result<Submission, CoreError> {
            self.originals.lock().unwrap().get(id).cloned().ok_or_else(|| {
                CoreError::RedditApi(RedditApiError::PostNotFound {
                    post_id: id.to_string(),
                })
            })
        }

        async fn top_comment(&self, submission_id: &str) -> Result<Option<Comment>, CoreError> {
            Ok(self.comments.lock().unwrap().get(submission_id).cloned())
        }

        async fn publish(
            &self,
            subreddit: &str,
            title: &str,
            url: &str,
        ) -> Result<String, CoreError> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(CoreError::RedditApi(RedditApiError::SubmissionRejected {
                    subreddit: subreddit.to_string(),
                    reason: "ALREADY_SUB: that link has already been submitted".to_string(),
                }));
            }
            let mut published = self.published.lock().unwrap();
            published.push((subreddit.to_string(), title.to_string(), url.to_string()));
            Ok(format!("x{}", published.len()))
        }

        async fn reply(&self, submission_id: &str, body: &str) -> Result<(), CoreError> {
            self.replies
                .lock()
                .unwrap()
                .push((submission_id.to_string(), body.to_string()));
            Ok(())
        }

        async fn user_submissions(
            &self,
            _username: &str,
            _limit: u32,
        ) -> Result<Vec<Submission>, CoreError> {
            let next = self.user_feed.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn post(id: &str) -> Submission {
        Submission {
            id: id.to_string(),
            title: format!("Post {}", id),
            author: "someone".to_string(),
            subreddit: "pics".to_string(),
            permalink: format!("/r/pics/comments/{}/post/", id),
            url: format!("https://i.redd.it/{}.jpg", id),
            score: 100,
            num_comments: 10,
            created_utc: 1640995200,
            removed_by_category: None,
            is_robot_indexable: true,
            stickied: false,
        }
    }

    fn removed_by(id: &str, category: RemovalCategory) -> Submission {
        Submission {
            removed_by_category: Some(category),
            is_robot_indexable: false,
            ..post(id)
        }
    }

    fn window(ids: &[&str]) -> Vec<Submission> {
        ids.iter().map(|id| post(id)).collect()
    }

    fn target(minimum_rank: u32, maximum_rank: u32) -> SweepTarget {
        SweepTarget {
            source_subreddit: "all".to_string(),
            crosspost_subreddit: "RemovedHot".to_string(),
            minimum_rank,
            maximum_rank,
            interval: Duration::from_secs(60),
        }
    }

    fn engine_with(platform: &Arc<MockPlatform>, target: SweepTarget) -> RemovalSweepEngine {
        RemovalSweepEngine::new(platform.clone(), target)
    }

    const TEN: [&str; 10] = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    const B_DROPPED: [&str; 10] = ["a", "c", "d", "e", "f", "g", "h", "i", "j", "k"];

    #[tokio::test]
    async fn test_first_tick_publishes_nothing() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        let mut engine = engine_with(&platform, target(0, 10));

        let report = engine.tick().await.unwrap();

        assert_eq!(report.fetched, 10);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.published, 0);
        assert!(platform.published().is_empty());
        assert_eq!(engine.snapshot().len(), 10);
    }

    #[tokio::test]
    async fn test_dropped_moderator_removal_is_crossposted_with_rank() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let report = engine.tick().await.unwrap();

        assert_eq!(report.dropped, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.published, 1);
        assert_eq!(
            platform.published(),
            vec![(
                "RemovedHot".to_string(),
                "[#2|+100|10] Post b [r/pics]".to_string(),
                "https://www.reddit.com/r/pics/comments/b/post/".to_string(),
            )]
        );
        assert_eq!(engine.snapshot().ids().len(), 10);
        assert!(engine.snapshot().contains("k"));
        assert!(!engine.snapshot().contains("b"));
    }

    #[tokio::test]
    async fn test_rank_is_offset_by_window_start() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        let mut engine = engine_with(&platform, target(100, 110));

        engine.tick().await.unwrap();
        engine.tick().await.unwrap();

        let published = platform.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].1.starts_with("[#102|"));
    }

    #[tokio::test]
    async fn test_self_deleted_and_purged_posts_are_skipped() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&["a", "e", "f", "g", "h", "i", "j"]));
        platform.set_reloaded(removed_by("b", RemovalCategory::Author));
        platform.set_reloaded(removed_by("c", RemovalCategory::Deleted));
        // "d" is absent from the reload response altogether.
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let report = engine.tick().await.unwrap();

        assert_eq!(report.dropped, 3);
        assert_eq!(report.removed, 0);
        assert!(platform.published().is_empty());
    }

    #[tokio::test]
    async fn test_fallen_but_live_post_is_not_crossposted() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(post("b"));
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let report = engine.tick().await.unwrap();

        assert_eq!(report.dropped, 1);
        assert_eq!(report.removed, 0);
        assert!(platform.published().is_empty());
    }

    #[tokio::test]
    async fn test_multiple_removals_publish_once_each() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&["a", "c", "e", "f", "g", "h", "i", "j"]));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        platform.set_reloaded(removed_by("d", RemovalCategory::AutomodFiltered));
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let report = engine.tick().await.unwrap();

        assert_eq!(report.published, 2);
        let mut titles: Vec<String> = platform.published().into_iter().map(|p| p.1).collect();
        titles.sort();
        assert_eq!(
            titles,
            vec![
                "[#2|+100|10] Post b [r/pics]".to_string(),
                "[#4|+100|10] Post d [r/pics]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_failure_leaves_snapshot_unchanged() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let before = engine.snapshot().clone();

        platform.fail_reload.store(true, Ordering::SeqCst);
        assert!(engine.tick().await.is_err());
        assert_eq!(engine.snapshot(), &before);
        assert!(platform.published().is_empty());

        // The next tick diffs against the same baseline and finds "b" again.
        platform.fail_reload.store(false, Ordering::SeqCst);
        let report = engine.tick().await.unwrap();
        assert_eq!(report.published, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_snapshot_unchanged() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window_error(CoreError::RedditApi(RedditApiError::Forbidden {
            resource: "/r/all/hot".to_string(),
        }));
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let before = engine.snapshot().clone();

        assert!(matches!(
            engine.run_tick().await,
            Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
        ));
        assert_eq!(engine.snapshot(), &before);
    }

    #[tokio::test]
    async fn test_publish_failure_still_replaces_snapshot() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        platform.fail_publish.store(true, Ordering::SeqCst);
        let mut engine = engine_with(&platform, target(0, 10));

        engine.tick().await.unwrap();
        let report = engine.tick().await.unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.published, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(
            engine.snapshot(),
            &SubmissionSnapshot::new(window(&B_DROPPED))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_timeout_leaves_snapshot_unchanged() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        let mut engine = engine_with(
            &platform,
            SweepTarget {
                interval: Duration::from_secs(5),
                ..target(0, 10)
            },
        );

        assert!(engine.run_tick().await.is_ok());
        let before = engine.snapshot().clone();

        platform.hang_fetch.store(true, Ordering::SeqCst);
        let started = tokio::time::Instant::now();
        assert!(matches!(
            engine.run_tick().await,
            Err(CoreError::Timeout { seconds: 4 })
        ));

        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(engine.snapshot(), &before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_run_keeps_ticking_after_a_failed_tick() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window_error(CoreError::RedditApi(RedditApiError::Forbidden {
            resource: "/r/all/hot".to_string(),
        }));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));
        let engine = engine_with(
            &platform,
            SweepTarget {
                interval: Duration::from_secs(5),
                ..target(0, 10)
            },
        );

        // Ticks at 0s, 5s (fails) and 10s.
        let handle = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.abort();

        let published = platform.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1, "[#2|+100|10] Post b [r/pics]");
    }

    #[test]
    fn test_target_tick_budget_and_rank() {
        let target = target(25, 50);
        assert_eq!(target.tick_budget(), Duration::from_secs(59));
        assert_eq!(target.rank_at(0), 26);
        assert_eq!(target.rank_at(24), 50);
    }

    #[tokio::test]
    async fn test_stream_skips_existing_and_yields_new_items() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_feed(window(&["x2", "x1"]));
        platform.push_feed(window(&["x4", "x3", "x2", "x1"]));
        platform.push_feed(window(&["x4", "x3", "x2", "x1"]));
        let mut stream = SubmissionStream::new(platform.clone(), "sweeper_bot");

        assert_eq!(stream.next().await.unwrap(), StreamEvent::Heartbeat);
        assert_eq!(stream.next().await.unwrap(), StreamEvent::Item(post("x3")));
        assert_eq!(stream.next().await.unwrap(), StreamEvent::Item(post("x4")));
        assert_eq!(stream.next().await.unwrap(), StreamEvent::Heartbeat);
    }

    #[tokio::test]
    async fn test_stream_surfaces_poll_errors() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_feed(Vec::new());
        platform.push_feed_error(CoreError::RedditApi(RedditApiError::ServerError {
            status_code: 502,
        }));
        let mut stream = SubmissionStream::new(platform.clone(), "sweeper_bot");

        assert_eq!(stream.next().await.unwrap(), StreamEvent::Heartbeat);
        assert!(stream.next().await.is_err());
    }

    fn crosspost_of(original: &str) -> Submission {
        Submission {
            id: "bot1".to_string(),
            subreddit: "RemovedHot".to_string(),
            url: format!("https://www.reddit.com/r/pics/comments/{}/post/", original),
            ..post("bot1")
        }
    }

    fn mod_comment(on: &str, stickied: bool) -> Comment {
        Comment {
            id: "c1".to_string(),
            body: "Removed: rule 4.\n---\nPlease read the sidebar.".to_string(),
            permalink: format!("/r/pics/comments/{}/post/c1/", on),
            subreddit: "pics".to_string(),
            link_id: format!("t3_{}", on),
            stickied,
            distinguished: Some("moderator".to_string()),
        }
    }

    #[tokio::test]
    async fn test_watcher_replies_with_stickied_comment() {
        let platform = MockPlatform::default();
        platform
            .originals
            .lock()
            .unwrap()
            .insert("b".to_string(), removed_by("b", RemovalCategory::Moderator));
        platform
            .comments
            .lock()
            .unwrap()
            .insert("b".to_string(), mod_comment("b", true));

        let outcome = process_crosspost(&platform, &crosspost_of("b")).await.unwrap();

        assert_eq!(outcome, ReplyOutcome::Replied);
        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "bot1");
        assert!(replies[0].1.contains("> Removed: rule 4.\n> \n> Please read the sidebar."));
        assert!(replies[0].1.contains("moderators of r/pics"));
    }

    #[tokio::test]
    async fn test_watcher_ignores_unstickied_or_missing_comments() {
        let platform = MockPlatform::default();
        platform
            .originals
            .lock()
            .unwrap()
            .insert("b".to_string(), removed_by("b", RemovalCategory::Moderator));

        let outcome = process_crosspost(&platform, &crosspost_of("b")).await.unwrap();
        assert_eq!(outcome, ReplyOutcome::NoStickiedComment);

        platform
            .comments
            .lock()
            .unwrap()
            .insert("b".to_string(), mod_comment("b", false));
        let outcome = process_crosspost(&platform, &crosspost_of("b")).await.unwrap();
        assert_eq!(outcome, ReplyOutcome::NoStickiedComment);

        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn test_watcher_skips_non_reddit_links_and_reports_missing_originals() {
        let platform = MockPlatform::default();

        let foreign = Submission {
            url: "https://example.com/article".to_string(),
            ..crosspost_of("b")
        };
        assert_eq!(
            process_crosspost(&platform, &foreign).await.unwrap(),
            ReplyOutcome::NotACrosspost
        );

        let result = process_crosspost(&platform, &crosspost_of("zzz")).await;
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::PostNotFound { .. }))
        ));
        assert!(platform.replies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_recovers_after_stream_failure() {
        let platform = Arc::new(MockPlatform::default());
        platform
            .originals
            .lock()
            .unwrap()
            .insert("b".to_string(), removed_by("b", RemovalCategory::Moderator));
        platform
            .comments
            .lock()
            .unwrap()
            .insert("b".to_string(), mod_comment("b", true));
        platform.push_feed_error(CoreError::RedditApi(RedditApiError::ServerError {
            status_code: 502,
        }));
        platform.push_feed(Vec::new());
        platform.push_feed(vec![crosspost_of("b")]);

        let watcher = StickiedReplyWatcher::new(
            platform.clone(),
            "sweeper_bot",
            &StickiedReplyConfig {
                enabled: true,
                poll_interval: 60,
                stream_retry_interval: 300,
            },
        );
        let handle = tokio::spawn(watcher.run());

        // Still waiting out the retry interval.
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(platform.feed_remaining(), 2);
        assert!(platform.replies().is_empty());

        // Rebuilt at 300s, primed, then picks up the crosspost at 360s.
        tokio::time::sleep(Duration::from_secs(900)).await;
        handle.abort();

        let replies = platform.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "bot1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_added_targets() {
        let platform = Arc::new(MockPlatform::default());
        platform.push_window(window(&TEN));
        platform.push_window(window(&B_DROPPED));
        platform.set_reloaded(removed_by("b", RemovalCategory::Moderator));

        let mut scheduler = Scheduler::new(platform.clone());
        scheduler.add_target(SweepTarget {
            interval: Duration::from_secs(5),
            ..target(0, 10)
        });
        assert_eq!(scheduler.engine_count(), 1);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.abort();

        assert_eq!(platform.published().len(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_without_tasks_returns() {
        let platform: Arc<dyn PlatformFacade> = Arc::new(MockPlatform::default());
        let scheduler = Scheduler::new(platform);
        assert_eq!(scheduler.engine_count(), 0);
        assert!(!scheduler.has_watcher());

        scheduler.run().await;
    }

    #[test]
    fn test_scheduler_from_config() {
        let contents = r#"
sweep_subreddit = "popular"

[client]
client_id = "id"
client_secret = "secret"
username = "sweeper_bot"
password = "hunter2"
user_agent = "removal-sweeper/0.1 by sweeper_bot"

[[crosspost_subreddits]]
subreddit = "RemovedHot"
minimum_rank = 0
maximum_rank = 100
interval = 60

[[crosspost_subreddits]]
subreddit = "RemovedWarm"
minimum_rank = 100
maximum_rank = 1000
interval = 300

[stickied_reply]
enabled = false
"#;
        let config = Config::from_toml(contents).unwrap();
        let platform: Arc<dyn PlatformFacade> = Arc::new(MockPlatform::default());

        let scheduler = Scheduler::from_config(platform.clone(), &config);
        assert_eq!(scheduler.engine_count(), 2);
        assert!(!scheduler.has_watcher());

        let target = SweepTarget::from_config(&config.sweep_subreddit, &config.crosspost_subreddits[1]);
        assert_eq!(target.source_subreddit, "popular");
        assert_eq!(target.crosspost_subreddit, "RemovedWarm");
        assert_eq!(target.interval, Duration::from_secs(300));
    }
}
