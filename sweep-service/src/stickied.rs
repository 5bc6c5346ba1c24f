use crate::stream::{StreamEvent, SubmissionStream};
use std::sync::Arc;
use std::time::Duration;
use sweeper_core::{
    Comment, CoreError, ErrorExt, PlatformFacade, StickiedReplyConfig, Submission,
};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Markdown rules that would end a quote block early.
const HORIZONTAL_RULES: [&str; 3] = ["---", "___", "***"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Replied,
    NoStickiedComment,
    /// The submission does not link to a Reddit post.
    NotACrosspost,
}

/// Replies to the bot's own crossposts with the stickied comment left on the
/// removed original, when there is one.
pub struct StickiedReplyWatcher {
    platform: Arc<dyn PlatformFacade>,
    username: String,
    poll_interval: Duration,
    stream_retry_interval: Duration,
}

impl StickiedReplyWatcher {
    pub fn new(
        platform: Arc<dyn PlatformFacade>,
        username: impl Into<String>,
        config: &StickiedReplyConfig,
    ) -> Self {
        Self {
            platform,
            username: username.into(),
            poll_interval: Duration::from_secs(config.poll_interval),
            stream_retry_interval: Duration::from_secs(config.stream_retry_interval),
        }
    }

    /// Consumes the account's submission stream forever, rebuilding it after
    /// every failure.
    pub async fn run(self) {
        info!(
            username = %self.username,
            poll_interval_secs = self.poll_interval.as_secs(),
            "Starting stickied comment watcher"
        );

        let mut tasks = JoinSet::new();
        loop {
            let mut stream = SubmissionStream::new(self.platform.clone(), self.username.clone());
            if let Err(e) = self.consume(&mut stream, &mut tasks).await {
                error!(
                    username = %self.username,
                    code = %e.error_code(),
                    exception = %e,
                    retry_secs = self.stream_retry_interval.as_secs(),
                    "Submission stream failed"
                );
                tokio::time::sleep(self.stream_retry_interval).await;
            }
        }
    }

    /// Reads the stream until it errors. Each new submission is handled by
    /// its own task so a slow reply never stalls the stream.
    async fn consume(
        &self,
        stream: &mut SubmissionStream,
        tasks: &mut JoinSet<(String, Result<ReplyOutcome, CoreError>)>,
    ) -> Result<(), CoreError> {
        loop {
            reap_finished(tasks);

            match stream.next().await? {
                StreamEvent::Item(submission) => {
                    debug!(id = %submission.id, url = %submission.url, "New bot submission");
                    let platform = self.platform.clone();
                    tasks.spawn(async move {
                        let outcome = process_crosspost(platform.as_ref(), &submission).await;
                        (submission.id, outcome)
                    });
                }
                StreamEvent::Heartbeat => {
                    debug!(username = %self.username, "Polling for submissions");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

fn reap_finished(tasks: &mut JoinSet<(String, Result<ReplyOutcome, CoreError>)>) {
    while let Some(joined) = tasks.try_join_next() {
        match joined {
            Ok((id, Ok(outcome))) => debug!(id = %id, outcome = ?outcome, "Processed crosspost"),
            Ok((id, Err(e))) => warn!(
                id = %id,
                code = %e.error_code(),
                exception = %e,
                "Failed to process crosspost"
            ),
            Err(e) => error!(exception = %e, "Crosspost task panicked"),
        }
    }
}

/// Looks up the original behind `crosspost` and quotes its stickied top
/// comment in a reply.
pub async fn process_crosspost(
    platform: &dyn PlatformFacade,
    crosspost: &Submission,
) -> Result<ReplyOutcome, CoreError> {
    let Some(original_id) = submission_id_from_url(&crosspost.url) else {
        return Ok(ReplyOutcome::NotACrosspost);
    };

    let original = platform.fetch_submission(&original_id).await?;
    let stickied = platform
        .top_comment(&original.id)
        .await?
        .filter(|comment| comment.stickied);

    let Some(comment) = stickied else {
        return Ok(ReplyOutcome::NoStickiedComment);
    };

    info!(
        submission_id = %comment.link_id,
        comment_id = %comment.id,
        comment_body = %comment.body,
        "Found stickied comment on removed post"
    );
    platform.reply(&crosspost.id, &compose_reply(&comment)).await?;
    Ok(ReplyOutcome::Replied)
}

/// Extracts a submission id from a Reddit permalink, gallery link or
/// `redd.it` short link.
pub fn submission_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == "redd.it" {
        segments.next()?
    } else if host == "reddit.com" || host.ends_with(".reddit.com") {
        segments
            .skip_while(|s| *s != "comments" && *s != "gallery")
            .nth(1)?
    } else {
        return None;
    };

    id.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then(|| id.to_string())
}

/// Prefixes every line with `> ` and removes horizontal rules.
pub fn quote_comment(body: &str) -> String {
    body.split('\n')
        .map(|line| {
            let line = HORIZONTAL_RULES
                .iter()
                .fold(line.to_string(), |acc, rule| acc.replace(rule, ""));
            format!("> {}", line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose_reply(comment: &Comment) -> String {
    format!(
        "The [following stickied comment]({}) was added to the removed submission:\n\n\
         {}\n\n\
         This might help explain why the moderators of r/{} decided to remove the \
         submission in question.\n\n\
         *^(It might also be completely unrelated or unhelpful.)*",
        comment.absolute_permalink(),
        quote_comment(&comment.body),
        comment.subreddit
    )
}
