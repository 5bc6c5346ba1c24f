//! Crosspost title construction.

/// Reddit rejects titles longer than this many characters.
pub const MAX_TITLE_CHARS: usize = 300;

const ELLIPSIS: &str = "...";

/// Builds `[#rank|+score|comments] title [r/subreddit]`.
///
/// When the result would exceed [`MAX_TITLE_CHARS`], only the original title
/// is shortened and suffixed with `...`; the rank, score, comment count and
/// subreddit tag are always kept whole.
pub fn format_title(
    rank: usize,
    score: i64,
    comment_count: u64,
    title: &str,
    subreddit: &str,
) -> String {
    let prefix = format!("[#{}|+{}|{}] ", rank, score, comment_count);
    let suffix = format!(" [r/{}]", subreddit);

    let title_len = title.chars().count();
    let total = prefix.chars().count() + title_len + suffix.chars().count();
    if total <= MAX_TITLE_CHARS {
        return format!("{prefix}{title}{suffix}");
    }

    let keep = title_len
        .saturating_sub(total - MAX_TITLE_CHARS)
        .saturating_sub(ELLIPSIS.len());
    let shortened: String = title.chars().take(keep).collect();
    format!("{prefix}{shortened}{ELLIPSIS}{suffix}")
}
