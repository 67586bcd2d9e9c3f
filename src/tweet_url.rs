use std::fmt;

/// A tweet status URL reduced to its canonical x.com form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetUrl {
    pub username: String,
    pub tweet_id: String,
    pub normalized_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTweetUrl(&'static str);

impl fmt::Display for InvalidTweetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for InvalidTweetUrl {}

impl TweetUrl {
    /// Parse a tweet URL from x.com or twitter.com (with or without www).
    /// Expected path: /<username>/status/<numeric id>[/...]
    pub fn parse(input: &str) -> Result<Self, InvalidTweetUrl> {
        let cleaned = input.trim();
        if cleaned.is_empty() {
            return Err(InvalidTweetUrl("Tweet URL is required"));
        }

        let rest = strip_prefix_ignore_case(cleaned, "https://")
            .or_else(|| strip_prefix_ignore_case(cleaned, "http://"))
            .ok_or(InvalidTweetUrl(
                "Tweet URL must start with http:// or https://",
            ))?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        // Query and fragment never belong to the status path
        let path = path.split(&['?', '#'][..]).next().unwrap_or("");

        let host = authority.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        if host != "x.com" && host != "twitter.com" {
            return Err(InvalidTweetUrl(
                "Tweet URL must be from x.com or twitter.com",
            ));
        }

        let mut segments = path.trim_start_matches('/').split('/');
        let username = segments.next().unwrap_or("");
        let status = segments.next().unwrap_or("");
        let tweet_id = segments.next().unwrap_or("");

        let username_ok = !username.is_empty()
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        let tweet_id_ok = !tweet_id.is_empty() && tweet_id.chars().all(|c| c.is_ascii_digit());

        if !path.starts_with('/') || !username_ok || status != "status" || !tweet_id_ok {
            return Err(InvalidTweetUrl(
                "Tweet URL must match /<user>/status/<tweet_id>",
            ));
        }

        Ok(Self {
            username: username.to_string(),
            tweet_id: tweet_id.to_string(),
            normalized_url: format!("https://x.com/{}/status/{}", username, tweet_id),
        })
    }

    pub fn author_handle(&self) -> String {
        format!("@{}", self.username)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
