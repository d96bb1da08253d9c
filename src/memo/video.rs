use std::sync::OnceLock;

use regex::Regex;

fn bare_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap())
}

fn url_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)",
            r"|youtu\.be/)([A-Za-z0-9_-]{11})",
        ))
        .unwrap()
    })
}

/// Extracts the video id from a bare id or a youtube.com / youtu.be link.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if bare_id().is_match(input) {
        return Some(input.to_string());
    }
    url_id().captures(input).map(|caps| caps[1].to_string())
}

pub fn watch_url(video_id: &str, start: f64) -> String {
    let start = start.max(0.0).floor() as u64;
    if start == 0 {
        format!("https://www.youtube.com/watch?v={}", video_id)
    } else {
        format!("https://www.youtube.com/watch?v={}&t={}s", video_id, start)
    }
}

/// `m:ss` below an hour, `h:mm:ss` above.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).floor() as u64 } else { 0 };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parses `ss`, `m:ss` or `h:mm:ss`. The last field may carry a fraction.
pub fn parse_timestamp(input: &str) -> Option<f64> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }

    let (last, leading) = parts.split_last()?;
    let seconds: f64 = last.trim().parse().ok().filter(|s: &f64| s.is_finite() && *s >= 0.0)?;
    if !leading.is_empty() && seconds >= 60.0 {
        return None;
    }

    let mut total = seconds;
    let mut scale = 60.0;
    for (i, part) in leading.iter().rev().enumerate() {
        let value: u64 = part.trim().parse().ok()?;
        // Minutes are capped only when hours are present.
        if i == 0 && leading.len() == 2 && value >= 60 {
            return None;
        }
        total += value as f64 * scale;
        scale *= 60.0;
    }

    Some(total)
}
