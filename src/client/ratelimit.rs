//! Rate limit headers

use vulnetix_protocol::headers;

use super::transport::HttpResponse;

/// Rate limit state reported by the last response
///
/// Absent or unparsable fields are zero; a zero limit means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// At least one rate limit header was present
    pub present: bool,
    pub minute_limit: u64,
    pub remaining: u64,
    /// Seconds until the minute window resets
    pub reset: u64,
    pub week_limit: u64,
    pub week_remaining: u64,
    /// Seconds until the week window resets
    pub week_reset: u64,
}

impl RateLimit {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self::from_lookup(|name| response.header(name))
    }

    pub fn from_lookup<'a, F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let present = headers::RATE_LIMIT_ALL
            .iter()
            .any(|name| lookup(name).is_some());
        let field = |name: &str| {
            lookup(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };

        Self {
            present,
            minute_limit: field(headers::RATE_LIMIT_MINUTE_LIMIT),
            remaining: field(headers::RATE_LIMIT_REMAINING),
            reset: field(headers::RATE_LIMIT_RESET),
            week_limit: field(headers::RATE_LIMIT_WEEK_LIMIT),
            week_remaining: field(headers::RATE_LIMIT_WEEK_REMAINING),
            week_reset: field(headers::RATE_LIMIT_WEEK_RESET),
        }
    }

    /// One-line human summary, `None` when no headers were present
    pub fn summary(&self) -> Option<String> {
        if !self.present {
            return None;
        }
        if self.minute_limit == 0 && self.week_limit == 0 {
            return Some("Rate limit: unlimited".to_string());
        }

        let minute = if self.minute_limit == 0 {
            "unlimited requests this minute".to_string()
        } else {
            format!(
                "{}/{} requests remaining this minute (resets in {})",
                format_number(self.remaining),
                format_number(self.minute_limit),
                format_duration(self.reset)
            )
        };
        let week = if self.week_limit == 0 {
            "unlimited this week".to_string()
        } else {
            format!(
                "{}/{} this week (resets in {})",
                format_number(self.week_remaining),
                format_number(self.week_limit),
                format_duration(self.week_reset)
            )
        };
        Some(format!("Rate limit: {} | {}", minute, week))
    }

    /// Guidance for a 429 response
    pub fn retry_guidance(&self) -> String {
        if self.remaining == 0 && self.minute_limit > 0 {
            format!("minute quota exhausted, resets in {}", format_duration(self.reset))
        } else if self.week_remaining == 0 && self.week_limit > 0 {
            format!("weekly quota exhausted, resets in {}", format_duration(self.week_reset))
        } else {
            "retry later".to_string()
        }
    }
}

/// Compact duration: `45s`, `2m 5s`, `3h`, `2d 3h`
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => match (s / 60, s % 60) {
            (m, 0) => format!("{}m", m),
            (m, rem) => format!("{}m {}s", m, rem),
        },
        s if s < 86_400 => match (s / 3600, (s % 3600) / 60) {
            (h, 0) => format!("{}h", h),
            (h, m) => format!("{}h {}m", h, m),
        },
        s => match (s / 86_400, (s % 86_400) / 3600) {
            (d, 0) => format!("{}d", d),
            (d, h) => format!("{}d {}h", d, h),
        },
    }
}

/// Thousands separators: `1000` becomes `1,000`
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_header() {
        let response = HttpResponse::new(200, "").with_header("RateLimit-Remaining", "45");
        let rl = RateLimit::from_response(&response);
        assert!(rl.present);
        assert_eq!(rl.remaining, 45);
        assert_eq!(rl.minute_limit, 0);
        assert_eq!(rl.reset, 0);
        assert_eq!(rl.week_limit, 0);
        assert_eq!(rl.week_remaining, 0);
        assert_eq!(rl.week_reset, 0);
    }

    #[test]
    fn test_no_headers() {
        let rl = RateLimit::from_response(&HttpResponse::new(200, ""));
        assert_eq!(rl, RateLimit::default());
        assert!(rl.summary().is_none());
    }

    #[test]
    fn test_unparsable_is_zero_but_present() {
        let response = HttpResponse::new(200, "").with_header("ratelimit-weeklimit", "lots");
        let rl = RateLimit::from_response(&response);
        assert!(rl.present);
        assert_eq!(rl.week_limit, 0);
    }

    #[test]
    fn test_summary() {
        let rl = RateLimit {
            present: true,
            minute_limit: 60,
            remaining: 45,
            reset: 30,
            week_limit: 1000,
            week_remaining: 900,
            week_reset: 2 * 86_400 + 3 * 3600,
        };
        assert_eq!(
            rl.summary().unwrap(),
            "Rate limit: 45/60 requests remaining this minute (resets in 30s) | 900/1,000 this week (resets in 2d 3h)"
        );
    }

    #[test]
    fn test_summary_unlimited() {
        let rl = RateLimit {
            present: true,
            ..RateLimit::default()
        };
        assert_eq!(rl.summary().unwrap(), "Rate limit: unlimited");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3660), "1h 1m");
        assert_eq!(format_duration(86_400), "1d");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
