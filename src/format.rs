use serde::Serialize;

use crate::analytics::Outcome;

/// Display color attached to an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Green,
    Purple,
    Blue,
    Red,
    Amber,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Purple => "purple",
            StatusColor::Blue => "blue",
            StatusColor::Red => "red",
            StatusColor::Amber => "amber",
        }
    }

    /// ANSI SGR foreground code for terminal output.
    pub fn ansi_code(&self) -> u8 {
        match self {
            StatusColor::Green => 32,
            StatusColor::Purple => 35,
            StatusColor::Blue => 34,
            StatusColor::Red => 31,
            StatusColor::Amber => 33,
        }
    }
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Done => "Done",
            Outcome::PrCreated => "PR Created",
            Outcome::Staged => "Staged",
            Outcome::Error => "Error",
            Outcome::InProgress => "In Progress",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            Outcome::Done => StatusColor::Green,
            Outcome::PrCreated => StatusColor::Purple,
            Outcome::Staged => StatusColor::Blue,
            Outcome::Error => StatusColor::Red,
            Outcome::InProgress => StatusColor::Amber,
        }
    }
}

/// Milliseconds as `"Xh Ym"`, `"Xm Ys"` or `"Xs"`. Each component is
/// truncated, never rounded. Negative input renders as `"0s"`.
pub fn format_duration(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Same as [`format_duration`] for averages, which are fractional.
pub fn format_duration_f64(ms: f64) -> String {
    if !ms.is_finite() {
        return "0s".to_string();
    }
    format_duration(ms.floor() as i64)
}

/// Compact token count: `2.3M`, `1.5K`, or the plain number below a thousand.
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        format_number(tokens)
    }
}

/// Integer with `,` thousands separators.
pub fn format_number(value: u64) -> String {
    let s = value.to_string();
    let len = s.len();
    if len <= 3 {
        return s;
    }

    let mut result = String::with_capacity(len + (len - 1) / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

pub fn format_percent(rate: f64) -> String {
    if !rate.is_finite() {
        return "0.0%".to_string();
    }
    format!("{rate:.1}%")
}

/// Dollar amount; sub-cent values keep four decimals so they don't show as `$0.00`.
pub fn format_cost(usd: f64) -> String {
    if usd > 0.0 && usd < 0.01 {
        format!("${usd:.4}")
    } else {
        format!("${usd:.2}")
    }
}
