use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, info};

use crate::eval::Execution;

/// Install a file logger at ~/.local/share/replkit/replkit.log.
/// Best-effort: returns false (and logs nothing) if the file can't be opened
/// or a logger is already installed; the console keeps working either way.
pub fn init(level: &str) -> bool {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let Some(home) = std::env::var_os("HOME") else {
        return false;
    };
    let log_dir = std::path::Path::new(&home).join(".local/share/replkit");
    let _ = std::fs::create_dir_all(&log_dir);

    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("replkit.log"))
    else {
        return false;
    };

    let config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    simplelog::WriteLogger::init(level, config, file).is_ok()
}

/// Record one audit line for an executed input.
pub fn log_execution(line: &str, execution: &Execution) {
    // Compact single-line form: newlines folded, command truncated
    let line_oneline = line.replace('\n', "; ");
    let line_truncated: String = line_oneline.chars().take(200).collect();
    let status = if execution.is_ok() { "ok" } else { "error" };
    let errors = execution
        .errors
        .iter()
        .map(|e| e.to_string().replace('\n', "; "))
        .collect::<Vec<_>>()
        .join(" | ");

    info!(
        target: "replkit::audit",
        "{status}\t{line_truncated}\t{bytes}B\t{errors}",
        bytes = execution.output.len(),
    );
}

/// Broken-down UTC time, second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

const SECS_PER_DAY: i64 = 86_400;

impl From<SystemTime> for UtcTime {
    fn from(time: SystemTime) -> Self {
        // Times before the epoch count backwards; sub-second parts are dropped.
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        };
        let (year, month, day) = civil_date(secs.div_euclid(SECS_PER_DAY));
        let of_day = secs.rem_euclid(SECS_PER_DAY) as u32;
        UtcTime {
            year,
            month,
            day,
            hour: of_day / 3600,
            minute: of_day % 3600 / 60,
            second: of_day % 60,
        }
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// RFC 3339 UTC form (`YYYY-MM-DDTHH:MM:SSZ`). Every time the crate shows
/// (job listings, job JSON) goes through here.
pub fn timestamp(time: SystemTime) -> String {
    UtcTime::from(time).to_string()
}

/// Proleptic Gregorian (year, month, day) for a day count relative to
/// 1970-01-01, using 400-year eras that start on March 1st.
fn civil_date(days: i64) -> (i64, u32, u32) {
    const DAYS_PER_ERA: i64 = 146_097;
    let shifted = days + 719_468;
    let era = shifted.div_euclid(DAYS_PER_ERA);
    let day_of_era = shifted.rem_euclid(DAYS_PER_ERA);
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    // months counted from March
    let march_month = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * march_month + 2) / 5 + 1) as u32;
    let month = (if march_month < 10 { march_month + 3 } else { march_month - 9 }) as u32;
    let year = era * 400 + year_of_era + i64::from(month <= 2);
    (year, month, day)
}
