// Copyright 2025 Martin Pool

//! Short, kubectl-like rendering of how long ago something was created.

use std::time::Duration;

/// Format an age using at most two units, coarsening as it grows.
pub fn format(age: Duration) -> String {
    let secs = age.as_secs();
    let (mins, hours, days) = (secs / 60, secs / 3600, secs / 86400);
    if secs < 120 {
        format!("{secs}s")
    } else if mins < 120 {
        format!("{mins}m")
    } else if hours < 48 {
        match mins % 60 {
            0 => format!("{hours}h"),
            m => format!("{hours}h{m}m"),
        }
    } else {
        match hours % 24 {
            0 => format!("{days}d"),
            h => format!("{days}d{h}h"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ages() {
        assert_eq!(format(Duration::from_millis(900)), "0s");
        assert_eq!(format(Duration::from_secs(119)), "119s");
        assert_eq!(format(Duration::from_secs(120)), "2m");
        assert_eq!(format(Duration::from_secs(7199)), "119m");
        assert_eq!(format(Duration::from_secs(7200)), "2h");
        assert_eq!(format(Duration::from_secs(3 * 3600 + 5 * 60 + 30)), "3h5m");
        assert_eq!(format(Duration::from_secs(48 * 3600)), "2d");
        assert_eq!(format(Duration::from_secs(7 * 86400 + 7 * 3600 + 59)), "7d7h");
    }
}
