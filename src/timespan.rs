//! Human readable timespan descriptors for the preamble.
use hifitime::Epoch;

/// Days around a year boundary within which an endpoint is rounded to the
/// adjacent year before classification.
const BOUNDARY_BUFFER_DAYS: u8 = 10;

/// Computes the descriptive timespan of `[start, end]` for the preamble:
/// `2000s` for a span inside one decade, `2001` for a single calendar
/// year, `1995-2015` otherwise. Endpoints within ten days of a year
/// boundary count against the adjacent year, so `1899-12-31` opens the
/// 1900s and `2001-01-02` still closes 2000. A caller supplied custom
/// descriptor always wins.
pub fn descriptive_timespan(start: Epoch, end: Epoch, custom: Option<&str>) -> String {
    if let Some(custom) = custom {
        return custom.to_string();
    }

    let (start_year, start_month, start_day, _, _, _, _) = start.to_gregorian_utc();
    let (end_year, end_month, end_day, _, _, _, _) = end.to_gregorian_utc();

    let mut start_year = start_year;
    if start_month == 12 && start_day > 31 - BOUNDARY_BUFFER_DAYS {
        start_year += 1;
    }
    let mut end_year = end_year;
    if end_month == 1 && end_day <= BOUNDARY_BUFFER_DAYS {
        end_year -= 1;
    }

    if start_year == end_year {
        return format!("{}", start_year);
    }
    if start_year.div_euclid(10) == end_year.div_euclid(10) {
        return format!("{}s", start_year.div_euclid(10) * 10);
    }
    format!("{}-{}", start_year, end_year)
}
