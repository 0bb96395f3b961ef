//! Fixed historical crisis windows (spec §4.13): when a backtest's
//! coverage overlaps one of these, the harness restricts the summary
//! statistics, average regime probabilities, and per-instrument
//! attribution to the overlapping months.

use chrono::NaiveDate;

pub struct CrisisWindow {
    pub name: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn md(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

/// The table is fixed per spec §4.13's example list; a faithful
/// reimplementation keeps exactly these six rather than inventing others.
pub fn crisis_windows() -> Vec<CrisisWindow> {
    vec![
        CrisisWindow { name: "taper_tantrum_2013", start: md(2013, 5), end: md(2013, 12) },
        CrisisWindow { name: "brazil_impeachment_2015", start: md(2015, 1), end: md(2016, 12) },
        CrisisWindow { name: "joesley_day_2017", start: md(2017, 5), end: md(2017, 8) },
        CrisisWindow { name: "covid_2020", start: md(2020, 2), end: md(2020, 6) },
        CrisisWindow { name: "fed_hike_2022", start: md(2022, 1), end: md(2022, 12) },
        CrisisWindow { name: "brazil_fiscal_2024", start: md(2024, 1), end: md(2024, 12) },
    ]
}
