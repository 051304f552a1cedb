// src/catalog/period.rs

use anyhow::{Context, Result};
use std::ops::RangeInclusive;

use super::template::{Bindings, UrlTemplate};

/// Months `"01"` through `"12"`, in calendar order.
pub fn default_months() -> Vec<String> {
    (1..=12).map(|m| format!("{:02}", m)).collect()
}

/// Years × months at a fixed day.
///
/// Iteration is year ascending, then months in the order they were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodGrid {
    years: RangeInclusive<i32>,
    months: Vec<u32>,
    day: u32,
}

impl PeriodGrid {
    /// All twelve months of every year in `year_start..=year_end`, on day 1.
    /// An inverted range is empty.
    pub fn new(year_start: i32, year_end: i32) -> Self {
        Self {
            years: year_start..=year_end,
            months: (1..=12).collect(),
            day: 1,
        }
    }

    /// Replace the month list. Values are parsed as integers, so `"1"` and
    /// `"01"` are equivalent.
    pub fn with_months<S: AsRef<str>>(mut self, months: &[S]) -> Result<Self> {
        self.months = months
            .iter()
            .map(|m| parse_two_digit(m.as_ref()).with_context(|| format!("month {:?}", m.as_ref())))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn with_day(mut self, day: &str) -> Result<Self> {
        self.day = parse_two_digit(day).with_context(|| format!("day {:?}", day))?;
        Ok(self)
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Number of (year, month) cells.
    pub fn len(&self) -> usize {
        self.years.clone().count() * self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn periods(&self) -> impl Iterator<Item = (i32, u32)> + '_ {
        self.years
            .clone()
            .flat_map(move |year| self.months.iter().map(move |&month| (year, month)))
    }

    /// Render every pattern for every period, patterns innermost.
    pub fn expand(&self, patterns: &[UrlTemplate], dataset_key: &str) -> Vec<String> {
        let mut urls = Vec::with_capacity(self.len() * patterns.len());
        for (year, month) in self.periods() {
            let bindings = Bindings {
                year,
                month,
                day: self.day,
                dataset_key,
            };
            urls.extend(patterns.iter().map(|p| p.render(&bindings)));
        }
        urls
    }
}

fn parse_two_digit(value: &str) -> Result<u32> {
    let n: u32 = value
        .trim()
        .parse()
        .with_context(|| format!("{:?} is not an integer", value))?;
    if n > 99 {
        anyhow::bail!("{} does not fit in two digits", n);
    }
    Ok(n)
}

/// Expand `patterns` over `year_start..=year_end` × `months` for one dataset key.
///
/// Produces `(year_end - year_start + 1) * months.len() * patterns.len()` URLs,
/// or none when the year range is inverted. Fails only when a month or the day
/// is not an integer.
pub fn expand<M, P>(
    year_start: i32,
    year_end: i32,
    months: &[M],
    patterns: &[P],
    dataset_key: &str,
    day: &str,
) -> Result<Vec<String>>
where
    M: AsRef<str>,
    P: AsRef<str>,
{
    let grid = PeriodGrid::new(year_start, year_end)
        .with_months(months)?
        .with_day(day)?;
    let templates: Vec<UrlTemplate> = patterns
        .iter()
        .map(|p| UrlTemplate::parse(p.as_ref()))
        .collect();
    Ok(grid.expand(&templates, dataset_key))
}
