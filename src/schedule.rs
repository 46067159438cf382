use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::clock_error::ClockError;

/// Minute, hour, day of month, month, day of week.
const FIELD_COUNT: usize = 5;
const DAY_OF_MONTH_FIELD: usize = 2;
const DAY_OF_WEEK_FIELD: usize = 4;
const LAST_WEEKDAY: u32 = 6;

/// A standard five-field cron schedule, with Sunday as day 0.
///
/// When both the day of month and the day of week are restricted, a day
/// matching either one fires.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    inner: Vec<cron::Schedule>,
}

impl Schedule {
    pub fn parse(expression: &str) -> Result<Self, ClockError> {
        let invalid = |reason: String| ClockError::InvalidSchedule {
            expression: expression.to_owned(),
            reason,
        };

        let mut fields: Vec<String> = expression.split_whitespace().map(str::to_owned).collect();
        if fields.len() != FIELD_COUNT {
            return Err(invalid(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                fields.len()
            )));
        }

        // The underlying parser counts weekdays from 1 and wants a leading seconds field.
        fields[DAY_OF_WEEK_FIELD] = shift_weekdays(&fields[DAY_OF_WEEK_FIELD]).map_err(invalid)?;

        // It also requires both day fields to match, so split a schedule that
        // restricts both into one per field.
        let variants = if is_wildcard(&fields[DAY_OF_MONTH_FIELD])
            || is_wildcard(&fields[DAY_OF_WEEK_FIELD])
        {
            vec![fields]
        } else {
            let mut by_month_day = fields.clone();
            by_month_day[DAY_OF_WEEK_FIELD] = "*".to_owned();
            let mut by_weekday = fields;
            by_weekday[DAY_OF_MONTH_FIELD] = "*".to_owned();
            vec![by_month_day, by_weekday]
        };

        let inner = variants
            .iter()
            .map(|fields| {
                cron::Schedule::from_str(&format!("0 {}", fields.join(" ")))
                    .map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            expression: expression.trim().to_owned(),
            inner,
        })
    }

    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.inner
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }

    /// Time left from `now` until the next run.
    pub fn delay_after<Z: TimeZone>(&self, now: &DateTime<Z>) -> Result<Duration, ClockError> {
        let next = self
            .next_after(now)
            .ok_or_else(|| ClockError::NoUpcomingRun(self.expression.clone()))?;
        Ok(next
            .signed_duration_since(now.clone())
            .to_std()
            .unwrap_or_default())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// A day field that places no restriction, as `*`, `?` or a step of one.
fn is_wildcard(field: &str) -> bool {
    matches!(field, "*" | "?" | "*/1" | "?/1")
}

/// Renumbers numeric weekdays from 0-6 to 1-7, leaving names, wildcards and steps alone.
fn shift_weekdays(field: &str) -> Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.find('/') {
            Some(i) => item.split_at(i),
            None => (item, ""),
        };

        let mut bounds = Vec::new();
        for bound in range.split('-') {
            if bound.is_empty() || !bound.chars().all(|c| c.is_ascii_digit()) {
                bounds.push(bound.to_owned());
                continue;
            }

            let day: u32 = bound
                .parse()
                .map_err(|_| format!("invalid day of week \"{}\"", bound))?;
            if day > LAST_WEEKDAY {
                return Err(format!(
                    "day of week {} is out of range 0-{}",
                    day, LAST_WEEKDAY
                ));
            }
            bounds.push((day + 1).to_string());
        }

        items.push(format!("{}{}", bounds.join("-"), step));
    }

    Ok(items.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, second)
            .unwrap()
    }

    #[test]
    fn accepts_standard_expressions() {
        for expression in ["*/5 * * * *", "0 * * * *", "30 2 1 * *", "0 9 * * 1-5"] {
            assert!(Schedule::parse(expression).is_ok(), "{}", expression);
        }
    }

    #[test]
    fn rejects_invalid_expressions() {
        let expressions = [
            "invalid",
            "",
            "* * * *",
            "0 0 * * * *",
            "@hourly",
            "61 * * * *",
            "0 0 * * 7",
        ];
        for expression in expressions {
            assert!(
                matches!(
                    Schedule::parse(expression),
                    Err(ClockError::InvalidSchedule { .. })
                ),
                "{}",
                expression
            );
        }
    }

    #[test]
    fn next_run_lands_on_the_next_matching_minute() {
        let schedule = Schedule::parse("*/15 * * * *").unwrap();
        assert_eq!(schedule.next_after(&at(19, 10, 7, 30)), Some(at(19, 10, 15, 0)));
    }

    #[test]
    fn weekdays_count_from_sunday() {
        // 2026-10-17 is a Saturday.
        let saturday_noon = at(17, 12, 0, 0);
        let sunday = Schedule::parse("0 9 * * 0").unwrap();
        let monday = Schedule::parse("0 9 * * 1").unwrap();
        let weekdays = Schedule::parse("0 9 * * 1-5").unwrap();

        assert_eq!(sunday.next_after(&saturday_noon), Some(at(18, 9, 0, 0)));
        assert_eq!(monday.next_after(&saturday_noon), Some(at(19, 9, 0, 0)));
        assert_eq!(weekdays.next_after(&saturday_noon), Some(at(19, 9, 0, 0)));
    }

    #[test]
    fn restricted_day_fields_fire_on_either_match() {
        // Every Monday as well as every first of the month.
        let schedule = Schedule::parse("0 0 1 * 1").unwrap();
        assert_eq!(schedule.next_after(&at(19, 10, 0, 0)), Some(at(26, 0, 0, 0)));

        // The 20th comes before the next Saturday.
        let schedule = Schedule::parse("0 0 20 * 6").unwrap();
        assert_eq!(schedule.next_after(&at(19, 10, 0, 0)), Some(at(20, 0, 0, 0)));
    }

    #[test]
    fn a_wildcard_day_field_keeps_the_other_one_strict() {
        let schedule = Schedule::parse("0 0 1 * *").unwrap();
        assert_eq!(
            schedule.next_after(&at(19, 10, 0, 0)),
            Some(Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn delay_is_measured_from_now() {
        let schedule = Schedule::parse("0 * * * *").unwrap();
        assert_eq!(
            schedule.delay_after(&at(19, 10, 59, 30)).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn shift_weekdays_keeps_steps_and_names() {
        assert_eq!(shift_weekdays("*").unwrap(), "*");
        assert_eq!(shift_weekdays("0,6").unwrap(), "1,7");
        assert_eq!(shift_weekdays("1-5/2").unwrap(), "2-6/2");
        assert_eq!(shift_weekdays("*/2").unwrap(), "*/2");
        assert_eq!(shift_weekdays("MON-FRI").unwrap(), "MON-FRI");
        assert!(shift_weekdays("8").is_err());
    }
}
