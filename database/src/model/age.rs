use chrono::{Datelike, NaiveDate, Utc};

/// Whole years elapsed between `birth_date` and `reference_date`.
///
/// Returns `None` when there is no birth date, callers must treat that as "matches no age bound"
/// rather than as zero. A person turns a new age on the day of their birthday. Birthdays are compared
/// as `(month, day)` tuples, so a 29 February birthday is reached on 1 March in a non-leap year.
///
/// A birth date after the reference date gives a negative age.
pub fn age_of(birth_date: Option<NaiveDate>, reference_date: NaiveDate) -> Option<i32> {
    let birth = birth_date?;

    let birthday_passed =
        (reference_date.month(), reference_date.day()) >= (birth.month(), birth.day());

    let mut age = reference_date.year() - birth.year();

    if !birthday_passed {
        age -= 1;
    }

    Some(age)
}

/// Source of the reference date used for age calculations
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Current UTC date
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Always answers the same date, used to make age based queries deterministic
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    mod age_of {
        use super::*;

        #[rstest]
        // Birthday already passed this year
        #[case(date(1990, 1, 1), date(2024, 6, 1), 34)]
        // Birthday is today, the new age applies immediately
        #[case(date(1990, 6, 1), date(2024, 6, 1), 34)]
        // Birthday is tomorrow
        #[case(date(1990, 6, 2), date(2024, 6, 1), 33)]
        // Birthday not yet reached on new year's day
        #[case(date(1990, 6, 1), date(2024, 1, 1), 33)]
        // Last day of the year
        #[case(date(2000, 12, 31), date(2024, 12, 30), 23)]
        #[case(date(2000, 12, 31), date(2024, 12, 31), 24)]
        // Born today
        #[case(date(2024, 6, 1), date(2024, 6, 1), 0)]
        fn computes_whole_years(
            #[case] birth_date: NaiveDate,
            #[case] reference_date: NaiveDate,
            #[case] expected: i32,
        ) {
            assert_eq!(age_of(Some(birth_date), reference_date), Some(expected));
        }

        #[rstest]
        // Non-leap reference year: not reached on the 28th, reached on 1 March
        #[case(date(2000, 2, 29), date(2023, 2, 28), 22)]
        #[case(date(2000, 2, 29), date(2023, 3, 1), 23)]
        // Leap reference year: reached on the 29th
        #[case(date(2000, 2, 29), date(2024, 2, 28), 23)]
        #[case(date(2000, 2, 29), date(2024, 2, 29), 24)]
        fn leap_day_birthdays_are_reached_on_march_first_in_non_leap_years(
            #[case] birth_date: NaiveDate,
            #[case] reference_date: NaiveDate,
            #[case] expected: i32,
        ) {
            assert_eq!(age_of(Some(birth_date), reference_date), Some(expected));
        }

        #[test]
        fn missing_birth_date_has_no_age() {
            assert_eq!(age_of(None, date(2024, 6, 1)), None);
        }

        #[test]
        fn future_birth_date_is_negative() {
            assert_eq!(age_of(Some(date(2025, 1, 1)), date(2024, 6, 1)), Some(-1));
        }

        #[test]
        fn matches_year_difference_rule_across_a_year() {
            // Given a fixed birth date
            let birth_date = date(1990, 6, 15);

            // When we walk every day of a reference year
            let mut reference_date = date(2024, 1, 1);

            while reference_date.year() == 2024 {
                let birthday_passed = (reference_date.month(), reference_date.day()) >= (6, 15);

                let expected = if birthday_passed { 34 } else { 33 };

                // Then the age only changes on the birthday
                assert_eq!(
                    age_of(Some(birth_date), reference_date),
                    Some(expected),
                    "reference date {}",
                    reference_date
                );

                reference_date = reference_date.succ_opt().expect("not the end of time");
            }
        }
    }

    mod clock {
        use super::*;

        #[test]
        fn fixed_clock_returns_its_date() {
            let clock = FixedClock(date(2024, 6, 1));

            assert_eq!(clock.today(), date(2024, 6, 1));
        }
    }
}
