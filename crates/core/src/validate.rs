use chrono::NaiveDate;

use crate::errors::ValidationError;

/// Normalizes a `D/M/YYYY` user date to zero-padded `YYYY-MM-DD`.
///
/// Rejects inputs that do not match the pattern, that fail to construct as a
/// real calendar date, or that fall strictly before `today`.
pub fn normalize_date(input: &str, today: NaiveDate) -> Result<String, ValidationError> {
    let input = input.trim();
    let parts: Vec<&str> = input.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(ValidationError::DateFormat(input.to_owned()));
    };

    if day.len() > 2 || month.len() > 2 || year.len() != 4 {
        return Err(ValidationError::DateFormat(input.to_owned()));
    }

    let (Ok(day), Ok(month), Ok(year)) =
        (day.parse::<u32>(), month.parse::<u32>(), year.parse::<i32>())
    else {
        return Err(ValidationError::DateFormat(input.to_owned()));
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ValidationError::DateNotReal(input.to_owned()))?;

    if date < today {
        return Err(ValidationError::DatePast(input.to_owned()));
    }

    Ok(date.format("%Y-%m-%d").to_string())
}

/// Normalizes an `H:MM`/`HH:MM` user time to zero-padded `HH:MM`.
pub fn normalize_time(input: &str) -> Result<String, ValidationError> {
    let input = input.trim();
    let Some((hour, minute)) = input.split_once(':') else {
        return Err(ValidationError::TimeFormat(input.to_owned()));
    };

    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(ValidationError::TimeFormat(input.to_owned()));
    }

    let (Ok(hour), Ok(minute)) = (hour.parse::<u32>(), minute.parse::<u32>()) else {
        return Err(ValidationError::TimeFormat(input.to_owned()));
    };

    if hour > 23 || minute > 59 {
        return Err(ValidationError::TimeFormat(input.to_owned()));
    }

    Ok(format!("{hour:02}:{minute:02}"))
}
