use crate::error::{CarbonError, Result};

/// Converts a scheduler duration of the form `H:MM:SS` to fractional hours.
pub fn hours(duration: &str) -> Result<f64> {
    let fields: Vec<&str> = duration.trim().split(':').collect();
    let [h, m, s] = fields.as_slice() else {
        return Err(CarbonError::DataParseFailure(format!(
            "invalid duration '{duration}', expected H:MM:SS"
        )));
    };

    let invalid = |reason: &str| {
        CarbonError::DataParseFailure(format!("invalid duration '{duration}': {reason}"))
    };
    let parse = |field: &str| {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("fields must be ASCII digits"));
        }
        field.parse::<u64>().map_err(|e| invalid(&e.to_string()))
    };
    // minutes and seconds are always two digits below 60
    let parse_sexagesimal = |field: &str| {
        if field.len() != 2 {
            return Err(invalid("minutes and seconds must have two digits"));
        }
        match parse(field)? {
            value @ 0..=59 => Ok(value),
            _ => Err(invalid("minutes and seconds must be below 60")),
        }
    };

    let (h, m, s) = (parse(h)?, parse_sexagesimal(m)?, parse_sexagesimal(s)?);
    Ok(h as f64 + m as f64 / 60.0 + s as f64 / 3600.0)
}
