use crate::ValidationError;
use chrono::Datelike;

pub fn non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(())
}

/// Plates are 1-16 characters of `[A-Za-z0-9 -]`.
pub fn validate_plate(plate: &str) -> Result<(), ValidationError> {
    let plate = plate.trim();
    non_blank("plate", plate)?;
    if plate.len() > 16 {
        return Err(ValidationError::invalid(
            "plate",
            "must be at most 16 characters",
        ));
    }
    if !plate
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b' ')
    {
        return Err(ValidationError::invalid("plate", "must match [A-Za-z0-9 -]"));
    }
    Ok(())
}

/// Model years run from 1900 to next calendar year.
pub fn validate_year(year: u16) -> Result<(), ValidationError> {
    let max = chrono::Utc::now().year() + 1;
    if year < 1900 || i32::from(year) > max {
        return Err(ValidationError::invalid(
            "year",
            format!("{year} is outside 1900..={max}"),
        ));
    }
    Ok(())
}

/// Money and volume inputs must be finite and non-negative.
pub fn validate_amount(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::invalid(
            field,
            format!("{value} is not a non-negative amount"),
        ));
    }
    Ok(())
}
