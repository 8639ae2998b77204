/// Digits shown after the leading significant digit
pub const DEFAULT_PRECISION: usize = 5;
/// Zeros allowed between the decimal point and the first significant digit
pub const DEFAULT_MAX_LEADING_ZEROS: usize = 3;

/// Formats `value` with a magnitude-dependent number of decimals.
///
/// Values are shown with `precision` digits after their leading significant
/// digit. Fixed-point is used while that needs between `0` and
/// `precision + max_leading_zeros` decimals; anything larger or smaller goes
/// to scientific notation with a `precision`-digit mantissa.
///
/// ```
/// use tiny_scales::format_value;
///
/// assert_eq!(format_value(1234.5, 5, 3), "1234.50");
/// assert_eq!(format_value(0.0000012345, 5, 3), "1.23450e-06");
/// assert_eq!(format_value(f64::NAN, 5, 3), "nan");
/// ```
pub fn format_value(value: f64, precision: usize, max_leading_zeros: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format_integral(value);
    }
    let decimals = precision as i64 - value.abs().log10().floor() as i64;
    if (0..=(precision + max_leading_zeros) as i64).contains(&decimals) {
        format!("{:.*}", decimals as usize, value)
    } else {
        format_scientific(value, precision)
    }
}

/// Zero-decimal rendering, with lowercase names for non-finite values
fn format_integral(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{:.0}", value)
    }
}

/// `d.ddddde±XX`: signed exponent padded to two digits
fn format_scientific(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e').map(|(m, e)| (m, e.parse::<i32>())) {
        Some((mantissa, Ok(exp))) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        _ => formatted,
    }
}
