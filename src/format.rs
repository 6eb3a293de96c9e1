//! Number formatting shared by the table writer, error log and diagnostics.

/// Format like C's `%.<precision>G`.
///
/// Uses `precision` significant figures, switches to exponent notation when
/// the exponent is below -4 or at least `precision`, strips trailing zeros
/// and writes the exponent with a sign and at least two digits.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}E{}{:02}", trim_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_notation() {
        assert_eq!(format_g(0.1, 6), "0.1");
        assert_eq!(format_g(123.456789, 6), "123.457");
        assert_eq!(format_g(100000.0, 6), "100000");
        assert_eq!(format_g(-2.5, 6), "-2.5");
        assert_eq!(format_g(0.00012345, 6), "0.00012345");
        assert_eq!(format_g(60000.123456, 6), "60000.1");
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(format_g(123456789.0, 6), "1.23457E+08");
        assert_eq!(format_g(0.0000123, 6), "1.23E-05");
        assert_eq!(format_g(1e100, 6), "1E+100");
        assert_eq!(format_g(999999.5, 6), "1E+06");
    }

    #[test]
    fn test_low_precision() {
        assert_eq!(format_g(0.12345, 3), "0.123");
        assert_eq!(format_g(0.0049, 2), "0.0049");
        assert_eq!(format_g(1234.0, 2), "1.2E+03");
        assert_eq!(format_g(1.0, 3), "1");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(format_g(0.0, 6), "0");
        assert_eq!(format_g(f64::NAN, 6), "NAN");
        assert_eq!(format_g(f64::INFINITY, 6), "INF");
        assert_eq!(format_g(f64::NEG_INFINITY, 6), "-INF");
    }
}
