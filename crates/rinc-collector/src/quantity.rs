//! Kubernetes resource quantities (`"250m"`, `"16Gi"`, `"1e3"`) as `f64`.

use crate::error::{CollectError, Result};

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

/// Decimal SI suffixes as powers of ten.
const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Parses a quantity into its approximate base-unit value (cores, bytes).
///
/// # Examples
///
/// ```
/// use rinc_collector::quantity::parse_quantity;
///
/// assert_eq!(parse_quantity("250m").unwrap(), 0.25);
/// assert_eq!(parse_quantity("2Gi").unwrap(), 2.0 * 1024.0 * 1024.0 * 1024.0);
/// assert!(parse_quantity("lots").is_err());
/// ```
pub fn parse_quantity(raw: &str) -> Result<f64> {
    let s = raw.trim();
    let invalid = || CollectError::Quantity(raw.to_string());

    let parse = |number: &str| -> Result<f64> {
        let value: f64 = number.parse().map_err(|_| invalid())?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid())
        }
    };

    if let Some((number, mult)) = BINARY_SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| s.strip_suffix(suffix).map(|n| (n, *mult)))
    {
        return Ok(parse(number)? * mult);
    }
    if let Some((number, exp)) = DECIMAL_SUFFIXES
        .iter()
        .find_map(|(suffix, exp)| s.strip_suffix(suffix).map(|n| (n, *exp)))
    {
        let value = parse(number)?;
        // Divide for sub-unit suffixes so "100m" is exactly 0.1.
        return Ok(if exp < 0 {
            value / 10f64.powi(-exp)
        } else {
            value * 10f64.powi(exp)
        });
    }
    parse(s)
}

/// `used` as a percentage of `total`; 0 when `total` is 0.
pub fn percentage(used: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    used * 100.0 / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_quantities() {
        assert_eq!(parse_quantity("2").unwrap(), 2.0);
        assert_eq!(parse_quantity("100m").unwrap(), 0.1);
        assert_eq!(parse_quantity("1500Ki").unwrap(), 1_536_000.0);
        assert_eq!(parse_quantity("129M").unwrap(), 129e6);
        assert_eq!(parse_quantity("1e3").unwrap(), 1000.0);
        assert_eq!(parse_quantity("123456789n").unwrap(), 0.123456789);
        assert_eq!(parse_quantity("3E").unwrap(), 3e18);
        assert_eq!(parse_quantity(" 4 ").unwrap(), 4.0);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "Gi", "abc", "1.2.3", "12Xi", "-"] {
            assert!(parse_quantity(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(2.0, 8.0), 25.0);
    }
}
