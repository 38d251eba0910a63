//! Number formatting for reports.

/// Round to a whole number and group thousands with spaces.
///
/// ```rust
/// use calc_core::format::thousands;
///
/// assert_eq!(thousands(290321.4), "290 321");
/// assert_eq!(thousands(-1875.5), "-1 876");
/// ```
pub fn thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
