//! One-dimensional linear interpolation over sorted tables

/// Look up `x` in a table of `(key, value)` pairs sorted by key
///
/// Exact keys return their value. Queries between two keys are linearly
/// interpolated; queries outside the table extend the nearest boundary
/// segment. A single-entry table is constant.
///
/// # Panics
///
/// Panics if `table` is empty.
pub fn interpolate(table: &[(f32, f32)], x: f32) -> f32 {
    assert!(!table.is_empty(), "interpolation table must not be empty");

    if table.len() == 1 {
        return table[0].1;
    }

    if let Some(&(_, y)) = table.iter().find(|(k, _)| *k == x) {
        return y;
    }

    let last = table.len() - 1;
    let segment = if x < table[0].0 {
        0
    } else if x > table[last].0 {
        last - 1
    } else {
        // First key above x closes the bracket
        table
            .iter()
            .position(|(k, _)| *k > x)
            .map_or(last - 1, |upper| upper.saturating_sub(1))
    };

    let (x1, y1) = table[segment];
    let (x2, y2) = table[segment + 1];
    if x2 == x1 {
        return y1;
    }
    y1 + (y2 - y1) * (x - x1) / (x2 - x1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [(f32, f32); 3] = [(40.0, 59.3), (50.0, 65.4), (60.0, 71.8)];

    #[test]
    fn test_exact_key() {
        assert_eq!(interpolate(&TABLE, 50.0), 65.4);
    }

    #[test]
    fn test_between_keys() {
        let y = interpolate(&TABLE, 45.0);
        assert!((y - 62.35).abs() < 1e-4);
    }

    #[test]
    fn test_extrapolates_below_and_above() {
        // Slope of first segment is 0.61 per unit
        assert!((interpolate(&TABLE, 30.0) - 53.2).abs() < 1e-4);
        // Slope of last segment is 0.64 per unit
        assert!((interpolate(&TABLE, 70.0) - 78.2).abs() < 1e-4);
    }

    #[test]
    fn test_single_entry_is_constant() {
        assert_eq!(interpolate(&[(10.0, -3.0)], 99.0), -3.0);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_table_panics() {
        interpolate(&[], 1.0);
    }
}
