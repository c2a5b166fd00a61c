//! Human-readable tier label from a numeric rank.

/// Bucket a rank within a population into a display label.
///
/// A rank of zero or below means unknown/unranked and yields `"N/A"`.
/// Bucket boundaries are inclusive on the lower bucket: exactly 1.0%
/// is `"TOP 1%"`, not `"TOP 5%"`.
pub fn percentile(rank: i64, population: u64) -> String {
    if rank <= 0 || population == 0 {
        return "N/A".to_string();
    }
    // Multiply before dividing so exact boundaries stay exact in f64.
    let pct = (rank as f64 * 100.0) / population as f64;
    if pct <= 1.0 {
        "TOP 1%".to_string()
    } else if pct <= 5.0 {
        "TOP 5%".to_string()
    } else if pct <= 10.0 {
        "TOP 10%".to_string()
    } else if pct <= 25.0 {
        "TOP 25%".to_string()
    } else {
        format!("TOP {}%", pct.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_one_percent_is_top_1() {
        assert_eq!(percentile(30_000, 3_000_000), "TOP 1%");
    }

    #[test]
    fn just_over_one_percent_is_top_5() {
        assert_eq!(percentile(30_001, 3_000_000), "TOP 5%");
    }

    #[test]
    fn zero_and_negative_ranks_are_not_applicable() {
        assert_eq!(percentile(0, 3_000_000), "N/A");
        assert_eq!(percentile(-5, 3_000_000), "N/A");
    }

    #[test]
    fn empty_population_is_not_applicable() {
        assert_eq!(percentile(10, 0), "N/A");
    }

    #[test]
    fn remaining_buckets() {
        assert_eq!(percentile(150_000, 3_000_000), "TOP 5%");
        assert_eq!(percentile(300_000, 3_000_000), "TOP 10%");
        assert_eq!(percentile(750_000, 3_000_000), "TOP 25%");
        assert_eq!(percentile(1_500_000, 3_000_000), "TOP 50%");
        assert_eq!(percentile(2_770_000, 3_000_000), "TOP 92%");
    }
}
