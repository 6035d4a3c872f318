use std::fmt;
use std::str::FromStr;

/// Tenure range in years. Upper bounds are inclusive; 20+ is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TenureBucket {
    UpToFive,
    SixToTen,
    ElevenToFifteen,
    SixteenToTwenty,
    OverTwenty,
}

impl TenureBucket {
    pub const ALL: [TenureBucket; 5] = [
        TenureBucket::UpToFive,
        TenureBucket::SixToTen,
        TenureBucket::ElevenToFifteen,
        TenureBucket::SixteenToTwenty,
        TenureBucket::OverTwenty,
    ];

    pub const LABELS: [&'static str; 5] = ["0-5", "6-10", "11-15", "16-20", "20+"];

    /// Negative years clamp to zero and land in 0-5.
    pub fn from_years(years: i32) -> TenureBucket {
        match years.max(0) {
            0..=5 => TenureBucket::UpToFive,
            6..=10 => TenureBucket::SixToTen,
            11..=15 => TenureBucket::ElevenToFifteen,
            16..=20 => TenureBucket::SixteenToTwenty,
            _ => TenureBucket::OverTwenty,
        }
    }

    pub fn label(&self) -> &'static str {
        Self::LABELS[self.index()]
    }

    pub fn index(&self) -> usize {
        match self {
            TenureBucket::UpToFive => 0,
            TenureBucket::SixToTen => 1,
            TenureBucket::ElevenToFifteen => 2,
            TenureBucket::SixteenToTwenty => 3,
            TenureBucket::OverTwenty => 4,
        }
    }

    /// Position of a bucket label in domain order, if it is one.
    pub fn position(label: &str) -> Option<usize> {
        Self::LABELS.iter().position(|candidate| *candidate == label)
    }
}

impl fmt::Display for TenureBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TenureBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::position(s.trim())
            .map(|index| Self::ALL[index])
            .ok_or_else(|| format!("unknown tenure bucket '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_are_inclusive_on_the_upper_end() {
        assert_eq!(TenureBucket::from_years(0).label(), "0-5");
        assert_eq!(TenureBucket::from_years(5).label(), "0-5");
        assert_eq!(TenureBucket::from_years(6).label(), "6-10");
        assert_eq!(TenureBucket::from_years(10).label(), "6-10");
        assert_eq!(TenureBucket::from_years(15).label(), "11-15");
        assert_eq!(TenureBucket::from_years(20).label(), "16-20");
        assert_eq!(TenureBucket::from_years(21).label(), "20+");
    }

    #[test]
    fn negative_years_clamp_to_first_bucket() {
        assert_eq!(TenureBucket::from_years(-4), TenureBucket::UpToFive);
        assert_eq!(TenureBucket::from_years(i32::MIN), TenureBucket::UpToFive);
        assert_eq!(TenureBucket::from_years(i32::MAX), TenureBucket::OverTwenty);
    }

    #[test]
    fn scenario_three_records() {
        let labels: Vec<&str> = [3, 8, 22]
            .into_iter()
            .map(|years| TenureBucket::from_years(years).label())
            .collect();
        assert_eq!(labels, vec!["0-5", "6-10", "20+"]);
    }

    #[test]
    fn labels_parse_back() {
        for bucket in TenureBucket::ALL {
            assert_eq!(bucket.label().parse::<TenureBucket>().unwrap(), bucket);
        }
        assert!("21-25".parse::<TenureBucket>().is_err());
    }

    proptest! {
        /// Property: every tenure maps to one of the five fixed labels
        #[test]
        fn prop_bucket_is_a_fixed_label(years in any::<i32>()) {
            let label = TenureBucket::from_years(years).label();
            prop_assert!(TenureBucket::LABELS.contains(&label));
        }

        /// Property: bucketing is monotonic in years
        #[test]
        fn prop_bucketing_is_monotonic(a in -50i32..200, b in -50i32..200) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(TenureBucket::from_years(low) <= TenureBucket::from_years(high));
        }
    }
}
