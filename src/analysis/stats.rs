// Stats module - reduce per-frame series to fixed descriptors
//
// Every extractor produces time series (one value per frame) and collapses
// them with the statistics requested in its parameters. Non-finite frame
// values (unvoiced pitch frames, silent LPC frames) are excluded before
// reduction; a series with no finite value reduces to NA.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Summary statistic applied across frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Statistic {
    Mean,
    /// Population standard deviation
    Std,
    /// Population variance
    Var,
    Median,
    Min,
    Max,
    /// Percentile in [0, 100], linear interpolation between order statistics
    Percentile(u8),
}

impl Statistic {
    /// Column suffix for this statistic
    pub fn suffix(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => write!(f, "mean"),
            Statistic::Std => write!(f, "std"),
            Statistic::Var => write!(f, "var"),
            Statistic::Median => write!(f, "median"),
            Statistic::Min => write!(f, "min"),
            Statistic::Max => write!(f, "max"),
            Statistic::Percentile(p) => write!(f, "p{p:02}"),
        }
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mean" => Ok(Statistic::Mean),
            "std" => Ok(Statistic::Std),
            "var" => Ok(Statistic::Var),
            "median" => Ok(Statistic::Median),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            other => {
                let pct = other
                    .strip_prefix('p')
                    .and_then(|digits| digits.parse::<u8>().ok())
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| {
                        format!(
                            "unknown statistic '{other}' (expected mean, std, var, median, min, max or p0..p100)"
                        )
                    })?;
                Ok(Statistic::Percentile(pct))
            }
        }
    }
}

impl TryFrom<String> for Statistic {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Statistic> for String {
    fn from(stat: Statistic) -> Self {
        stat.to_string()
    }
}

/// Column names `<base>_<stat>` for each requested statistic
pub fn stat_columns(base: &str, stats: &[Statistic]) -> Vec<String> {
    stats
        .iter()
        .map(|stat| format!("{base}_{}", stat.suffix()))
        .collect()
}

/// Reduce a per-frame series to the requested statistics
///
/// Returns one entry per statistic, `None` when the series holds no
/// finite value.
pub fn summarise(series: &[f64], stats: &[Statistic]) -> Vec<Option<f64>> {
    let mut finite: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![None; stats.len()];
    }

    finite.sort_by(|a, b| a.total_cmp(b));
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    stats
        .iter()
        .map(|stat| {
            Some(match stat {
                Statistic::Mean => mean,
                Statistic::Std => var.sqrt(),
                Statistic::Var => var,
                Statistic::Median => percentile_sorted(&finite, 50.0),
                Statistic::Min => finite[0],
                Statistic::Max => finite[finite.len() - 1],
                Statistic::Percentile(p) => percentile_sorted(&finite, *p as f64),
            })
        })
        .collect()
}

/// Mean of the finite values, `None` if there are none
pub fn finite_mean(series: &[f64]) -> Option<f64> {
    let (sum, count) = series
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statistics() {
        assert_eq!("mean".parse::<Statistic>(), Ok(Statistic::Mean));
        assert_eq!("p90".parse::<Statistic>(), Ok(Statistic::Percentile(90)));
        assert!("p101".parse::<Statistic>().is_err());
        assert!("average".parse::<Statistic>().is_err());
    }

    #[test]
    fn test_statistic_json_names() {
        let stats: Vec<Statistic> = serde_json::from_str(r#"["mean","std","p05"]"#).unwrap();
        assert_eq!(
            stats,
            vec![Statistic::Mean, Statistic::Std, Statistic::Percentile(5)]
        );
        assert_eq!(
            stat_columns("rms", &stats),
            vec!["rms_mean", "rms_std", "rms_p05"]
        );
    }

    #[test]
    fn test_summarise_known_series() {
        let series = [1.0, 2.0, 3.0, 4.0];
        let out = summarise(
            &series,
            &[
                Statistic::Mean,
                Statistic::Var,
                Statistic::Median,
                Statistic::Min,
                Statistic::Max,
                Statistic::Percentile(25),
            ],
        );
        assert_eq!(out[0], Some(2.5));
        assert_eq!(out[1], Some(1.25));
        assert_eq!(out[2], Some(2.5));
        assert_eq!(out[3], Some(1.0));
        assert_eq!(out[4], Some(4.0));
        assert_eq!(out[5], Some(1.75));
    }

    #[test]
    fn test_summarise_skips_non_finite() {
        let series = [f64::NAN, 10.0, f64::NAN, 20.0];
        let out = summarise(&series, &[Statistic::Mean, Statistic::Std]);
        assert_eq!(out[0], Some(15.0));
        assert_eq!(out[1], Some(5.0));
    }

    #[test]
    fn test_summarise_all_missing_is_na() {
        let out = summarise(&[f64::NAN, f64::NAN], &[Statistic::Mean, Statistic::Max]);
        assert_eq!(out, vec![None, None]);
        assert_eq!(finite_mean(&[]), None);
    }
}
