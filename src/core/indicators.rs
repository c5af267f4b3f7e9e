//! Moving averages and MACD over daily closes.
//!
//! Windowed series return `Option<f64>` per input position: a value is only
//! present once its window is full of present inputs.

use crate::domain::model::TrendSignal;
use crate::utils::error::Result;
use crate::utils::validation::{validate_range, Validate};
use serde::{Deserialize, Serialize};

pub const STANDARD_FAST: usize = 12;
pub const STANDARD_SLOW: usize = 26;
pub const STANDARD_SIGNAL: usize = 9;

/// Rolling mean over `window` positions.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let wrapped: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    rolling_mean(&wrapped, window)
}

/// Rolling mean over a series that may already have gaps.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i]
                .iter()
                .try_fold(0.0, |acc, v| v.map(|x| acc + x))
                .map(|sum| sum / window as f64)
        })
        .collect()
}

/// Exponential moving average seeded with the first value, without bias
/// adjustment: `y[t] = a * x[t] + (1 - a) * y[t-1]`, `a = 2 / (span + 1)`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let next = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => x,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    let macd: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal = ema(&macd, signal);
    let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdSeries {
        ema_fast,
        ema_slow,
        macd,
        signal,
        histogram,
    }
}

/// Standard 12/26/9 MACD.
pub fn standard_macd(closes: &[f64]) -> MacdSeries {
    macd(closes, STANDARD_FAST, STANDARD_SLOW, STANDARD_SIGNAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdPeriods {
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub longest_ma: usize,
    pub signal_period: usize,
}

impl Default for MacdPeriods {
    fn default() -> Self {
        Self {
            fast_ma: 10,
            slow_ma: 30,
            longest_ma: 60,
            signal_period: 9,
        }
    }
}

impl Validate for MacdPeriods {
    fn validate(&self) -> Result<()> {
        validate_range("fast_ma", self.fast_ma, 5, 50)?;
        validate_range("slow_ma", self.slow_ma, 10, 100)?;
        validate_range("longest_ma", self.longest_ma, 20, 200)?;
        validate_range("signal_period", self.signal_period, 5, 20)?;
        Ok(())
    }
}

/// MACD built from three simple moving averages instead of EMAs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomMacd {
    pub periods: MacdPeriods,
    pub fast_ma: Vec<Option<f64>>,
    pub slow_ma: Vec<Option<f64>>,
    pub longest_ma: Vec<Option<f64>>,
    pub macd_fast_slow: Vec<Option<f64>>,
    pub macd_slow_longest: Vec<Option<f64>>,
    pub macd_fast_longest: Vec<Option<f64>>,
    pub signal_fast_slow: Vec<Option<f64>>,
    pub signal_slow_longest: Vec<Option<f64>>,
    pub signal_fast_longest: Vec<Option<f64>>,
}

fn difference(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| Some((*x)? - (*y)?))
        .collect()
}

pub fn custom_macd(closes: &[f64], periods: MacdPeriods) -> CustomMacd {
    let fast_ma = sma(closes, periods.fast_ma);
    let slow_ma = sma(closes, periods.slow_ma);
    let longest_ma = sma(closes, periods.longest_ma);

    let macd_fast_slow = difference(&fast_ma, &slow_ma);
    let macd_slow_longest = difference(&slow_ma, &longest_ma);
    let macd_fast_longest = difference(&fast_ma, &longest_ma);

    let signal_fast_slow = rolling_mean(&macd_fast_slow, periods.signal_period);
    let signal_slow_longest = rolling_mean(&macd_slow_longest, periods.signal_period);
    let signal_fast_longest = rolling_mean(&macd_fast_longest, periods.signal_period);

    CustomMacd {
        periods,
        fast_ma,
        slow_ma,
        longest_ma,
        macd_fast_slow,
        macd_slow_longest,
        macd_fast_longest,
        signal_fast_slow,
        signal_slow_longest,
        signal_fast_longest,
    }
}

/// Combines the latest standard and custom (fast/slow) MACD readings.
pub fn trend_signal(standard: &MacdSeries, custom: &CustomMacd) -> TrendSignal {
    let latest = (
        standard.macd.last().copied(),
        standard.signal.last().copied(),
        custom.macd_fast_slow.last().copied().flatten(),
        custom.signal_fast_slow.last().copied().flatten(),
    );

    let (Some(macd), Some(signal), Some(custom_macd), Some(custom_signal)) = latest else {
        return TrendSignal::Neutral;
    };

    if macd > signal && custom_macd > custom_signal && macd > 0.0 {
        TrendSignal::Bullish
    } else if macd < signal && custom_macd < custom_signal && macd < 0.0 {
        TrendSignal::Bearish
    } else {
        TrendSignal::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_sma_leading_values_absent() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_sma_window_longer_than_input() {
        assert_eq!(sma(&[1.0, 2.0], 5), vec![None, None]);
        assert!(sma(&[], 3).is_empty());
    }

    #[test]
    fn test_rolling_mean_requires_full_window() {
        let values = [None, Some(2.0), Some(4.0), Some(6.0)];
        assert_eq!(
            rolling_mean(&values, 2),
            vec![None, None, Some(3.0), Some(5.0)]
        );
    }

    #[test]
    fn test_ema_without_adjustment() {
        // span 3 => alpha 0.5
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_close(out[0], 2.0);
        assert_close(out[1], 3.0);
        assert_close(out[2], 4.5);
        assert_close(out[3], 6.25);
    }

    #[test]
    fn test_macd_histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = standard_macd(&closes);
        assert_eq!(series.macd.len(), closes.len());
        for i in 0..closes.len() {
            assert_close(series.macd[i], series.ema_fast[i] - series.ema_slow[i]);
            assert_close(series.histogram[i], series.macd[i] - series.signal[i]);
        }
        // first point: both EMAs equal the first close
        assert_close(series.macd[0], 0.0);
    }

    #[test]
    fn test_macd_rising_prices_is_positive() {
        let closes: Vec<f64> = (1..=80).map(|i| i as f64).collect();
        let series = standard_macd(&closes);
        assert!(*series.macd.last().unwrap() > 0.0);
    }

    #[test]
    fn test_custom_macd_windows() {
        let closes: Vec<f64> = (1..=80).map(|i| i as f64).collect();
        let periods = MacdPeriods::default();
        let custom = custom_macd(&closes, periods);

        // MA_10 at index 9 is mean(1..=10)
        assert_eq!(custom.fast_ma[8], None);
        assert_close(custom.fast_ma[9].unwrap(), 5.5);

        // fast-slow line starts when the 30-day window fills
        assert_eq!(custom.macd_fast_slow[28], None);
        // linear prices: MA_10 - MA_30 is constant (20 - 10) / 2 * ... = 10
        assert_close(custom.macd_fast_slow[29].unwrap(), 10.0);

        // signal needs 9 present macd values
        assert_eq!(custom.signal_fast_slow[36], None);
        assert_close(custom.signal_fast_slow[37].unwrap(), 10.0);

        // slow-longest appears once the 60-day window fills
        assert_eq!(custom.macd_slow_longest[58], None);
        assert_close(custom.macd_slow_longest[59].unwrap(), 15.0);
        assert_close(custom.macd_fast_longest[59].unwrap(), 25.0);
    }

    #[test]
    fn test_periods_validation_bounds() {
        assert!(MacdPeriods::default().validate().is_ok());
        let too_fast = MacdPeriods {
            fast_ma: 4,
            ..MacdPeriods::default()
        };
        assert!(too_fast.validate().is_err());
        let long_signal = MacdPeriods {
            signal_period: 21,
            ..MacdPeriods::default()
        };
        assert!(long_signal.validate().is_err());
    }

    #[test]
    fn test_trend_signal_bullish_on_accelerating_rise() {
        let closes: Vec<f64> = (1..=120).map(|i| (i * i) as f64 / 10.0).collect();
        let standard = standard_macd(&closes);
        let custom = custom_macd(&closes, MacdPeriods::default());
        assert_eq!(trend_signal(&standard, &custom), TrendSignal::Bullish);
    }

    #[test]
    fn test_trend_signal_bearish_on_accelerating_fall() {
        let closes: Vec<f64> = (1..=120).map(|i| 2000.0 - (i * i) as f64 / 10.0).collect();
        let standard = standard_macd(&closes);
        let custom = custom_macd(&closes, MacdPeriods::default());
        assert_eq!(trend_signal(&standard, &custom), TrendSignal::Bearish);
    }

    #[test]
    fn test_trend_signal_neutral_with_short_history() {
        let closes = [10.0, 11.0, 12.0];
        let standard = standard_macd(&closes);
        let custom = custom_macd(&closes, MacdPeriods::default());
        assert_eq!(trend_signal(&standard, &custom), TrendSignal::Neutral);
    }
}
