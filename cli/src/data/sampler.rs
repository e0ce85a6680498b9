use std::collections::VecDeque;

use batmon_platform::BatteryProvider;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// SAR ADC breakpoints of the reference handheld, `(raw, percent)`.
const DEFAULT_CURVE: [(i32, i32); 5] = [(479, 0), (480, 4), (512, 20), (528, 50), (578, 100)];

/// Maps a raw provider value to a charge percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Calibration {
    /// The provider already reports percent.
    Passthrough,
    /// Linear interpolation between `(raw, percent)` breakpoints sorted by raw
    /// value, clamped to the first and last percent.
    Curve { points: Vec<(i32, i32)> },
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration::Curve {
            points: DEFAULT_CURVE.to_vec(),
        }
    }
}

impl Calibration {
    pub fn apply(&self, raw: i32) -> i32 {
        let points = match self {
            Calibration::Passthrough => return raw,
            Calibration::Curve { points } => points,
        };

        let (Some(&(first_raw, first_pct)), Some(&(last_raw, last_pct))) =
            (points.first(), points.last())
        else {
            return raw;
        };

        if raw <= first_raw {
            return first_pct;
        }
        if raw >= last_raw {
            return last_pct;
        }

        points
            .windows(2)
            .find(|w| raw >= w[0].0 && raw <= w[1].0)
            .map(|w| {
                let (lo_raw, lo_pct) = w[0];
                let (hi_raw, hi_pct) = w[1];
                if hi_raw == lo_raw {
                    hi_pct
                } else {
                    lo_pct + (raw - lo_raw) * (hi_pct - lo_pct) / (hi_raw - lo_raw)
                }
            })
            .unwrap_or(last_pct)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("battery read failed: {0}")]
    ReadFailed(String),

    #[error("battery driver returned error sentinel {0}")]
    NegativeSentinel(i32),
}

/// Moving average over the last few raw readings.
///
/// ADC readings jump by a few counts between reads and shift sharply when the
/// charger is plugged in, so the window restarts whenever the charger flips.
#[derive(Debug)]
struct Smoother {
    window: usize,
    readings: VecDeque<i32>,
    charging: Option<bool>,
}

impl Smoother {
    fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            readings: VecDeque::with_capacity(window),
            charging: None,
        }
    }

    fn push(&mut self, raw: i32, charging: bool) -> i32 {
        if self.charging != Some(charging) {
            self.readings.clear();
            self.charging = Some(charging);
        }

        if self.readings.len() >= self.window {
            self.readings.pop_front();
        }
        self.readings.push_back(raw);

        let sum: i64 = self.readings.iter().map(|&r| r as i64).sum();
        let len = self.readings.len() as i64;
        ((sum + len / 2) / len) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatterySample {
    pub raw: i32,
    pub level: i32,
    pub charging: bool,
}

pub struct Sampler {
    provider: Box<dyn BatteryProvider>,
    calibration: Calibration,
    smoother: Smoother,
}

impl Sampler {
    pub fn new(
        provider: Box<dyn BatteryProvider>,
        calibration: Calibration,
        smoothing_window: usize,
    ) -> Self {
        Self {
            provider,
            calibration,
            smoother: Smoother::new(smoothing_window),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Read the provider once and turn the reading into a charge level.
    pub fn sample(&mut self) -> Result<BatterySample, SampleError> {
        self.provider
            .refresh()
            .map_err(|e| SampleError::ReadFailed(e.to_string()))?;

        let reading = *self.provider.reading();
        if reading.raw < 0 {
            return Err(SampleError::NegativeSentinel(reading.raw));
        }

        let charging = reading.is_charging();
        let smoothed = self.smoother.push(reading.raw, charging);
        let level = self.calibration.apply(smoothed);

        trace!(raw = reading.raw, smoothed, level, charging, "Battery sampled");
        Ok(BatterySample {
            raw: reading.raw,
            level,
            charging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batmon_platform::{BatteryReading, ChargeState};
    use color_eyre::eyre::{eyre, Result};

    /// Replays a fixed list of reads; `None` is a failed refresh.
    struct Scripted {
        reads: VecDeque<Option<(i32, bool)>>,
        reading: BatteryReading,
    }

    impl Scripted {
        fn new(reads: Vec<Option<(i32, bool)>>) -> Box<Self> {
            Box::new(Self {
                reads: reads.into(),
                reading: BatteryReading::default(),
            })
        }
    }

    impl BatteryProvider for Scripted {
        fn refresh(&mut self) -> Result<()> {
            match self.reads.pop_front().flatten() {
                Some((raw, charging)) => {
                    self.reading = BatteryReading {
                        raw,
                        state: ChargeState::Unknown,
                        external_connected: charging,
                    };
                    Ok(())
                }
                None => Err(eyre!("i/o error")),
            }
        }

        fn reading(&self) -> &BatteryReading {
            &self.reading
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[test]
    fn test_default_curve() {
        let curve = Calibration::default();
        assert_eq!(curve.apply(400), 0);
        assert_eq!(curve.apply(479), 0);
        assert_eq!(curve.apply(480), 4);
        assert_eq!(curve.apply(496), 12);
        assert_eq!(curve.apply(520), 35);
        assert_eq!(curve.apply(553), 75);
        assert_eq!(curve.apply(578), 100);
        assert_eq!(curve.apply(640), 100);
    }

    #[test]
    fn test_passthrough_and_empty_curve() {
        assert_eq!(Calibration::Passthrough.apply(103), 103);
        assert_eq!(Calibration::Curve { points: vec![] }.apply(42), 42);
    }

    #[test]
    fn test_smoothing_resets_on_charger_flip() {
        let mut smoother = Smoother::new(3);
        assert_eq!(smoother.push(500, false), 500);
        assert_eq!(smoother.push(510, false), 505);
        assert_eq!(smoother.push(520, false), 510);
        assert_eq!(smoother.push(530, false), 520);

        assert_eq!(smoother.push(560, true), 560);
        assert_eq!(smoother.push(570, true), 565);
    }

    #[test]
    fn test_sample_levels() {
        let provider = Scripted::new(vec![Some((528, false)), Some((95, true))]);
        let mut sampler = Sampler::new(provider, Calibration::default(), 1);

        let sample = sampler.sample().unwrap();
        assert_eq!(
            sample,
            BatterySample {
                raw: 528,
                level: 50,
                charging: false
            }
        );

        let sample = sampler.sample().unwrap();
        assert!(sample.charging);
        assert_eq!(sample.level, 0);
    }

    #[test]
    fn test_read_errors_are_skipped() {
        let provider = Scripted::new(vec![None, Some((-5, false)), Some((90, false))]);
        let mut sampler = Sampler::new(provider, Calibration::Passthrough, 5);

        assert!(matches!(sampler.sample(), Err(SampleError::ReadFailed(_))));
        assert!(matches!(
            sampler.sample(),
            Err(SampleError::NegativeSentinel(-5))
        ));
        // The sentinel never entered the smoothing window.
        assert_eq!(sampler.sample().unwrap().level, 90);
    }

    #[test]
    fn test_calibration_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            calibration: Calibration,
        }
        let parsed: Wrapper = toml::from_str(
            r#"calibration = { kind = "curve", points = [[100, 0], [200, 100]] }"#,
        )
        .unwrap();
        assert_eq!(parsed.calibration.apply(150), 50);
    }
}
