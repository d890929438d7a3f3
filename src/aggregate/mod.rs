//! # Aggregation Module
//!
//! Rolling averages over the last few sampling cycles.
//!
//! One [`CycleReading`] (climate, particulate and ambient values taken in
//! the same cycle) is stored per window slot, so slot `k` of every channel
//! always refers to the same sampling instant.

pub mod window;

pub use window::HistoryWindow;

use crate::dht::protocol::ClimateSample;
use crate::error::Result;
use crate::pms::protocol::{ParticulateSample, NUM_FIELDS};

/// Number of cycles kept for the rolling average
pub const WINDOW_CAPACITY: usize = 10;

/// Field-wise arithmetic mean with floor division
pub trait Average: Copy {
    /// Mean of `values`, or `None` if there are none
    fn average<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: Clone,
        Self: 'a;
}

impl Average for u8 {
    fn average<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: Clone,
    {
        let (sum, count) = values
            .into_iter()
            .fold((0u32, 0u32), |(sum, count), &v| (sum + u32::from(v), count + 1));
        (count > 0).then(|| (sum / count) as u8)
    }
}

impl Average for ClimateSample {
    fn average<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: Clone,
    {
        let mut temperature = 0i32;
        let mut humidity = 0u32;
        let mut count = 0u32;
        for sample in values {
            temperature += i32::from(sample.temperature);
            humidity += u32::from(sample.humidity);
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(ClimateSample {
            temperature: temperature.div_euclid(count as i32) as i16,
            humidity: (humidity / count) as u16,
        })
    }
}

impl Average for ParticulateSample {
    fn average<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: Clone,
    {
        let mut sums = [0u32; NUM_FIELDS];
        let mut count = 0u32;
        for sample in values {
            for (sum, field) in sums.iter_mut().zip(sample.fields()) {
                *sum += u32::from(field);
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(ParticulateSample::from_fields(sums.map(|sum| (sum / count) as u16)))
    }
}

/// Everything sampled in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReading {
    pub climate: ClimateSample,
    pub particulate: ParticulateSample,
    /// Controller temperature in °C
    pub ambient: u8,
}

impl Average for CycleReading {
    fn average<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
        I::IntoIter: Clone,
    {
        let values = values.into_iter();
        Some(CycleReading {
            climate: ClimateSample::average(values.clone().map(|r| &r.climate))?,
            particulate: ParticulateSample::average(values.clone().map(|r| &r.particulate))?,
            ambient: u8::average(values.map(|r| &r.ambient))?,
        })
    }
}

/// Rolling averages of the last [`WINDOW_CAPACITY`] cycles
///
/// Performs no I/O and never blocks.
#[derive(Debug, Clone, Default)]
pub struct RollingAverageAggregator {
    window: HistoryWindow<CycleReading, WINDOW_CAPACITY>,
}

impl RollingAverageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cycle, overwriting the oldest once the window is full
    pub fn push(&mut self, reading: CycleReading) {
        self.window.push(reading);
    }

    /// Cycles currently held (saturates at the window capacity)
    pub fn occupancy(&self) -> usize {
        self.window.len()
    }

    /// Slot the next cycle will be written to
    pub fn offset(&self) -> usize {
        self.window.offset()
    }

    /// Most recent cycle
    pub fn latest(&self) -> Option<&CycleReading> {
        self.window.latest()
    }

    /// Mean of every channel
    pub fn average(&self) -> Result<CycleReading> {
        self.window.average()
    }

    pub fn average_climate(&self) -> Result<ClimateSample> {
        self.average().map(|r| r.climate)
    }

    pub fn average_particulate(&self) -> Result<ParticulateSample> {
        self.average().map(|r| r.particulate)
    }

    pub fn average_ambient(&self) -> Result<u8> {
        self.average().map(|r| r.ambient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BeaconError;

    fn reading(n: u16) -> CycleReading {
        CycleReading {
            climate: ClimateSample { temperature: n as i16 * 10, humidity: n * 20 },
            particulate: ParticulateSample::from_fields([n; NUM_FIELDS]),
            ambient: n as u8,
        }
    }

    #[test]
    fn test_average_u8() {
        assert_eq!(u8::average(&[]), None);
        assert_eq!(u8::average(&[255, 255, 254]), Some(254));
    }

    #[test]
    fn test_average_climate_floors_negative() {
        let samples = [
            ClimateSample { temperature: -5, humidity: 1 },
            ClimateSample { temperature: -6, humidity: 2 },
        ];
        // -5.5 floors to -6; 1.5 floors to 1
        assert_eq!(
            ClimateSample::average(&samples),
            Some(ClimateSample { temperature: -6, humidity: 1 })
        );
    }

    #[test]
    fn test_average_particulate_fieldwise() {
        let a = ParticulateSample::from_fields([10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, u16::MAX]);
        let b = ParticulateSample::from_fields([21, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, u16::MAX]);
        let avg = ParticulateSample::average(&[a, b]).unwrap();
        assert_eq!(avg.standard.pm1_0, 15);
        assert_eq!(avg.standard.pm2_5, 0);
        assert_eq!(avg.counts.um10, u16::MAX);
    }

    #[test]
    fn test_average_cycle_matches_each_channel() {
        let mut readings = [reading(3), reading(4)];
        readings[1].climate.temperature = -11;
        let avg = CycleReading::average(&readings).unwrap();

        let climate: Vec<_> = readings.iter().map(|r| r.climate).collect();
        let particulate: Vec<_> = readings.iter().map(|r| r.particulate).collect();
        let ambient: Vec<_> = readings.iter().map(|r| r.ambient).collect();
        assert_eq!(Some(avg.climate), ClimateSample::average(&climate));
        assert_eq!(Some(avg.particulate), ParticulateSample::average(&particulate));
        assert_eq!(Some(avg.ambient), u8::average(&ambient));
        // (30 - 11) / 2 floors to 9
        assert_eq!(avg.climate.temperature, 9);
        assert_eq!(CycleReading::average(&[]), None);
    }

    #[test]
    fn test_aggregator_empty() {
        let aggregator = RollingAverageAggregator::new();
        assert_eq!(aggregator.occupancy(), 0);
        assert!(matches!(aggregator.average(), Err(BeaconError::EmptyWindow)));
        assert!(matches!(aggregator.average_ambient(), Err(BeaconError::EmptyWindow)));
    }

    #[test]
    fn test_aggregator_increasing_sequence() {
        let mut aggregator = RollingAverageAggregator::new();
        for n in 1..=11 {
            aggregator.push(reading(n));
        }
        assert_eq!(aggregator.occupancy(), WINDOW_CAPACITY);
        assert_eq!(aggregator.average_ambient().unwrap(), 6);
        assert_eq!(aggregator.average_particulate().unwrap().atmospheric.pm2_5, 6);
        // mean(20..=110 step 10) = 65
        assert_eq!(aggregator.average_climate().unwrap().temperature, 65);
        assert_eq!(aggregator.latest(), Some(&reading(11)));
    }

    #[test]
    fn test_aggregator_channels_share_offset() {
        let mut aggregator = RollingAverageAggregator::new();
        for n in 1..=3 {
            aggregator.push(reading(n));
        }
        assert_eq!(aggregator.offset(), 3);
        let avg = aggregator.average().unwrap();
        assert_eq!(avg, reading(2));
    }
}
