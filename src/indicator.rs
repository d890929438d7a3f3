//! # Air-Quality Indicator
//!
//! Maps averaged particulate levels onto a colour band and drives a
//! three-channel light with it.

use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::error::Result;
use crate::pms::protocol::ParticulateSample;

/// Delay between self-test colours
pub const SELF_TEST_STEP: Duration = Duration::from_millis(600);

/// Three-channel intensity command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Air-quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityBand {
    Good,
    Fair,
    Moderate,
    Poor,
    Unhealthy,
    Hazardous,
}

/// Inclusive (pm2.5, pm10) upper bounds, best band first
const BAND_LIMITS: [(AirQualityBand, u16, u16); 5] = [
    (AirQualityBand::Good, 13, 20),
    (AirQualityBand::Fair, 35, 50),
    (AirQualityBand::Moderate, 55, 80),
    (AirQualityBand::Poor, 75, 110),
    (AirQualityBand::Unhealthy, 110, 150),
];

impl AirQualityBand {
    /// First band whose limits hold for both values
    pub fn from_levels(pm2_5: u16, pm10: u16) -> Self {
        BAND_LIMITS
            .iter()
            .find(|(_, max_pm2_5, max_pm10)| pm2_5 <= *max_pm2_5 && pm10 <= *max_pm10)
            .map(|(band, _, _)| *band)
            .unwrap_or(AirQualityBand::Hazardous)
    }

    /// Band for a sample, using its atmospheric concentrations
    pub fn from_sample(sample: &ParticulateSample) -> Self {
        Self::from_levels(sample.atmospheric.pm2_5, sample.atmospheric.pm10)
    }

    pub fn color(self) -> Rgb {
        match self {
            AirQualityBand::Good => Rgb::new(0, 255, 0),
            AirQualityBand::Fair => Rgb::new(26, 255, 26),
            AirQualityBand::Moderate => Rgb::new(255, 30, 0),
            AirQualityBand::Poor => Rgb::new(255, 10, 0),
            AirQualityBand::Unhealthy => Rgb::new(255, 4, 4),
            AirQualityBand::Hazardous => Rgb::new(255, 0, 0),
        }
    }
}

/// Fire-and-forget colour output
#[cfg_attr(test, mockall::automock)]
pub trait Indicator: Send {
    fn show(&mut self, color: Rgb) -> Result<()>;
}

/// Indicator that only logs the requested colour
#[derive(Debug, Default)]
pub struct LogIndicator {
    current: Rgb,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Rgb {
        self.current
    }
}

impl Indicator for LogIndicator {
    fn show(&mut self, color: Rgb) -> Result<()> {
        if color != self.current {
            info!(
                "Indicator colour ({}, {}, {})",
                color.red, color.green, color.blue
            );
        }
        self.current = color;
        Ok(())
    }
}

/// Cycle red, green, blue, then switch off
pub async fn run_self_test<I: Indicator + ?Sized>(indicator: &mut I) -> Result<()> {
    debug!("Indicator self-test");
    for color in [Rgb::RED, Rgb::GREEN, Rgb::BLUE] {
        indicator.show(color)?;
        sleep(SELF_TEST_STEP).await;
    }
    indicator.show(Rgb::OFF)
}
