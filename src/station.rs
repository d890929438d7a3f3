//! # Sampling Station
//!
//! The slow cadence of the node: once per cycle it takes a burst of climate
//! and particulate readings, records the cycle in the rolling history and
//! republishes the live and averaged records.
//!
//! Sensor transactions are strictly sequential. Failed attempts are retried
//! after a fixed delay up to a bounded attempt count, and every delay counts
//! against the time left until the next cycle.

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::aggregate::{Average, CycleReading, HistoryWindow, RollingAverageAggregator};
use crate::ambient::AmbientSensor;
use crate::broadcast::{PayloadEncoder, RecordKind};
use crate::config::SamplingConfig;
use crate::dht::decoder::TimedSignalDecoder;
use crate::dht::line::SingleWireLine;
use crate::dht::protocol::ClimateSample;
use crate::error::Result;
use crate::indicator::{run_self_test, AirQualityBand, Indicator};
use crate::pms::protocol::{ParticulateSample, WorkMode};
use crate::pms::sensor::ParticulateSensor;
use crate::serial::SensorPort;

/// Upper bound on valid readings averaged per burst
pub const MAX_SAMPLES_PER_BURST: usize = 10;

/// Sampling cadence and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between the starts of two cycles
    pub cycle_interval: Duration,
    /// Time the particulate sensor runs before it is sampled
    pub sensor_warmup: Duration,
    /// Delay between two attempts of a burst
    pub retry_delay: Duration,
    /// Attempts per sensor per cycle
    pub max_attempts: u32,
    /// Valid readings that complete a burst
    pub samples_per_burst: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(300),
            sensor_warmup: Duration::from_secs(40),
            retry_delay: Duration::from_secs(2),
            max_attempts: 60,
            samples_per_burst: MAX_SAMPLES_PER_BURST,
        }
    }
}

impl From<&SamplingConfig> for Schedule {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            cycle_interval: Duration::from_millis(config.cycle_interval_ms),
            sensor_warmup: Duration::from_millis(config.sensor_warmup_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_attempts: config.max_attempts,
            samples_per_burst: config.samples_per_burst.clamp(1, MAX_SAMPLES_PER_BURST),
        }
    }
}

/// Outcome of one sampling cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub climate_samples: usize,
    pub particulate_samples: usize,
    /// Reading recorded in the history, if any
    pub reading: Option<CycleReading>,
    /// At least one sensor repeated its previous reading
    pub stale: bool,
    pub band: AirQualityBand,
    pub elapsed: Duration,
}

/// Owned context driving sensors, aggregator, encoder and indicator
pub struct Station<L, P, A, I>
where
    L: SingleWireLine,
    P: SensorPort,
    A: AmbientSensor,
    I: Indicator,
{
    climate: TimedSignalDecoder<L>,
    particulate: ParticulateSensor<P>,
    ambient: A,
    indicator: I,
    aggregator: RollingAverageAggregator,
    encoder: PayloadEncoder,
    schedule: Schedule,
    last_climate: Option<ClimateSample>,
    last_particulate: Option<ParticulateSample>,
    last_ambient: u8,
    cycles: u64,
}

impl<L, P, A, I> Station<L, P, A, I>
where
    L: SingleWireLine,
    P: SensorPort,
    A: AmbientSensor,
    I: Indicator,
{
    pub fn new(
        climate: TimedSignalDecoder<L>,
        particulate: ParticulateSensor<P>,
        ambient: A,
        indicator: I,
        encoder: PayloadEncoder,
        schedule: Schedule,
    ) -> Self {
        Self {
            climate,
            particulate,
            ambient,
            indicator,
            aggregator: RollingAverageAggregator::new(),
            encoder,
            schedule,
            last_climate: None,
            last_particulate: None,
            last_ambient: 0,
            cycles: 0,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn aggregator(&self) -> &RollingAverageAggregator {
        &self.aggregator
    }

    /// Cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Put the particulate sensor in polled mode and run the indicator self-test
    pub async fn start(&mut self) -> Result<()> {
        if let Err(e) = self.particulate.set_work_mode(WorkMode::Passive).await {
            warn!("Could not switch particulate sensor to passive mode: {}", e);
        }
        if let Err(e) = self.particulate.sleep().await {
            warn!("Could not put particulate sensor to sleep: {}", e);
        }
        run_self_test(&mut self.indicator).await
    }

    /// Sample forever, one cycle per `cycle_interval`
    ///
    /// Only returns on a contract violation (`InvalidSlot`, `EmptyWindow`).
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Sampling every {:?} ({} readings per burst, {} attempts)",
            self.schedule.cycle_interval, self.schedule.samples_per_burst, self.schedule.max_attempts
        );
        loop {
            let report = self.run_cycle().await?;
            let remaining = self.schedule.cycle_interval.saturating_sub(report.elapsed);
            debug!("Next cycle in {:?}", remaining);
            sleep(remaining).await;
        }
    }

    /// Run one full sampling cycle
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        self.cycles += 1;

        let (climate, climate_samples) = self.sample_climate().await;
        let (particulate, particulate_samples) = self.sample_particulate().await;
        let ambient = self.sample_ambient().await;

        let mut stale = false;
        let climate = match climate {
            Some(sample) => {
                self.last_climate = Some(sample);
                Some(sample)
            }
            None => {
                stale |= self.last_climate.is_some();
                self.last_climate
            }
        };
        let fresh_particulate = particulate;
        let particulate = match particulate {
            Some(sample) => {
                self.last_particulate = Some(sample);
                Some(sample)
            }
            None => {
                stale |= self.last_particulate.is_some();
                self.last_particulate
            }
        };

        let reading = match (climate, particulate) {
            (Some(climate), Some(particulate)) => {
                let reading = CycleReading {
                    climate,
                    particulate,
                    ambient,
                };
                self.record(&reading)?;
                Some(reading)
            }
            _ => {
                warn!("Cycle {}: no reading available yet, slots left unchanged", self.cycles);
                None
            }
        };
        if stale {
            warn!("Cycle {}: repeating previous reading for a failed sensor", self.cycles);
        }

        let band = match fresh_particulate {
            Some(sample) => AirQualityBand::from_sample(&sample),
            None => AirQualityBand::Hazardous,
        };
        if let Err(e) = self.indicator.show(band.color()) {
            warn!("Indicator update failed: {}", e);
        }

        let report = CycleReport {
            cycle: self.cycles,
            climate_samples,
            particulate_samples,
            reading,
            stale,
            band,
            elapsed: started.elapsed(),
        };
        info!(
            "Cycle {} done in {:?}: {} climate / {} particulate samples, {:?}",
            report.cycle, report.elapsed, climate_samples, particulate_samples, band
        );
        Ok(report)
    }

    /// Push into the history and refresh both slots
    fn record(&mut self, reading: &CycleReading) -> Result<()> {
        self.aggregator.push(*reading);
        self.encoder.encode(reading, RecordKind::Live)?;
        let average = self.aggregator.average()?;
        self.encoder.encode(&average, RecordKind::Averaged)?;
        debug!(
            "History holds {} cycles, average temperature {} humidity {}",
            self.aggregator.occupancy(),
            average.climate.temperature,
            average.climate.humidity
        );
        Ok(())
    }

    async fn sample_climate(&mut self) -> (Option<ClimateSample>, usize) {
        let mut burst: HistoryWindow<ClimateSample, MAX_SAMPLES_PER_BURST> = HistoryWindow::new();
        for attempt in 1..=self.schedule.max_attempts {
            match run_blocking(|| self.climate.read()) {
                Ok(sample) => burst.push(sample),
                Err(e) if e.is_retryable() => debug!("Climate attempt {} failed: {}", attempt, e),
                Err(e) => {
                    warn!("Climate sensor unusable this cycle: {}", e);
                    break;
                }
            }
            if burst.len() >= self.schedule.samples_per_burst {
                break;
            }
            sleep(self.schedule.retry_delay).await;
        }
        finish_burst("climate", &burst)
    }

    async fn sample_particulate(&mut self) -> (Option<ParticulateSample>, usize) {
        let mut burst: HistoryWindow<ParticulateSample, MAX_SAMPLES_PER_BURST> = HistoryWindow::new();

        if let Err(e) = self.particulate.wake().await {
            warn!("Particulate sensor unavailable: {}", e);
            return (None, 0);
        }
        sleep(self.schedule.sensor_warmup).await;

        for attempt in 1..=self.schedule.max_attempts {
            match self.particulate.request_read().await {
                Ok(sample) => burst.push(sample),
                Err(e) if e.is_retryable() => {
                    debug!("Particulate attempt {} failed: {}", attempt, e)
                }
                Err(e) => {
                    warn!("Particulate sensor unusable this cycle: {}", e);
                    break;
                }
            }
            if burst.len() >= self.schedule.samples_per_burst {
                break;
            }
            sleep(self.schedule.retry_delay).await;
        }

        if let Err(e) = self.particulate.sleep().await {
            warn!("Could not put particulate sensor to sleep: {}", e);
        }
        finish_burst("particulate", &burst)
    }

    async fn sample_ambient(&mut self) -> u8 {
        match self.ambient.read_celsius().await {
            Ok(value) => {
                self.last_ambient = value;
                value
            }
            Err(e) => {
                warn!("Ambient read failed, keeping {}°C: {}", self.last_ambient, e);
                self.last_ambient
            }
        }
    }
}

/// Run a busy-waiting sensor transaction, handing the worker's other tasks
/// to another thread when the runtime has one
fn run_blocking<R>(transaction: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => block_in_place(transaction),
        _ => transaction(),
    }
}

fn finish_burst<T: Average + Default>(
    sensor: &str,
    burst: &HistoryWindow<T, MAX_SAMPLES_PER_BURST>,
) -> (Option<T>, usize) {
    if burst.is_empty() {
        warn!("No valid {} samples this cycle", sensor);
        return (None, 0);
    }
    (burst.average().ok(), burst.len())
}
