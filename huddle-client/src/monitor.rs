use std::time::{Duration, Instant};

/// Boolean speaking indicator derived from decoded audio energy.
///
/// Strictly a consumer of an established link's audio: feed it PCM batches
/// from whatever decodes the remote track, read the flag. A hold-off window
/// keeps the flag from flickering between words.
pub struct SpeakingMonitor {
    /// RMS threshold on samples normalized to [-1.0, 1.0].
    threshold: f32,
    hold: Duration,
    last_active: Option<Instant>,
    speaking: bool,
}

impl SpeakingMonitor {
    pub fn new(threshold: f32, hold: Duration) -> Self {
        Self {
            threshold,
            hold,
            last_active: None,
            speaking: false,
        }
    }

    /// Fold one batch of samples into the indicator and return its new value.
    pub fn update(&mut self, samples: &[i16], now: Instant) -> bool {
        if rms(samples) >= self.threshold {
            self.last_active = Some(now);
        }
        self.speaking = self
            .last_active
            .is_some_and(|t| now.duration_since(t) <= self.hold);
        self.speaking
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }
}

impl Default for SpeakingMonitor {
    fn default() -> Self {
        Self::new(0.02, Duration::from_millis(300))
    }
}

fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = f64::from(s) / f64::from(i16::MAX);
            normalized * normalized
        })
        .sum();
    ((sum / samples.len() as f64).sqrt()) as f32
}
