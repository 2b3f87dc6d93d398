//! Backend metrics scraping.
//!
//! The backend exposes a Prometheus text exposition at `/metrics`. The
//! client parses the numeric samples and differences successive scrapes
//! into live rates (requests per second, tokens per second) for the
//! status display.

use std::collections::HashMap;
use std::time::Instant;

/// Counter watched for the live request rate.
pub const STT_REQUESTS_TOTAL: &str = "stt_requests_total";

/// Counter watched for the live token throughput.
pub const STT_TOKENS_GENERATED_TOTAL: &str = "stt_tokens_generated_total";

/// Parse a Prometheus text exposition into name -> value samples.
///
/// Comment and blank lines are skipped; label sets are stripped so
/// `name{label="x"} 3` and `name 3` both key on `name`. Unparseable
/// values are ignored rather than failing the scrape.
pub fn parse_metrics(text: &str) -> HashMap<String, f64> {
    let mut samples = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name_part), Some(value_part)) = (parts.next(), parts.next()) else {
            continue;
        };
        let name = name_part.split('{').next().unwrap_or(name_part);
        if let Ok(value) = value_part.parse::<f64>() {
            samples.insert(name.to_string(), value);
        }
    }
    samples
}

/// Differences successive scrapes into per-second rates.
pub struct ThroughputTracker {
    previous: Option<(Instant, HashMap<String, f64>)>,
    rates: HashMap<String, f64>,
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self {
            previous: None,
            rates: HashMap::new(),
        }
    }

    /// Fold in a new scrape taken at `now`.
    ///
    /// Rates are only produced once two scrapes are available; a counter
    /// that moved backwards (backend restart) resets its rate to zero.
    pub fn update(&mut self, samples: HashMap<String, f64>, now: Instant) {
        if let Some((then, ref old)) = self.previous {
            let elapsed = now.duration_since(then).as_secs_f64();
            if elapsed > 0.0 {
                self.rates.clear();
                for (name, value) in &samples {
                    if let Some(old_value) = old.get(name) {
                        let delta = value - old_value;
                        let rate = if delta >= 0.0 { delta / elapsed } else { 0.0 };
                        self.rates.insert(name.clone(), rate);
                    }
                }
            }
        }
        self.previous = Some((now, samples));
    }

    /// Per-second rate of a counter, if two scrapes have seen it.
    pub fn rate(&self, name: &str) -> Option<f64> {
        self.rates.get(name).copied()
    }
}

impl Default for ThroughputTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const EXPOSITION: &str = "\
# HELP stt_requests_total Total transcription requests
# TYPE stt_requests_total counter
stt_requests_total 42
stt_tokens_generated_total 1200
stt_audio_seconds_processed_total{channel=\"mono\"} 33.5
";

    #[test]
    fn test_parse_exposition() {
        let samples = parse_metrics(EXPOSITION);
        assert_eq!(samples.get(STT_REQUESTS_TOTAL), Some(&42.0));
        assert_eq!(samples.get(STT_TOKENS_GENERATED_TOTAL), Some(&1200.0));
        // Labels are stripped
        assert_eq!(samples.get("stt_audio_seconds_processed_total"), Some(&33.5));
    }

    #[test]
    fn test_parse_skips_garbage() {
        let samples = parse_metrics("broken_line\nname not_a_number\nok 1\n");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples.get("ok"), Some(&1.0));
    }

    #[test]
    fn test_rates_from_successive_scrapes() {
        let mut tracker = ThroughputTracker::new();
        let t0 = Instant::now();

        let mut first = HashMap::new();
        first.insert(STT_REQUESTS_TOTAL.to_string(), 10.0);
        tracker.update(first, t0);
        assert_eq!(tracker.rate(STT_REQUESTS_TOTAL), None);

        let mut second = HashMap::new();
        second.insert(STT_REQUESTS_TOTAL.to_string(), 20.0);
        tracker.update(second, t0 + Duration::from_secs(5));
        let rate = tracker.rate(STT_REQUESTS_TOTAL).unwrap();
        assert!((rate - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_reset_yields_zero_rate() {
        let mut tracker = ThroughputTracker::new();
        let t0 = Instant::now();

        let mut first = HashMap::new();
        first.insert(STT_REQUESTS_TOTAL.to_string(), 100.0);
        tracker.update(first, t0);

        let mut second = HashMap::new();
        second.insert(STT_REQUESTS_TOTAL.to_string(), 3.0);
        tracker.update(second, t0 + Duration::from_secs(5));
        assert_eq!(tracker.rate(STT_REQUESTS_TOTAL), Some(0.0));
    }
}
