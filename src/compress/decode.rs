//! Decode-time benchmark
//!
//! A candidate is decoded once untimed to make sure it decodes at all, then
//! repeatedly until the cumulative time reaches the requested minimum.

use image::{DynamicImage, ImageFormat, ImageResult};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::detect;
use crate::utils::plural_noun;

/// Figures from benchmarking one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeBench {
    pub total: Duration,
    pub average: Duration,
    pub trials: u32,
    pub error: Option<String>,
}

impl DecodeBench {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Decoded without error at least once
    pub fn is_measured(&self) -> bool {
        self.error.is_none() && self.trials > 0
    }

    /// Average decode time in milliseconds, `-` when not measured
    pub fn ms_average(&self) -> String {
        if let Some(error) = &self.error {
            return format!("ERROR: {error}");
        }
        if self.trials == 0 {
            return "-".to_string();
        }
        format!("{:.6}", self.average.as_secs_f64() * 1000.0)
    }

    pub fn ms_average_with_trials(&self) -> String {
        if !self.is_measured() {
            return self.ms_average();
        }
        format!(
            "{} ms ({} {})",
            self.ms_average(),
            self.trials,
            plural_noun(self.trials as usize, "trials", "trial")
        )
    }
}

/// Image formats the benchmark can decode
pub fn decode_format(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" | detect::APNG => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

pub fn bench_file(path: &Path, minimum: Duration) -> DecodeBench {
    match std::fs::read(path) {
        Ok(data) => bench_bytes(&data, minimum),
        Err(err) => DecodeBench::failed(err.to_string()),
    }
}

/// Benchmark `data`; unsupported content yields an unmeasured result
pub fn bench_bytes(data: &[u8], minimum: Duration) -> DecodeBench {
    let Some(format) = detect::detect_bytes(data).and_then(decode_format) else {
        return DecodeBench::default();
    };

    if let Err(err) = decode(data, format) {
        return DecodeBench::failed(err.to_string());
    }

    let start = Instant::now();
    let mut trials: u32 = 0;
    let total = loop {
        let _ = std::hint::black_box(decode(data, format));
        trials += 1;
        let elapsed = start.elapsed();
        if elapsed >= minimum {
            break elapsed;
        }
    };

    DecodeBench {
        total,
        average: total / trials,
        trials,
        error: None,
    }
}

fn decode(data: &[u8], format: ImageFormat) -> ImageResult<DynamicImage> {
    image::load_from_memory_with_format(data, format)
}
