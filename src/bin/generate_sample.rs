//! Writes a synthetic labelled spectroscopy dataset for trying the loaders.
//!
//! Usage: `generate-sample [OUTPUT]` where the extension of `OUTPUT`
//! (`.arff`, `.csv`, `.json`, `.names`) picks the format. Defaults to
//! `sample_data.arff`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use rusty_instances::{Dataset, Value, save_file};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Wavenumbers sampled as features, one numeric attribute each.
const BANDS: [f64; 6] = [3600.0, 3400.0, 3000.0, 2900.0, 2500.0, 2200.0];

fn main() -> Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("sample_data.arff"), PathBuf::from);

    let mut rng = SimpleRng::new(42);

    let samples = ["Sample_A", "Sample_B", "Sample_C"];
    let concentrations = [0.1, 0.5, 1.0, 2.0, 5.0];
    let operators = ["Alice", "Bob"];

    let sample_peaks: [(&str, [(f64, f64, f64); 3]); 3] = [
        ("Sample_A", [(3400.0, 80.0, 0.8), (2900.0, 40.0, 0.5), (2350.0, 30.0, 0.3)]),
        ("Sample_B", [(3200.0, 60.0, 0.6), (2800.0, 50.0, 0.7), (2500.0, 35.0, 0.4)]),
        ("Sample_C", [(3600.0, 70.0, 0.9), (3000.0, 45.0, 0.4), (2200.0, 25.0, 0.5)]),
    ];

    let mut dataset = Dataset::new("spectra");
    for band in BANDS {
        dataset.numeric(&format!("band_{band}"), false)?;
    }
    dataset
        .numeric("concentration", false)?
        .string("operator", false)?
        .date("measured", "%Y-%m-%d", false)?
        .nominal("sample", &samples, true)?;

    let mut day = 1;
    for (sample, peaks) in &sample_peaks {
        for &conc in &concentrations {
            for &operator in &operators {
                let mut row: Vec<Value> = BANDS
                    .iter()
                    .map(|&wn| {
                        let signal: f64 = peaks
                            .iter()
                            .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp * conc))
                            .sum();
                        Value::Number(signal + rng.gauss(0.0, 0.005 * conc))
                    })
                    .collect();
                row.push(Value::Number(conc));
                row.push(Value::from(operator));
                row.push(Value::Text(format!("2024-03-{day:02}")));
                row.push(Value::from(*sample));
                // low-concentration measurements count for less
                let weight = conc.min(1.0);
                dataset.add_instance(row, weight)?;
                day = day % 28 + 1;
            }
        }
    }

    info!("{dataset}");
    save_file(&output, &dataset)
        .with_context(|| format!("writing sample to {}", output.display()))?;
    info!(
        "Wrote {} instances ({} bands each) to {}",
        dataset.len(),
        BANDS.len(),
        output.display()
    );
    Ok(())
}
