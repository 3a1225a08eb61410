use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};

use ocean_acquire::remote::{RemoteDescriptor, RemoteSource};

/// Column layout of the aggregated BBMP profile file; the acquirer reads
/// columns 0, 6, 7, 13, 14 and 15.
const HEADER: [&str; 16] = [
    "time_string",
    "cast_id",
    "latitude",
    "longitude",
    "scan",
    "depth",
    "pressure",
    "temperature",
    "conductivity",
    "fluorescence",
    "par",
    "ph",
    "flag",
    "salinity",
    "sigmaTheta",
    "oxygen",
];

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

/// Seasonal, depth-dependent profile of the basin: warm fresh surface in
/// late summer over a cold, salty, low-oxygen deep layer.
fn profile(day_of_year: f64, pressure: f64) -> (f64, f64, f64, f64) {
    let season = (2.0 * std::f64::consts::PI * (day_of_year - 230.0) / 365.0).cos();
    let surface = (-pressure / 15.0).exp();

    let temperature = 2.5 + 8.0 * season * surface + 5.5 * surface;
    let salinity = 31.3 - 1.2 * surface - 0.2 * season * surface;
    let sigma_theta = 21.5 + 3.2 * (1.0 - surface) + 0.4 * (salinity - 30.5);
    let oxygen = 7.5 - 3.0 * (pressure / 70.0).powi(2);
    (temperature, salinity, sigma_theta, oxygen)
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let output_path = PathBuf::from("sample_bbmp_profiles.csv");
    let descriptor_path = PathBuf::from("sample_bbmp_descriptor.json");

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    writer.write_record(HEADER)?;

    let start = NaiveDate::from_ymd_opt(2018, 1, 3)
        .and_then(|d| d.and_hms_opt(13, 45, 0))
        .context("invalid start date")?;

    let mut n_rows = 0usize;
    for cast in 0..52i64 {
        let time = start + Duration::weeks(cast);
        let day_of_year = (cast * 7 + 3) as f64;

        for level in 0..=150u32 {
            // The CTD samples every 0.5 dbar down to 75 dbar, plus a few
            // off-grid readings while the winch settles.
            let mut pressures = vec![level as f64 * 0.5];
            if level % 25 == 7 {
                pressures.push(level as f64 * 0.5 + 0.3);
            }

            for pressure in pressures {
                let (t, s, sig, o2) = profile(day_of_year, pressure);
                let oxygen = if rng.next_f64() < 0.02 {
                    String::new()
                } else {
                    format!("{:.3}", o2 + rng.gauss(0.0, 0.05))
                };

                let row = [
                    time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    format!("BBMP{cast:04}"),
                    "44.6936".to_string(),
                    "-63.6403".to_string(),
                    n_rows.to_string(),
                    format!("{:.2}", pressure * 0.993),
                    format!("{pressure:.1}"),
                    format!("{:.4}", t + rng.gauss(0.0, 0.02)),
                    format!("{:.4}", 2.9 + 0.03 * t),
                    format!("{:.3}", rng.next_f64()),
                    format!("{:.2}", 100.0 * (-pressure / 8.0).exp()),
                    format!("{:.3}", 7.9 + rng.gauss(0.0, 0.02)),
                    "0".to_string(),
                    format!("{:.4}", s + rng.gauss(0.0, 0.01)),
                    format!("{:.4}", sig + rng.gauss(0.0, 0.01)),
                    oxygen,
                ];
                writer.write_record(&row)?;
                n_rows += 1;

                // Repeated scan at the surface; the acquirer keeps the first.
                if level == 0 {
                    writer.write_record(&row)?;
                    n_rows += 1;
                }
            }
        }
    }
    writer.flush()?;

    let descriptor = RemoteDescriptor {
        source: RemoteSource::File {
            path: output_path.clone(),
        },
        layout: RemoteDescriptor::bbmp_layout(),
    };
    std::fs::write(&descriptor_path, serde_json::to_string_pretty(&descriptor)?)
        .with_context(|| format!("writing {}", descriptor_path.display()))?;

    println!(
        "Wrote {n_rows} rows to {} and descriptor {}",
        output_path.display(),
        descriptor_path.display()
    );
    println!(
        "Try: ocean-acquire --base-dir . fetch --descriptor {} --output data/raw/sample.parquet",
        descriptor_path.display()
    );
    Ok(())
}
