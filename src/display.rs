use std::collections::BTreeMap;
use std::fmt;

use palette::{LinSrgb, Mix, Srgb};

use crate::data::model::Dataset;

// ---------------------------------------------------------------------------
// Colour scales
// ---------------------------------------------------------------------------

/// Sequential colour scales used for ocean variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScale {
    Thermal,
    Haline,
    Dense,
    Oxy,
    Viridis,
}

impl ColorScale {
    /// Evenly spaced sRGB stops, low to high.
    fn stops(self) -> &'static [(u8, u8, u8)] {
        match self {
            ColorScale::Thermal => &[
                (4, 35, 51),
                (23, 51, 122),
                (85, 59, 157),
                (129, 79, 143),
                (175, 95, 130),
                (222, 112, 101),
                (249, 146, 66),
                (249, 196, 65),
                (232, 250, 91),
            ],
            ColorScale::Haline => &[
                (42, 24, 108),
                (33, 50, 162),
                (15, 90, 145),
                (40, 118, 137),
                (59, 146, 135),
                (79, 175, 126),
                (120, 203, 104),
                (193, 221, 100),
                (253, 239, 154),
            ],
            ColorScale::Dense => &[
                (230, 241, 241),
                (182, 217, 228),
                (142, 192, 226),
                (118, 164, 228),
                (116, 133, 219),
                (114, 100, 190),
                (104, 70, 150),
                (83, 44, 105),
                (54, 14, 36),
            ],
            ColorScale::Oxy => &[
                (64, 5, 5),
                (142, 12, 10),
                (90, 90, 89),
                (140, 139, 138),
                (196, 194, 193),
                (232, 226, 81),
                (220, 175, 25),
            ],
            ColorScale::Viridis => &[
                (68, 1, 84),
                (72, 40, 120),
                (62, 74, 137),
                (49, 104, 142),
                (38, 130, 142),
                (31, 158, 137),
                (53, 183, 121),
                (109, 205, 89),
                (180, 222, 44),
                (253, 231, 37),
            ],
        }
    }

    /// Colour at position `t` in `[0, 1]`, interpolated in linear RGB.
    /// Values outside the interval are clamped.
    pub fn color_at(self, t: f64) -> Srgb<u8> {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = t * (stops.len() - 1) as f64;
        let lo = (pos.floor() as usize).min(stops.len() - 2);
        let frac = (pos - lo as f64) as f32;

        let to_linear = |(r, g, b): (u8, u8, u8)| -> LinSrgb {
            Srgb::new(r, g, b).into_format::<f32>().into_linear()
        };
        let mixed = to_linear(stops[lo]).mix(to_linear(stops[lo + 1]), frac);
        Srgb::<f32>::from_linear(mixed).into_format::<u8>()
    }

    /// `n` colours evenly spread over the scale.
    pub fn sample(self, n: usize) -> Vec<Srgb<u8>> {
        match n {
            0 => Vec::new(),
            1 => vec![self.color_at(0.5)],
            _ => (0..n)
                .map(|i| self.color_at(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorScale::Thermal => "thermal",
            ColorScale::Haline => "haline",
            ColorScale::Dense => "dense",
            ColorScale::Oxy => "oxy",
            ColorScale::Viridis => "viridis",
        };
        f.write_str(name)
    }
}

/// `#rrggbb` notation.
pub fn hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

// ---------------------------------------------------------------------------
// Variable display metadata
// ---------------------------------------------------------------------------

/// How a variable is labelled and coloured in a Hovmöller diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStyle {
    pub units: String,
    pub display_name: String,
    pub color_scale: ColorScale,
    /// Lower colour limit; the data minimum when absent.
    pub min: Option<f64>,
    /// Upper colour limit; the data maximum when absent.
    pub max: Option<f64>,
}

impl VariableStyle {
    fn new(units: &str, display_name: &str, color_scale: ColorScale, bounds: Option<(f64, f64)>) -> Self {
        Self {
            units: units.to_string(),
            display_name: display_name.to_string(),
            color_scale,
            min: bounds.map(|b| b.0),
            max: bounds.map(|b| b.1),
        }
    }

    /// Diagram title, e.g. `Hovmoeller Diagram - Salinity [-]`.
    pub fn title(&self) -> String {
        format!("Hovmoeller Diagram - {} {}", self.display_name, self.units)
            .trim_end()
            .to_string()
    }

    /// Colour limits, filling unset ends from the data range of `variable`.
    pub fn bounds(&self, dataset: &Dataset, variable: &str) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            (min, max) => {
                let (lo, hi) = dataset.range(variable)?;
                Some((min.unwrap_or(lo), max.unwrap_or(hi)))
            }
        }
    }

    /// Colour for a value given the resolved limits.
    pub fn color_for(&self, value: f64, (lo, hi): (f64, f64)) -> Srgb<u8> {
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
        self.color_scale.color_at(t)
    }
}

/// Lookup table from variable name to display metadata.
#[derive(Debug, Clone)]
pub struct StyleTable {
    entries: BTreeMap<String, VariableStyle>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl StyleTable {
    /// Styles for the CTD and glider variables.
    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "temperature".to_string(),
            VariableStyle::new("[°C]", "Temperature", ColorScale::Thermal, Some((-2.0, 20.0))),
        );
        entries.insert(
            "salinity".to_string(),
            VariableStyle::new("[-]", "Salinity", ColorScale::Haline, Some((28.0, 32.0))),
        );
        entries.insert(
            "sigmaTheta".to_string(),
            VariableStyle::new(
                "[kg/m³]",
                "Potential Density σθ",
                ColorScale::Dense,
                Some((21.0, 25.5)),
            ),
        );
        entries.insert(
            "density".to_string(),
            VariableStyle::new("[kg/m³]", "Density", ColorScale::Dense, None),
        );
        entries.insert(
            "oxygen".to_string(),
            VariableStyle::new("[ml/l]", "Oxygen", ColorScale::Oxy, None),
        );
        StyleTable { entries }
    }

    /// Style for `name`, or the fallback for unknown variables.
    pub fn style_for(&self, name: &str) -> VariableStyle {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or_else(|| Self::fallback(name))
    }

    /// No units, capitalised name, viridis, limits from the data.
    pub fn fallback(name: &str) -> VariableStyle {
        VariableStyle::new("", &capitalize(name), ColorScale::Viridis, None)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Depth, Record};
    use chrono::NaiveDate;

    #[test]
    fn known_variables() {
        let table = StyleTable::standard();
        let temp = table.style_for("temperature");
        assert_eq!(temp.color_scale, ColorScale::Thermal);
        assert_eq!((temp.min, temp.max), (Some(-2.0), Some(20.0)));
        assert_eq!(temp.title(), "Hovmoeller Diagram - Temperature [°C]");

        let sigma = table.style_for("sigmaTheta");
        assert_eq!(sigma.color_scale, ColorScale::Dense);
        assert_eq!(sigma.max, Some(25.5));
    }

    #[test]
    fn unknown_variable_falls_back() {
        let style = StyleTable::standard().style_for("fluorescenceCHL");
        assert_eq!(style.display_name, "Fluorescencechl");
        assert_eq!(style.units, "");
        assert_eq!(style.color_scale, ColorScale::Viridis);
        assert_eq!(style.title(), "Hovmoeller Diagram - Fluorescencechl");
    }

    #[test]
    fn bounds_fill_from_data() {
        let t0 = NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let records: Vec<Record> = [(0.5, 4.1), (1.0, 6.3), (1.5, 5.0)]
            .iter()
            .map(|&(d, v)| Record {
                time: t0,
                depth: Depth::new(d),
                values: vec![Some(v)],
            })
            .collect();
        let ds = Dataset::from_records("pressure", &["oxygen".to_string()], &records);

        let table = StyleTable::standard();
        assert_eq!(table.style_for("oxygen").bounds(&ds, "oxygen"), Some((4.1, 6.3)));
        assert_eq!(
            table.style_for("temperature").bounds(&ds, "temperature"),
            Some((-2.0, 20.0))
        );
        assert_eq!(table.style_for("salinity").bounds(&ds, "missing"), Some((28.0, 32.0)));
        assert_eq!(StyleTable::fallback("missing").bounds(&ds, "missing"), None);
    }

    #[test]
    fn scale_endpoints_and_clamping() {
        assert_eq!(ColorScale::Viridis.color_at(0.0), Srgb::new(68, 1, 84));
        assert_eq!(ColorScale::Viridis.color_at(1.0), Srgb::new(253, 231, 37));
        assert_eq!(ColorScale::Viridis.color_at(-3.0), ColorScale::Viridis.color_at(0.0));
        assert_eq!(hex(ColorScale::Thermal.color_at(1.0)), "#e8fa5b");
        assert_eq!(ColorScale::Haline.sample(4).len(), 4);
    }
}
