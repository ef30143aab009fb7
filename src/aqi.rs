//! US EPA style Air Quality Index for PM2.5.
//!
//! The index is a piecewise linear interpolation over concentration
//! breakpoints:
//!
//! ```text
//! I = (Ih - Il) / (BPh - BPl) * (C - BPl) + Il
//! ```
//!
//! Categories and both colour palettes are keyed on the index, not on the
//! concentration.

use embedded_graphics::pixelcolor::Rgb888;

/// One interpolation band. `above` is the selection threshold: a
/// concentration belongs to the band when it is strictly greater than it.
#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    above: f32,
    bp_lo: f32,
    bp_hi: f32,
    i_lo: f32,
    i_hi: f32,
}

const fn bp(above: f32, bp_lo: f32, bp_hi: f32, i_lo: f32, i_hi: f32) -> Breakpoint {
    Breakpoint {
        above,
        bp_lo,
        bp_hi,
        i_lo,
        i_hi,
    }
}

// Highest band first. Selection thresholds sit 0.1 above the previous
// band's upper bound, so the tiny gaps (12.0..=12.1 etc.) extrapolate the
// lower band.
const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    bp(350.5, 350.5, 500.0, 401.0, 500.0),
    bp(250.5, 250.5, 350.4, 301.0, 400.0),
    bp(150.5, 150.5, 250.4, 201.0, 300.0),
    bp(55.5, 55.5, 150.4, 151.0, 200.0),
    bp(35.5, 35.5, 55.4, 101.0, 150.0),
    bp(12.1, 12.1, 35.4, 51.0, 100.0),
    bp(0.0, 0.0, 12.0, 0.0, 50.0),
];

/// Concentration at which the scale ends; anything above reads as 500.
pub const PM25_MAX: f32 = 500.0;
pub const AQI_MAX: f32 = 500.0;

// Widened to f64 so band edges land exactly on the index bounds.
fn interpolate(c: f32, band: &Breakpoint) -> f32 {
    let (c, bp_lo, bp_hi) = (f64::from(c), f64::from(band.bp_lo), f64::from(band.bp_hi));
    let (i_lo, i_hi) = (f64::from(band.i_lo), f64::from(band.i_hi));
    (((i_hi - i_lo) / (bp_hi - bp_lo)) * (c - bp_lo) + i_lo) as f32
}

/// Convert a PM2.5 concentration (µg/m³) into the 0–500 index.
///
/// Non-positive and NaN concentrations give 0; concentrations above
/// [`PM25_MAX`] saturate at [`AQI_MAX`].
pub fn index_from_pm25(concentration: f32) -> f32 {
    if concentration.is_nan() || concentration <= 0.0 {
        return 0.0;
    }
    if concentration > PM25_MAX {
        return AQI_MAX;
    }

    PM25_BREAKPOINTS
        .iter()
        .find(|band| concentration > band.above)
        .map_or(0.0, |band| interpolate(concentration, band))
}

/// The six standard AQI categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Good,
        Category::Moderate,
        Category::UnhealthyForSensitiveGroups,
        Category::Unhealthy,
        Category::VeryUnhealthy,
        Category::Hazardous,
    ];

    pub fn from_index(index: f32) -> Self {
        if index >= 301.0 {
            Self::Hazardous
        } else if index >= 201.0 {
            Self::VeryUnhealthy
        } else if index >= 151.0 {
            Self::Unhealthy
        } else if index >= 101.0 {
            Self::UnhealthyForSensitiveGroups
        } else if index >= 51.0 {
            Self::Moderate
        } else {
            Self::Good
        }
    }

    /// Label as shown on the dashboard (the long one wraps onto two lines).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for\nSensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// Saturated colour: AQI panel and LED bar.
    pub fn alert_color(&self) -> Rgb888 {
        match self {
            Self::Good => Rgb888::new(0, 128, 0),                           // green
            Self::Moderate => Rgb888::new(255, 255, 0),                     // yellow
            Self::UnhealthyForSensitiveGroups => Rgb888::new(255, 126, 0),  // orange
            Self::Unhealthy => Rgb888::new(255, 0, 0),                      // red
            Self::VeryUnhealthy => Rgb888::new(143, 63, 151),               // purple
            Self::Hazardous => Rgb888::new(126, 0, 35),                     // maroon
        }
    }

    /// Desaturated colour: body background behind the readings.
    pub fn background_color(&self) -> Rgb888 {
        match self {
            Self::Good => Rgb888::new(123, 224, 123),
            Self::Moderate => Rgb888::new(242, 242, 153),
            Self::UnhealthyForSensitiveGroups => Rgb888::new(235, 171, 108),
            Self::Unhealthy => Rgb888::new(245, 157, 157),
            Self::VeryUnhealthy => Rgb888::new(200, 153, 204),
            Self::Hazardous => Rgb888::new(200, 110, 135),
        }
    }
}

pub fn category_label(index: f32) -> &'static str {
    Category::from_index(index).label()
}

pub fn alert_color(index: f32) -> Rgb888 {
    Category::from_index(index).alert_color()
}

pub fn background_color(index: f32) -> Rgb888 {
    Category::from_index(index).background_color()
}

/// Everything derived from one PM2.5 value, computed once per refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiStatus {
    pub index: f32,
    pub category: Category,
}

impl AqiStatus {
    pub fn from_pm25(concentration: f32) -> Self {
        let index = index_from_pm25(concentration);
        Self {
            index,
            category: Category::from_index(index),
        }
    }

    /// Whole index as displayed and reported (truncated, never negative).
    pub fn whole(&self) -> u16 {
        self.index as u16
    }

    pub fn label(&self) -> &'static str {
        self.category.label()
    }

    pub fn alert_color(&self) -> Rgb888 {
        self.category.alert_color()
    }

    pub fn background_color(&self) -> Rgb888 {
        self.category.background_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(index_from_pm25(0.0), 0.0);
        assert!(close(index_from_pm25(12.0), 50.0));
        assert!(close(index_from_pm25(35.4), 100.0));
        assert!(close(index_from_pm25(55.4), 150.0));
        assert!(close(index_from_pm25(150.4), 200.0));
        assert!(close(index_from_pm25(250.4), 300.0));
        assert!(close(index_from_pm25(350.4), 400.0));
        assert!(close(index_from_pm25(500.0), 500.0));
    }

    #[test]
    fn lower_band_edges() {
        assert!((index_from_pm25(12.2) - (51.0 + 49.0 / 23.3 * 0.1)).abs() < 1e-3);
        assert!((index_from_pm25(35.6) - (101.0 + 49.0 / 19.9 * 0.1)).abs() < 1e-3);
    }

    #[test]
    fn saturates_at_both_ends() {
        assert_eq!(index_from_pm25(-3.0), 0.0);
        assert_eq!(index_from_pm25(f32::NAN), 0.0);
        assert_eq!(index_from_pm25(500.1), AQI_MAX);
        assert_eq!(index_from_pm25(65_535.0), AQI_MAX);
    }

    #[test]
    fn monotonic_over_sensor_range() {
        let mut last = 0.0;
        for tenth in 0..=5000 {
            let aqi = index_from_pm25(tenth as f32 / 10.0);
            assert!(aqi >= last, "AQI dropped at {} µg/m³", tenth as f32 / 10.0);
            last = aqi;
        }
    }

    #[test]
    fn labels_per_band() {
        assert_eq!(category_label(0.0), "Good");
        assert_eq!(category_label(50.0), "Good");
        assert_eq!(category_label(51.0), "Moderate");
        assert_eq!(category_label(100.0), "Moderate");
        assert_eq!(category_label(101.0), "Unhealthy for\nSensitive Groups");
        assert_eq!(category_label(150.0), "Unhealthy for\nSensitive Groups");
        assert_eq!(category_label(151.0), "Unhealthy");
        assert_eq!(category_label(200.0), "Unhealthy");
        assert_eq!(category_label(201.0), "Very Unhealthy");
        assert_eq!(category_label(300.0), "Very Unhealthy");
        assert_eq!(category_label(301.0), "Hazardous");
        assert_eq!(category_label(500.0), "Hazardous");
    }

    #[test]
    fn palettes_are_fixed() {
        let alert: Vec<_> = Category::ALL
            .iter()
            .map(|c| {
                let rgb = c.alert_color();
                (rgb.r(), rgb.g(), rgb.b())
            })
            .collect();
        assert_eq!(
            alert,
            vec![
                (0, 128, 0),
                (255, 255, 0),
                (255, 126, 0),
                (255, 0, 0),
                (143, 63, 151),
                (126, 0, 35),
            ]
        );

        assert_eq!(background_color(0.0), Rgb888::new(123, 224, 123));
        assert_eq!(background_color(75.0), Rgb888::new(242, 242, 153));
        assert_eq!(background_color(120.0), Rgb888::new(235, 171, 108));
        assert_eq!(background_color(175.0), Rgb888::new(245, 157, 157));
        assert_eq!(background_color(250.0), Rgb888::new(200, 153, 204));
        assert_eq!(background_color(450.0), Rgb888::new(200, 110, 135));
    }

    #[test]
    fn status_truncates_for_display() {
        let status = AqiStatus::from_pm25(40.0);
        assert_eq!(status.whole(), 112);
        assert_eq!(status.category, Category::UnhealthyForSensitiveGroups);
        assert_eq!(status.alert_color(), alert_color(112.0));
    }
}
