use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

use crate::data::model::MetadataValue;

/// Default trace colour (matplotlib's "C0").
pub const TRACE_BLUE: RGBColor = RGBColor(31, 119, 180);
/// Colour for values a [`ColorMap`] has not seen.
pub const GREY: RGBColor = RGBColor(128, 128, 128);

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.45);
            let rgb: Srgb = hsl.into_color();
            RGBColor(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: annotation value → RGBColor
// ---------------------------------------------------------------------------

/// Maps the unique values of one annotation key to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub key: String,
    mapping: BTreeMap<MetadataValue, RGBColor>,
    default_color: RGBColor,
}

impl ColorMap {
    pub fn new(key: &str, unique_values: &BTreeSet<MetadataValue>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping = unique_values.iter().cloned().zip(palette).collect();
        ColorMap {
            key: key.to_string(),
            mapping,
            default_color: GREY,
        }
    }

    pub fn color_for(&self, value: &MetadataValue) -> RGBColor {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// `(label, colour)` pairs for a chart legend.
    pub fn legend_entries(&self) -> Vec<(String, RGBColor)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let palette = generate_palette(4);
        assert_eq!(palette.len(), 4);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_values_get_default_colour() {
        let values: BTreeSet<MetadataValue> = ["good", "mua"].into_iter().map(MetadataValue::from).collect();
        let map = ColorMap::new("cluster_group", &values);
        assert_ne!(map.color_for(&MetadataValue::from("good")), GREY);
        assert_eq!(map.color_for(&MetadataValue::from("noise")), GREY);
        let labels: Vec<String> = map.legend_entries().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["good".to_string(), "mua".to_string()]);
    }
}
