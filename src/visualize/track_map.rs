use std::fmt::Write;

use log::{debug, warn};

use crate::BoxBoxError;
use crate::session::{CircuitInfo, Position};

use super::{BoundingBox, ChartConfig, escape_xml, rotate};

/// Distance between a corner and its label, in circuit units
const CORNER_LABEL_OFFSET: f64 = 500.0;
const CORNER_MARKER_RADIUS: f64 = 9.0;
const TITLE_HEIGHT: f64 = 30.0;

/// A corner label ready to be drawn, in rotated circuit coordinates
struct CornerLabel {
    text: String,
    track: (f64, f64),
    label: (f64, f64),
}

/// Generator for creating SVG track maps from position samples
pub struct TrackMapGenerator {
    config: ChartConfig,
}

impl TrackMapGenerator {
    pub fn new() -> Self {
        Self {
            config: ChartConfig::default(),
        }
    }

    pub fn with_config(config: ChartConfig) -> Self {
        Self { config }
    }

    /// Render the track outline rotated by the circuit rotation, with a grey
    /// marker, a connector line and a label for every corner.
    pub fn generate(
        &self,
        title: &str,
        points: &[Position],
        circuit: &CircuitInfo,
    ) -> Result<String, BoxBoxError> {
        let track_angle = circuit.rotation_deg.to_radians();
        let track: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .map(|p| rotate(p.x, p.y, track_angle))
            .collect();
        if track.len() < 3 {
            return Err(BoxBoxError::ChartGenerationError {
                reason: format!(
                    "Insufficient position data points ({}, minimum 3)",
                    track.len()
                ),
            });
        }
        if track.len() < points.len() {
            warn!(
                "Skipped {} position samples with non-finite coordinates",
                points.len() - track.len()
            );
        }

        let corners: Vec<CornerLabel> = circuit
            .corners
            .iter()
            .map(|corner| {
                let (offset_x, offset_y) =
                    rotate(CORNER_LABEL_OFFSET, 0.0, corner.angle_deg.to_radians());
                CornerLabel {
                    text: corner.label(),
                    track: rotate(corner.position.x, corner.position.y, track_angle),
                    label: rotate(
                        corner.position.x + offset_x,
                        corner.position.y + offset_y,
                        track_angle,
                    ),
                }
            })
            .collect();

        let mut bbox = BoundingBox::new();
        for (x, y) in track.iter().chain(corners.iter().map(|c| &c.label)) {
            bbox.update(*x, *y);
        }

        let (width, height) = (
            f64::from(self.config.canvas_size.0),
            f64::from(self.config.canvas_size.1),
        );
        let margin = width.min(height) * self.config.margin_percentage;
        let usable_width = width - 2.0 * margin;
        let usable_height = height - 2.0 * margin - TITLE_HEIGHT;
        // uniform scale keeps the aspect ratio of the circuit
        let scale = (usable_width / bbox.width().max(1.0)).min(usable_height / bbox.height().max(1.0));
        let offset_x = margin + (usable_width - bbox.width() * scale) / 2.0;
        let offset_y = margin + TITLE_HEIGHT + (usable_height - bbox.height() * scale) / 2.0;
        // SVG y grows downwards
        let to_canvas = |(x, y): (f64, f64)| {
            (
                offset_x + (x - bbox.min_x) * scale,
                offset_y + (bbox.max_y - y) * scale,
            )
        };

        let mut svg = String::with_capacity(1024 + track.len() * 20);
        let _ = write!(
            svg,
            r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}">
  <defs>
    <style>
      .track-line {{ stroke: #1f77b4; stroke-width: {stroke:.2}; fill: none; stroke-linecap: round; stroke-linejoin: round; }}
      .corner-line {{ stroke: grey; stroke-width: 1; }}
      .corner-marker {{ fill: grey; }}
      .corner-label {{ fill: white; font-family: sans-serif; font-size: 9px; text-anchor: middle; dominant-baseline: central; }}
      .title {{ font-family: sans-serif; font-size: 16px; text-anchor: middle; }}
    </style>
  </defs>
  <text class="title" x="{cx:.2}" y="{ty:.2}">{title}</text>"#,
            w = self.config.canvas_size.0,
            h = self.config.canvas_size.1,
            stroke = self.config.stroke_width,
            cx = width / 2.0,
            ty = margin + TITLE_HEIGHT / 2.0,
            title = escape_xml(title),
        );

        svg.push_str("\n  <path class=\"track-line\" d=\"");
        for (i, point) in track.iter().enumerate() {
            let (x, y) = to_canvas(*point);
            let command = if i == 0 { "M" } else { " L" };
            let _ = write!(svg, "{command} {x:.2},{y:.2}");
        }
        svg.push_str("\" />");

        for corner in &corners {
            let (track_x, track_y) = to_canvas(corner.track);
            let (label_x, label_y) = to_canvas(corner.label);
            let _ = write!(
                svg,
                "\n  <line class=\"corner-line\" x1=\"{track_x:.2}\" y1=\"{track_y:.2}\" x2=\"{label_x:.2}\" y2=\"{label_y:.2}\" />\
                 \n  <circle class=\"corner-marker\" cx=\"{label_x:.2}\" cy=\"{label_y:.2}\" r=\"{CORNER_MARKER_RADIUS}\" />\
                 \n  <text class=\"corner-label\" x=\"{label_x:.2}\" y=\"{label_y:.2}\">{}</text>",
                escape_xml(&corner.text)
            );
        }

        svg.push_str("\n</svg>");
        debug!(
            "Generated track map with {} points and {} corners",
            track.len(),
            corners.len()
        );
        Ok(svg)
    }
}

impl Default for TrackMapGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Corner;

    fn square() -> Vec<Position> {
        vec![
            Position::new(0., 0.),
            Position::new(2000., 0.),
            Position::new(2000., 1000.),
            Position::new(0., 1000.),
        ]
    }

    #[test]
    fn test_generate_track_map() {
        let circuit = CircuitInfo {
            rotation_deg: 0.,
            outline: vec![],
            corners: vec![
                Corner {
                    number: 1,
                    letter: String::new(),
                    angle_deg: 0.,
                    position: Position::new(2000., 0.),
                },
                Corner {
                    number: 2,
                    letter: "A".to_string(),
                    angle_deg: 180.,
                    position: Position::new(0., 1000.),
                },
            ],
        };
        let svg = TrackMapGenerator::new()
            .generate("Test Grand Prix 2023", &square(), &circuit)
            .unwrap();

        assert!(svg.starts_with("<svg width=\"800\" height=\"600\""));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Test Grand Prix 2023"));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert_eq!(svg.matches("<line").count(), 2);
        assert!(svg.contains(">1</text>"));
        assert!(svg.contains(">2A</text>"));
        assert_eq!(svg.matches(" L ").count(), 3);
    }

    #[test]
    fn test_generate_track_map_drawn_inside_canvas() {
        let circuit = CircuitInfo {
            rotation_deg: 37.,
            ..Default::default()
        };
        let svg = TrackMapGenerator::new()
            .generate("Rotated", &square(), &circuit)
            .unwrap();
        let path = svg.split("d=\"").nth(1).unwrap().split('"').next().unwrap();
        for coordinate in path.split(|c: char| c == ' ' || c == ',') {
            if let Ok(value) = coordinate.parse::<f64>() {
                assert!((0.0..=800.0).contains(&value), "{value} outside canvas");
            }
        }
    }

    #[test]
    fn test_generate_track_map_needs_points() {
        let result =
            TrackMapGenerator::new().generate("Empty", &square()[..2], &CircuitInfo::default());
        assert!(matches!(
            result,
            Err(BoxBoxError::ChartGenerationError { .. })
        ));
    }
}
