use std::fmt::Write;

use itertools::Itertools;
use log::debug;

use crate::BoxBoxError;
use crate::analysis::StintSummary;
use crate::session::{Compound, DriverCode};
use crate::strategy::StrategyPlan;

use super::{ChartConfig, escape_xml};

const ROW_HEIGHT: f64 = 22.0;
const LABEL_WIDTH: f64 = 70.0;
const LEGEND_WIDTH: f64 = 150.0;
const HEADER_HEIGHT: f64 = 40.0;
const AXIS_HEIGHT: f64 = 45.0;
const TICK_EVERY: u32 = 10;

/// One horizontal bar of the chart
struct Row {
    label: String,
    segments: Vec<(Compound, u32)>,
    hatched: bool,
}

/// Horizontal stacked bars of tyre stints, one row per driver
pub struct StrategyChartGenerator {
    config: ChartConfig,
}

impl StrategyChartGenerator {
    pub fn new() -> Self {
        Self {
            config: ChartConfig::default(),
        }
    }

    pub fn with_config(config: ChartConfig) -> Self {
        Self { config }
    }

    /// Render `drivers` top to bottom in the given order. A simulated plan adds
    /// a hatched `SIM <code>` row at the bottom.
    pub fn generate(
        &self,
        title: &str,
        drivers: &[DriverCode],
        stints: &[StintSummary],
        simulated: Option<(&DriverCode, &StrategyPlan)>,
    ) -> Result<String, BoxBoxError> {
        let mut rows: Vec<Row> = drivers
            .iter()
            .map(|driver| Row {
                label: driver.to_string(),
                segments: stints
                    .iter()
                    .filter(|s| &s.driver == driver)
                    .map(|s| (s.compound, s.laps))
                    .collect(),
                hatched: false,
            })
            .collect();
        if let Some((driver, plan)) = simulated {
            rows.push(Row {
                label: format!("SIM {driver}"),
                segments: plan.stints().iter().map(|s| (s.compound, s.laps)).collect(),
                hatched: true,
            });
        }
        if rows.iter().all(|r| r.segments.is_empty()) {
            return Err(BoxBoxError::ChartGenerationError {
                reason: "No stint data to draw".to_string(),
            });
        }

        let max_laps = rows
            .iter()
            .map(|r| r.segments.iter().map(|(_, laps)| laps).sum::<u32>())
            .max()
            .unwrap_or(0)
            .max(1);
        let legend: Vec<Compound> = rows
            .iter()
            .flat_map(|r| r.segments.iter().map(|(c, _)| *c))
            .unique()
            .collect();

        let width = f64::from(self.config.canvas_size.0);
        let height = HEADER_HEIGHT + rows.len() as f64 * ROW_HEIGHT + AXIS_HEIGHT;
        let plot_width = (width - LABEL_WIDTH - LEGEND_WIDTH).max(100.0);
        let lap_width = plot_width / f64::from(max_laps);
        let axis_y = HEADER_HEIGHT + rows.len() as f64 * ROW_HEIGHT;

        let mut svg = String::with_capacity(2048 + rows.len() * 256);
        let _ = write!(
            svg,
            r##"<svg width="{w}" height="{h:.0}" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h:.0}">
  <defs>
    <style>
      .segment {{ stroke: black; stroke-width: 1; }}
      .label {{ font-family: sans-serif; font-size: 11px; text-anchor: end; dominant-baseline: central; }}
      .axis {{ stroke: black; stroke-width: 1; }}
      .tick {{ font-family: sans-serif; font-size: 10px; text-anchor: middle; }}
      .title {{ font-family: sans-serif; font-size: 16px; text-anchor: middle; }}
      .legend {{ font-family: sans-serif; font-size: 11px; dominant-baseline: central; }}
    </style>
    <pattern id="hatch" patternUnits="userSpaceOnUse" width="6" height="6" patternTransform="rotate(45)">
      <line x1="0" y1="0" x2="0" y2="6" stroke="black" stroke-width="1" />
    </pattern>
  </defs>
  <text class="title" x="{cx:.2}" y="24">{title}</text>"##,
            w = self.config.canvas_size.0,
            h = height,
            cx = LABEL_WIDTH + plot_width / 2.0,
            title = escape_xml(title),
        );

        for (index, row) in rows.iter().enumerate() {
            let y = HEADER_HEIGHT + index as f64 * ROW_HEIGHT;
            let _ = write!(
                svg,
                "\n  <text class=\"label\" x=\"{:.2}\" y=\"{:.2}\">{}</text>",
                LABEL_WIDTH - 6.0,
                y + ROW_HEIGHT / 2.0,
                escape_xml(&row.label)
            );
            let mut start = 0;
            for (compound, laps) in &row.segments {
                let x = LABEL_WIDTH + f64::from(start) * lap_width;
                let w = f64::from(*laps) * lap_width;
                let _ = write!(
                    svg,
                    "\n  <rect class=\"segment\" x=\"{x:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{:.2}\" fill=\"{}\" />",
                    y + 2.0,
                    ROW_HEIGHT - 4.0,
                    compound.color()
                );
                if row.hatched {
                    let _ = write!(
                        svg,
                        "\n  <rect x=\"{x:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{:.2}\" fill=\"url(#hatch)\" />",
                        y + 2.0,
                        ROW_HEIGHT - 4.0
                    );
                }
                start += laps;
            }
        }

        let _ = write!(
            svg,
            "\n  <line class=\"axis\" x1=\"{LABEL_WIDTH:.2}\" y1=\"{axis_y:.2}\" x2=\"{:.2}\" y2=\"{axis_y:.2}\" />",
            LABEL_WIDTH + plot_width
        );
        for lap in (0..=max_laps).step_by(TICK_EVERY as usize) {
            let x = LABEL_WIDTH + f64::from(lap) * lap_width;
            let _ = write!(
                svg,
                "\n  <text class=\"tick\" x=\"{x:.2}\" y=\"{:.2}\">{lap}</text>",
                axis_y + 14.0
            );
        }
        let _ = write!(
            svg,
            "\n  <text class=\"tick\" x=\"{:.2}\" y=\"{:.2}\">Lap Number</text>",
            LABEL_WIDTH + plot_width / 2.0,
            axis_y + 34.0
        );

        let legend_x = LABEL_WIDTH + plot_width + 16.0;
        let _ = write!(
            svg,
            "\n  <text class=\"legend\" x=\"{legend_x:.2}\" y=\"{:.2}\">Tyre Compounds</text>",
            HEADER_HEIGHT
        );
        for (index, compound) in legend.iter().enumerate() {
            let y = HEADER_HEIGHT + 18.0 + index as f64 * 18.0;
            let _ = write!(
                svg,
                "\n  <rect class=\"segment\" x=\"{legend_x:.2}\" y=\"{:.2}\" width=\"14\" height=\"12\" fill=\"{}\" />\
                 \n  <text class=\"legend\" x=\"{:.2}\" y=\"{y:.2}\">{}</text>",
                y - 6.0,
                compound.color(),
                legend_x + 20.0,
                compound
            );
        }

        svg.push_str("\n</svg>");
        debug!(
            "Generated strategy chart with {} rows over {max_laps} laps",
            rows.len()
        );
        Ok(svg)
    }
}

impl Default for StrategyChartGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::PlannedStint;

    fn code(code: &str) -> DriverCode {
        DriverCode::new(code).unwrap()
    }

    fn stint(driver: &str, stint: u32, compound: Compound, laps: u32) -> StintSummary {
        StintSummary {
            driver: code(driver),
            stint,
            compound,
            laps,
        }
    }

    #[test]
    fn test_rows_follow_driver_order() {
        let stints = vec![
            stint("HAM", 1, Compound::Hard, 30),
            stint("VER", 1, Compound::Medium, 10),
            stint("VER", 2, Compound::Hard, 20),
        ];
        let svg = StrategyChartGenerator::new()
            .generate("Test 2023 Strategies", &[code("VER"), code("HAM")], &stints, None)
            .unwrap();

        let ver = svg.find(">VER</text>").unwrap();
        let ham = svg.find(">HAM</text>").unwrap();
        assert!(ver < ham);
        assert_eq!(svg.matches("class=\"segment\"").count(), 3 + 2);
        assert!(svg.contains("Lap Number"));
        assert!(svg.contains("Tyre Compounds"));
        assert!(svg.contains(Compound::Medium.color()));
        assert!(!svg.contains("url(#hatch)\" />"));
    }

    #[test]
    fn test_simulated_row_is_hatched() {
        let stints = vec![stint("VER", 1, Compound::Medium, 30)];
        let plan = StrategyPlan::new(
            vec![
                PlannedStint::new(Compound::Soft, 10).unwrap(),
                PlannedStint::new(Compound::Hard, 20).unwrap(),
            ],
            30,
        )
        .unwrap();
        let ver = code("VER");
        let svg = StrategyChartGenerator::new()
            .generate("Test", &[ver.clone()], &stints, Some((&ver, &plan)))
            .unwrap();

        assert!(svg.contains(">SIM VER</text>"));
        assert_eq!(svg.matches("fill=\"url(#hatch)\"").count(), 2);
    }

    #[test]
    fn test_chart_without_stints_fails() {
        let result = StrategyChartGenerator::new().generate("Empty", &[code("VER")], &[], None);
        assert!(matches!(
            result,
            Err(BoxBoxError::ChartGenerationError { .. })
        ));
    }
}
