// SVG figures for a loaded race: track map and tyre strategy chart

pub mod strategy_chart;
pub mod track_map;

use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::BoxBoxError;
use crate::analysis::stints_by_compound;
use crate::provider::RaceDataProvider;
use crate::provider::cache::normalize_name;
use crate::session::{CircuitInfo, DriverCode, ResultsAccessor};
use crate::strategy::StrategyPlan;
use crate::writer::write_figure;

pub use strategy_chart::StrategyChartGenerator;
pub use track_map::TrackMapGenerator;

/// Configuration shared by both figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Canvas dimensions (width, height) in pixels
    pub canvas_size: (u32, u32),
    /// Stroke width for the track line
    pub stroke_width: f64,
    /// Margin around the drawing as percentage of canvas size
    pub margin_percentage: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            canvas_size: (800, 600),
            stroke_width: 3.0,
            margin_percentage: 0.1,
        }
    }
}

/// Bounding box for coordinate calculations
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn update(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotate a point around the origin, as the row vector `[x, y]` times
/// `[[cos, sin], [-sin, cos]]`
pub fn rotate(x: f64, y: f64, angle_rad: f64) -> (f64, f64) {
    let (sin, cos) = angle_rad.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders both figures of the loaded race into an output directory
pub struct Visualizer {
    output_dir: PathBuf,
    config: ChartConfig,
}

impl Visualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            config: ChartConfig::default(),
        }
    }

    fn file_name<P: RaceDataProvider>(
        accessor: &ResultsAccessor<'_, P>,
        figure: &str,
    ) -> Result<String, BoxBoxError> {
        let session = accessor.session()?;
        Ok(format!(
            "{}_{}_{figure}.svg",
            session.year,
            normalize_name(&session.event.name)
        ))
    }

    /// Draw the fastest lap of the race with labelled corners
    pub fn track_map<P: RaceDataProvider>(
        &self,
        accessor: &ResultsAccessor<'_, P>,
    ) -> Result<PathBuf, BoxBoxError> {
        let session = accessor.session()?;
        let circuit = accessor.circuit_info().unwrap_or_else(|e| {
            warn!("No circuit details for {}: {e}", session.event.name);
            CircuitInfo::default()
        });

        let mut points = match session.fastest_lap() {
            Some(lap) => accessor.lap_positions(lap).unwrap_or_else(|e| {
                warn!("No position data for the fastest lap: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        if points.is_empty() {
            debug!("Falling back to the circuit outline for the track map");
            points = circuit.outline.clone();
        }

        let title = format!("{} {}", session.event.name, session.year);
        let svg = TrackMapGenerator::with_config(self.config.clone())
            .generate(&title, &points, &circuit)?;
        let path = write_figure(&self.output_dir, &Self::file_name(accessor, "track_map")?, &svg)?;
        info!("Track map written to {}", path.display());
        Ok(path)
    }

    /// Draw every driver's real stints, plus the simulated plan when given
    pub fn strategies<P: RaceDataProvider>(
        &self,
        accessor: &ResultsAccessor<'_, P>,
        simulated: Option<(&DriverCode, &StrategyPlan)>,
    ) -> Result<PathBuf, BoxBoxError> {
        let session = accessor.session()?;
        let stints = stints_by_compound(&session.laps);
        let drivers: Vec<DriverCode> = accessor.drivers().cloned().collect();

        let title = format!("{} {} Strategies", session.event.name, session.year);
        let svg = StrategyChartGenerator::with_config(self.config.clone()).generate(
            &title,
            &drivers,
            &stints,
            simulated,
        )?;
        let path = write_figure(&self.output_dir, &Self::file_name(accessor, "strategies")?, &svg)?;
        info!("Strategy chart written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockEntry, MockProvider};
    use crate::session::{Compound, Corner, EventInfo, Position, RaceSelector};
    use crate::strategy::PlannedStint;
    use tempfile::TempDir;

    #[test]
    fn test_rotate_quarter_turn() {
        let (x, y) = rotate(1.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert!(x.abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
        let (x, y) = rotate(3.0, 4.0, 0.0);
        assert_eq!((x, y), (3.0, 4.0));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("A & B <C>"), "A &amp; B &lt;C&gt;");
    }

    fn provider() -> MockProvider {
        let event = EventInfo {
            round: 6,
            name: "Monaco Grand Prix".to_string(),
            country: "Monaco".to_string(),
            location: "Monte-Carlo".to_string(),
            date: "2023-05-28".to_string(),
        };
        let session = MockProvider::synthetic_session(
            2023,
            event,
            &[
                MockEntry {
                    code: "VER",
                    number: 1,
                    stints: vec![(Compound::Medium, 5), (Compound::Hard, 5)],
                    lap_secs: 75.,
                },
                MockEntry {
                    code: "ALO",
                    number: 14,
                    stints: vec![(Compound::Hard, 10)],
                    lap_secs: 75.2,
                },
            ],
        );
        let square = vec![
            Position::new(0., 0.),
            Position::new(1000., 0.),
            Position::new(1000., 1000.),
            Position::new(0., 1000.),
        ];
        MockProvider::new()
            .with_session(session)
            .with_positions(square)
            .with_circuit(CircuitInfo {
                rotation_deg: 90.,
                outline: vec![],
                corners: vec![Corner {
                    number: 1,
                    letter: "A".to_string(),
                    angle_deg: 45.,
                    position: Position::new(1000., 0.),
                }],
            })
    }

    #[test]
    fn test_figures_written_to_output_dir() {
        let provider = provider();
        let mut accessor = ResultsAccessor::new(&provider);
        accessor.load_session(2023, &RaceSelector::Round(6)).unwrap();
        let dir = TempDir::new().unwrap();
        let visualizer = Visualizer::new(dir.path().join("charts"));

        let map = visualizer.track_map(&accessor).unwrap();
        assert_eq!(map, dir.path().join("charts/2023_monaco_grand_prix_track_map.svg"));
        let svg = std::fs::read_to_string(&map).unwrap();
        assert!(svg.contains(">1A</text>"));
        assert!(svg.contains("Monaco Grand Prix 2023"));

        let ver = DriverCode::new("VER").unwrap();
        let plan = StrategyPlan::new(
            vec![
                PlannedStint::new(Compound::Soft, 4).unwrap(),
                PlannedStint::new(Compound::Hard, 6).unwrap(),
            ],
            10,
        )
        .unwrap();
        let chart = visualizer.strategies(&accessor, Some((&ver, &plan))).unwrap();
        let svg = std::fs::read_to_string(chart).unwrap();
        assert!(svg.contains("SIM VER"));
        assert!(svg.contains("Tyre Compounds"));
    }

    #[test]
    fn test_track_map_without_any_geometry_fails() {
        let event = EventInfo {
            round: 1,
            name: "Bahrain Grand Prix".to_string(),
            country: "Bahrain".to_string(),
            location: "Sakhir".to_string(),
            date: "2023-03-05".to_string(),
        };
        let session = MockProvider::synthetic_session(
            2023,
            event,
            &[MockEntry {
                code: "VER",
                number: 1,
                stints: vec![(Compound::Soft, 3)],
                lap_secs: 90.,
            }],
        );
        let provider = MockProvider::new().with_session(session);
        let mut accessor = ResultsAccessor::new(&provider);
        accessor.load_session(2023, &RaceSelector::Round(1)).unwrap();
        let dir = TempDir::new().unwrap();

        let result = Visualizer::new(dir.path()).track_map(&accessor);
        assert!(matches!(
            result,
            Err(BoxBoxError::ChartGenerationError { .. })
        ));
    }
}
