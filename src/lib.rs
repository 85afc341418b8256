// Library interface for boxbox
// This allows integration tests and benches to access internal modules

pub mod analysis;
pub mod config;
pub mod errors;
pub mod provider;
pub mod session;
pub mod shell;
pub mod strategy;
pub mod visualize;
mod writer;

// Re-export commonly used types
pub use analysis::{DriverSummary, PerformanceAnalyzer, StintSummary, WinnerReport};
pub use config::{AppConfig, ProviderConfig};
pub use errors::BoxBoxError;
pub use provider::{HttpProvider, MockEntry, MockProvider, RaceDataProvider};
pub use session::{
    Compound, DriverCode, DriverResult, EventInfo, LapRecord, RaceSelector, ResultsAccessor,
    Session,
};
pub use shell::{Shell, ShellOptions};
pub use strategy::{PlannedStint, SimulationResult, StrategyComparison, StrategyPlan, StrategySimulator};
