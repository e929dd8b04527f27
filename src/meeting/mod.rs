//! Meeting generation and the recent-links history

pub mod connectivity;
pub mod history;
pub mod orchestrator;

pub use connectivity::{Connectivity, FixedConnectivity, TcpProbe};
pub use history::{History, HistoryStore, MeetingRecord};
pub use orchestrator::{Meeting, MeetingOrchestrator};
