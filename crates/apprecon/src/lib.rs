//! apprecon — traffic-derived schema inference for web applications: entities, endpoints, and UI components.

pub mod aggregate;
pub mod browser;
pub mod dom;
pub mod endpoints;
pub mod inference;
pub mod recorder;
pub mod scan;
pub mod session;
pub mod survey;
pub mod types;

pub use aggregate::{aggregate, ArchitectureReport, ReportSummary};
pub use browser::{ArtifactSink, BrowserPage, CapturedPage, NavigationResult, NullSink};
pub use dom::{DomNode, DomQuery, HtmlDom, LayoutMap};
pub use endpoints::{normalize, EndpointCatalog};
pub use inference::{classify, EntityCatalog};
pub use recorder::{ExchangeRecorder, TrafficFilter, DEFAULT_BODY_LIMIT};
pub use scan::{validate_start_url, CrawlSummary, ScanOptions, Scanner};
pub use session::{ObservedRequest, ObservedResponse, ReconSession, SessionConfig, TrafficEvent};
pub use survey::{AssetInventory, ComponentKind, ComponentSurvey, SelectorSet, Surveyor};
pub use types::*;
