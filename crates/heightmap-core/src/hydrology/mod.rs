//! Stage 5 — HydrologyAnalyzer: D8 flow routing, rivers, dam sites.
//! Read-only with respect to H: this stage only derives side-output data.

pub mod flow_routing;
pub mod rivers;

pub use flow_routing::{compute_d8_flow, FlowField};
pub use rivers::{dam_sites, extract_rivers, DamSite, River, RiverThreshold};
