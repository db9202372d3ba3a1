//! API request handlers

mod debug;
mod events;
mod health;
mod instances;
mod manifests;
mod metrics;
mod reconcile;

pub use debug::*;
pub use events::*;
pub use health::*;
pub use instances::*;
pub use manifests::*;
pub use metrics::*;
pub use reconcile::*;
