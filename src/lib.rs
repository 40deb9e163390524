pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export logic types
pub use logic::{
    inbound, CidResolver, CidUnresolver, Exported, IncludedStore, Payload, Resolution,
    ResolutionStore,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{EntityStore, MemoryStore, SchemaProvider};
