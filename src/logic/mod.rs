pub mod cid_resolver;
pub mod cid_unresolver;
pub mod included_store;
pub mod payload;
pub mod pipeline;
pub mod relations;
pub mod resolution_store;

pub use cid_resolver::*;
pub use cid_unresolver::*;
pub use included_store::*;
pub use payload::*;
pub use pipeline::*;
pub use resolution_store::*;
