pub mod document;
pub mod embed;
pub mod entity;
pub mod error;
pub mod record;
pub mod schema;

pub use document::*;
pub use embed::*;
pub use entity::*;
pub use error::*;
pub use record::*;
pub use schema::*;
