pub mod importer;
pub mod ports;
pub mod repository;

pub use importer::*;
pub use ports::*;
pub use repository::*;
