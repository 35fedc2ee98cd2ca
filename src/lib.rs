pub mod app;
pub mod importers;
pub mod shutdown;

pub use app::Application;
pub use shutdown::ShutdownManager;
