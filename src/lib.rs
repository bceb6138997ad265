pub mod amount;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod model;
pub mod registry;
pub mod report;
pub mod server;
pub mod session;

pub use amount::Amount;
pub use auth::Roster;
pub use config::ServerConfig;
pub use dispatch::WorkerPool;
pub use model::{Identity, WindowId};
pub use registry::AccountRegistry;
pub use server::Acceptor;
