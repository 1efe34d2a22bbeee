//! HTTP publisher: one scrape pass per poll request.

mod errors;
mod handlers;
mod pool;
mod server;
mod state;

pub use errors::ApiError;
pub use pool::rest_factory;
pub use pool::ApiFactory;
pub use pool::ExporterPool;
pub use server::routes;
pub use server::ApiServer;
pub use state::AppState;
