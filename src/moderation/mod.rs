pub mod audit;
pub mod category;
pub mod config;
pub mod lock;
pub mod paths;
pub mod pull;
pub mod reconcile;
pub mod record;
pub mod staging;
pub mod store;
pub mod util;
pub mod warn;
