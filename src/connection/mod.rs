pub mod pool;
pub mod tcp;

pub use pool::{ConnectionPool, PoolGuard};
pub use tcp::Connection;
