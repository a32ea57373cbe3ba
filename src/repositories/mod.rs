pub mod kv;
pub mod sql;

pub use kv::RedisPostRepository;
pub use sql::SqlPostRepository;
