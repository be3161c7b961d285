pub mod in_memory;
pub mod payment_mock;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod upstream;
