//! ceresprom Storage - Remote CeresDB storage access
//!
//! This crate provides the storage side of the bridge:
//! - Series codec: remote time series with a seek/next sample cursor
//! - Querier: issues pushdown queries and maps response codes
//! - Write batcher: columnar, per-metric dictionary encoding of points
//! - Appender: buffers samples from label sets until commit
//! - `StorageClient`: the transport seam (HTTP/JSON and in-memory clients)

pub mod appender;
pub mod client;
pub mod config;
pub mod error;
pub mod querier;
pub mod series;
pub mod write;

pub use appender::Appender;
pub use client::{HttpStorageClient, MemoryClient, StorageClient};
pub use config::{parse_duration, RemoteConfig};
pub use error::{Result, StorageError};
pub use querier::{Querier, SelectHints};
pub use series::{RemoteSeries, SeriesIterator, SeriesSet, SeriesSlot};
pub use write::{decode_request, encode_points, Writer};
