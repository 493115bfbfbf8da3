//! Series hashing and shuffle-shard selection.

mod shuffle;
mod tokens;

pub use shuffle::{effective_shard_size, shuffle_shard, zone_local_shard_size};
pub use tokens::{series_id, series_token, shard_probe_token};
