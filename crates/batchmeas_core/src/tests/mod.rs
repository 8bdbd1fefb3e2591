//! Cross-module tests for batch collection and measurement mapping
//!
//! Tests are organized by topic:
//! - `keys` - Combination key encoding over random index tuples
//! - `collection` - Reading batch directories with missing and broken records
//! - `aggregate` - Aggregate file round trips and cached reloads
//! - `mapping` - Measurement mapping layouts and consistency failures
//! - `traces` - Trace extraction onto the grid

mod collection;
mod keys;
