//! `indices` command handler.

use crate::market_data::IndexRegistry;

/// Print each supported index and its constituent count.
pub fn run_indices() {
    let registry = IndexRegistry::builtin();
    println!("{:<12} {:>6}", "INDEX", "STOCKS");
    for info in registry.list() {
        println!("{:<12} {:>6}", info.name, info.stock_count);
    }
}
