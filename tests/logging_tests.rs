//! Integration tests for the shared tracing setup

use courier::logging::default_filter;
use tracing_subscriber::filter::LevelFilter;

#[test]
fn test_default_filter_is_info() {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }

    assert_eq!(default_filter().max_level_hint(), Some(LevelFilter::INFO));
}
