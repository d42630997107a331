use std::sync::Once;

static INIT: Once = Once::new();

/// Used when neither `RUST_LOG` nor the configured filter is set.
pub const DEFAULT_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// Initializes the global logger once; later calls are ignored.
///
/// `RUST_LOG` wins over `filter`, which wins over the default of `info`.
pub fn init(filter: Option<&str>) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        if let Ok(env_filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&env_filter);
        } else if let Some(filter) = filter {
            builder.parse_filters(filter);
        } else {
            builder.filter_level(DEFAULT_LEVEL);
        }
        builder.init();
        log::debug!("logging initialized");
    });
}
