//! Run configuration loaded from `.faultmap.toml`

mod core;
mod loader;

pub use self::core::{
    default_max_call_depth, default_timeout_ms, ExecutionConfig, FaultmapConfig, ScoringConfig,
    MAX_CALL_DEPTH_LIMIT,
};
pub use loader::{
    directory_ancestors, load_config, load_config_from_dir, load_config_from_path,
    parse_and_validate_config, CONFIG_FILE_NAME,
};
