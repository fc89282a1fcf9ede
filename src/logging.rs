use log::LevelFilter;

pub fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(true)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}
