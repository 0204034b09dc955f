use tracing_subscriber::filter::EnvFilter;

/// Install the global subscriber. Logs go to stderr; stdout carries reports.
///
/// `RUST_LOG` takes precedence over `level`; an unparsable level falls back
/// to `info`.
pub fn init(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| match EnvFilter::try_new(level) {
            Ok(filter) => Ok(filter),
            Err(e) => {
                eprintln!("invalid log level '{level}', using info: {e}");
                EnvFilter::try_new("info")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let res = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = res {
        eprintln!("failed to init logger: {e}");
    }
}
