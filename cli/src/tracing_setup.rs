//! Tracing / logging initialisation.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trafficrelay_core::LogConfig;

/// Build the filter directive string: "info,trafficrelay_core=debug" etc.
pub fn directives(config: &LogConfig, verbose: bool) -> String {
    let mut directives = if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    };
    let mut components: Vec<_> = config.components.iter().collect();
    components.sort();
    for (component, level) in components {
        directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
    }
    directives
}

/// Initialise tracing once at startup. `RUST_LOG` wins over the config file.
pub fn init_tracing(config: &LogConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(config, verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout stays free for command output.
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
