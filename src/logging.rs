use tracing::Level;
use tracing_subscriber::{filter::filter_fn, prelude::*, registry, EnvFilter, Layer};

/// Installs the process-wide log subscriber, writing to stderr.
///
/// The level comes from `RUST_LOG` and defaults to `info`. Records emitted
/// through the `log` facade are forwarded as well. Calling this twice, or
/// after another subscriber was installed, leaves the first one in place.
pub fn install() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter)
        .with_filter(filter_fn(|m| {
            if let Some(path) = m.module_path() {
                // The wgpu crate is logging too much, so we skip `info` level.
                if path.starts_with("wgpu") && *m.level() >= Level::INFO {
                    return false;
                }
            }
            true
        }));

    registry().with(layer).try_init().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        install();
        install();
        log::info!("logging installed twice");
    }
}
