use {
    anyhow::Result,
    rust_decimal::Decimal,
    tracing_appender::non_blocking::WorkerGuard,
    tracing_subscriber::{
        filter::EnvFilter, fmt, fmt::time::ChronoUtc, layer::SubscriberExt,
        util::SubscriberInitExt,
    },
};

use crate::libs::config::Config;

const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Stderr logging filtered by `RUST_LOG` (default `info`). With `DEBUG_LOGS=true`
/// an hourly file in `logs/` gets the same events without colors.
///
/// Keep the returned guard alive for the life of the process.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
        .with_target(false);

    let (file_layer, guard) = if Config::get_var_t("DEBUG_LOGS", false) {
        std::fs::create_dir_all("logs")?;
        let appender = tracing_appender::rolling::hourly("logs", "cakeorders.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

/// Human price with a handful of significant digits, whatever the magnitude.
pub fn format_price(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    let abs = value.abs();
    let dp = if abs >= Decimal::ONE {
        4
    } else {
        // leading zeros after the point, then 4 significant digits
        let mut zeros = 0u32;
        let mut v = abs;
        while v < Decimal::ONE && zeros < 24 {
            v *= Decimal::TEN;
            zeros += 1;
        }
        zeros + 3
    };
    value.round_dp(dp).normalize().to_string()
}

/// Decimal percentage rounded to two places, with an explicit sign.
pub fn format_pct(ratio: Decimal) -> String {
    let pct = ratio * Decimal::ONE_HUNDRED;
    if pct.is_sign_negative() {
        format!("{pct:.2}%")
    } else {
        format!("+{pct:.2}%")
    }
}
