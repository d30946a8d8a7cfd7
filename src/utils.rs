//! Small helpers shared by the binary and the stages.

use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tokio::signal;
use tracing::error;

use crate::reference::Horizon;

/// Resolve once Ctrl+C or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Local midnight of the next day plus twelve hours, in the given UTC offset.
pub fn far_horizon_cutoff(now: OffsetDateTime, utc_offset_hours: i8) -> OffsetDateTime {
    let offset = UtcOffset::from_hms(utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC);
    let local = now.to_offset(offset);
    local.replace_time(Time::MIDNIGHT) + Duration::days(1) + Duration::hours(12)
}

/// Which listing the reference site files a kickoff under.
pub fn horizon_for(kickoff: OffsetDateTime, now: OffsetDateTime, utc_offset_hours: i8) -> Horizon {
    if kickoff >= far_horizon_cutoff(now, utc_offset_hours) {
        Horizon::FarTerm
    } else {
        Horizon::NearTerm
    }
}

/// Truncate `s` to at most `max` characters for log output.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
