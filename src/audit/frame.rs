//! Datagram framing for the audit collector.
//!
//! `<priority>timestamp hostname appname: json-payload`

use chrono::{DateTime, SecondsFormat, Utc};

use crate::audit::entry::AccessLogEntry;

/// local0
pub const FACILITY: u8 = 16;
/// informational
pub const SEVERITY: u8 = 6;
pub const PRIORITY: u8 = FACILITY * 8 + SEVERITY;

/// Encode one entry as a collector datagram, stamping it with `now` if unset.
pub fn encode(
    entry: AccessLogEntry,
    hostname: &str,
    app_name: &str,
    now: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(&entry.stamped(now))?;
    Ok(format!(
        "<{}>{} {} {}: {}",
        PRIORITY,
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        hostname,
        app_name,
        payload
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{Action, Protocol};
    use chrono::TimeZone;

    #[test]
    fn test_priority() {
        assert_eq!(PRIORITY, 134);
    }

    #[test]
    fn test_frame_layout() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let entry = AccessLogEntry::new(Protocol::Tcp, Action::Allow, "10.0.0.2", "db.internal:5432");

        let frame = encode(entry, "edge-1", "edge-gateway", now).unwrap();

        let (header, payload) = frame.split_once(": ").unwrap();
        assert_eq!(header, "<134>2026-10-19T08:30:00Z edge-1 edge-gateway");
        let decoded: AccessLogEntry = serde_json::from_str(payload).unwrap();
        assert_eq!(decoded.timestamp, Some(now));
        assert_eq!(decoded.target_host, "db.internal:5432");
    }
}
