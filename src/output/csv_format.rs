//! CSV output formatting.

use crate::report::ScanReport;
use crate::services::service_label;
use std::io::Write;

/// Write one row per result.
pub fn write_csv<W: Write>(out: W, report: &ScanReport) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["protocol", "port", "state", "service", "latency_ms", "error"])?;

    for result in &report.results {
        let protocol = result.protocol.to_string().to_lowercase();
        let port = result.port.to_string();
        let state = result.state.to_string();
        let latency = result.latency.as_millis().to_string();
        wtr.write_record([
            protocol.as_str(),
            port.as_str(),
            state.as_str(),
            service_label(result.protocol, result.port.as_u16()),
            latency.as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
