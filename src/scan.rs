// One-shot security scan: POST to the backend, then refresh the scans stream out of band.

use tracing::{info, instrument, warn};

use crate::fetch::{ScanError, TelemetryClient};
use crate::models::{OpenPort, ScanRequest, ScanResult};
use crate::scheduler::SchedulerHandle;
use crate::stream::StreamId;

/// Runs the scan and, only when it succeeds, requests exactly one refresh of the scans stream.
#[instrument(skip(client, scheduler), fields(target = %request.target, scan_type = %request.scan_type))]
pub async fn trigger_scan(
    client: &TelemetryClient,
    scheduler: &SchedulerHandle,
    request: &ScanRequest,
) -> Result<ScanResult, ScanError> {
    let result = client.post_scan(request).await?;
    info!(
        risk_level = ?result.risk_level,
        open_ports = ?result.open_ports.iter().map(OpenPort::port).collect::<Vec<_>>(),
        vulnerabilities = result.vulnerabilities.len(),
        "scan completed"
    );
    if let Err(e) = scheduler.refresh(StreamId::Scans).await {
        warn!(error = %e, operation = "refresh_scans", "scan refresh not scheduled");
    }
    Ok(result)
}
