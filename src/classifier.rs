use crate::ping::ProbeError;
use crate::types::{Health, ProbeResult, Thresholds, Verdict};

/// Classifica o resultado bruto de um ping contra os limiares de perda e RTT.
///
/// Falha de execução sempre conta como degradação do destino.
pub fn classify(
    destination: &str,
    result: &Result<ProbeResult, ProbeError>,
    thresholds: &Thresholds,
) -> Verdict {
    match result {
        Err(e) => Verdict {
            destination: destination.to_string(),
            health: Health::Degraded,
            diagnostic: format!("probe execution failed: {}", e),
        },
        Ok(probe) => {
            let lost = probe.lost();
            let health = if lost > thresholds.max_lost_packets
                || probe.avg_rtt_ms > thresholds.rtt_threshold_ms
            {
                Health::Degraded
            } else {
                Health::Healthy
            };
            Verdict {
                destination: destination.to_string(),
                health,
                diagnostic: format!("lost={}, rtt={}ms", lost, probe.avg_rtt_ms),
            }
        }
    }
}
