use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alvo monitorado: um equipamento (hostname) com seus destinos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Destinos em ordem de configuração.
    #[serde(alias = "destinos", default)]
    pub destinations: Vec<String>,
    /// Ciclos degradados consecutivos, compartilhado por todos os destinos.
    #[serde(alias = "eventos", default)]
    pub events: u32,
}

/// Documento de estado completo, indexado por hostname.
pub type Targets = BTreeMap<String, Target>;

/// Resumo bruto de um ping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub sent: u32,
    pub received: u32,
    pub avg_rtt_ms: f64,
}

impl ProbeResult {
    pub fn lost(&self) -> u32 {
        self.sent.saturating_sub(self.received)
    }
}

/// Limiares imutáveis, fixados na inicialização do processo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_lost_packets: u32,
    pub rtt_threshold_ms: f64,
    pub max_events: u32,
    pub alert_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Degraded,
}

/// Veredito de um destino num ciclo.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub destination: String,
    pub health: Health,
    pub diagnostic: String,
}

impl Verdict {
    pub fn is_degraded(&self) -> bool {
        self.health == Health::Degraded
    }
}

/// Alarme disparado quando um alvo atinge `max_events` ciclos degradados.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmEvent {
    pub hostname: String,
    pub destination: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Resumo de um ciclo, registrado no log ao final de cada execução.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub targets: usize,
    pub probes: usize,
    pub degraded_probes: usize,
    pub degraded_targets: usize,
    pub alarms: usize,
    pub elapsed_ms: u128,
}
