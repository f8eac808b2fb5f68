//! alarm.rs — Canal de eventos para operação (warning / critical)
//!
//! Os operadores só enxergam a saúde da rede por este canal: diagnósticos de
//! degradação vão como `warning`, alarmes e erros de infraestrutura como
//! `critical`.

use crate::types::AlarmEvent;
#[cfg(test)]
use std::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

/// Destino dos eventos de alarme.
pub trait AlarmSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str);

    fn warning(&self, message: &str) {
        self.emit(Severity::Warning, message);
    }

    fn critical(&self, message: &str) {
        self.emit(Severity::Critical, message);
    }

    fn alarm(&self, event: &AlarmEvent) {
        self.emit(Severity::Critical, &event.message);
    }
}

/// Sink de produção: publica via `tracing` com os targets
/// `external.warning` / `external.critical`.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl AlarmSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Warning => warn!(target: "external.warning", "{}", message),
            Severity::Critical => error!(target: "external.critical", "{}", message),
        }
    }
}

/// Sink em memória, útil para inspecionar os eventos emitidos.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(Severity, String)>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events().iter().filter(|(s, _)| *s == severity).count()
    }
}

#[cfg(test)]
impl AlarmSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((severity, message.to_string()));
        }
    }
}
