//! tracker.rs — Máquina de estados do contador de eventos consecutivos
//!
//! ```text
//! Stable(0) ──degradado──▶ Degrading(1..max-1) ──degradado──▶ AlarmFired ──▶ Stable(0)
//!     ▲                           │
//!     └────────── saudável ───────┘
//! ```
//!
//! Um ciclo conta como degradado se QUALQUER destino do alvo estiver
//! degradado (agregação por host).

use crate::types::{AlarmEvent, Thresholds, Verdict};
use chrono::Utc;
use tracing::debug;

/// Estado observável de um alvo a partir do seu contador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Stable,
    Degrading(u32),
}

impl TargetState {
    pub fn from_events(events: u32) -> Self {
        if events == 0 {
            Self::Stable
        } else {
            Self::Degrading(events)
        }
    }
}

/// Resultado de um ciclo para um alvo.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub events: u32,
    pub alarm: Option<AlarmEvent>,
}

#[derive(Debug, Clone)]
pub struct EventTracker {
    thresholds: Thresholds,
}

impl EventTracker {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Aplica os vereditos de um ciclo ao contador atual do alvo.
    pub fn observe_cycle(&self, hostname: &str, events: u32, verdicts: &[Verdict]) -> Observation {
        let max = self.thresholds.max_events;
        // Contadores persistidos sob um limiar anterior podem vir acima do máximo.
        let current = events.min(max.saturating_sub(1));

        let Some(first_degraded) = verdicts.iter().find(|v| v.is_degraded()) else {
            if current > 0 {
                debug!(hostname, previous = current, "Alvo recuperado, contador zerado");
            }
            return Observation {
                events: 0,
                alarm: None,
            };
        };

        let next = current + 1;
        if next < max {
            debug!(hostname, events = next, max, "Ciclo degradado");
            return Observation {
                events: next,
                alarm: None,
            };
        }

        let message = format!(
            "ALARM: target {} with destination {} has been degraded for {} seconds",
            hostname, first_degraded.destination, self.thresholds.alert_timeout_secs
        );
        Observation {
            events: 0,
            alarm: Some(AlarmEvent {
                hostname: hostname.to_string(),
                destination: first_degraded.destination.clone(),
                message,
                raised_at: Utc::now(),
            }),
        }
    }
}
