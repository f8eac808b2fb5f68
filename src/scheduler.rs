// src/scheduler.rs

use crate::alarm::AlarmSink;
use crate::config::{Config, Scope};
use crate::error::MonitorError;
use crate::ping::Prober;
use crate::scan::ScanOrchestrator;
use crate::storage::Storage;
use crate::types::{CycleReport, Targets};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Determina o hostname do equipamento local (ou usa o configurado).
pub fn resolve_identity(config: &Config) -> Result<String, MonitorError> {
    if let Some(hostname) = &config.hostname {
        return Ok(hostname.clone());
    }
    let hostname = gethostname::gethostname()
        .into_string()
        .map_err(|_| MonitorError::IdentityResolution("hostname is not valid UTF-8".into()))?;
    if hostname.trim().is_empty() {
        return Err(MonitorError::IdentityResolution("empty system hostname".into()));
    }
    Ok(hostname)
}

/// Laço principal: carrega estado, executa o ciclo, persiste e dorme.
pub struct Monitor<P: Prober, S: AlarmSink> {
    config: Arc<Config>,
    storage: Storage,
    orchestrator: ScanOrchestrator<P>,
    sink: Arc<S>,
}

impl<P: Prober, S: AlarmSink> Monitor<P, S> {
    pub fn new(config: Arc<Config>, prober: Arc<P>, sink: Arc<S>) -> Self {
        let orchestrator = ScanOrchestrator::new(
            prober,
            config.thresholds(),
            config.ping_count,
            config.max_workers,
        );
        Self {
            storage: Storage::new(config.state_file.clone()),
            config,
            orchestrator,
            sink,
        }
    }

    /// Executa ciclos até `run_once` ou até o sinal de parada. O ciclo em
    /// andamento sempre termina antes de sair.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.storage.check_permissions().await;
        info!(
            state_file = %self.storage.path().display(),
            scope = ?self.config.scope,
            interval_secs = self.config.cycle_interval_secs,
            "Monitoramento iniciado"
        );

        let mut cycle_number = 0;
        loop {
            cycle_number += 1;
            info!("[CICLO {}] Iniciando ciclo em {}.", cycle_number, Utc::now());

            match self.run_cycle(cycle_number).await {
                Some(report) => match serde_json::to_string(&report) {
                    Ok(summary) => info!("[CICLO {}] Fim do ciclo: {}", cycle_number, summary),
                    Err(_) => info!("[CICLO {}] Fim do ciclo: {:?}", cycle_number, report),
                },
                None => warn!("[CICLO {}] Ciclo abortado.", cycle_number),
            }

            if self.config.run_once || *shutdown.borrow() {
                break;
            }

            let interval = Duration::from_secs(self.config.cycle_interval_secs);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    // Emissor descartado: sem sinal de parada, só aguarda o intervalo.
                    if changed.is_err() {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("Monitoramento encerrado após {} ciclos.", cycle_number);
    }

    /// Um ciclo completo. Retorna `None` quando o ciclo é abortado
    /// (estado ilegível ou identidade local não resolvida).
    pub async fn run_cycle(&self, cycle_number: u64) -> Option<CycleReport> {
        let mut document = match self.storage.load_targets().await {
            Ok(document) => document,
            Err(e) => {
                self.report_error(cycle_number, &e);
                return None;
            }
        };

        let mut selected = match self.config.scope {
            Scope::All => std::mem::take(&mut document),
            Scope::Local => match self.select_local(&mut document) {
                Ok(selected) => selected,
                Err(e) => {
                    self.report_error(cycle_number, &e);
                    return None;
                }
            },
        };

        info!(
            "[CICLO {}] Executando pings para {} alvos...",
            cycle_number,
            selected.len()
        );
        let mut report = self
            .orchestrator
            .run_cycle(&mut selected, self.sink.as_ref())
            .await;
        report.cycle_number = cycle_number;

        // Documento sobrescrito por inteiro, incluindo entradas não monitoradas.
        document.extend(selected);
        if let Err(e) = self.storage.save_targets(&document).await {
            self.report_error(cycle_number, &e);
        }

        Some(report)
    }

    fn select_local(&self, document: &mut Targets) -> Result<Targets, MonitorError> {
        let hostname = resolve_identity(&self.config)?;
        let (hostname, target) = document.remove_entry(&hostname).ok_or_else(|| {
            MonitorError::IdentityResolution(format!("hostname {} not present in state file", hostname))
        })?;
        Ok(Targets::from([(hostname, target)]))
    }

    fn report_error(&self, cycle_number: u64, e: &MonitorError) {
        error!("[CICLO {}] {}", cycle_number, e);
        self.sink.critical(&e.to_string());
    }
}
