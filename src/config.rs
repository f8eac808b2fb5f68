use config as config_crate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Thresholds;

/// Escopo de monitoramento de cada ciclo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Todos os hosts presentes no arquivo de estado.
    All,
    /// Apenas a entrada cujo hostname coincide com o do equipamento local.
    Local,
}

/// Configuração operacional do sistema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Arquivo YAML com destinos e contadores de eventos por host.
    pub state_file: PathBuf,
    /// Quantidade de pacotes enviados por ping.
    pub ping_count: u32,
    /// Timeout em segundos para cada pacote.
    pub ping_timeout_secs: u64,
    /// Limiar de RTT médio em milissegundos.
    pub rtt_threshold_ms: f64,
    /// Máximo de pacotes perdidos tolerados por ping.
    pub max_lost_packets: u32,
    /// Ciclos degradados consecutivos antes de disparar o alarme.
    pub max_events: u32,
    /// Janela citada no texto do alarme (somente informativa).
    pub alert_timeout_secs: u64,
    /// Intervalo entre ciclos em segundos.
    pub cycle_interval_secs: u64,
    /// Máximo de pings simultâneos.
    pub max_workers: usize,
    pub scope: Scope,
    /// Sobrescreve o hostname local (escopo `local`).
    pub hostname: Option<String>,
    /// Executa um único ciclo e encerra.
    pub run_once: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("destinos_telcel.yml"),
            ping_count: 50,
            ping_timeout_secs: 2,
            rtt_threshold_ms: 100.0,
            max_lost_packets: 0,
            max_events: 3,
            alert_timeout_secs: 900,
            cycle_interval_secs: 300,
            max_workers: 10,
            scope: Scope::All,
            hostname: None,
            run_once: false,
        }
    }
}

impl Config {
    /// Carrega `config.{toml,yaml,json}` (opcional) sobre os valores padrão,
    /// com sobrescritas por variáveis `MONITOR_*`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config_crate::Config::builder()
            .add_source(config_crate::Config::try_from(&Config::default())?)
            .add_source(config_crate::File::with_name("config").required(false))
            .add_source(config_crate::Environment::with_prefix("MONITOR"))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ping_count == 0 {
            return Err("ping_count deve ser maior que zero".into());
        }
        // Números de sequência ICMP têm 16 bits.
        if self.ping_count > u32::from(u16::MAX) {
            return Err(format!("ping_count deve ser no máximo {}", u16::MAX));
        }
        if self.ping_timeout_secs == 0 {
            return Err("ping_timeout_secs deve ser maior que zero".into());
        }
        if self.max_events == 0 {
            return Err("max_events deve ser maior que zero".into());
        }
        if self.max_workers == 0 {
            return Err("max_workers deve ser maior que zero".into());
        }
        if !self.rtt_threshold_ms.is_finite() || self.rtt_threshold_ms < 0.0 {
            return Err("rtt_threshold_ms deve ser um número não negativo".into());
        }
        if let Some(hostname) = &self.hostname {
            if hostname.trim().is_empty() {
                return Err("hostname não pode ser vazio".into());
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            max_lost_packets: self.max_lost_packets,
            rtt_threshold_ms: self.rtt_threshold_ms,
            max_events: self.max_events,
            alert_timeout_secs: self.alert_timeout_secs,
        }
    }
}
