use std::path::PathBuf;
use thiserror::Error;

/// Falhas de infraestrutura do monitoramento.
///
/// Todas são recuperadas no ponto onde ocorrem e convertidas em evento
/// crítico no sink, exceto `TransportSession`, que é fatal na inicialização.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("error reading state file {path}: {reason}")]
    StateLoad { path: PathBuf, reason: String },

    #[error("error writing state file {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("unable to resolve local identity: {0}")]
    IdentityResolution(String),

    #[error("unable to open probe transport: {0}")]
    TransportSession(String),
}
