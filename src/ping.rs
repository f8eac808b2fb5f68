//! ping.rs — Execução de um ping (ICMP echo) contra um destino
//!
//! Cada chamada abre o seu próprio cliente ICMP: nenhum socket com estado é
//! compartilhado entre tasks concorrentes.
//! Falhas de rede comuns (timeout, inalcançável, DNS) voltam como
//! `ProbeError`, nunca como pânico, para que o ciclo continue.

use crate::error::MonitorError;
use crate::types::ProbeResult;
use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use surge_ping::{Client, ICMP, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::time::Duration;
use trust_dns_resolver::TokioAsyncResolver;

/// Tamanho do payload ICMP (mesmo padrão do `ping` do sistema).
const PAYLOAD_SIZE: usize = 56;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("unable to resolve {destination}: {reason}")]
    Resolve { destination: String, reason: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("incomplete ping summary ({sent} sent, no replies): {reason}")]
    Incomplete { sent: u32, reason: String },

    #[error("probe task aborted: {0}")]
    Aborted(String),
}

/// Primitiva de ping consumida pelo orquestrador.
pub trait Prober: Send + Sync + 'static {
    fn probe(
        &self,
        destination: &str,
        count: u32,
    ) -> impl Future<Output = Result<ProbeResult, ProbeError>> + Send;
}

/// Prober de produção: resolve nomes via DNS e envia ICMP echo com surge-ping.
pub struct IcmpProber {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl IcmpProber {
    /// Abre a sessão de transporte. Falhar aqui é fatal para a execução
    /// (sem resolver ou sem permissão para sockets ICMP).
    pub fn open(timeout_secs: u64) -> Result<Self, MonitorError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| MonitorError::TransportSession(format!("DNS resolver: {}", e)))?;

        // Valida o acesso a sockets ICMP antes do primeiro ciclo.
        Client::new(&surge_ping::Config::default())
            .map_err(|e| MonitorError::TransportSession(format!("ICMP socket: {}", e)))?;

        Ok(Self {
            resolver,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    async fn resolve(&self, destination: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = destination.parse::<IpAddr>() {
            return Ok(ip);
        }
        let lookup = self
            .resolver
            .lookup_ip(destination)
            .await
            .map_err(|e| ProbeError::Resolve {
                destination: destination.to_string(),
                reason: e.to_string(),
            })?;
        lookup.iter().next().ok_or_else(|| ProbeError::Resolve {
            destination: destination.to_string(),
            reason: "no addresses returned".into(),
        })
    }
}

impl Prober for IcmpProber {
    async fn probe(&self, destination: &str, count: u32) -> Result<ProbeResult, ProbeError> {
        // Números de sequência ICMP têm 16 bits.
        let samples = u16::try_from(count).map_err(|_| {
            ProbeError::Transport(format!("ping count {} exceeds ICMP sequence space", count))
        })?;
        let ip = self.resolve(destination).await?;

        let config = match ip {
            IpAddr::V4(_) => surge_ping::Config::default(),
            IpAddr::V6(_) => surge_ping::Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(|e| ProbeError::Transport(e.to_string()))?;
        let mut pinger = client.pinger(ip, PingIdentifier(next_identifier())).await;
        pinger.timeout(self.timeout);

        let payload = [0u8; PAYLOAD_SIZE];
        let mut received = 0u32;
        let mut total = Duration::ZERO;
        let mut last_error = None;

        for seq in 0..samples {
            match pinger.ping(PingSequence(seq), &payload).await {
                Ok((_, rtt)) => {
                    received += 1;
                    total += rtt;
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        // Sem respostas não há RTT médio: resumo incompleto.
        if received == 0 {
            return Err(ProbeError::Incomplete {
                sent: count,
                reason: last_error.unwrap_or_else(|| "no samples sent".into()),
            });
        }

        Ok(ProbeResult {
            sent: count,
            received,
            avg_rtt_ms: total.as_secs_f64() * 1000.0 / f64::from(received),
        })
    }
}

/// Identificadores ICMP distintos por ping, para não misturar respostas
/// de destinos pingados em paralelo.
fn next_identifier() -> u16 {
    static NEXT: AtomicU16 = AtomicU16::new(0);
    (std::process::id() as u16).wrapping_add(NEXT.fetch_add(1, Ordering::Relaxed))
}
