mod alarm;
mod classifier;
mod config;
mod error;
mod ping;
mod scan;
mod scheduler;
mod storage;
mod tracker;
mod types;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing), padrão `info`
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Carrega a configuração da aplicação (Arc para compartilhamento seguro)
    let config: Arc<config::Config> = Arc::new(config::Config::load()?);
    info!(?config, "Configuração carregada");

    // Sessão de transporte: falhar aqui encerra a execução
    let prober: Arc<ping::IcmpProber> = Arc::new(ping::IcmpProber::open(config.ping_timeout_secs)?);

    // Ctrl-C: o ciclo em andamento termina antes de sair
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Sinal de parada recebido, encerrando após o ciclo atual");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Falha ao registrar handler de Ctrl-C: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let monitor = scheduler::Monitor::new(config, prober, Arc::new(alarm::TracingSink));
    monitor.run(shutdown_rx).await;

    Ok(())
}
