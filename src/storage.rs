//! storage.rs — Persistência do estado (destinos + contador) em YAML
//!
//! O documento é lido no início de cada ciclo e sobrescrito por inteiro no
//! final. A escrita passa por um arquivo temporário irmão seguido de rename,
//! para que uma queda no meio da escrita não deixe o YAML truncado.

use crate::error::MonitorError;
use crate::types::Targets;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Resultado do diagnóstico de permissões do arquivo de estado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFileAccess {
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
}

pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Carrega todos os alvos. Documento vazio conta como erro: não há nada
    /// para monitorar neste ciclo.
    pub async fn load_targets(&self) -> Result<Targets, MonitorError> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.load_error(e.to_string()))?;

        let targets: Option<Targets> =
            serde_yaml::from_str(&content).map_err(|e| self.load_error(e.to_string()))?;

        match targets {
            Some(targets) if !targets.is_empty() => {
                debug!(path = %self.path.display(), hosts = targets.len(), "Estado carregado");
                Ok(targets)
            }
            _ => Err(self.load_error("document has no targets".into())),
        }
    }

    /// Sobrescreve o documento inteiro com o estado atualizado.
    pub async fn save_targets(&self, targets: &Targets) -> Result<(), MonitorError> {
        let content = serde_yaml::to_string(targets).map_err(|e| self.persist_error(e.to_string()))?;

        let tmp = self.tmp_path();
        fs::write(&tmp, content)
            .await
            .map_err(|e| self.persist_error(e.to_string()))?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.persist_error(e.to_string()));
        }

        debug!(path = %self.path.display(), hosts = targets.len(), "Estado persistido");
        Ok(())
    }

    /// Diagnóstico de inicialização: existência e permissões do arquivo.
    pub async fn check_permissions(&self) -> StateFileAccess {
        let path = self.path.display();
        let metadata = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                warn!(path = %path, "Arquivo de estado não existe");
                return StateFileAccess::default();
            }
        };

        let readable = fs::File::open(&self.path).await.is_ok();
        let writable = !metadata.permissions().readonly()
            && fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .await
                .is_ok();

        if readable && writable {
            info!(path = %path, "Permissões do arquivo de estado: leitura OK, escrita OK");
        } else {
            warn!(
                path = %path,
                readable, writable, "Permissões insuficientes no arquivo de estado"
            );
        }
        StateFileAccess {
            exists: true,
            readable,
            writable,
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load_error(&self, reason: String) -> MonitorError {
        MonitorError::StateLoad {
            path: self.path.clone(),
            reason,
        }
    }

    fn persist_error(&self, reason: String) -> MonitorError {
        MonitorError::Persistence {
            path: self.path.clone(),
            reason,
        }
    }
}
