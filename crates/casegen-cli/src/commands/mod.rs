pub mod document;
pub mod history;
mod render;

use anyhow::{Context, Result};
use casegen_application::{DocumentController, DocumentService};
use casegen_core::config::ClientConfig;
use casegen_core::requirement::{RequirementDetails, RequirementRef};
use casegen_core::version::VersionId;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Requirement selected on the command line.
pub struct Target {
    pub project: String,
    pub requirement: String,
    pub title: String,
}

/// Reads `@path` arguments from a file and returns anything else unchanged.
pub fn read_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}")),
        None => Ok(value.to_string()),
    }
}

/// A controller wired to the remote service, with its events printed as they
/// arrive.
pub struct Workspace {
    pub controller: Arc<DocumentController>,
    service: DocumentService,
    printer: JoinHandle<()>,
}

impl Workspace {
    pub async fn open(config: &ClientConfig, target: &Target, description: String) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = DocumentService::from_config(config, tx)?;
        let requirement = RequirementRef::new(&target.project, &target.requirement);
        let controller = service
            .controller(
                &requirement,
                RequirementDetails {
                    title: target.title.clone(),
                    description,
                },
            )
            .await;

        Ok(Self {
            controller,
            service,
            printer: tokio::spawn(render::print_events(rx)),
        })
    }

    /// Activates `version` when given.
    pub async fn select(&self, version: Option<&str>) -> Result<()> {
        if let Some(version) = version {
            self.controller.set_active(&VersionId::from(version)).await?;
        }
        Ok(())
    }

    /// Runs an operation; Ctrl-C cancels the session in flight.
    pub async fn until_interrupted<F: Future>(&self, operation: F) -> F::Output {
        tokio::pin!(operation);
        loop {
            tokio::select! {
                output = &mut operation => return output,
                _ = tokio::signal::ctrl_c() => {
                    self.controller.cancel_active().await;
                }
            }
        }
    }

    /// Waits until every event has been printed.
    pub async fn finish(self) {
        let Self {
            controller,
            service,
            printer,
        } = self;
        drop(controller);
        drop(service);
        if let Err(err) = printer.await {
            tracing::warn!("[Workspace] event printer stopped: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_arg_reads_at_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "Users log in").unwrap();

        let arg = format!("@{}", path.display());
        assert_eq!(read_arg(&arg).unwrap(), "Users log in");
        assert_eq!(read_arg("inline text").unwrap(), "inline text");
        assert!(read_arg("@/nonexistent/casegen/file").is_err());
    }
}
