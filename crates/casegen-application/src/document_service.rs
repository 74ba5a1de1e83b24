//! Registry of document controllers.
//!
//! One `DocumentController` exists per requirement; controllers are created
//! on first access and share the transport, repository and event channel.
//! Every notice on the shared channel names its requirement and exchange.

use crate::document_controller::DocumentController;
use casegen_core::config::ClientConfig;
use casegen_core::error::Result;
use casegen_core::generation::{DocumentNotice, StreamTransport};
use casegen_core::requirement::{RequirementDetails, RequirementRef};
use casegen_core::version::HistoryRepository;
use casegen_infrastructure::HttpHistoryRepository;
use casegen_interaction::HttpStreamTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

pub struct DocumentService {
    transport: Arc<dyn StreamTransport>,
    repository: Arc<dyn HistoryRepository>,
    events: mpsc::UnboundedSender<DocumentNotice>,
    /// In-memory controller registry
    controllers: Arc<RwLock<HashMap<RequirementRef, Arc<DocumentController>>>>,
}

impl DocumentService {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        repository: Arc<dyn HistoryRepository>,
        events: mpsc::UnboundedSender<DocumentNotice>,
    ) -> Self {
        Self {
            transport,
            repository,
            events,
            controllers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a service talking to the configured remote service.
    pub fn from_config(
        config: &ClientConfig,
        events: mpsc::UnboundedSender<DocumentNotice>,
    ) -> Result<Self> {
        tracing::info!("[DocumentService] Using service at {}", config.base_url);
        Ok(Self::new(
            Arc::new(HttpStreamTransport::new(config)?),
            Arc::new(HttpHistoryRepository::new(config)?),
            events,
        ))
    }

    /// Gets the controller of a requirement, creating it if needed.
    ///
    /// `details` are only used when the controller is created.
    pub async fn controller(
        &self,
        requirement: &RequirementRef,
        details: RequirementDetails,
    ) -> Arc<DocumentController> {
        if let Some(existing) = self.get(requirement).await {
            return existing;
        }

        let mut controllers = self.controllers.write().await;
        controllers
            .entry(requirement.clone())
            .or_insert_with(|| {
                tracing::debug!("[DocumentService] Creating controller for {}", requirement);
                Arc::new(DocumentController::new(
                    requirement.clone(),
                    details,
                    self.transport.clone(),
                    self.repository.clone(),
                    self.events.clone(),
                ))
            })
            .clone()
    }

    /// Gets an existing controller.
    pub async fn get(&self, requirement: &RequirementRef) -> Option<Arc<DocumentController>> {
        let controllers = self.controllers.read().await;
        controllers.get(requirement).cloned()
    }

    /// Drops a controller after cancelling its session.
    pub async fn remove(&self, requirement: &RequirementRef) {
        let removed = self.controllers.write().await.remove(requirement);
        if let Some(controller) = removed {
            controller.cancel_active().await;
        }
    }

    /// Cancels every running session.
    pub async fn cancel_all(&self) {
        let controllers: Vec<_> = self.controllers.read().await.values().cloned().collect();
        for controller in controllers {
            controller.cancel_active().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegen_core::frame::StreamFrame;
    use casegen_core::generation::{DocumentEvent, FormatKind, FormatOptions, GenerationPrompt};
    use casegen_infrastructure::InMemoryHistoryRepository;
    use casegen_interaction::ChannelTransport;

    fn service() -> DocumentService {
        let (tx, _rx) = mpsc::unbounded_channel();
        DocumentService::new(
            Arc::new(ChannelTransport::new()),
            Arc::new(InMemoryHistoryRepository::new()),
            tx,
        )
    }

    #[tokio::test]
    async fn test_controller_is_created_once_per_requirement() {
        let service = service();
        let login = RequirementRef::new("p1", "login");

        let first = service.controller(&login, RequirementDetails::default()).await;
        let second = service
            .controller(
                &login,
                RequirementDetails {
                    title: "ignored".into(),
                    description: String::new(),
                },
            )
            .await;
        let other = service
            .controller(&RequirementRef::new("p1", "logout"), RequirementDetails::default())
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(second.details().title, "");
    }

    #[tokio::test]
    async fn test_remove_forgets_controller() {
        let service = service();
        let login = RequirementRef::new("p1", "login");
        service.controller(&login, RequirementDetails::default()).await;

        service.remove(&login).await;

        assert!(service.get(&login).await.is_none());
    }

    #[tokio::test]
    async fn test_notices_name_their_requirement_and_exchange() {
        let transport = Arc::new(ChannelTransport::new());
        for text in ["login cases", "logout cases"] {
            transport.push_frames(vec![
                StreamFrame::TextChunk { text: text.into() },
                StreamFrame::End,
            ]);
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = DocumentService::new(
            transport.clone(),
            Arc::new(InMemoryHistoryRepository::new()),
            tx,
        );
        let login = RequirementRef::new("p1", "login");
        let logout = RequirementRef::new("p1", "logout");

        for requirement in [&login, &logout] {
            service
                .controller(requirement, RequirementDetails::default())
                .await
                .generate(
                    GenerationPrompt::new("Users log in", "Web shop"),
                    FormatOptions::new(FormatKind::Default),
                )
                .await
                .unwrap();
        }

        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        let chunk_of = |requirement: &RequirementRef| {
            notices
                .iter()
                .find_map(|n| match &n.event {
                    DocumentEvent::ChunkReceived { text, .. } if &n.requirement == requirement => {
                        Some((text.clone(), n.exchange_id))
                    }
                    _ => None,
                })
                .unwrap()
        };
        let (login_text, login_exchange) = chunk_of(&login);
        let (logout_text, logout_exchange) = chunk_of(&logout);

        assert_eq!(login_text, "login cases");
        assert_eq!(logout_text, "logout cases");
        assert!(login_exchange.is_some());
        assert_ne!(login_exchange, logout_exchange);
        assert!(notices.iter().all(|n| n.requirement == login || n.requirement == logout));
        let login_exchanges: Vec<_> = notices
            .iter()
            .filter(|n| n.requirement == login)
            .map(|n| n.exchange_id)
            .collect();
        assert!(login_exchanges.iter().all(|id| *id == login_exchange));
    }
}
