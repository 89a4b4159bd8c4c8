use metrics_exporter_prometheus::PrometheusHandle;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use talent_pipeline::error::AppError;
use talent_pipeline::workflows::hiring::{
    DocumentError, DocumentRef, DocumentStore, NotificationError, NotificationPublisher,
    OfferLetter, OfferNotification, StaticDirectory,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Stand-in transport: logs every offer notification and keeps a copy for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationPublisher {
    events: Arc<Mutex<Vec<OfferNotification>>>,
}

impl NotificationPublisher for LoggingNotificationPublisher {
    fn publish(&self, notification: OfferNotification) -> Result<(), NotificationError> {
        info!(
            template = notification.kind.template(),
            offer_id = %notification.offer_id,
            recipient = %notification.recipient_email,
            "offer notification dispatched"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox lock poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl LoggingNotificationPublisher {
    pub(crate) fn events(&self) -> Vec<OfferNotification> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Issues letter references under a local prefix; rendering itself is external.
#[derive(Debug, Clone)]
pub(crate) struct LocalDocumentStore {
    prefix: String,
}

impl Default for LocalDocumentStore {
    fn default() -> Self {
        Self {
            prefix: "offer-letters".to_string(),
        }
    }
}

impl DocumentStore for LocalDocumentStore {
    fn render_offer_letter(&self, letter: &OfferLetter) -> Result<DocumentRef, DocumentError> {
        if letter.template_id.as_str().trim().is_empty() {
            return Err(DocumentError::UnknownTemplate(letter.template_id.to_string()));
        }
        Ok(DocumentRef(format!(
            "{}/{}/{}.pdf",
            self.prefix, letter.template_id, letter.offer_id
        )))
    }
}

pub(crate) fn seeded_directory() -> StaticDirectory {
    StaticDirectory::default()
        .with_department("dept-engineering")
        .with_department("dept-people")
        .with_position("pos-backend")
        .with_position("pos-recruiter")
        .with_principal("usr-hiring-manager")
        .with_principal("usr-interviewer")
}

pub(crate) fn load_directory(path: &Path) -> Result<StaticDirectory, AppError> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|source| AppError::Directory {
        path: path.to_path_buf(),
        source,
    })
}
