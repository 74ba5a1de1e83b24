use casegen_core::generation::{DocumentEvent, DocumentNotice, ExchangeKind};
use std::io::Write;
use tokio::sync::mpsc;

/// Prints streamed text to stdout and status lines to stderr.
///
/// `Error` events are skipped: failures are reported by the command itself.
pub async fn print_events(mut notices: mpsc::UnboundedReceiver<DocumentNotice>) {
    let mut stdout = std::io::stdout();
    while let Some(DocumentNotice { event, .. }) = notices.recv().await {
        match event {
            DocumentEvent::Started { kind } => eprintln!("{}...", label(kind)),
            DocumentEvent::ChunkReceived { text, .. } => {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
            DocumentEvent::DocumentReplaced {
                version_id, origin, ..
            } => eprintln!("\nSaved version {} ({})", version_id, origin.label()),
            DocumentEvent::VersionAppended { version_id } => eprintln!(
                "\nStored version {version_id}; a newer edit stays active"
            ),
            DocumentEvent::SaveFailed { message } => {
                eprintln!("\nWarning: history not saved: {message}")
            }
            DocumentEvent::Error { .. } => {}
            DocumentEvent::Done { .. } => {
                let _ = writeln!(stdout);
            }
            DocumentEvent::Cancelled { kind } => eprintln!("\n{} cancelled", label(kind)),
        }
    }
}

fn label(kind: ExchangeKind) -> &'static str {
    match kind {
        ExchangeKind::Generation => "Generating",
        ExchangeKind::Conversation => "Asking the assistant",
    }
}
