//! Update dispatch: commands, file messages and the long-poll loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use driveferry_core::Notifier;
use driveferry_services::{messages, render_history, JobReport, UploadJob, UploadLedger, UploadOrchestrator};
use driveferry_telegram::{Message, TelegramClient};
use tokio::task::JoinSet;

/// Pause after a failed poll before asking again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Static facts shown in command replies
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub history_cap: usize,
    pub max_file_size_mb: u64,
    pub destination_label: &'static str,
}

/// Routes one inbound message to a command handler or an upload job.
pub struct Dispatcher {
    orchestrator: UploadOrchestrator,
    ledger: Arc<dyn UploadLedger>,
    notifier: Arc<dyn Notifier>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        orchestrator: UploadOrchestrator,
        ledger: Arc<dyn UploadLedger>,
        notifier: Arc<dyn Notifier>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            notifier,
            settings,
        }
    }

    /// Handle one message. Returns the job report when it carried a file.
    pub async fn handle(&self, message: Message) -> Option<JobReport> {
        if let Some(attachment) = message.attachment() {
            let job = UploadJob {
                file: attachment.into_inbound_file(),
                owner_id: message.sender_id(),
                chat_id: message.chat.id,
            };
            return Some(self.orchestrator.run(job).await);
        }

        if let Some(command) = message.command() {
            match command.name.as_str() {
                "start" => self.start(&message).await,
                "help" => self.help(message.chat.id).await,
                "myfiles" => self.my_files(message.chat.id).await,
                other => tracing::debug!(command = %other, "Ignoring unknown command"),
            }
        }

        None
    }

    async fn start(&self, message: &Message) {
        let first_name = message.from.as_ref().and_then(|u| u.first_name.as_deref());
        self.reply(message.chat.id, &messages::greeting(first_name)).await;
        self.help(message.chat.id).await;
    }

    async fn help(&self, chat_id: i64) {
        let text = messages::help(self.settings.max_file_size_mb, self.settings.destination_label);
        self.reply(chat_id, &text).await;
    }

    async fn my_files(&self, chat_id: i64) {
        let text = match self.ledger.list_all().await {
            Ok(entries) => render_history(&entries, self.settings.history_cap),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read upload history");
                "❌ Could not load the upload history. Please try again later.".to_string()
            }
        };
        self.reply(chat_id, &text).await;
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.notifier.send(chat_id, text).await {
            tracing::warn!(error = %e, chat_id, "Failed to send reply");
        }
    }
}

/// Long-poll for updates until `shutdown` resolves, one task per message.
///
/// Jobs already running when `shutdown` fires are awaited, not cancelled.
pub async fn poll_updates(
    client: &TelegramClient,
    dispatcher: Arc<Dispatcher>,
    timeout_secs: u64,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    let mut jobs = JoinSet::new();

    tracing::info!("Polling for updates");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = client.get_updates(offset, timeout_secs) => match result {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let Some(message) = update.message else {
                            continue;
                        };
                        let dispatcher = Arc::clone(&dispatcher);
                        jobs.spawn(async move {
                            dispatcher.handle(message).await;
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch updates, retrying");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        while let Some(finished) = jobs.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Message handler panicked");
            }
        }
    }

    if !jobs.is_empty() {
        tracing::info!(in_flight = jobs.len(), "Waiting for running uploads to finish");
    }
    while let Some(finished) = jobs.join_next().await {
        if let Err(e) = finished {
            tracing::error!(error = %e, "Message handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use driveferry_core::{ByteStream, FileSource, NotifyError, SourceError, StatusMessage};
    use driveferry_services::{JsonLedger, OrchestratorSettings, TransferEngine};
    use driveferry_storage::{LocalDestination, StaticTokenProvider};
    use std::sync::Mutex;

    struct StaticSource;

    #[async_trait]
    impl FileSource for StaticSource {
        async fn open(&self, _identifier: &str) -> Result<ByteStream, SourceError> {
            let chunks: Vec<Result<Bytes, SourceError>> = vec![Ok(Bytes::from_static(b"%PDF-1.7"))];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        texts: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: i64, text: &str) -> Result<StatusMessage, NotifyError> {
            let mut texts = self.texts.lock().unwrap();
            texts.push(text.to_string());
            Ok(StatusMessage {
                chat_id,
                message_id: texts.len() as i64,
            })
        }

        async fn edit(&self, _message: &StatusMessage, text: &str) -> Result<(), NotifyError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        notifier: Arc<RecordingNotifier>,
        store: tempfile::TempDir,
        _work: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let work = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let ledger: Arc<dyn UploadLedger> = Arc::new(
            JsonLedger::open(work.path().join("uploaded_files.json"))
                .await
                .unwrap(),
        );
        let destination = LocalDestination::new(store.path(), None, 256 * 1024)
            .await
            .unwrap();
        let engine = TransferEngine::new(
            Arc::new(StaticSource),
            Arc::new(destination),
            work.path().join("staging"),
        );
        let orchestrator = UploadOrchestrator::new(
            Arc::new(StaticTokenProvider::anonymous()),
            engine,
            Arc::clone(&ledger),
            notifier.clone() as Arc<dyn Notifier>,
            OrchestratorSettings {
                max_file_size_bytes: 100 * 1024 * 1024,
                folder_id: None,
                progress_step_percent: 20,
            },
        );

        let dispatcher = Dispatcher::new(
            orchestrator,
            ledger,
            notifier.clone() as Arc<dyn Notifier>,
            DispatchSettings {
                history_cap: 25,
                max_file_size_mb: 100,
                destination_label: "local storage",
            },
        );

        Fixture {
            dispatcher,
            notifier,
            store,
            _work: work,
        }
    }

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    fn text_message(text: &str) -> Message {
        message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 9},
            "from": {"id": 77, "first_name": "Ada"},
            "text": text
        }))
    }

    fn document_message(size: u64) -> Message {
        message(serde_json::json!({
            "message_id": 2,
            "chat": {"id": 9},
            "from": {"id": 77, "first_name": "Ada"},
            "document": {
                "file_id": "BQACAgIAAx0",
                "file_unique_id": "AgADxx",
                "file_name": "report.pdf",
                "file_size": size,
                "mime_type": "application/pdf"
            }
        }))
    }

    #[tokio::test]
    async fn test_start_greets_and_shows_help() {
        let f = fixture().await;
        assert!(f.dispatcher.handle(text_message("/start")).await.is_none());

        let texts = f.notifier.texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "Hi Ada! 👋");
        assert!(texts[1].contains("100 MB"));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let f = fixture().await;
        f.dispatcher.handle(text_message("/myfiles")).await;
        assert_eq!(
            f.notifier.texts(),
            vec!["You haven't uploaded any files yet using this bot.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_plain_text_and_unknown_commands_are_ignored() {
        let f = fixture().await;
        f.dispatcher.handle(text_message("hello there")).await;
        f.dispatcher.handle(text_message("/unknown")).await;
        assert!(f.notifier.texts().is_empty());
    }

    #[tokio::test]
    async fn test_document_is_uploaded_and_listed() {
        let f = fixture().await;
        let report = f.dispatcher.handle(document_message(8)).await.unwrap();
        assert!(report.succeeded());

        let stored: Vec<_> = std::fs::read_dir(f.store.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].ends_with("-report.pdf"));

        f.dispatcher.handle(text_message("/myfiles@driveferry_bot")).await;
        let last = f.notifier.texts().pop().unwrap();
        assert!(last.contains("1. report.pdf - Link unavailable"));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_delay() {
        let mut server = mockito::Server::new_async().await;
        let polls = server
            .mock("POST", "/botTEST/getUpdates")
            .with_status(502)
            .with_body("Bad Gateway")
            .expect(1)
            .create_async()
            .await;

        let client = TelegramClient::new(server.url(), "TEST").unwrap();
        let f = fixture().await;
        let shutdown = tokio::time::sleep(Duration::from_millis(200));

        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            poll_updates(&client, Arc::new(f.dispatcher), 0, shutdown),
        )
        .await;

        assert!(stopped.is_ok(), "poll loop kept sleeping after shutdown");
        polls.assert_async().await;
    }

    #[tokio::test]
    async fn test_oversize_document_is_rejected() {
        let f = fixture().await;
        let report = f
            .dispatcher
            .handle(document_message(150 * 1024 * 1024))
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert!(f.notifier.texts()[0].contains("File Too Large"));
        assert_eq!(std::fs::read_dir(f.store.path()).unwrap().count(), 0);
    }
}
