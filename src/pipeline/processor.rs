//! Pipeline orchestrator.
//!
//! Per message:
//! `Received → DedupCheck → GlobalEnableCheck → Extract → ModeResolve → Dispatch → Done`.
//! Any failed guard ends the run. Nothing is retried; the next message
//! gets a fresh run.

use std::sync::Arc;

use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::config::Timings;
use crate::interactive::InteractiveHandle;
use crate::logging::loggable;
use crate::pipeline::dedup::DedupGuard;
use crate::pipeline::dispatcher::ActionDispatcher;
use crate::pipeline::mode::ModeResolver;
use crate::pipeline::types::{ExtractedCode, InboundMessage, RunOutcome};
use crate::settings::SettingsProvider;
use crate::store::traits::DedupStore;

/// Everything a [`Pipeline`] needs besides the interactive context.
pub struct PipelineDeps {
    pub settings: Arc<dyn SettingsProvider>,
    pub dedup_store: Arc<dyn DedupStore>,
    pub collaborators: Collaborators,
    /// Identifier handed to `activate_agent`.
    pub agent_id: String,
    pub timings: Timings,
}

/// Stateless between runs apart from the persisted dedup record.
pub struct Pipeline {
    settings: Arc<dyn SettingsProvider>,
    dedup: DedupGuard,
    collaborators: Collaborators,
    dispatcher: ActionDispatcher,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, interactive: InteractiveHandle) -> Self {
        let PipelineDeps {
            settings,
            dedup_store,
            collaborators,
            agent_id,
            timings,
        } = deps;

        let dispatcher =
            ActionDispatcher::new(collaborators.clone(), interactive, agent_id, timings);
        Self {
            settings,
            dedup: DedupGuard::new(dedup_store, timings.dedup_window),
            collaborators,
            dispatcher,
        }
    }

    /// Run one message through the pipeline.
    pub async fn process(&self, message: &InboundMessage) -> RunOutcome {
        let outcome = self.run(message).await;
        debug!(outcome = outcome.label(), "Pipeline run finished");
        outcome
    }

    async fn run(&self, message: &InboundMessage) -> RunOutcome {
        if !self.dedup.should_process(message).await {
            info!(timestamp_ms = message.epoch_ms(), "Duplicate message ignored");
            return RunOutcome::Duplicate;
        }

        let settings = self.settings.snapshot();
        if !settings.enabled {
            debug!("Relay disabled, skipping message");
            return RunOutcome::Disabled;
        }

        info!(
            sender = %loggable(&message.sender, settings.verbose_log),
            body = %loggable(&message.body, settings.verbose_log),
            "Processing message"
        );

        if message.body.is_empty() {
            debug!("Empty message body");
            return RunOutcome::EmptyBody;
        }

        let Some(code) = self
            .collaborators
            .extractor
            .extract(&message.body)
            .and_then(ExtractedCode::new)
        else {
            debug!("No verification code found");
            return RunOutcome::NoCode;
        };

        let strategy = ModeResolver::resolve(&settings);
        info!(
            code = %loggable(code.as_str(), settings.verbose_log),
            strategy = strategy.label(),
            "Verification code extracted"
        );

        self.dispatcher
            .dispatch(&code, strategy, &settings, message)
            .await;

        RunOutcome::Dispatched { code, strategy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::collaborators::{
        AutoFillChannel, ClipboardSink, Notifier, PatternExtractor, PrivilegedInputSink,
    };
    use crate::error::CollaboratorError;
    use crate::interactive::InteractiveContext;
    use crate::pipeline::mode::Strategy;
    use crate::settings::{Settings, SharedSettings};
    use crate::store::memory::{MemoryDedupStore, MemoryMessageStore};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Recorder {
        fn push(&self, s: String) {
            self.0.lock().unwrap().push(s);
        }
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct Sink(Arc<Recorder>);

    #[async_trait]
    impl ClipboardSink for Sink {
        async fn write(&self, text: &str) -> Result<(), CollaboratorError> {
            self.0.push(format!("copy:{text}"));
            Ok(())
        }
        async fn clear(&self) -> Result<(), CollaboratorError> {
            self.0.push("clear".into());
            Ok(())
        }
    }

    impl Notifier for Sink {
        fn announce(&self, text: &str) -> Result<(), CollaboratorError> {
            self.0.push(format!("toast:{text}"));
            Ok(())
        }
    }

    impl AutoFillChannel for Sink {
        fn request_fill(&self, code: &str) {
            self.0.push(format!("fill:{code}"));
        }
    }

    #[async_trait]
    impl PrivilegedInputSink for Sink {
        async fn type_text(&self, code: &str) -> Result<(), CollaboratorError> {
            self.0.push(format!("type:{code}"));
            Ok(())
        }
        async fn activate_agent(&self, agent_id: &str) -> Result<(), CollaboratorError> {
            self.0.push(format!("activate:{agent_id}"));
            Ok(())
        }
    }

    struct Fixture {
        pipeline: Pipeline,
        settings: Arc<SharedSettings>,
        dedup: Arc<MemoryDedupStore>,
        recorder: Arc<Recorder>,
        ctx: InteractiveContext,
    }

    fn fixture() -> Fixture {
        let recorder = Arc::new(Recorder::default());
        let settings = Arc::new(SharedSettings::new(Settings {
            show_toast: false,
            ..Settings::default()
        }));
        let dedup = Arc::new(MemoryDedupStore::new());
        let collaborators = Collaborators {
            extractor: Arc::new(PatternExtractor::new(Vec::<String>::new()).unwrap()),
            clipboard: Arc::new(Sink(recorder.clone())),
            notifier: Arc::new(Sink(recorder.clone())),
            auto_fill: Arc::new(Sink(recorder.clone())),
            privileged: Arc::new(Sink(recorder.clone())),
            store: Arc::new(MemoryMessageStore::new()),
        };
        let ctx = InteractiveContext::spawn("test");
        let pipeline = Pipeline::new(
            PipelineDeps {
                settings: settings.clone(),
                dedup_store: dedup.clone(),
                collaborators,
                agent_id: "agent".into(),
                timings: Timings::default(),
            },
            ctx.handle(),
        );
        Fixture {
            pipeline,
            settings,
            dedup,
            recorder,
            ctx,
        }
    }

    fn msg(body: &str, ms: i64) -> InboundMessage {
        InboundMessage::from_epoch_ms("10086", body, ms)
    }

    #[tokio::test]
    async fn code_is_dispatched() {
        let f = fixture();
        let outcome = f
            .pipeline
            .process(&msg("Your code is 483920, valid 5 min", 1_000))
            .await;
        assert_eq!(
            outcome,
            RunOutcome::Dispatched {
                code: ExtractedCode::new("483920").unwrap(),
                strategy: Strategy::Disabled,
            }
        );
        f.ctx.handle().wait_idle().await;
        assert_eq!(f.recorder.take(), vec!["copy:483920"]);
    }

    #[tokio::test]
    async fn disabled_relay_still_records_dedup_state() {
        let f = fixture();
        f.settings.update(|s| s.enabled = false);

        let outcome = f.pipeline.process(&msg("code 1234", 1_000)).await;
        assert_eq!(outcome, RunOutcome::Disabled);
        assert_eq!(f.dedup.current().unwrap().last_timestamp_ms, 1_000);
        f.ctx.handle().wait_idle().await;
        assert!(f.recorder.take().is_empty());
    }

    #[tokio::test]
    async fn empty_body_ends_run() {
        let f = fixture();
        assert_eq!(f.pipeline.process(&msg("", 1_000)).await, RunOutcome::EmptyBody);
    }

    #[tokio::test]
    async fn whitespace_body_reaches_extractor() {
        let f = fixture();
        assert_eq!(f.pipeline.process(&msg("   ", 1_000)).await, RunOutcome::NoCode);
    }

    #[tokio::test]
    async fn no_code_ends_run_and_still_counts_for_dedup() {
        let f = fixture();
        assert_eq!(
            f.pipeline.process(&msg("hello there", 1_000)).await,
            RunOutcome::NoCode
        );
        assert_eq!(
            f.pipeline.process(&msg("code 1234", 2_000)).await,
            RunOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn settings_are_read_per_run() {
        let f = fixture();
        f.pipeline.process(&msg("code 1111", 1_000)).await;

        f.settings.update(|s| s.auto_fill = true);
        let outcome = f.pipeline.process(&msg("code 2222", 10_000)).await;
        assert!(matches!(
            outcome,
            RunOutcome::Dispatched {
                strategy: Strategy::AccessibilityAutoFill,
                ..
            }
        ));
        f.ctx.handle().wait_idle().await;
        assert_eq!(
            f.recorder.take(),
            vec!["copy:1111", "copy:2222", "fill:2222"]
        );
    }
}
