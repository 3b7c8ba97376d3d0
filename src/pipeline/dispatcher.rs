//! Side-effect sequencing for an extracted code.
//!
//! Order within one run:
//! 1. agent activation + grace wait (privileged strategy, auto focus; worker)
//! 2. clipboard copy, toast, fill (one job on the interactive context)
//! 3. mark-read / delete (delayed job on the interactive context)
//!
//! Every step tolerates failure of the steps before it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collaborators::Collaborators;
use crate::config::Timings;
use crate::interactive::InteractiveHandle;
use crate::logging::loggable;
use crate::pipeline::matcher::MessageMatcher;
use crate::pipeline::mode::{ModeResolver, Strategy};
use crate::pipeline::types::{ExtractedCode, InboundMessage, MatchCriteria, StoreOp};
use crate::settings::Settings;

pub struct ActionDispatcher {
    collaborators: Collaborators,
    matcher: MessageMatcher,
    interactive: InteractiveHandle,
    agent_id: String,
    timings: Timings,
}

impl ActionDispatcher {
    pub fn new(
        collaborators: Collaborators,
        interactive: InteractiveHandle,
        agent_id: impl Into<String>,
        timings: Timings,
    ) -> Self {
        let matcher = MessageMatcher::new(Arc::clone(&collaborators.store))
            .with_search_limit(timings.match_search_limit);
        Self {
            collaborators,
            matcher,
            interactive,
            agent_id: agent_id.into(),
            timings,
        }
    }

    /// Run the side effects for `code`. Nothing is reported back; outcomes
    /// show up in logs and the user-visible confirmation only.
    pub async fn dispatch(
        &self,
        code: &ExtractedCode,
        strategy: Strategy,
        settings: &Settings,
        message: &InboundMessage,
    ) {
        if ModeResolver::requires_agent_activation(settings) {
            self.activate_agent().await;
        }

        self.submit_interactive(code, strategy, settings);

        if let Some(op) = StoreOp::from_flags(settings.delete_on_success, settings.mark_as_read) {
            let matcher = self.matcher.clone();
            let criteria = MatchCriteria::for_message(message);
            debug!(
                op = op.label(),
                delay_ms = self.timings.housekeeping_delay.as_millis() as u64,
                "Scheduling housekeeping"
            );
            self.interactive
                .submit_after(self.timings.housekeeping_delay, async move {
                    matcher.operate_on_match(&criteria, op).await;
                });
        }
    }

    /// Start the focus agent with privilege. The grace wait blocks this
    /// run only, and only after a successful activation.
    async fn activate_agent(&self) {
        match self
            .collaborators
            .privileged
            .activate_agent(&self.agent_id)
            .await
        {
            Ok(()) => {
                info!(
                    agent = %self.agent_id,
                    grace_ms = self.timings.agent_grace_period.as_millis() as u64,
                    "Focus agent activated"
                );
                tokio::time::sleep(self.timings.agent_grace_period).await;
            }
            Err(e) => {
                warn!(
                    agent = %self.agent_id,
                    error = %e,
                    "Focus agent activation failed, broadcasting anyway"
                );
            }
        }
    }

    fn submit_interactive(&self, code: &ExtractedCode, strategy: Strategy, settings: &Settings) {
        let Collaborators {
            clipboard,
            notifier,
            auto_fill,
            privileged,
            ..
        } = self.collaborators.clone();
        let code = code.clone();
        let show_toast = settings.show_toast;
        let clear_after_input = settings.clear_clipboard_after_input;
        let verbose = settings.verbose_log;

        let submitted = self.interactive.submit(async move {
            match clipboard.write(code.as_str()).await {
                Ok(()) => debug!(code = %loggable(code.as_str(), verbose), "Code copied"),
                Err(e) => warn!(error = %e, "Clipboard write failed"),
            }

            if show_toast {
                if let Err(e) = notifier.announce(&format!("Current verification code: {code}")) {
                    warn!(error = %e, "Toast failed");
                }
            }

            match strategy {
                Strategy::Disabled => {}
                Strategy::AccessibilityAutoFill => {
                    auto_fill.request_fill(code.as_str());
                    debug!("Auto-fill request sent");
                }
                Strategy::PrivilegedKeystroke => match privileged.type_text(code.as_str()).await {
                    Ok(()) => {
                        info!("Code typed with privileged input");
                        if clear_after_input {
                            if let Err(e) = clipboard.clear().await {
                                warn!(error = %e, "Clipboard clear failed");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Privileged input failed, code left on clipboard");
                    }
                },
            }
        });

        if !submitted {
            warn!(strategy = strategy.label(), "Interactive context unavailable, code dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::collaborators::{
        AutoFillChannel, ClipboardSink, CodeExtractor, Notifier, PrivilegedInputSink,
    };
    use crate::error::CollaboratorError;
    use crate::interactive::InteractiveContext;
    use crate::settings::{FocusMode, InputStrategy};
    use crate::store::memory::MemoryMessageStore;

    type Events = Arc<Mutex<Vec<(String, Instant)>>>;

    fn record(events: &Events, event: impl Into<String>) {
        events.lock().unwrap().push((event.into(), Instant::now()));
    }

    fn names(events: &Events) -> Vec<String> {
        events.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    struct NoExtract;
    impl CodeExtractor for NoExtract {
        fn extract(&self, _body: &str) -> Option<String> {
            None
        }
    }

    struct MockClipboard {
        events: Events,
        ok: bool,
    }
    #[async_trait]
    impl ClipboardSink for MockClipboard {
        async fn write(&self, text: &str) -> Result<(), CollaboratorError> {
            record(&self.events, format!("copy:{text}"));
            if self.ok {
                Ok(())
            } else {
                Err(CollaboratorError::unavailable("clipboard", "no display"))
            }
        }
        async fn clear(&self) -> Result<(), CollaboratorError> {
            record(&self.events, "clear");
            Ok(())
        }
    }

    struct MockToast {
        events: Events,
        ok: bool,
    }
    impl Notifier for MockToast {
        fn announce(&self, text: &str) -> Result<(), CollaboratorError> {
            record(&self.events, format!("toast:{text}"));
            if self.ok {
                Ok(())
            } else {
                Err(CollaboratorError::unavailable("toast", "no notification service"))
            }
        }
    }

    struct MockFill(Events);
    impl AutoFillChannel for MockFill {
        fn request_fill(&self, code: &str) {
            record(&self.0, format!("fill:{code}"));
        }
    }

    struct MockPrivileged {
        events: Events,
        activation_ok: bool,
        typing_ok: bool,
    }
    #[async_trait]
    impl PrivilegedInputSink for MockPrivileged {
        async fn type_text(&self, code: &str) -> Result<(), CollaboratorError> {
            record(&self.events, format!("type:{code}"));
            if self.typing_ok {
                Ok(())
            } else {
                Err(CollaboratorError::denied("root", "not granted"))
            }
        }
        async fn activate_agent(&self, agent_id: &str) -> Result<(), CollaboratorError> {
            record(&self.events, format!("activate:{agent_id}"));
            if self.activation_ok {
                Ok(())
            } else {
                Err(CollaboratorError::failed("privileged shell", "exit code 1"))
            }
        }
    }

    struct Harness {
        dispatcher: ActionDispatcher,
        events: Events,
        store: Arc<MemoryMessageStore>,
        ctx: InteractiveContext,
    }

    /// Which collaborators succeed.
    struct Behaviour {
        clipboard_ok: bool,
        toast_ok: bool,
        activation_ok: bool,
        typing_ok: bool,
    }

    impl Default for Behaviour {
        fn default() -> Self {
            Self {
                clipboard_ok: true,
                toast_ok: true,
                activation_ok: true,
                typing_ok: true,
            }
        }
    }

    fn harness(activation_ok: bool, typing_ok: bool) -> Harness {
        harness_with(Behaviour {
            activation_ok,
            typing_ok,
            ..Behaviour::default()
        })
    }

    fn harness_with(behaviour: Behaviour) -> Harness {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryMessageStore::new());
        let collaborators = Collaborators {
            extractor: Arc::new(NoExtract),
            clipboard: Arc::new(MockClipboard {
                events: events.clone(),
                ok: behaviour.clipboard_ok,
            }),
            notifier: Arc::new(MockToast {
                events: events.clone(),
                ok: behaviour.toast_ok,
            }),
            auto_fill: Arc::new(MockFill(events.clone())),
            privileged: Arc::new(MockPrivileged {
                events: events.clone(),
                activation_ok: behaviour.activation_ok,
                typing_ok: behaviour.typing_ok,
            }),
            store: store.clone(),
        };
        let ctx = InteractiveContext::spawn("test-interactive");
        let dispatcher =
            ActionDispatcher::new(collaborators, ctx.handle(), "agent/.Svc", Timings::default());
        Harness {
            dispatcher,
            events,
            store,
            ctx,
        }
    }

    fn message() -> InboundMessage {
        InboundMessage::from_epoch_ms("10086", "Your code is 483920, valid 5 min", 1_000)
    }

    fn code() -> ExtractedCode {
        ExtractedCode::new("483920").unwrap()
    }

    fn settings(f: impl FnOnce(&mut Settings)) -> Settings {
        let mut s = Settings {
            show_toast: false,
            ..Settings::default()
        };
        f(&mut s);
        s
    }

    #[tokio::test]
    async fn disabled_strategy_only_copies() {
        let h = harness(true, true);
        let s = settings(|_| {});
        h.dispatcher
            .dispatch(&code(), Strategy::Disabled, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(names(&h.events), vec!["copy:483920"]);
    }

    #[tokio::test]
    async fn toast_follows_copy() {
        let h = harness(true, true);
        let s = settings(|s| s.show_toast = true);
        h.dispatcher
            .dispatch(&code(), Strategy::Disabled, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(
            names(&h.events),
            vec!["copy:483920", "toast:Current verification code: 483920"]
        );
    }

    #[tokio::test]
    async fn accessibility_sends_fill_request() {
        let h = harness(true, true);
        let s = settings(|s| s.auto_fill = true);
        h.dispatcher
            .dispatch(&code(), Strategy::AccessibilityAutoFill, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(names(&h.events), vec!["copy:483920", "fill:483920"]);
    }

    #[tokio::test]
    async fn keystroke_success_clears_clipboard_when_asked() {
        let h = harness(true, true);
        let s = settings(|s| {
            s.auto_fill = true;
            s.input_strategy = InputStrategy::Privileged;
            s.focus_mode = FocusMode::Manual;
            s.clear_clipboard_after_input = true;
        });
        h.dispatcher
            .dispatch(&code(), Strategy::PrivilegedKeystroke, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(
            names(&h.events),
            vec!["copy:483920", "type:483920", "clear"]
        );
    }

    #[tokio::test]
    async fn keystroke_failure_leaves_clipboard() {
        let h = harness(true, false);
        let s = settings(|s| {
            s.auto_fill = true;
            s.input_strategy = InputStrategy::Privileged;
            s.focus_mode = FocusMode::Manual;
            s.clear_clipboard_after_input = true;
        });
        h.dispatcher
            .dispatch(&code(), Strategy::PrivilegedKeystroke, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(names(&h.events), vec!["copy:483920", "type:483920"]);
    }

    #[tokio::test]
    async fn clipboard_failure_still_announces_and_fills() {
        let h = harness_with(Behaviour {
            clipboard_ok: false,
            ..Behaviour::default()
        });
        let s = settings(|s| {
            s.auto_fill = true;
            s.show_toast = true;
        });
        h.dispatcher
            .dispatch(&code(), Strategy::AccessibilityAutoFill, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(
            names(&h.events),
            vec![
                "copy:483920",
                "toast:Current verification code: 483920",
                "fill:483920",
            ]
        );
    }

    #[tokio::test]
    async fn clipboard_failure_still_types_the_code() {
        let h = harness_with(Behaviour {
            clipboard_ok: false,
            ..Behaviour::default()
        });
        let s = settings(|s| {
            s.auto_fill = true;
            s.show_toast = true;
            s.input_strategy = InputStrategy::Privileged;
            s.focus_mode = FocusMode::Manual;
        });
        h.dispatcher
            .dispatch(&code(), Strategy::PrivilegedKeystroke, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(
            names(&h.events),
            vec![
                "copy:483920",
                "toast:Current verification code: 483920",
                "type:483920",
            ]
        );
    }

    #[tokio::test]
    async fn toast_failure_still_fills() {
        let h = harness_with(Behaviour {
            toast_ok: false,
            ..Behaviour::default()
        });
        let s = settings(|s| {
            s.auto_fill = true;
            s.show_toast = true;
        });
        h.dispatcher
            .dispatch(&code(), Strategy::AccessibilityAutoFill, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;
        assert_eq!(
            names(&h.events),
            vec![
                "copy:483920",
                "toast:Current verification code: 483920",
                "fill:483920",
            ]
        );
    }

    fn privileged_auto() -> Settings {
        settings(|s| {
            s.auto_fill = true;
            s.input_strategy = InputStrategy::Privileged;
            s.focus_mode = FocusMode::Auto;
        })
    }

    #[tokio::test(start_paused = true)]
    async fn successful_activation_waits_grace_period() {
        let h = harness(true, true);
        let start = Instant::now();
        h.dispatcher
            .dispatch(&code(), Strategy::AccessibilityAutoFill, &privileged_auto(), &message())
            .await;
        h.ctx.handle().wait_idle().await;

        assert_eq!(
            names(&h.events),
            vec!["activate:agent/.Svc", "copy:483920", "fill:483920"]
        );
        let events = h.events.lock().unwrap();
        let fill_at = events[2].1;
        assert!(fill_at - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_activation_broadcasts_without_waiting() {
        let h = harness(false, true);
        let start = Instant::now();
        h.dispatcher
            .dispatch(&code(), Strategy::AccessibilityAutoFill, &privileged_auto(), &message())
            .await;
        h.ctx.handle().wait_idle().await;

        assert_eq!(
            names(&h.events),
            vec!["activate:agent/.Svc", "copy:483920", "fill:483920"]
        );
        let events = h.events.lock().unwrap();
        assert!(events[2].1 - start < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn housekeeping_runs_after_copy_and_delay() {
        let h = harness(true, true);
        let id = h.store.push("10086", "Your code is 483920, valid 5 min", 1_000);
        let s = settings(|s| s.delete_on_success = true);

        let start = Instant::now();
        h.dispatcher
            .dispatch(&code(), Strategy::Disabled, &s, &message())
            .await;
        assert!(h.store.get(&id).is_some());

        h.ctx.handle().wait_idle().await;
        assert!(h.store.get(&id).is_none());
        assert!(Instant::now() - start >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_read_when_delete_disabled() {
        let h = harness(true, true);
        let id = h.store.push("10086", "Your code is 483920, valid 5 min", 1_000);
        let s = settings(|s| s.mark_as_read = true);

        h.dispatcher
            .dispatch(&code(), Strategy::Disabled, &s, &message())
            .await;
        h.ctx.handle().wait_idle().await;

        let entry = h.store.get(&id).unwrap();
        assert!(!entry.unread);
    }
}
