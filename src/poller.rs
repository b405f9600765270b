//! Live chat poll loop.
//!
//! One cooperative task per poller: fetch new messages, dispatch each through
//! the command table, post replies, sleep the fixed interval, repeat. A cycle
//! that fails is logged and swallowed — the loop only stops when [`ChatPoller::stop`]
//! clears the running flag or the process exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::commands::{dispatch, BotStatus};
use crate::platform::ChatPlatform;

/// Result of asking the poller to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

pub struct ChatPoller {
    interval: Duration,
    /// Enabled flag of the currently spawned loop, if any. Each loop owns its
    /// own flag so a stop immediately followed by a start can't revive the
    /// old task.
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl ChatPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .expect("poller lock poisoned")
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Clear the enabled flag. An in-flight cycle completes before the task
    /// observes the change and exits.
    pub fn stop(&self) {
        if let Some(flag) = self.active.lock().expect("poller lock poisoned").take() {
            flag.store(false, Ordering::SeqCst);
            info!("Chat poller stop requested");
        }
    }

    /// Start polling `live_chat_id`. Idempotent: a second call while the loop
    /// is alive reports [`StartOutcome::AlreadyRunning`] instead of spawning
    /// another task.
    pub fn start(
        &self,
        platform: Arc<dyn ChatPlatform>,
        live_chat_id: String,
        status: BotStatus,
        own_channel_id: Option<String>,
    ) -> StartOutcome {
        let mut active = self.active.lock().expect("poller lock poisoned");
        if active
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return StartOutcome::AlreadyRunning;
        }

        let running = Arc::new(AtomicBool::new(true));
        *active = Some(Arc::clone(&running));
        let interval = self.interval;

        tokio::spawn(async move {
            info!("Chat poller started for live chat {}", live_chat_id);
            let mut page_token: Option<String> = None;

            while running.load(Ordering::SeqCst) {
                match run_cycle(
                    &*platform,
                    &live_chat_id,
                    page_token.as_deref(),
                    &status,
                    own_channel_id.as_deref(),
                )
                .await
                {
                    Ok(next_token) => page_token = next_token,
                    // Keep the previous page token so the next cycle retries
                    // from the same point.
                    Err(e) => error!("Poll cycle failed: {:#}", e),
                }

                tokio::time::sleep(interval).await;
            }

            info!("Chat poller stopped");
        });

        StartOutcome::Started
    }
}

/// One fetch-dispatch-send cycle. Returns the platform's next page token.
///
/// Free function over the platform trait so tests can drive single cycles
/// without wall-clock delays.
pub async fn run_cycle(
    platform: &dyn ChatPlatform,
    live_chat_id: &str,
    page_token: Option<&str>,
    status: &BotStatus,
    own_channel_id: Option<&str>,
) -> Result<Option<String>> {
    let page = platform.list_messages(live_chat_id, page_token).await?;
    let newest = page.messages.iter().filter_map(|m| m.published_at).max();
    debug!(
        "Fetched {} chat message(s), newest at {:?}",
        page.messages.len(),
        newest
    );

    for message in &page.messages {
        // Never answer our own messages — the fallback reply would otherwise
        // feed back into the next fetch forever.
        if own_channel_id == Some(message.author_channel_id.as_str()) {
            continue;
        }

        if let Some(reply) = dispatch(&message.author_display_name, &message.text, status) {
            info!(
                "Replying to {}: {}",
                message.author_display_name, message.text
            );
            platform.send_message(live_chat_id, &reply).await?;
        }
    }

    Ok(page.next_page_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ChatMessage, ChatPage};
    use anyhow::bail;
    use async_trait::async_trait;

    fn msg(author: &str, channel_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            author_display_name: author.to_string(),
            author_channel_id: channel_id.to_string(),
            text: text.to_string(),
            published_at: None,
        }
    }

    /// Scripted platform: hands out one page per call, records sends.
    #[derive(Default)]
    struct MockPlatform {
        pages: Mutex<Vec<ChatPage>>,
        sent: Mutex<Vec<String>>,
        fail_listing: bool,
    }

    impl MockPlatform {
        fn with_page(page: ChatPage) -> Self {
            Self {
                pages: Mutex::new(vec![page]),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPlatform for MockPlatform {
        async fn list_messages(
            &self,
            _live_chat_id: &str,
            _page_token: Option<&str>,
        ) -> Result<ChatPage> {
            if self.fail_listing {
                bail!("simulated fetch failure");
            }
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(ChatPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }

        async fn send_message(&self, _live_chat_id: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cycle_dispatches_and_replies() {
        let platform = MockPlatform::with_page(ChatPage {
            messages: vec![msg("alice", "UCalice", "!ping")],
            next_page_token: Some("tok1".to_string()),
        });

        let token = run_cycle(&platform, "chat1", None, &BotStatus::default(), None)
            .await
            .unwrap();

        assert_eq!(token.as_deref(), Some("tok1"));
        assert_eq!(platform.sent(), vec!["@alice pong!".to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_skips_own_messages() {
        let platform = MockPlatform::with_page(ChatPage {
            messages: vec![
                msg("botself", "UCbot", "@alice bot says hi!"),
                msg("alice", "UCalice", "!ping"),
            ],
            next_page_token: None,
        });

        run_cycle(&platform, "chat1", None, &BotStatus::default(), Some("UCbot"))
            .await
            .unwrap();

        assert_eq!(platform.sent(), vec!["@alice pong!".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_page_sends_nothing() {
        let platform = MockPlatform::default();
        let token = run_cycle(&platform, "chat1", None, &BotStatus::default(), None)
            .await
            .unwrap();
        assert!(token.is_none());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let platform = MockPlatform {
            fail_listing: true,
            ..Default::default()
        };
        assert!(
            run_cycle(&platform, "chat1", None, &BotStatus::default(), None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_start_twice_leaves_one_loop() {
        let poller = ChatPoller::new(Duration::from_millis(5));
        let platform = Arc::new(MockPlatform::default());

        let first = poller.start(
            platform.clone(),
            "chat1".to_string(),
            BotStatus::default(),
            None,
        );
        let second = poller.start(
            platform.clone(),
            "chat1".to_string(),
            BotStatus::default(),
            None,
        );

        assert_eq!(first, StartOutcome::Started);
        assert_eq!(second, StartOutcome::AlreadyRunning);
        assert!(poller.is_running());
        poller.stop();
    }

    #[tokio::test]
    async fn test_stop_terminates_loop() {
        let poller = ChatPoller::new(Duration::from_millis(5));
        let platform = Arc::new(MockPlatform::default());

        poller.start(
            platform,
            "chat1".to_string(),
            BotStatus::default(),
            None,
        );
        poller.stop();
        assert!(!poller.is_running());

        // Restart gets a fresh flag; the old task drains on its own.
        let platform = Arc::new(MockPlatform::default());
        assert_eq!(
            poller.start(
                platform,
                "chat2".to_string(),
                BotStatus::default(),
                None
            ),
            StartOutcome::Started
        );
        poller.stop();
    }

    #[tokio::test]
    async fn test_loop_survives_failing_cycles() {
        let poller = ChatPoller::new(Duration::from_millis(5));
        let platform = Arc::new(MockPlatform {
            fail_listing: true,
            ..Default::default()
        });

        poller.start(
            platform,
            "chat1".to_string(),
            BotStatus::default(),
            None,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(poller.is_running(), "loop died on a failed cycle");
        poller.stop();
    }
}
