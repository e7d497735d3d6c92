//! Per-stream inbound audio routers.
//!
//! Each enabled audio stream gets one task that awaits raw frames,
//! transcodes them, and forwards them to the realtime session. Frames that
//! arrive before the session is connected are dropped: realtime semantics
//! prefer freshness over completeness, and the service has no use for
//! stale audio.

use std::{collections::HashMap, sync::Arc};

use lingobridge_realtime::RealtimeClient;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{audio, platform::AudioFrame};

/// Spawns the listener task for one audio stream.
///
/// The task ends when the frame channel closes or a send to the realtime
/// service fails; a dead router is observable through its handle so the
/// orchestrator can replace it on the next stream-enabled notification.
pub fn spawn_stream_listener(
    stream_id: String,
    mut frames: mpsc::Receiver<AudioFrame>,
    client: Arc<RealtimeClient>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(%stream_id, "audio listener started");
        while let Some(frame) = frames.recv().await {
            if !client.is_connected() {
                debug!(%stream_id, "dropping frame, session not connected");
                continue;
            }
            let pcm = match audio::resample_frame(&frame.samples, frame.sample_rate, frame.channels)
            {
                Ok(pcm) => pcm,
                Err(e) => {
                    // Frame loss is acceptable; stream continuity is not.
                    warn!(%stream_id, error = %e, "dropping undecodable frame");
                    continue;
                }
            };
            if let Err(e) = client.send_audio(&pcm).await {
                warn!(%stream_id, error = %e, "audio forward failed, stopping listener");
                break;
            }
        }
        info!(%stream_id, "audio listener stopped");
    })
}

/// Listener tasks keyed by stream id. At most one listener exists per
/// stream: inserting over a live entry aborts the old task first.
#[derive(Default)]
pub struct ListenerSet {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `stream_id`, aborting any previous one.
    pub fn insert(&mut self, stream_id: String, handle: JoinHandle<()>) {
        if let Some(old) = self.tasks.insert(stream_id.clone(), handle) {
            warn!(%stream_id, "replacing existing audio listener");
            old.abort();
        }
    }

    /// Aborts and forgets the listener for `stream_id`. Harmless if the
    /// task already exited on its own.
    pub fn remove(&mut self, stream_id: &str) {
        if let Some(handle) = self.tasks.remove(stream_id) {
            handle.abort();
        }
    }

    pub fn abort_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// True if a listener is registered and its task has not finished.
    pub fn is_active(&self, stream_id: &str) -> bool {
        self.tasks
            .get(stream_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingobridge_realtime::SessionConfig;
    use secrecy::SecretString;

    fn unconnected_client() -> Arc<RealtimeClient> {
        let (client, _rx) =
            RealtimeClient::new(SecretString::from("sk-test"), SessionConfig::default());
        Arc::new(client)
    }

    fn frame() -> AudioFrame {
        AudioFrame {
            samples: vec![100i16; 480],
            sample_rate: 48_000,
            channels: 1,
        }
    }

    #[tokio::test]
    async fn listener_drops_frames_while_disconnected() {
        let client = unconnected_client();
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_stream_listener("s1".to_string(), rx, client);

        tx.send(frame()).await.unwrap();
        tokio::task::yield_now().await;
        // Dropped frames must not kill the listener.
        assert!(!handle.is_finished());

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn listener_survives_malformed_frames() {
        let client = unconnected_client();
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_stream_listener("s1".to_string(), rx, client);

        tx.send(AudioFrame {
            samples: vec![1, 2, 3],
            sample_rate: 48_000,
            channels: 2,
        })
        .await
        .unwrap();
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn exactly_one_listener_per_stream_across_toggles() {
        let client = unconnected_client();
        let mut set = ListenerSet::new();

        let (tx1, rx1) = mpsc::channel(8);
        set.insert(
            "s1".to_string(),
            spawn_stream_listener("s1".to_string(), rx1, Arc::clone(&client)),
        );
        assert_eq!(set.len(), 1);
        assert!(set.is_active("s1"));

        set.remove("s1");
        assert_eq!(set.len(), 0);
        drop(tx1);

        let (_tx2, rx2) = mpsc::channel(8);
        set.insert(
            "s1".to_string(),
            spawn_stream_listener("s1".to_string(), rx2, client),
        );
        assert_eq!(set.len(), 1);
        assert!(set.is_active("s1"));
    }

    #[tokio::test]
    async fn duplicate_insert_aborts_the_older_listener() {
        let mut set = ListenerSet::new();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let first = tokio::spawn(async move {
            let _guard = done_tx;
            std::future::pending::<()>().await;
        });
        let second = tokio::spawn(async {
            std::future::pending::<()>().await;
        });

        set.insert("s1".to_string(), first);
        set.insert("s1".to_string(), second);
        assert_eq!(set.len(), 1);

        // The replaced task was cancelled, so its guard dropped unsent.
        assert!(done_rx.await.is_err());
        assert!(set.is_active("s1"));
    }

    #[tokio::test]
    async fn remove_after_natural_exit_does_not_panic() {
        let mut set = ListenerSet::new();
        let handle = tokio::spawn(async {});
        handle_settled(&handle).await;
        set.insert("s1".to_string(), handle);
        set.remove("s1");
        assert!(set.is_empty());
    }

    async fn handle_settled(handle: &JoinHandle<()>) {
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
    }
}
