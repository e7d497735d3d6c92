//! The agent's synthetic microphone track.
//!
//! AI audio deltas arrive in bursts far faster than real time, so the track
//! queues them and a pacing task drains the queue into the call platform at
//! playback speed. `flush` implements barge-in: everything queued but not
//! yet played is discarded the moment the human starts speaking, while
//! audio pushed afterwards plays normally.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{
    sync::{Mutex, Notify, mpsc},
    task::JoinHandle,
};
use tracing::debug;

use crate::audio::OUTPUT_SAMPLE_RATE;

/// Bytes per paced chunk: 10 ms of mono PCM16 at the output rate. One
/// chunk is always in flight and beyond flush's reach, so small chunks
/// keep the unrecallable audio short.
const CHUNK_BYTES: usize = (OUTPUT_SAMPLE_RATE as usize / 100) * 2;

struct TrackShared {
    queue: Mutex<VecDeque<u8>>,
    wakeup: Notify,
}

/// Paced playback queue feeding the platform's outbound audio track.
pub struct MicrophoneTrack {
    shared: Arc<TrackShared>,
    pacer: JoinHandle<()>,
}

impl MicrophoneTrack {
    /// Creates the track and spawns its pacing task. Chunks are delivered
    /// on `sink` at real time; the task ends when the sink is dropped.
    pub fn spawn(sink: mpsc::Sender<Bytes>) -> Self {
        let shared = Arc::new(TrackShared {
            queue: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
        });
        let pacer = tokio::spawn(pace(Arc::clone(&shared), sink));
        Self { shared, pacer }
    }

    /// Enqueues decoded PCM16 for playback.
    pub async fn push(&self, pcm: &[u8]) {
        if pcm.is_empty() {
            return;
        }
        self.shared.queue.lock().await.extend(pcm.iter().copied());
        self.shared.wakeup.notify_one();
    }

    /// Discards all queued-but-unplayed audio. Safe to call concurrently
    /// with `push`; audio pushed after the flush still plays.
    pub async fn flush(&self) {
        let mut queue = self.shared.queue.lock().await;
        let dropped = queue.len();
        queue.clear();
        if dropped > 0 {
            debug!(bytes = dropped, "flushed unplayed audio");
        }
    }

    /// Bytes currently queued and not yet handed to the platform.
    pub async fn queued_bytes(&self) -> usize {
        self.shared.queue.lock().await.len()
    }
}

impl Drop for MicrophoneTrack {
    fn drop(&mut self) {
        self.pacer.abort();
    }
}

/// Drains the queue at playback speed, sleeping for each chunk's duration
/// and parking on the notifier while idle.
async fn pace(shared: Arc<TrackShared>, sink: mpsc::Sender<Bytes>) {
    loop {
        let chunk: Vec<u8> = {
            let mut queue = shared.queue.lock().await;
            let take = queue.len().min(CHUNK_BYTES);
            queue.drain(..take).collect()
        };

        if chunk.is_empty() {
            shared.wakeup.notified().await;
            continue;
        }

        let playback = Duration::from_secs_f64(
            chunk.len() as f64 / (OUTPUT_SAMPLE_RATE as f64 * 2.0),
        );
        if sink.send(Bytes::from(chunk)).await.is_err() {
            debug!("microphone sink dropped, stopping pacing task");
            break;
        }
        tokio::time::sleep(playback).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn flush_discards_queued_audio_only() {
        let (tx, mut rx) = mpsc::channel(64);
        let track = MicrophoneTrack::spawn(tx);

        // Queue audio and flush before the pacing task gets a chance to
        // run; none of it may reach the sink.
        track.push(&[1u8; 500]).await;
        track.flush().await;
        assert_eq!(track.queued_bytes().await, 0);

        // Audio pushed after the flush is delivered.
        track.push(&[7u8; 100]).await;
        let chunk = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("pacer should deliver post-flush audio")
            .unwrap();
        assert_eq!(&chunk[..], &[7u8; 100][..]);

        // Nothing else is in flight.
        let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_paced_chunks() {
        let (tx, mut rx) = mpsc::channel(64);
        let track = MicrophoneTrack::spawn(tx);

        track.push(&vec![3u8; CHUNK_BYTES * 2]).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.len(), CHUNK_BYTES);
        assert_eq!(second.len(), CHUNK_BYTES);
        assert_eq!(track.queued_bytes().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_during_playback_discards_the_rest() {
        let (tx, mut rx) = mpsc::channel(64);
        let track = MicrophoneTrack::spawn(tx);

        track.push(&vec![2u8; CHUNK_BYTES * 3]).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.len(), CHUNK_BYTES);

        // Barge-in while the first chunk is playing: nothing queued may
        // follow it out.
        track.flush().await;
        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_push_and_flush_do_not_lose_later_audio() {
        let (tx, mut rx) = mpsc::channel(64);
        let track = Arc::new(MicrophoneTrack::spawn(tx));

        let pusher = {
            let track = Arc::clone(&track);
            tokio::spawn(async move {
                for _ in 0..10 {
                    track.push(&[9u8; 64]).await;
                }
            })
        };
        track.flush().await;
        pusher.await.unwrap();
        track.push(&[5u8; 32]).await;

        // Whatever survived the race, the bytes pushed after the flush
        // must eventually come through.
        let mut seen_post_flush = false;
        while let Ok(Some(chunk)) =
            tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
        {
            if chunk.contains(&5u8) {
                seen_post_flush = true;
            }
        }
        assert!(seen_post_flush);
    }
}
