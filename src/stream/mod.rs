//! Streaming delivery channel
//!
//! Relays generated fragments to one client over a persistent connection.
//! The channel pulls the next fragment only after the previous one has been
//! handed to the sink, so at most one fragment is in flight. Dropping the
//! fragment stream (on a failed send) stops the producer.

pub mod mock;

pub use mock::MockSink;

use crate::generation::{Fragment, FragmentStream};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;

/// Sent after the last fragment of a successful stream.
pub const TERMINATOR: &str = "[END]";

/// Outbound side of a persistent client connection.
#[async_trait]
pub trait FragmentSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Receiving,
    Streaming,
    Terminated,
    Error,
}

pub struct DeliveryChannel<S: FragmentSink> {
    sink: S,
    state: ChannelState,
}

impl<S: FragmentSink> DeliveryChannel<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: ChannelState::Idle,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Marks a new inbound query. Returns false once the channel has failed.
    pub fn begin_receiving(&mut self) -> bool {
        match self.state {
            ChannelState::Error => false,
            _ => {
                self.state = ChannelState::Receiving;
                true
            }
        }
    }

    /// Relays every fragment in order, then the terminator.
    ///
    /// A [`Fragment::Failed`] sends one error fragment and closes the
    /// connection. A failed send means the client is gone: the stream is
    /// dropped without pulling further fragments.
    pub async fn relay(&mut self, mut fragments: FragmentStream) -> ChannelState {
        if self.state == ChannelState::Error {
            return self.state;
        }
        self.state = ChannelState::Streaming;

        let mut sent = 0usize;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Fragment::Text(text) => {
                    if let Err(e) = self.sink.send_text(text).await {
                        tracing::info!("Client went away after {} fragment(s): {}", sent, e);
                        self.state = ChannelState::Error;
                        return self.state;
                    }
                    sent += 1;
                }
                Fragment::Failed(reason) => return self.fail(&reason).await,
            }
        }

        match self.sink.send_text(TERMINATOR.to_string()).await {
            Ok(()) => {
                tracing::debug!("Stream complete after {} fragment(s)", sent);
                self.state = ChannelState::Terminated;
            }
            Err(e) => {
                tracing::info!("Client went away before the terminator: {}", e);
                self.state = ChannelState::Error;
            }
        }
        self.state
    }

    /// Sends `"Error: <description>"` and closes. The channel is not reused.
    pub async fn fail(&mut self, description: &str) -> ChannelState {
        tracing::warn!("Closing stream with error: {}", description);
        self.state = ChannelState::Error;

        if let Err(e) = self.sink.send_text(format!("Error: {}", description)).await {
            tracing::debug!("Could not deliver error fragment: {}", e);
        }
        if let Err(e) = self.sink.close().await {
            tracing::debug!("Could not close connection cleanly: {}", e);
        }
        self.state
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}
