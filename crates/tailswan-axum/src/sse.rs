//! SSE streaming of broadcaster messages.
//!
//! Every client gets its own [`Subscription`]. Messages are written as
//! `event: <topic event name>` / `data: <json>` frames; a `:heartbeat`
//! comment keeps idle connections alive. When the client disconnects the
//! stream is dropped together with the subscription, which unregisters it.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tailswan_core::Message;
use tailswan_runtime::Subscription;
use tracing::debug;

use crate::error::HttpError;
use crate::state::AppState;

/// Comment text of the keep-alive frame.
pub const HEARTBEAT_TEXT: &str = "heartbeat";

/// Convert one message into an SSE event.
pub fn to_event(message: &Message) -> Event {
    Event::default()
        .event(message.event_name())
        .data(String::from_utf8_lossy(&message.payload))
}

/// Stream of events for one subscription; ends when the broadcaster drops it.
pub fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.recv().await;
        if message.is_none() {
            debug!(client = %subscription.id(), "Event stream closed");
        }
        message.map(|message| (Ok(to_event(&message)), subscription))
    })
}

/// `GET /api/events`
pub async fn events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, HttpError> {
    let subscription = state.broadcaster.subscribe().await?;
    debug!(client = %subscription.id(), "SSE client connected");

    let heartbeat = state.broadcaster.config().heartbeat_interval;
    Ok(Sse::new(event_stream(subscription))
        .keep_alive(KeepAlive::new().interval(heartbeat).text(HEARTBEAT_TEXT)))
}
