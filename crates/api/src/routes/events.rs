//! Live Event Stream

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// One subscriber per connection; the subscription is released when the
/// client goes away and the stream is dropped
pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();

    let events = stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.recv().await?;
        let event = Event::default().data(message.json());
        Some((Ok::<_, Infallible>(event), subscription))
    })
    .take_until(state.streams_closed());

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
