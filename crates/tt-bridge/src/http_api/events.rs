use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::HeaderName, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures_util::StreamExt;

use super::state::ApiState;
use crate::event_hub::Frame;

fn to_sse(frame: Frame) -> Event {
    match frame {
        Frame::Event { channel, data } => Event::default().event(&*channel).data(&*data),
        Frame::KeepAlive => Event::default().comment("ping"),
    }
}

/// GET /api/events -- long-lived event stream.
///
/// The connection stays registered with the hub until the client goes
/// away and axum drops the body.
pub(crate) async fn event_stream(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stream = state
        .hub
        .subscribe()
        .into_stream()
        .map(|frame| Ok::<_, Infallible>(to_sse(frame)));
    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream),
    )
}
