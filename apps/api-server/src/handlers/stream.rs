//! Server-Sent Events over live subscriptions.
//!
//! Each stream owns one [`Subscription`]. Actix drops the body stream when
//! the client goes away, and the drop disposes the subscription.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use promptly_core::domain::{ProjectedItem, UserAccount};
use promptly_core::services::{Callback, Subscription};

use crate::middleware::auth::CurrentCaller;
use crate::middleware::error::AppResult;
use crate::observability::RequestId;
use crate::state::AppState;

/// Body stream of one SSE response.
pub struct SseStream {
    events: mpsc::UnboundedReceiver<Bytes>,
    subscription: Subscription,
}

impl Stream for SseStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx).map(|event| event.map(Ok))
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        let subscription = self.subscription.clone();
        actix_rt::spawn(async move {
            subscription.dispose().await;
            tracing::debug!("SSE client disconnected, subscription disposed");
        });
    }
}

/// Channel feeding an [`SseStream`]; the callback frames every value as an
/// `event: {name}` message.
fn channel<T: Serialize + Send + 'static>(
    name: &'static str,
) -> (Callback<T>, mpsc::UnboundedReceiver<Bytes>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: Callback<T> = Arc::new(move |value: T| match frame(name, &value) {
        Ok(event) => {
            // The receiver is gone once the client disconnects.
            let _ = tx.send(event);
        }
        Err(e) => tracing::warn!(event = name, error = %e, "Unserializable SSE payload"),
    });
    (callback, rx)
}

fn frame<T: Serialize>(name: &str, value: &T) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(value)?;
    Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", name, data)))
}

fn respond(events: mpsc::UnboundedReceiver<Bytes>, subscription: Subscription) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(SseStream {
            events,
            subscription,
        })
}

/// GET /api/stream/prompts/{id}
pub async fn prompt_stream(
    state: web::Data<AppState>,
    request_id: RequestId,
    path: web::Path<String>,
) -> HttpResponse {
    let item_id = path.into_inner();
    tracing::info!(request_id = %request_id.as_str(), item_id = %item_id, "Prompt stream opened");
    let (callback, events) = channel::<ProjectedItem>("prompt");
    let subscription = state.subscriptions.subscribe_to_item(&item_id, callback);
    respond(events, subscription)
}

/// GET /api/stream/authors/{id}
pub async fn author_stream(
    state: web::Data<AppState>,
    request_id: RequestId,
    path: web::Path<String>,
) -> HttpResponse {
    let author_id = path.into_inner();
    tracing::info!(
        request_id = %request_id.as_str(),
        author_id = %author_id,
        "Catalog stream opened"
    );
    let (callback, events) = channel::<Vec<ProjectedItem>>("prompts");
    let subscription = state
        .subscriptions
        .subscribe_to_catalog(&author_id, callback);
    respond(events, subscription)
}

/// GET /api/stream/me
pub async fn account_stream(
    state: web::Data<AppState>,
    request_id: RequestId,
    caller: CurrentCaller,
) -> AppResult<HttpResponse> {
    let user_id = caller.caller().require()?.user_id.clone();
    tracing::info!(request_id = %request_id.as_str(), user_id = %user_id, "Account stream opened");
    let (callback, events) = channel::<UserAccount>("account");
    let subscription = state.subscriptions.subscribe_to_account(&user_id, callback);
    Ok(respond(events, subscription))
}
