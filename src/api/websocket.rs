use crate::api::rest::ApiError;
use crate::messaging::{ChannelLayer, Subscription, ALERTS_GROUP};
use crate::security::{Claims, SecurityService};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    pub token: Option<String>,
}

/// Check a subscriber before the upgrade. `Ok(None)` means the gate is off.
pub fn authorize_subscriber(
    security: &SecurityService,
    params: &SocketParams,
    headers: &HeaderMap,
) -> Result<Option<Claims>, ApiError> {
    if !security.require_ws_auth() {
        return Ok(None);
    }
    let claims = security.authorize_subscriber(params.token.as_deref(), headers)?;
    Ok(Some(claims))
}

/// `/ws/alerts/`: live alert feed
pub async fn alerts_socket(
    State(channels): State<Arc<ChannelLayer>>,
    State(security): State<Arc<SecurityService>>,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let subscriber = match authorize_subscriber(&security, &params, &headers) {
        Ok(Some(claims)) => claims.name,
        Ok(None) => "anonymous".to_string(),
        Err(e) => {
            warn!("Refused alert socket: {}", e.message);
            return e.into_response();
        }
    };

    ws.on_upgrade(move |socket: WebSocket| async move {
        serve_subscriber(&channels, &subscriber, socket).await;
    })
}

/// Keep `socket` in the alerts group until it disconnects
async fn serve_subscriber<S, E>(channels: &ChannelLayer, subscriber: &str, socket: S)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: Display + Send,
    E: Send + 'static,
{
    let subscription = channels.group_add(ALERTS_GROUP).await;
    let channel_id = subscription.channel_id;
    info!("Alert socket opened for {} (channel {})", subscriber, channel_id);

    handle_socket(socket, subscription).await;

    channels.group_discard(ALERTS_GROUP, &channel_id).await;
    info!("Alert socket closed for {} (channel {})", subscriber, channel_id);
}

// Forward group messages until either side goes away
async fn handle_socket<S, E>(socket: S, subscription: Subscription)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: Display + Send,
    E: Send + 'static,
{
    let (mut sender, mut receiver) = socket.split();
    let mut messages = subscription.receiver;

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = messages.recv().await {
            if let Err(e) = sender.send(Message::Text(text)).await {
                debug!("Alert socket send failed: {}", e);
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                // Subscribers have nothing to say
                other => debug!("Ignoring inbound frame: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
