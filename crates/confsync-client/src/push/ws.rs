use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::{FrameSink, FrameStream, PushConnector, PushRequest};
use crate::error::{ClientError, ClientResult};

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, request: &PushRequest) -> ClientResult<(FrameSink, FrameStream)> {
        let mut ws_request = request.url.as_str().into_client_request()?;
        for (name, value) in &request.headers {
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::Configuration(format!("invalid value for header {}: {}", name, e))
            })?;
            ws_request.headers_mut().insert(*name, value);
        }

        let (socket, _response) = tokio_tungstenite::connect_async(ws_request).await?;
        let (write, read) = socket.split();

        let sink = write
            .with(|text: String| future::ready(Ok::<_, WsError>(Message::Text(text))))
            .sink_map_err(ClientError::from);

        let stream = read
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(_) => None,
                    Err(e) => Some(Err(ClientError::from(e))),
                })
            });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
