//! WebSocket connector for the per-server stream endpoint

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use http::header::{AUTHORIZATION, USER_AGENT};
use http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::transport::{ChannelIdentity, Connection, Connector, TransportError};

const CLIENT_AGENT: &str = concat!("servconsole/", env!("CARGO_PKG_VERSION"));

/// Connects to `<base>/ws/server/<identity>`
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: Url,
    token: Option<SecretString>,
}

impl WsConnector {
    /// `stream_base_url` may use `http(s)` or `ws(s)`; the session token, if
    /// any, is sent as a bearer header on every handshake.
    pub fn new(stream_base_url: &str, token: Option<SecretString>) -> Result<Self, TransportError> {
        let base_url = build_stream_base(stream_base_url)?;
        Ok(Self { base_url, token })
    }

    /// Stream endpoint of `identity`
    pub fn endpoint(&self, identity: &ChannelIdentity) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Endpoint(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["ws", "server", identity.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        identity: &ChannelIdentity,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let url = self.endpoint(identity)?;
        info!("Connecting to stream: {}", url);

        let mut request = url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_AGENT));
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| TransportError::Endpoint(format!("Invalid token header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request).await?;
        debug!("Stream handshake completed: {}", response.status());

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!("Remote sent close frame: {:?}", frame);
                    return None;
                }
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

fn build_stream_base(base_url: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base_url).map_err(|e| TransportError::Endpoint(e.to_string()))?;

    // Change http/https to ws/wss
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::Endpoint(format!(
                "Unsupported stream URL scheme: {other}"
            )))
        }
    };

    url.set_scheme(scheme)
        .map_err(|_| TransportError::Endpoint("Failed to set scheme".to_string()))?;
    Ok(url)
}
