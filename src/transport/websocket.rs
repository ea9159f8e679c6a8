//! WebSocket connect and error classification for the persistent channel

use crate::config::ChannelConfig;
use aeroscan_shared::{defaults, state_machine::ChannelFault};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    http::{header::USER_AGENT, HeaderValue},
};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open and upgrade a connection, bounded by the connect timeout
pub async fn connect(config: &ChannelConfig) -> Result<WsStream, ChannelFault> {
    let mut request = config.url().into_client_request().map_err(classify)?;
    request
        .headers_mut()
        .insert(USER_AGENT, HeaderValue::from_static(defaults::USER_AGENT));

    match timeout(config.connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(classify(e)),
        Err(_) => Err(ChannelFault::ConnectTimeout),
    }
}

/// Map a tungstenite error onto a channel fault
pub fn classify(error: tungstenite::Error) -> ChannelFault {
    use tungstenite::Error;

    match error {
        Error::Http(response) => {
            let status = response.status().as_u16();
            match status {
                401 | 403 => ChannelFault::AuthRejected { status },
                _ => ChannelFault::HandshakeRejected { status },
            }
        }
        Error::Io(e) => ChannelFault::Unreachable(e.to_string()),
        Error::Protocol(e) => ChannelFault::Protocol(e.to_string()),
        Error::Url(e) => ChannelFault::Protocol(format!("bad URL: {}", e)),
        other => ChannelFault::Unreachable(other.to_string()),
    }
}
