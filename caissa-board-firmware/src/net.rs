//! Game-server client over Wi-Fi.
//!
//! One short-lived TCP connection per exchange with a fixed HTTP/1.1
//! request writer - deliberately not a general HTTP stack. The wire
//! payloads themselves live in `caissa-protocol::server`.

use core::fmt::Write as _;

use defmt::*;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::Duration;
use embedded_io_async::Write;

use caissa_core::config::NetConfig;
use caissa_protocol::server::{MoveReport, PollResponse, JSON_BUF_LEN};
use caissa_protocol::Move;

/// Wi-Fi credentials are baked in at build time.
pub const WIFI_SSID: &str = match option_env!("CAISSA_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "caissa",
};
pub const WIFI_PSK: &str = match option_env!("CAISSA_WIFI_PSK") {
    Some(psk) => psk,
    None => "",
};

/// Game-server endpoint.
const SERVER_HOST: &str = match option_env!("CAISSA_SERVER_HOST") {
    Some(host) => host,
    None => "192.168.1.10",
};
const SERVER_PORT: u16 = 3000;

/// Per-exchange socket timeout.
const SOCKET_TIMEOUT_S: u64 = 5;

/// Network exchange failures. All of them are logged and retried on the
/// next cycle; none block sensing or the serial bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetError {
    Dns,
    Connect,
    Io,
    BadResponse,
}

/// Poll the server for the most recent move.
///
/// Returns `Ok(None)` when there is no new move or when the reported
/// move fails format validation (logged, never forwarded).
pub async fn poll_server(stack: Stack<'static>, cfg: &NetConfig) -> Result<Option<Move>, NetError> {
    let mut request: heapless::String<256> = heapless::String::new();
    write!(
        request,
        "GET /api/rooms/{}/move HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        cfg.room_id, SERVER_HOST
    )
    .map_err(|_| NetError::Io)?;

    let mut response = [0u8; 1024];
    let len = http_exchange(stack, request.as_bytes(), &mut response).await?;
    let body = body_of(&response[..len]).ok_or(NetError::BadResponse)?;

    let poll = PollResponse::decode(body).map_err(|_| NetError::BadResponse)?;
    let Some(mv_str) = poll.mv else {
        return Ok(None);
    };
    match Move::parse(mv_str.as_str()) {
        Ok(mv) => Ok(Some(mv)),
        Err(e) => {
            warn!("server sent malformed move, dropped: {:?}", e);
            Ok(None)
        }
    }
}

/// Report a physically detected move.
pub async fn post_move(stack: Stack<'static>, cfg: &NetConfig, mv: Move) -> Result<(), NetError> {
    let mut body = [0u8; JSON_BUF_LEN];
    let mv_str = mv.as_string();
    let report = MoveReport::physical(mv_str.as_str(), &cfg.room_id, &cfg.player_side);
    let body_len = report.encode(&mut body).map_err(|_| NetError::Io)?;

    let mut request: heapless::String<384> = heapless::String::new();
    write!(
        request,
        "POST /api/rooms/{}/move HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        cfg.room_id, SERVER_HOST, body_len
    )
    .map_err(|_| NetError::Io)?;
    for &b in &body[..body_len] {
        request.push(b as char).map_err(|_| NetError::Io)?;
    }

    let mut response = [0u8; 512];
    let len = http_exchange(stack, request.as_bytes(), &mut response).await?;
    if is_ok_status(&response[..len]) {
        Ok(())
    } else {
        Err(NetError::BadResponse)
    }
}

/// One connect/write/read-to-close round trip.
async fn http_exchange(
    stack: Stack<'static>,
    request: &[u8],
    response: &mut [u8],
) -> Result<usize, NetError> {
    let addrs = stack
        .dns_query(SERVER_HOST, DnsQueryType::A)
        .await
        .map_err(|_| NetError::Dns)?;
    let addr = *addrs.first().ok_or(NetError::Dns)?;

    let mut rx_buf = [0u8; 1024];
    let mut tx_buf = [0u8; 512];
    let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
    socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_S)));

    socket
        .connect((addr, SERVER_PORT))
        .await
        .map_err(|_| NetError::Connect)?;
    socket.write_all(request).await.map_err(|_| NetError::Io)?;

    // The server closes after each exchange; read until then.
    let mut total = 0;
    loop {
        match socket.read(&mut response[total..]).await {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if total == response.len() {
                    break;
                }
            }
            Err(_) => return Err(NetError::Io),
        }
    }
    socket.close();
    Ok(total)
}

fn is_ok_status(response: &[u8]) -> bool {
    // "HTTP/1.1 2xx ..."
    response.len() > 9 && response.starts_with(b"HTTP/1.1 2")
}

/// Body starts after the blank line separating the headers.
fn body_of(response: &[u8]) -> Option<&[u8]> {
    if !is_ok_status(response) {
        return None;
    }
    response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| &response[i + 4..])
}
