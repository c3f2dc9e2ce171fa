use std::io;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use tracing::{error, info, warn};
use tungstenite::{accept, Message};

use crate::bus::ServoBus;
use crate::controller::RobotController;

/// Accepts operator connections forever, one thread per client.
pub fn websocket_server<B, A>(address: A, controller: RobotController<B>) -> io::Result<()>
where
    B: ServoBus + 'static,
    A: ToSocketAddrs,
{
    let server = TcpListener::bind(address)?;
    info!("WebSocket server listening on {}", server.local_addr()?);

    for stream in server.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                error!("Connection error: {}", e);
                continue;
            }
        };

        let controller = controller.clone();
        thread::spawn(move || handle_client(stream, controller));
    }
    Ok(())
}

fn handle_client<B: ServoBus + 'static>(stream: TcpStream, controller: RobotController<B>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    let mut websocket = match accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake error from {}: {}", peer, e);
            return;
        }
    };

    info!("New WebSocket client connected: {}", peer);

    loop {
        match websocket.read() {
            Ok(Message::Text(text)) => {
                info!("Received message: {}", text);
                // Bad commands are dropped, the connection stays up.
                if let Err(e) = controller.handle_message(&text) {
                    warn!("Rejected message from {}: {}", peer, e);
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket client {} disconnected", peer);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer, e);
                break;
            }
        }
    }
}
