use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::service::{Request, Response, ServiceHandle};

/// Accept connections until the listener fails. One thread per client.
pub fn serve(listener: TcpListener, service: ServiceHandle) -> io::Result<()> {
    info!("accepting connections on {}", listener.local_addr()?);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let service = service.clone();
                let spawned = std::thread::Builder::new()
                    .name("fsgraph-conn".to_string())
                    .spawn(move || {
                        if let Err(e) = handle_connection(stream, &service) {
                            debug!("connection closed: {}", e);
                        }
                    });
                if let Err(e) = spawned {
                    warn!("failed to spawn connection thread: {}", e);
                }
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, service: &ServiceHandle) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    debug!("client connected: {}", peer);
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (response, stopped) = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match service.call(request) {
                Ok(response) => (response, false),
                Err(e) => (Response::error(&e, Value::Null), true),
            },
            Err(e) => (Response::bad_request(e.to_string()), false),
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        if stopped {
            break;
        }
    }
    debug!("client disconnected: {}", peer);
    Ok(())
}
