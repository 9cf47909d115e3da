use crate::error::AppError;
use crate::metrics;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serve `/metrics` and `/health` until the process exits.
pub async fn start_metrics_server(port: u16) -> Result<(), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((mut socket, _)) => {
                tokio::spawn(async move {
                    let mut buffer = [0; 1024];
                    let read = match socket.read(&mut buffer).await {
                        Ok(read) => read,
                        Err(e) => {
                            error!("Failed to read from socket: {}", e);
                            return;
                        }
                    };

                    let request = String::from_utf8_lossy(&buffer[..read]);
                    let response = route(&request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        error!("Failed to write to socket: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn route(request: &str) -> String {
    if request.starts_with("GET /metrics") {
        match metrics::gather_metrics() {
            Ok(body) => format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
            Err(e) => {
                error!("Failed to gather metrics: {}", e);
                "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n".to_string()
            }
        }
    } else if request.starts_with("GET /health") {
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK".to_string()
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nNot Found".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_health_and_unknown_paths() {
        assert!(route("GET /health HTTP/1.1\r\n").ends_with("OK"));
        assert!(route("GET /nope HTTP/1.1\r\n").starts_with("HTTP/1.1 404"));
        assert!(route("GET /metrics HTTP/1.1\r\n").starts_with("HTTP/1.1 200"));
    }
}
