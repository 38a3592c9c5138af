use rtuctl::config::ControllerConfig;
use rtuctl::controller::RtuController;
use rtuctl::plant::ZonePlant;
use rtuctl::protocol::{Command, CommandResponse};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8080;
const STATUS_BROADCAST_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("RTU Controller Simulator");
    println!("========================");

    let config = match std::env::args().nth(1) {
        Some(path) => ControllerConfig::from_file(Path::new(&path))?,
        None => ControllerConfig::default(),
    };
    let scan_period_ms = config.scan_period_ms;

    let controller = Arc::new(Mutex::new(RtuController::new(config)));
    {
        let mut guard = controller.lock().await;
        guard.start();
    }

    let (status_tx, _) = broadcast::channel(STATUS_BROADCAST_BUFFER_SIZE);

    let tcp_controller = Arc::clone(&controller);
    let tcp_status_tx = status_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_controller, tcp_status_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    // Closed-loop scan: the plant feeds the controller, the controller's
    // outputs feed the plant.
    let mut plant = ZonePlant::new();
    let mut interval = time::interval(Duration::from_millis(scan_period_ms));

    loop {
        interval.tick().await;

        let status_result = {
            let mut guard = controller.lock().await;
            let outputs = guard.outputs();
            let occupied = guard
                .last_scan()
                .is_some_and(|scan| scan.occupancy == rtuctl::control::OccupancyState::Occupied);
            plant.step(&outputs, occupied, scan_period_ms);
            let sensors = plant.snapshot(&outputs);
            guard.update(sensors)
        };

        match status_result {
            Ok(Some(status)) => {
                if status_tx.receiver_count() > 0 {
                    if let Err(e) = status_tx.send(status) {
                        warn!("Failed to broadcast status: {}", e);
                    }
                }
            }
            Ok(None) => {
                // No status packet due this scan
            }
            Err(e) => {
                error!("Controller error: {}", e);
                break;
            }
        }

        let running = {
            let guard = controller.lock().await;
            guard.get_state().running
        };
        if !running {
            break;
        }
    }

    {
        let mut guard = controller.lock().await;
        guard.stop();
    }

    tcp_server.abort();
    println!("RTU Controller Simulator stopped");

    Ok(())
}

async fn start_tcp_server(
    controller: Arc<Mutex<RtuController>>,
    status_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{TCP_PORT}")).await?;
    info!("TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New client connected: {}", addr);
                let client_controller = Arc::clone(&controller);
                let client_status_rx = status_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_controller, client_status_rx).await
                    {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    controller: Arc<Mutex<RtuController>>,
    mut status_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let writer = Arc::new(Mutex::new(writer));

    // Stream status packets to the client as they are published.
    let status_writer = Arc::clone(&writer);
    let status_task = tokio::spawn(async move {
        while let Ok(status) = status_rx.recv().await {
            let mut writer_guard = status_writer.lock().await;
            if let Err(e) = writer_guard.write_all(status.as_bytes()).await {
                warn!("Failed to send status: {}", e);
                break;
            }
            if let Err(e) = writer_guard.write_all(b"\n").await {
                warn!("Failed to send status newline: {}", e);
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match serde_json::from_str::<Command>(trimmed) {
                    Ok(command) => {
                        info!("Received command: {:?}", command);

                        let response = {
                            let mut guard = controller.lock().await;
                            match guard.queue_command(command.clone()) {
                                Ok(()) => {
                                    if let Err(e) = guard.process_commands() {
                                        error!("Command processing error: {}", e);
                                        error_response(command.id, &format!("Processing error: {e}"))
                                    } else {
                                        let responses = guard.get_responses();
                                        responses
                                            .iter()
                                            .find(|r| r.id == command.id)
                                            .cloned()
                                            .unwrap_or_else(|| success_response(command.id))
                                    }
                                }
                                Err(e) => {
                                    error!("Command queue error: {}", e);
                                    error_response(command.id, &format!("Queue error: {e}"))
                                }
                            }
                        };

                        let response_json = serde_json::to_string(&response)?;
                        {
                            let mut writer_guard = writer.lock().await;
                            writer_guard.write_all(response_json.as_bytes()).await?;
                            writer_guard.write_all(b"\n").await?;
                        }
                        info!("Sent response: {}", response_json);
                    }
                    Err(e) => {
                        error!("Failed to parse command: {}", e);
                        let error_json = serde_json::json!({
                            "id": 0,
                            "timestamp": unix_millis(),
                            "status": "InvalidCommand",
                            "message": format!("Invalid command format: {e}")
                        });
                        {
                            let mut writer_guard = writer.lock().await;
                            writer_guard.write_all(error_json.to_string().as_bytes()).await?;
                            writer_guard.write_all(b"\n").await?;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    status_task.abort();
    Ok(())
}

fn success_response(id: u32) -> CommandResponse {
    CommandResponse {
        id,
        timestamp: unix_millis(),
        status: rtuctl::protocol::ResponseStatus::Success,
        message: None,
    }
}

fn error_response(id: u32, message: &str) -> CommandResponse {
    CommandResponse {
        id,
        timestamp: unix_millis(),
        status: rtuctl::protocol::ResponseStatus::Error,
        message: Some(message.to_string()),
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
