use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use serde_json;
use std::process::Command;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("rtuctl")
        .version("0.1.0")
        .author("Building Controls Engineering Team")
        .about("Packaged rooftop unit (RTU) controller - operator command line")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Controller host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Controller port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("ping")
                .about("Test connection to the RTU controller"),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("Check that the controller responds to a status request"),
        )
        .subcommand(
            SubCommand::with_name("setpoint")
                .about("Write a setpoint")
                .arg(
                    Arg::with_name("target")
                        .help("Setpoint slot")
                        .required(true)
                        .possible_values(&["occ-cool", "occ-heat", "unocc-cool", "unocc-heat"]),
                )
                .arg(
                    Arg::with_name("value")
                        .help("Temperature in degrees F (40-95)")
                        .required(true)
                        .validator(|v| match v.parse::<f32>() {
                            Ok(t) if (40.0..=95.0).contains(&t) => Ok(()),
                            _ => Err("Setpoint must be between 40 and 95 F".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("override")
                .about("Force or release an output")
                .subcommand(
                    SubCommand::with_name("fan")
                        .about("Force the supply fan relay")
                        .arg(state_arg()),
                )
                .subcommand(
                    SubCommand::with_name("compressor")
                        .about("Force the Y1 compressor relay")
                        .arg(state_arg()),
                )
                .subcommand(
                    SubCommand::with_name("heat")
                        .about("Force the W1 heat relay")
                        .arg(state_arg()),
                )
                .subcommand(
                    SubCommand::with_name("damper")
                        .about("Pin the outside-air damper")
                        .arg(
                            Arg::with_name("position")
                                .help("Damper position percent (0-100)")
                                .required(true)
                                .validator(|v| match v.parse::<u8>() {
                                    Ok(p) if p <= 100 => Ok(()),
                                    _ => Err("Position must be 0-100".into()),
                                }),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("clear")
                        .about("Release an override")
                        .arg(
                            Arg::with_name("output")
                                .help("Output to release")
                                .required(true)
                                .possible_values(&["fan", "compressor", "heat", "damper"]),
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("occupancy")
                .about("Occupancy control")
                .subcommand(
                    SubCommand::with_name("set")
                        .about("Force occupancy regardless of schedule")
                        .arg(
                            Arg::with_name("state")
                                .help("Occupancy state")
                                .required(true)
                                .possible_values(&["occupied", "unoccupied"]),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("auto")
                        .about("Return occupancy to the weekly schedule"),
                ),
        )
        .subcommand(
            SubCommand::with_name("estop")
                .about("Emergency stop control")
                .arg(
                    Arg::with_name("state")
                        .help("Emergency stop state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("alarms")
                .about("Alarm management")
                .subcommand(
                    SubCommand::with_name("ack")
                        .about("Acknowledge an active alarm")
                        .arg(
                            Arg::with_name("alarm")
                                .help("Alarm to acknowledge")
                                .required(true)
                                .possible_values(&["fan-failure", "low-discharge-temp", "high-zone-temp"]),
                        ),
                )
                .subcommand(SubCommand::with_name("enable").about("Enable alarm generation"))
                .subcommand(SubCommand::with_name("disable").about("Disable alarm generation")),
        )
        .subcommand(
            SubCommand::with_name("fan")
                .about("Supply fan management")
                .subcommand(
                    SubCommand::with_name("reset")
                        .about("Reset a latched fan failure after service"),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("Monitor the live status stream"),
        )
        .subcommand(
            SubCommand::with_name("server")
                .about("Start the RTU controller simulator")
                .arg(
                    Arg::with_name("background")
                        .short("b")
                        .long("background")
                        .help("Run simulator in background"),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap();
    let port = matches.value_of("port").unwrap().parse::<u16>()?;
    let format = matches.value_of("format").unwrap();
    let verbose = matches.is_present("verbose");

    if verbose {
        println!("{}", "rtuctl - RTU Controller".bright_blue().bold());
        println!("{} {}:{}", "Connecting to".dimmed(), host, port);
    }

    match matches.subcommand() {
        ("ping", _) => {
            let response = send_command(host, port, command_json("Ping")).await?;
            match format {
                "json" => println!("{}", response),
                "compact" => println!("{}", "PONG".bright_green()),
                _ => {
                    if response_succeeded(&response) {
                        println!("{} {}", "OK".green(), "RTU controller is responsive".bright_green());
                    } else {
                        println!("{} {}", "!!".red(), "Ping failed".bright_red());
                    }
                }
            }
        }
        ("status", _) => {
            let response = send_command(host, port, command_json("SystemStatus")).await?;
            match format {
                "json" => println!("{}", response),
                _ => {
                    if response_succeeded(&response) {
                        println!("{} {}", "OK".green(), "Controller operational".bright_green());
                        println!("{}", "Use 'rtuctl monitor' for the live status stream".dimmed());
                    } else {
                        println!("{} {}", "!!".red(), "Status check failed".bright_red());
                    }
                }
            }
        }
        ("setpoint", Some(sub_matches)) => {
            let target = match sub_matches.value_of("target").unwrap() {
                "occ-cool" => "OccupiedCooling",
                "occ-heat" => "OccupiedHeating",
                "unocc-cool" => "UnoccupiedCooling",
                _ => "UnoccupiedHeating",
            };
            let value: f32 = sub_matches.value_of("value").unwrap().parse()?;
            let command = variant_json(serde_json::json!({
                "SetSetpoint": { "target": target, "value_f": value }
            }));
            let response = send_command(host, port, command).await?;
            print_command_result("Setpoint", &format!("{target} = {value:.1}F"), &response, format);
        }
        ("override", Some(sub_matches)) => {
            handle_override_command(sub_matches, host, port, format).await?;
        }
        ("occupancy", Some(sub_matches)) => match sub_matches.subcommand() {
            ("set", Some(set_matches)) => {
                let occupied = set_matches.value_of("state").unwrap() == "occupied";
                let command = variant_json(serde_json::json!({
                    "SetOccupancyOverride": { "occupied": occupied }
                }));
                let response = send_command(host, port, command).await?;
                let label = if occupied { "OCCUPIED" } else { "UNOCCUPIED" };
                print_command_result("Occupancy", label, &response, format);
            }
            ("auto", _) => {
                let command = command_json("ClearOccupancyOverride");
                let response = send_command(host, port, command).await?;
                print_command_result("Occupancy", "AUTO (schedule)", &response, format);
            }
            _ => {
                println!("{}", "Occupancy subcommand required. Use 'rtuctl occupancy --help'.".yellow());
            }
        },
        ("estop", Some(sub_matches)) => {
            let asserted = sub_matches.value_of("state").unwrap() == "on";
            let command = variant_json(serde_json::json!({
                "SetEmergencyStop": { "asserted": asserted }
            }));
            let response = send_command(host, port, command).await?;
            let label = if asserted { "ASSERTED" } else { "RELEASED" };
            print_command_result("Emergency Stop", label, &response, format);
        }
        ("alarms", Some(sub_matches)) => match sub_matches.subcommand() {
            ("ack", Some(ack_matches)) => {
                let alarm = match ack_matches.value_of("alarm").unwrap() {
                    "fan-failure" => "FanFailure",
                    "low-discharge-temp" => "LowDischargeTemp",
                    _ => "HighZoneTemp",
                };
                let command = variant_json(serde_json::json!({ "AckAlarm": { "alarm": alarm } }));
                let response = send_command(host, port, command).await?;
                print_command_result("Alarm Ack", alarm, &response, format);
            }
            ("enable", _) => {
                let command = variant_json(serde_json::json!({ "SetAlarmsEnabled": { "enabled": true } }));
                let response = send_command(host, port, command).await?;
                print_command_result("Alarms", "ENABLED", &response, format);
            }
            ("disable", _) => {
                let command = variant_json(serde_json::json!({ "SetAlarmsEnabled": { "enabled": false } }));
                let response = send_command(host, port, command).await?;
                print_command_result("Alarms", "DISABLED", &response, format);
            }
            _ => {
                println!("{}", "Alarms subcommand required. Use 'rtuctl alarms --help'.".yellow());
            }
        },
        ("fan", Some(sub_matches)) => match sub_matches.subcommand() {
            ("reset", _) => {
                let response = send_command(host, port, command_json("ResetFanFailure")).await?;
                print_command_result("Fan Failure", "RESET", &response, format);
            }
            _ => {
                println!("{}", "Fan subcommand required. Use 'rtuctl fan --help'.".yellow());
            }
        },
        ("monitor", _) => {
            println!("{}", "Monitoring RTU status (Press Ctrl+C to stop)...".bright_blue().bold());
            match format {
                "json" => monitor_status_json(host, port).await?,
                "compact" => monitor_status_compact(host, port).await?,
                _ => monitor_status_table(host, port).await?,
            }
        }
        ("server", Some(sub_matches)) => {
            handle_server(sub_matches, port)?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the simulator", "rtuctl server".bright_cyan());
            println!("  {} Test connection", "rtuctl ping".bright_cyan());
            println!("  {} Watch live status", "rtuctl monitor".bright_cyan());
        }
    }

    Ok(())
}

fn state_arg() -> Arg<'static, 'static> {
    Arg::with_name("state")
        .help("Relay state")
        .required(true)
        .possible_values(&["on", "off"])
}

async fn handle_override_command(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        (relay @ ("fan" | "compressor" | "heat"), Some(sub_matches)) => {
            let on = sub_matches.value_of("state").unwrap() == "on";
            let relay_name = match relay {
                "fan" => "Fan",
                "compressor" => "Compressor",
                _ => "Heat",
            };
            let command = variant_json(serde_json::json!({
                "OverrideRelay": { "relay": relay_name, "on": on }
            }));
            let response = send_command(host, port, command).await?;
            let label = format!("{relay_name} = {}", if on { "ON" } else { "OFF" });
            print_command_result("Override", &label, &response, format);
        }
        ("damper", Some(sub_matches)) => {
            let position: u8 = sub_matches.value_of("position").unwrap().parse()?;
            let command = variant_json(serde_json::json!({
                "OverrideDamper": { "position_pct": position }
            }));
            let response = send_command(host, port, command).await?;
            print_command_result("Override", &format!("Damper = {position}%"), &response, format);
        }
        ("clear", Some(sub_matches)) => {
            let output = match sub_matches.value_of("output").unwrap() {
                "fan" => "Fan",
                "compressor" => "Compressor",
                "heat" => "Heat",
                _ => "Damper",
            };
            let command = variant_json(serde_json::json!({
                "ClearOverride": { "output": output }
            }));
            let response = send_command(host, port, command).await?;
            print_command_result("Override", &format!("{output} released"), &response, format);
        }
        _ => {
            println!("{}", "Override subcommand required. Use 'rtuctl override --help'.".yellow());
        }
    }
    Ok(())
}

fn handle_server(matches: &ArgMatches<'_>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let background = matches.is_present("background");

    println!("{}", "Starting RTU controller simulator...".bright_green().bold());

    let mut cmd = Command::new("cargo");
    cmd.args(&["run", "--bin", "rtuctl-sim"]);

    if background {
        cmd.spawn()?;
        println!("{} Simulator started in background on port {}", "OK".green(), port);
    } else {
        println!("{} Simulator starting on port {} (Press Ctrl+C to stop)", "::".bright_blue(), port);
        cmd.status()?;
    }

    Ok(())
}

// Helper functions

fn response_succeeded(response: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(response)
        .map(|parsed| parsed["status"] == "Success")
        .unwrap_or(false)
}

fn print_command_result(action: &str, value: &str, response: &str, format: &str) {
    match format {
        "json" => println!("{}", response),
        "compact" => println!("{}", "OK".bright_green()),
        _ => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) {
                let status = parsed["status"].as_str().unwrap_or("Unknown");
                match status {
                    "Success" => {
                        println!("{} {} set to {}", "OK".green(), action.bright_white(), value.bright_cyan());
                    }
                    "NegativeAck" => {
                        let message = parsed["message"].as_str().unwrap_or("Command rejected");
                        println!("{} {} failed: {}", "!!".red(), action.bright_white(), message.bright_red());

                        if message.contains("emergency stop") {
                            println!("{} Try: {}", "->".yellow(), "rtuctl estop off".bright_cyan());
                        }
                    }
                    "ExecutionFailed" | "Error" => {
                        let message = parsed["message"].as_str().unwrap_or("Execution failed");
                        println!("{} {} execution failed: {}", "!!".yellow(), action.bright_white(), message.bright_red());
                    }
                    _ => {
                        let message = parsed["message"].as_str().unwrap_or("Unknown error");
                        println!("{} {} status {}: {}", "??".blue(), action.bright_white(), status.bright_blue(), message);
                    }
                }
            } else {
                println!("{} {}", "OK".green(), "Command completed".bright_green());
            }
        }
    }
}

async fn send_command(host: &str, port: u16, command: String) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{} Failed to connect to RTU controller at {}", "!!".red(), addr.bright_white());

            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Simulator is not running. Start it with:", "->".yellow());
                eprintln!("   {}", "rtuctl server".bright_cyan());
                eprintln!("   or");
                eprintln!("   {}", "cargo run --bin rtuctl-sim".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "!!".yellow(), e.to_string().bright_red());
            }

            return Err(e.into());
        }
    };

    match tokio::time::timeout(std::time::Duration::from_secs(5), async {
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;

        let mut buffer = vec![0; 1024];
        let n = stream.read(&mut buffer).await?;

        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Server closed connection",
            ));
        }

        let response = String::from_utf8_lossy(&buffer[..n]);
        Ok(response.to_string())
    })
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Command timed out after 5 seconds", "!!".yellow());
            Err("Command timeout".into())
        }
    }
}

async fn monitor_status_table(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect((host, port)).await?;

    println!("{}", "┌──────────┬────────┬────────┬─────────────────┬─────┬─────┬─────┬────────┬────────┐".bright_white());
    println!("{}", "│ Time     │ Zone   │ OAT    │ Mode            │ Fan │ Y1  │ W1  │ Damper │ Alarms │".bright_white());
    println!("{}", "├──────────┼────────┼────────┼─────────────────┼─────┼─────┼─────┼────────┼────────┤".bright_white());

    let mut buffer = vec![0; 16384];

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }

        let data = String::from_utf8_lossy(&buffer[..n]);

        for line in data.lines() {
            if let Ok(status) = serde_json::from_str::<serde_json::Value>(line) {
                let timestamp = status["timestamp"].as_u64().unwrap_or(0);
                let zone = status["sensors"]["zone_temp_f"].as_f64().unwrap_or(0.0);
                let oat = status["sensors"]["outdoor_temp_f"].as_f64().unwrap_or(0.0);
                let unit_state = status["unit_state"].as_str().unwrap_or("?");
                let fan = status["outputs"]["fan"].as_bool().unwrap_or(false);
                let compressor = status["outputs"]["compressor"].as_bool().unwrap_or(false);
                let heat = status["outputs"]["heat"].as_bool().unwrap_or(false);
                let damper = status["outputs"]["damper_position"].as_u64().unwrap_or(0);
                let alarms = status["alarms"]
                    .as_array()
                    .map(|a| a.iter().filter(|r| r["cleared_at_ms"].is_null()).count())
                    .unwrap_or(0);

                let time_str = format!("{:>8}", timestamp / 1000);
                let zone_str = format!("{zone:>5.1}F");
                let oat_str = format!("{oat:>5.1}F");
                let mode_str = format!("{unit_state:<15}");
                let mode_str = match unit_state {
                    "EmergencyStop" | "FanFailure" => mode_str.bright_red(),
                    "Cooling" | "EconomizerCooling" => mode_str.bright_cyan(),
                    "Heating" => mode_str.bright_yellow(),
                    _ => mode_str.white(),
                };
                let relay = |on: bool| if on { " ON".green() } else { "OFF".dimmed() };
                let alarm_str = if alarms > 0 {
                    format!("{alarms:>6}").bright_red()
                } else {
                    format!("{alarms:>6}").green()
                };

                println!(
                    "│ {} │ {} │ {} │ {} │ {} │ {} │ {} │ {:>5}% │ {} │",
                    time_str, zone_str, oat_str, mode_str,
                    relay(fan), relay(compressor), relay(heat), damper, alarm_str
                );
            }
        }
    }

    Ok(())
}

async fn monitor_status_json(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let mut buffer = vec![0; 16384];

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        print!("{}", String::from_utf8_lossy(&buffer[..n]));
    }

    Ok(())
}

async fn monitor_status_compact(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let mut buffer = vec![0; 16384];

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }

        let data = String::from_utf8_lossy(&buffer[..n]);

        for line in data.lines() {
            if let Ok(status) = serde_json::from_str::<serde_json::Value>(line) {
                let timestamp = status["timestamp"].as_u64().unwrap_or(0);
                let zone = status["sensors"]["zone_temp_f"].as_f64().unwrap_or(0.0);
                let unit_state = status["unit_state"].as_str().unwrap_or("?");
                let estop = status["emergency_stop"].as_bool().unwrap_or(false);

                let tag = if estop {
                    "ESTOP".red()
                } else {
                    match unit_state {
                        "FanFailure" => "FAULT".red(),
                        "Off" => "IDLE".dimmed(),
                        _ => "RUN".green(),
                    }
                };

                println!("[{}] {} | {:.1}F | {}", timestamp / 1000, tag, zone, unit_state);
            }
        }
    }

    Ok(())
}

// Command creation helpers

fn command_json(command_type: &str) -> String {
    serde_json::json!({
        "id": current_timestamp() as u32,
        "timestamp": current_timestamp(),
        "command_type": command_type
    })
    .to_string()
}

fn variant_json(command_type: serde_json::Value) -> String {
    serde_json::json!({
        "id": current_timestamp() as u32,
        "timestamp": current_timestamp(),
        "command_type": command_type
    })
    .to_string()
}

fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
