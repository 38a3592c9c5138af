use rtuctl::protocol::*;

fn ping_json(id: u32) -> String {
    format!(r#"{{"id":{id},"timestamp":1000,"command_type":"Ping"}}"#)
}

#[test]
fn test_parse_valid_command() {
    let mut handler = ProtocolHandler::new();
    let command = handler.parse_command(&ping_json(1)).expect("valid command parses");
    assert_eq!(command.id, 1);
    assert!(matches!(command.command_type, CommandType::Ping));
}

#[test]
fn test_parse_structured_command() {
    let mut handler = ProtocolHandler::new();
    let json = r#"{"id":7,"timestamp":1000,"command_type":{"SetSetpoint":{"target":"OccupiedCooling","value_f":72.5}}}"#;
    let command = handler.parse_command(json).expect("structured command parses");
    match command.command_type {
        CommandType::SetSetpoint { target, value_f } => {
            assert_eq!(target, SetpointTarget::OccupiedCooling);
            assert!((value_f - 72.5).abs() < f32::EPSILON);
        }
        other => panic!("unexpected command type: {other:?}"),
    }
}

#[test]
fn test_parse_invalid_json() {
    let mut handler = ProtocolHandler::new();
    assert!(matches!(handler.parse_command("not json"), Err(ProtocolError::InvalidJson)));
    assert!(matches!(
        handler.parse_command(r#"{"id":1,"command_type":"NoSuchCommand"}"#),
        Err(ProtocolError::InvalidJson)
    ));
}

#[test]
fn test_parse_oversized_command() {
    let mut handler = ProtocolHandler::new();
    let oversized = format!(
        r#"{{"id":1,"timestamp":1000,"command_type":"Ping","padding":"{}"}}"#,
        "x".repeat(MAX_COMMAND_SIZE)
    );
    assert!(matches!(handler.parse_command(&oversized), Err(ProtocolError::MessageTooLarge)));
}

#[test]
fn test_validate_rejects_zero_id() {
    let mut handler = ProtocolHandler::new();
    let command = handler.parse_command(&ping_json(1)).unwrap();
    let mut zero_id = command;
    zero_id.id = 0;
    assert_eq!(handler.validate_command(&zero_id), Err(ProtocolError::InvalidCommand));
}

#[test]
fn test_validate_setpoint_range() {
    let handler = ProtocolHandler::new();
    let command = Command {
        id: 1,
        timestamp: 1000,
        command_type: CommandType::SetSetpoint {
            target: SetpointTarget::OccupiedCooling,
            value_f: 120.0,
        },
    };
    assert_eq!(handler.validate_command(&command), Err(ProtocolError::InvalidParameter));

    let nan = Command {
        id: 2,
        timestamp: 1000,
        command_type: CommandType::SetSetpoint {
            target: SetpointTarget::OccupiedCooling,
            value_f: f32::NAN,
        },
    };
    assert_eq!(handler.validate_command(&nan), Err(ProtocolError::InvalidParameter));
}

#[test]
fn test_validate_damper_override_range() {
    let handler = ProtocolHandler::new();
    let command = Command {
        id: 1,
        timestamp: 1000,
        command_type: CommandType::OverrideDamper { position_pct: 101 },
    };
    assert_eq!(handler.validate_command(&command), Err(ProtocolError::InvalidParameter));

    let ok = Command {
        id: 2,
        timestamp: 1000,
        command_type: CommandType::OverrideDamper { position_pct: 100 },
    };
    assert!(handler.validate_command(&ok).is_ok());
}

#[test]
fn test_response_serialization_roundtrip() {
    let mut handler = ProtocolHandler::new();
    let response = handler.create_response(42, ResponseStatus::Success, Some("done"), 5000);
    let json = handler.serialize_response(&response).expect("serializes").to_string();

    let parsed: CommandResponse = serde_json::from_str(&json).expect("roundtrips");
    assert_eq!(parsed.id, 42);
    assert_eq!(parsed.status, ResponseStatus::Success);
    assert_eq!(parsed.message.as_deref(), Some("done"));
}

#[test]
fn test_command_tracking_lifecycle() {
    let mut handler = ProtocolHandler::new();
    handler.track_command(10, 1000, 30_000).expect("tracks");

    let tracker = handler.get_command_status(10).expect("tracked");
    assert_eq!(tracker.status, ResponseStatus::Acknowledged);
    assert!(tracker.execution_start_time.is_none());

    handler
        .update_command_status(10, ResponseStatus::ExecutionStarted, 1500)
        .expect("updates");
    let tracker = handler.get_command_status(10).unwrap();
    assert_eq!(tracker.status, ResponseStatus::ExecutionStarted);
    assert_eq!(tracker.execution_start_time, Some(1500));

    handler.update_command_status(10, ResponseStatus::Success, 2000).expect("completes");
    assert_eq!(handler.get_command_status(10).unwrap().status, ResponseStatus::Success);
}

#[test]
fn test_duplicate_tracking_rejected() {
    let mut handler = ProtocolHandler::new();
    handler.track_command(10, 1000, 30_000).expect("tracks");
    assert_eq!(handler.track_command(10, 1100, 30_000), Err(ProtocolError::InvalidCommand));
}

#[test]
fn test_tracked_commands_expire() {
    let mut handler = ProtocolHandler::new();
    handler.track_command(10, 1000, 30_000).expect("tracks");

    handler.cleanup_expired_commands(20_000);
    assert!(handler.get_command_status(10).is_some());

    handler.cleanup_expired_commands(31_001);
    assert!(handler.get_command_status(10).is_none());
}

#[test]
fn test_unknown_command_status_update_fails() {
    let mut handler = ProtocolHandler::new();
    assert_eq!(
        handler.update_command_status(99, ResponseStatus::Success, 1000),
        Err(ProtocolError::InvalidCommand)
    );
}
