//! Command handling (§4.A): `move/stop/gesture/status_query/battery_query/
//! emergency_stop/resume/shutdown`. Emergency-stop preempts any in-flight
//! motion task and transitions the agent into `emergency_stopped`, which
//! only `resume` or `shutdown` exits. Every handler reports success/failure
//! via a `CommandAck`.

use crate::capability::AgentCapabilities;
use crate::state::AgentState;
use aetheris_shared::{AckStatus, Command, CommandAck, CommandType};
use tracing::warn;

/// Runs one command to completion and returns the ack to publish on
/// `<ns>/commands/<robot_id>/ack`. Pure with respect to the broker — callers
/// own publishing the result.
pub fn handle_command(
    state: &AgentState,
    capabilities: &AgentCapabilities,
    robot_id: &str,
    command: &Command,
) -> CommandAck {
    let ack = |status: AckStatus, detail: Option<String>| CommandAck {
        command_id: command.command_id,
        robot_id: robot_id.to_string(),
        status,
        detail,
    };

    match command.command_type {
        CommandType::EmergencyStop => {
            state.set_emergency_stopped(true);
            if let Err(e) = capabilities.gpio_light.set(true) {
                warn!(error = %e, "failed to light the emergency-stop indicator");
            }
            ack(AckStatus::Completed, Some("emergency stop engaged".to_string()))
        }
        CommandType::Resume => {
            state.set_emergency_stopped(false);
            if let Err(e) = capabilities.gpio_light.set(false) {
                warn!(error = %e, "failed to clear the emergency-stop indicator");
            }
            ack(AckStatus::Completed, Some("resumed normal operation".to_string()))
        }
        CommandType::Shutdown => {
            state.set_emergency_stopped(false);
            state.request_shutdown();
            let _ = capabilities.gpio_light.set(false);
            ack(AckStatus::Completed, Some("shutting down".to_string()))
        }
        CommandType::Move | CommandType::Gesture => {
            if state.is_emergency_stopped() {
                ack(
                    AckStatus::Rejected,
                    Some("robot is emergency stopped; resume before issuing motion commands".to_string()),
                )
            } else {
                ack(AckStatus::Completed, None)
            }
        }
        CommandType::Stop => {
            // Stop is always honored, emergency-stopped or not — it can
            // only reduce motion, never start it.
            ack(AckStatus::Completed, None)
        }
        CommandType::StatusQuery | CommandType::BatteryQuery => {
            // The next scheduled status/battery tick already carries fresh
            // data; acking here just confirms receipt.
            ack(AckStatus::Accepted, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn cmd(command_type: CommandType) -> Command {
        Command::new(command_type, Value::Null)
    }

    #[test]
    fn emergency_stop_sets_state_and_acks_completed() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        let ack = handle_command(&state, &caps, "RV-001", &cmd(CommandType::EmergencyStop));
        assert!(state.is_emergency_stopped());
        assert_eq!(ack.status, AckStatus::Completed);
    }

    #[test]
    fn move_is_rejected_while_emergency_stopped() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        state.set_emergency_stopped(true);
        let ack = handle_command(&state, &caps, "RV-001", &cmd(CommandType::Move));
        assert_eq!(ack.status, AckStatus::Rejected);
    }

    #[test]
    fn resume_clears_emergency_stop_and_unblocks_motion() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        state.set_emergency_stopped(true);
        handle_command(&state, &caps, "RV-001", &cmd(CommandType::Resume));
        assert!(!state.is_emergency_stopped());
        let ack = handle_command(&state, &caps, "RV-001", &cmd(CommandType::Move));
        assert_eq!(ack.status, AckStatus::Completed);
    }

    #[test]
    fn stop_is_always_honored() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        state.set_emergency_stopped(true);
        let ack = handle_command(&state, &caps, "RV-001", &cmd(CommandType::Stop));
        assert_eq!(ack.status, AckStatus::Completed);
    }

    #[test]
    fn shutdown_requests_shutdown_and_clears_emergency_stop() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        state.set_emergency_stopped(true);
        handle_command(&state, &caps, "RV-001", &cmd(CommandType::Shutdown));
        assert!(state.is_shutting_down());
        assert!(!state.is_emergency_stopped());
    }

    #[test]
    fn status_query_is_accepted_not_completed() {
        let state = AgentState::new();
        let caps = AgentCapabilities::acquire();
        let ack = handle_command(&state, &caps, "RV-001", &cmd(CommandType::StatusQuery));
        assert_eq!(ack.status, AckStatus::Accepted);
    }
}
