//! The per-`(robot_id, metric)` hysteresis state machine (§4.F), kept pure
//! and independent of storage so it can be exhaustively unit tested.

use aetheris_shared::{Direction, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Normal,
    Warning,
    Critical,
}

/// One action the engine must take against the Entity Store/outbound
/// `alerts` stream as a side effect of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// Open (or update, if already open) the alert at this severity.
    Open(Severity),
    /// Resolve the currently-open alert at this severity, if any.
    Resolve(Severity),
}

fn crossed_adverse(value: f64, threshold: f64, direction: Direction) -> bool {
    match direction {
        Direction::High => value >= threshold,
        Direction::Low => value <= threshold,
    }
}

fn recovered_past(value: f64, threshold: f64, hysteresis: f64, direction: Direction) -> bool {
    match direction {
        Direction::High => value <= threshold - hysteresis,
        Direction::Low => value >= threshold + hysteresis,
    }
}

/// Evaluates one observation against the current state, per the §4.F
/// diagram, returning the new state and the store-level events the caller
/// must apply.
pub fn evaluate(
    state: AlertState,
    observation: f64,
    warn: f64,
    crit: f64,
    h_w: f64,
    h_c: f64,
    direction: Direction,
) -> (AlertState, Vec<AlertEvent>) {
    match state {
        AlertState::Normal => {
            if crossed_adverse(observation, crit, direction) {
                // normal -> critical direct: both rows are written, but the
                // warning one is resolved immediately, only critical stays
                // open (§4.F).
                (
                    AlertState::Critical,
                    vec![
                        AlertEvent::Open(Severity::Warning),
                        AlertEvent::Resolve(Severity::Warning),
                        AlertEvent::Open(Severity::Critical),
                    ],
                )
            } else if crossed_adverse(observation, warn, direction) {
                (AlertState::Warning, vec![AlertEvent::Open(Severity::Warning)])
            } else {
                (AlertState::Normal, Vec::new())
            }
        }
        AlertState::Warning => {
            if crossed_adverse(observation, crit, direction) {
                (AlertState::Critical, vec![AlertEvent::Open(Severity::Critical)])
            } else if recovered_past(observation, warn, h_w, direction) {
                (AlertState::Normal, vec![AlertEvent::Resolve(Severity::Warning)])
            } else {
                (AlertState::Warning, Vec::new())
            }
        }
        AlertState::Critical => {
            if recovered_past(observation, crit, h_c, direction) {
                (AlertState::Warning, vec![AlertEvent::Resolve(Severity::Critical)])
            } else {
                (AlertState::Critical, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARN: f64 = 60.0;
    const CRIT: f64 = 80.0;
    const H_W: f64 = 2.0;
    const H_C: f64 = 3.0;

    #[test]
    fn normal_to_warning_on_crossing_warn() {
        let (state, events) = evaluate(AlertState::Normal, 65.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Warning);
        assert_eq!(events, vec![AlertEvent::Open(Severity::Warning)]);
    }

    #[test]
    fn warning_to_critical_on_crossing_crit() {
        let (state, events) = evaluate(AlertState::Warning, 85.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Critical);
        assert_eq!(events, vec![AlertEvent::Open(Severity::Critical)]);
    }

    #[test]
    fn critical_recovers_to_warning_below_hysteresis_band() {
        let (state, events) = evaluate(AlertState::Critical, 76.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Warning);
        assert_eq!(events, vec![AlertEvent::Resolve(Severity::Critical)]);
    }

    #[test]
    fn critical_stays_critical_above_hysteresis_band() {
        let (state, events) = evaluate(AlertState::Critical, 78.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Critical);
        assert_eq!(events, Vec::new());
    }

    #[test]
    fn warning_resolves_to_normal_below_hysteresis_band() {
        let (state, events) = evaluate(AlertState::Warning, 57.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Normal);
        assert_eq!(events, vec![AlertEvent::Resolve(Severity::Warning)]);
    }

    #[test]
    fn warning_stays_warning_within_hysteresis_band() {
        let (state, events) = evaluate(AlertState::Warning, 59.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Warning);
        assert_eq!(events, Vec::new());
    }

    #[test]
    fn direct_normal_to_critical_opens_and_resolves_warning() {
        let (state, events) = evaluate(AlertState::Normal, 95.0, WARN, CRIT, H_W, H_C, Direction::High);
        assert_eq!(state, AlertState::Critical);
        assert_eq!(
            events,
            vec![
                AlertEvent::Open(Severity::Warning),
                AlertEvent::Resolve(Severity::Warning),
                AlertEvent::Open(Severity::Critical),
            ]
        );
    }

    #[test]
    fn low_direction_warns_when_value_drops() {
        // Battery percentage: warn = 20, crit = 10, adverse direction is down.
        let (state, events) = evaluate(AlertState::Normal, 15.0, 20.0, 10.0, H_W, H_C, Direction::Low);
        assert_eq!(state, AlertState::Warning);
        assert_eq!(events, vec![AlertEvent::Open(Severity::Warning)]);
    }

    #[test]
    fn low_direction_recovers_when_value_rises_past_band() {
        let (state, events) = evaluate(AlertState::Warning, 23.0, 20.0, 10.0, H_W, H_C, Direction::Low);
        assert_eq!(state, AlertState::Normal);
        assert_eq!(events, vec![AlertEvent::Resolve(Severity::Warning)]);
    }
}
