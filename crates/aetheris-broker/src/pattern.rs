//! MQTT topic pattern matching (`+` single-level, `#` multi-level trailing
//! wildcard), used to route an incoming publish to the right ingress queue
//! without the adapter needing to understand payloads (§4.B).

/// Returns true if `topic` matches `pattern` under standard MQTT wildcard
/// rules.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_parts = pattern.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (Some(_), Some(_)) => return false,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_matches_single_level() {
        assert!(topic_matches("tonypi/sensors/+", "tonypi/sensors/RV-001"));
        assert!(!topic_matches("tonypi/sensors/+", "tonypi/sensors/RV-001/extra"));
    }

    #[test]
    fn hash_matches_multi_level() {
        assert!(topic_matches("tonypi/commands/#", "tonypi/commands/RV-001"));
        assert!(topic_matches(
            "tonypi/commands/#",
            "tonypi/commands/RV-001/ack"
        ));
    }

    #[test]
    fn exact_match_without_wildcards() {
        assert!(topic_matches("tonypi/alerts", "tonypi/alerts"));
        assert!(!topic_matches("tonypi/alerts", "tonypi/alerts/RV-001"));
    }

    #[test]
    fn mismatched_prefix_fails() {
        assert!(!topic_matches("tonypi/sensors/+", "other/sensors/RV-001"));
    }
}
