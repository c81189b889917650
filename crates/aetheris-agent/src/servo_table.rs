//! Fixed servo inventory for the TonyPi humanoid platform (SPEC_FULL.md
//! Module A supplement): 18 PWM servos, named by joint, each with a declared
//! travel range. The servo schema itself (`position`, `temperature`, ...)
//! lives in `aetheris_shared::schema::SERVO_FIELD_SCHEMA`; this table is
//! just the inventory of named instances a TonyPi agent drives.

/// One entry in the fixed servo table: bus id, joint name, min/max angle.
#[derive(Debug, Clone, Copy)]
pub struct ServoSlot {
    pub id: u32,
    pub name: &'static str,
    pub angle_min: f64,
    pub angle_max: f64,
}

/// The 18 named TonyPi servos, bus ids matching Hiwonder's stock firmware
/// layout (head pan/tilt, two arms, two legs).
pub const TONYPI_SERVO_IDS: &[ServoSlot] = &[
    ServoSlot { id: 1, name: "head_pan", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 2, name: "head_tilt", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 3, name: "l_shoulder", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 4, name: "l_elbow", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 5, name: "l_wrist", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 6, name: "r_shoulder", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 7, name: "r_elbow", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 8, name: "r_wrist", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 9, name: "l_hip", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 10, name: "l_knee", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 11, name: "l_ankle", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 12, name: "l_hip_roll", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 13, name: "r_hip", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 14, name: "r_knee", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 15, name: "r_ankle", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 16, name: "r_hip_roll", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 17, name: "l_hip_yaw", angle_min: 0.0, angle_max: 1023.0 },
    ServoSlot { id: 18, name: "r_hip_yaw", angle_min: 0.0, angle_max: 1023.0 },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_eighteen_servos() {
        assert_eq!(TONYPI_SERVO_IDS.len(), 18);
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<u32> = TONYPI_SERVO_IDS.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), TONYPI_SERVO_IDS.len());
    }
}
