//! MQTT topic layout: everything for a unit lives under `aircon/<unit_id>/`.

pub const TOPIC_PREFIX: &str = "aircon";

pub const SUFFIX_SENSOR_MEASUREMENT: &str = "sensor/measurement";
pub const SUFFIX_OUTDOOR_OBSERVATION: &str = "outdoor/observation";
pub const SUFFIX_UNIT_STATE: &str = "unit/state";
pub const SUFFIX_UNIT_SET: &str = "unit/set";
pub const SUFFIX_CONTROLLER_STATE: &str = "controller/state";

pub const SUFFIX_CMD_THRESHOLDS: &str = "cmnd/thresholds";
pub const SUFFIX_CMD_AUTO: &str = "cmnd/auto";
pub const SUFFIX_CMD_YIELD: &str = "cmnd/yield";

/// Topics the controller listens on.
pub const CONTROLLER_SUBSCRIPTIONS: [&str; 6] = [
    SUFFIX_SENSOR_MEASUREMENT,
    SUFFIX_OUTDOOR_OBSERVATION,
    SUFFIX_UNIT_STATE,
    SUFFIX_CMD_THRESHOLDS,
    SUFFIX_CMD_AUTO,
    SUFFIX_CMD_YIELD,
];

pub fn unit_topic(unit_id: &str, suffix: &str) -> String {
    format!("{TOPIC_PREFIX}/{unit_id}/{suffix}")
}

/// Splits a unit topic back into its unit id and suffix.
pub fn parse_unit_topic(topic: &str) -> Option<(&str, &str)> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix('/')?;
    let (unit_id, suffix) = rest.split_once('/')?;
    if unit_id.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((unit_id, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_unit_topics() {
        let topic = unit_topic("study", SUFFIX_CMD_THRESHOLDS);
        assert_eq!(topic, "aircon/study/cmnd/thresholds");
        assert_eq!(
            parse_unit_topic(&topic),
            Some(("study", SUFFIX_CMD_THRESHOLDS))
        );
    }

    #[test]
    fn rejects_foreign_topics() {
        assert_eq!(parse_unit_topic("hvac/study/unit/state"), None);
        assert_eq!(parse_unit_topic("aircon//unit/state"), None);
        assert_eq!(parse_unit_topic("aircon/study"), None);
        assert_eq!(parse_unit_topic("airconx/study/unit/state"), None);
    }
}
