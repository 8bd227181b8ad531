use serde_json::{ Map, Value };

pub const SETTING_DIAL_ENTITY_ID: &str = "dial_entity_id";
pub const SETTING_DIAL_STEP_SIZE: &str = "dial_step_size";
pub const SETTING_DIAL_TURN_SERVICE: &str = "dial_turn_service";
pub const SETTING_DIAL_PRESS_SERVICE: &str = "dial_press_service";

pub const DEFAULT_STEP_SIZE: i64 = 1;
pub const MIN_STEP_SIZE: i64 = 1;
pub const MAX_STEP_SIZE: i64 = 100;

/// Persisted state of one dial action instance. Empty strings mean "not configured".
///
/// `step_size` is not clamped here; only the inspector row bounds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialConfiguration {
    pub entity_id: String,
    pub step_size: i64,
    pub turn_service: String,
    pub press_service: String,
}

impl Default for DialConfiguration {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            step_size: DEFAULT_STEP_SIZE,
            turn_service: String::new(),
            press_service: String::new(),
        }
    }
}

impl DialConfiguration {
    /// Missing or unusable keys fall back to the defaults.
    pub fn from_settings(settings: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            entity_id: settings
                .get(SETTING_DIAL_ENTITY_ID)
                .and_then(value_as_string)
                .unwrap_or(defaults.entity_id),
            step_size: settings
                .get(SETTING_DIAL_STEP_SIZE)
                .and_then(value_as_i64)
                .unwrap_or(defaults.step_size),
            turn_service: settings
                .get(SETTING_DIAL_TURN_SERVICE)
                .and_then(value_as_string)
                .unwrap_or(defaults.turn_service),
            press_service: settings
                .get(SETTING_DIAL_PRESS_SERVICE)
                .and_then(value_as_string)
                .unwrap_or(defaults.press_service),
        }
    }

    /// Overwrites the four dial keys; other keys in `settings` are left alone.
    pub fn write_into(&self, settings: &mut Map<String, Value>) {
        settings.insert(SETTING_DIAL_ENTITY_ID.into(), Value::String(self.entity_id.clone()));
        settings.insert(SETTING_DIAL_STEP_SIZE.into(), Value::from(self.step_size));
        settings.insert(SETTING_DIAL_TURN_SERVICE.into(), Value::String(self.turn_service.clone()));
        settings.insert(
            SETTING_DIAL_PRESS_SERVICE.into(),
            Value::String(self.press_service.clone())
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialField {
    EntityId,
    StepSize,
    TurnService,
    PressService,
}

impl DialField {
    pub const ALL: [DialField; 4] = [
        DialField::EntityId,
        DialField::StepSize,
        DialField::TurnService,
        DialField::PressService,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DialField::EntityId => SETTING_DIAL_ENTITY_ID,
            DialField::StepSize => SETTING_DIAL_STEP_SIZE,
            DialField::TurnService => SETTING_DIAL_TURN_SERVICE,
            DialField::PressService => SETTING_DIAL_PRESS_SERVICE,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// Text values arrive as JSON strings, trimmed; other scalars are stringified and null reads as "".
pub(crate) fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => Some(String::new()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers, floats (rounded) and numeric strings are accepted.
pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        }
        _ => None,
    }
}
