use std::{ fmt, sync::Arc };

use serde_json::{ Map, Value };

use crate::{
    dial::{
        parse_service_id,
        settings::{ value_as_i64, value_as_string, MAX_STEP_SIZE, MIN_STEP_SIZE },
        DialConfiguration,
        DialField,
        FieldError,
        ParseServiceIdError,
        ServiceInvoker,
        SettingsError,
        SettingsStore,
    },
    error,
    info,
    locale::Locale,
    logger::ActionLog,
    rows::{ ConfigRow, RowGroup },
};

pub const PARAM_ENTITY_ID: &str = "entity_id";
pub const PARAM_BRIGHTNESS_STEP_PCT: &str = "brightness_step_pct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialEvent {
    Press,
    TurnClockwise,
    TurnCounterClockwise,
}

impl fmt::Display for DialEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialEvent::Press => "press",
            DialEvent::TurnClockwise => "clockwise turn",
            DialEvent::TurnCounterClockwise => "counter-clockwise turn",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoEntity,
    NoService,
    MalformedService(ParseServiceIdError),
}

/// What `handle_event` did. Never an error: failures are logged and reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Invoked,
    Skipped(SkipReason),
    Failed(String),
}

/// One dial action instance on the deck.
///
/// Holds the in-memory [`DialConfiguration`] and writes it through to the
/// [`SettingsStore`] after every field change.
pub struct DialActionController {
    action_id: String,
    config: DialConfiguration,
    settings: Arc<dyn SettingsStore>,
    invoker: Arc<dyn ServiceInvoker>,
    logger: Arc<dyn ActionLog>,
}

impl DialActionController {
    pub fn load(
        action_id: &str,
        settings: Arc<dyn SettingsStore>,
        invoker: Arc<dyn ServiceInvoker>,
        logger: Arc<dyn ActionLog>
    ) -> Self {
        let config = DialConfiguration::from_settings(&settings.get(action_id));
        Self {
            action_id: action_id.to_string(),
            config,
            settings,
            invoker,
            logger,
        }
    }

    pub fn config(&self) -> &DialConfiguration {
        &self.config
    }

    /// Re-reads the configuration after the host pushed new settings.
    pub fn reload(&mut self) {
        self.config = DialConfiguration::from_settings(&self.settings.get(&self.action_id));
    }

    /// Issues at most one service call. `_payload` is the host's event payload; it
    /// does not influence the call.
    pub fn handle_event(&self, event: DialEvent, _payload: &Value) -> EventOutcome {
        let cfg = &self.config;
        if cfg.entity_id.is_empty() {
            info!(self.logger, "DialAction: no entity id configured, ignoring {}", event);
            return EventOutcome::Skipped(SkipReason::NoEntity);
        }

        let (raw_service, step) = match event {
            DialEvent::Press => (&cfg.press_service, None),
            DialEvent::TurnClockwise => (&cfg.turn_service, Some(cfg.step_size)),
            DialEvent::TurnCounterClockwise => (&cfg.turn_service, Some(cfg.step_size.saturating_neg())),
        };

        if raw_service.is_empty() {
            info!(self.logger, "DialAction: {} on {} but no service configured", event, cfg.entity_id);
            return EventOutcome::Skipped(SkipReason::NoService);
        }

        let service_id = match parse_service_id(raw_service) {
            Ok(id) => id,
            Err(e) => {
                info!(
                    self.logger,
                    "DialAction: invalid service format '{}' ({}), expected 'domain.service'",
                    raw_service,
                    e
                );
                return EventOutcome::Skipped(SkipReason::MalformedService(e));
            }
        };

        let mut parameters = Map::new();
        parameters.insert(PARAM_ENTITY_ID.into(), Value::String(cfg.entity_id.clone()));
        if let Some(step) = step {
            parameters.insert(PARAM_BRIGHTNESS_STEP_PCT.into(), Value::from(step));
        }

        info!(
            self.logger,
            "DialAction: {} -> calling '{}' on '{}' with {}",
            event,
            service_id,
            cfg.entity_id,
            Value::Object(parameters.clone())
        );

        match self.invoker.call(&cfg.entity_id, service_id.service, &parameters) {
            Ok(()) => EventOutcome::Invoked,
            Err(e) => {
                error!(
                    self.logger,
                    "DialAction: calling '{}' on '{}' failed: {}",
                    service_id,
                    cfg.entity_id,
                    e
                );
                EventOutcome::Failed(e.to_string())
            }
        }
    }

    /// `base` comes first; the dial group is appended after it.
    pub fn build_configuration_rows(&self, mut base: Vec<RowGroup>, locale: &Locale) -> Vec<RowGroup> {
        let cfg = &self.config;
        let rows = vec![
            ConfigRow::text(
                DialField::EntityId.key(),
                locale.get("dial.entity_id.title"),
                &cfg.entity_id
            ).with_placeholder(locale.get("dial.entity_id.placeholder")),
            ConfigRow::number(
                DialField::StepSize.key(),
                locale.get("dial.step_size.title"),
                cfg.step_size,
                MIN_STEP_SIZE,
                MAX_STEP_SIZE
            ),
            ConfigRow::text(
                DialField::TurnService.key(),
                locale.get("dial.turn_service.title"),
                &cfg.turn_service
            ).with_placeholder(locale.get("dial.turn_service.placeholder")),
            ConfigRow::text(
                DialField::PressService.key(),
                locale.get("dial.press_service.title"),
                &cfg.press_service
            ).with_placeholder(locale.get("dial.press_service.placeholder")),
        ];

        base.push(RowGroup {
            title: locale.get("dial.group.title"),
            rows,
        });
        base
    }

    /// Updates one field and persists the whole configuration before returning.
    /// The in-memory copy only changes once the store accepted the write.
    pub fn on_field_changed(&mut self, field: DialField, value: &Value) -> Result<(), FieldError> {
        let mut updated = self.config.clone();
        match field {
            DialField::StepSize => {
                updated.step_size = value_as_i64(value).ok_or_else(||
                    FieldError::InvalidStepSize(value.clone())
                )?;
            }
            DialField::EntityId | DialField::TurnService | DialField::PressService => {
                let text = value_as_string(value).ok_or_else(||
                    FieldError::InvalidText(value.clone())
                )?;
                match field {
                    DialField::EntityId => {
                        updated.entity_id = text;
                    }
                    DialField::TurnService => {
                        updated.turn_service = text;
                    }
                    _ => {
                        updated.press_service = text;
                    }
                }
            }
        }

        self.persist(&updated)?;
        self.config = updated;
        Ok(())
    }

    fn persist(&self, config: &DialConfiguration) -> Result<(), SettingsError> {
        let mut settings = self.settings.get(&self.action_id);
        config.write_into(&mut settings);
        self.settings.set(&self.action_id, settings)
    }
}
