use async_trait::async_trait;
use tracing::info;

use crate::domain::{ActuatorMode, ActuatorType, CurrentUser};

use super::{CommandContext, CommandError, CommandHandler, Reply};

const USAGE: &str = "You need to provide the ecosystem, the actuator, the mode and \
                     optionally a countdown (in seconds)";

#[derive(Debug, PartialEq)]
pub(super) struct SwitchRequest<'a> {
    pub ecosystem: &'a str,
    pub actuator: ActuatorType,
    pub mode: ActuatorMode,
    pub countdown: f64,
}

/// Validate `<ecosystem> <actuator> <mode> [countdown]`.
pub(super) fn parse_switch_args(args: &[String]) -> Result<SwitchRequest<'_>, CommandError> {
    let (ecosystem, actuator, mode, countdown) = match args {
        [e, a, m] => (e, a, m, None),
        [e, a, m, c] => (e, a, m, Some(c)),
        _ => return Err(CommandError::InvalidArguments(USAGE.to_string())),
    };

    let actuator: ActuatorType = actuator.parse().map_err(|_| {
        CommandError::InvalidArguments(format!(
            "Actuator '{actuator}' is not a valid actuator. Valid actuators are: {}",
            ActuatorType::valid_names()
        ))
    })?;
    let mode: ActuatorMode = mode.parse().map_err(|_| {
        CommandError::InvalidArguments("Mode has to be 'on', 'off' or 'automatic'.".to_string())
    })?;
    let countdown = match countdown {
        None => 0.0,
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v,
            _ => {
                return Err(CommandError::InvalidArguments(format!(
                    "Countdown '{raw}' has to be a non-negative number of seconds."
                )))
            }
        },
    };

    Ok(SwitchRequest {
        ecosystem,
        actuator,
        mode,
        countdown,
    })
}

/// `/switch_actuator <ecosystem> <actuator> <mode> [countdown]`
pub struct SwitchActuator;

#[async_trait]
impl CommandHandler for SwitchActuator {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let request = parse_switch_args(ctx.args)?;

        let session = ctx.session().await?;
        let Some(ecosystem) = session.get_ecosystem(request.ecosystem).await? else {
            return Err(CommandError::NotFound(format!(
                "No ecosystem named '{}' was found.",
                request.ecosystem
            )));
        };
        let manageable = session
            .get_actuator_state(&ecosystem, request.actuator)
            .await?
            .is_some_and(|state| state.active);
        if !manageable {
            return Err(CommandError::NotFound(format!(
                "Ecosystem {} cannot manage {}.",
                request.ecosystem, request.actuator
            )));
        }

        ctx.services
            .dispatcher
            .dispatch_control(&ecosystem, request.actuator, request.mode, request.countdown)
            .await?;
        info!(
            user_id = ctx.user_id.0,
            ecosystem = %ecosystem.uid,
            actuator = %request.actuator,
            mode = %request.mode,
            countdown = request.countdown,
            "Sent actuator request"
        );

        Ok(Reply::Text(format!(
            "A request to turn {} to {} has been sent to {}.",
            request.actuator, request.mode, request.ecosystem
        )))
    }
}
