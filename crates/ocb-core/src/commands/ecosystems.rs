//! Read-only ecosystem queries.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    domain::{CurrentUser, EcosystemSelector, SensorReading},
    formatting::{humanize, round2},
};

use super::{CommandContext, CommandError, CommandHandler, Reply};

/// `/ecosystems`
pub struct ListEcosystems;

#[async_trait]
impl CommandHandler for ListEcosystems {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let session = ctx.session().await?;
        let ecosystems = session.get_ecosystems(&EcosystemSelector::Recent).await?;

        let names: Vec<Value> = ecosystems
            .iter()
            .map(|e| json!({ "name": e.name }))
            .collect();
        let html = ctx
            .services
            .templates
            .render("ecosystems_available", &json!({ "ecosystems": names }))?;
        Ok(Reply::Html(html))
    }
}

/// `/ecosystems_status [names...]`
pub struct EcosystemsStatus;

#[async_trait]
impl CommandHandler for EcosystemsStatus {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let session = ctx.session().await?;
        let selector = EcosystemSelector::from_args(ctx.args);
        let ecosystems = session.get_ecosystems(&selector).await?;

        let data: Vec<Value> = ecosystems
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "status": e.status,
                    "connected": e.connected,
                    "last_seen": e.last_seen,
                })
            })
            .collect();
        let html = ctx
            .services
            .templates
            .render("ecosystems_status", &json!({ "ecosystems": data }))?;
        Ok(Reply::Html(html))
    }
}

/// Mean value per measure, in order of first appearance.
pub(super) fn summarize_readings(readings: &[SensorReading]) -> Vec<(String, f64)> {
    let mut order: Vec<&str> = Vec::new();
    let mut values: HashMap<&str, Vec<f64>> = HashMap::new();
    for reading in readings {
        let entry = values.entry(reading.measure.as_str()).or_insert_with(|| {
            order.push(reading.measure.as_str());
            Vec::new()
        });
        entry.push(reading.value);
    }

    order
        .into_iter()
        .filter_map(|measure| {
            let data = values.get(measure)?;
            let mean = data.iter().sum::<f64>() / data.len() as f64;
            Some((measure.to_string(), round2(mean)))
        })
        .collect()
}

/// `/sensors [names...]`
pub struct CurrentSensors;

#[async_trait]
impl CommandHandler for CurrentSensors {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let session = ctx.session().await?;
        let selector = EcosystemSelector::from_args(ctx.args);
        let ecosystems = session.get_ecosystems(&selector).await?;

        let mut summaries = Vec::new();
        for ecosystem in &ecosystems {
            let readings = session.get_current_sensor_data(ecosystem).await?;
            let summary = summarize_readings(&readings);
            if !summary.is_empty() {
                summaries.push((ecosystem.name.as_str(), summary));
            }
        }

        let units: HashMap<String, Option<String>> = if summaries.is_empty() {
            HashMap::new()
        } else {
            session
                .get_measures()
                .await?
                .into_iter()
                .map(|m| (m.name, m.unit))
                .collect()
        };

        let data: Vec<Value> = summaries
            .into_iter()
            .map(|(name, summary)| {
                let measures: Vec<Value> = summary
                    .into_iter()
                    .map(|(measure, value)| {
                        let unit = units.get(&measure).cloned().flatten();
                        json!({ "label": humanize(&measure), "value": value, "unit": unit })
                    })
                    .collect();
                json!({ "name": name, "measures": measures })
            })
            .collect();
        let html = ctx
            .services
            .templates
            .render("current_sensors", &json!({ "ecosystems": data }))?;
        Ok(Reply::Html(html))
    }
}

/// `/actuators_state [names...]`
pub struct ActuatorsState;

#[async_trait]
impl CommandHandler for ActuatorsState {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let session = ctx.session().await?;
        let selector = EcosystemSelector::from_args(ctx.args);
        let ecosystems = session.get_ecosystems(&selector).await?;

        let mut data: Vec<Value> = Vec::new();
        for ecosystem in &ecosystems {
            let states = session.get_actuator_states(ecosystem).await?;
            if states.is_empty() {
                continue;
            }
            let actuators: Vec<Value> = states
                .iter()
                .map(|s| {
                    json!({
                        "label": s.actuator_type.name(),
                        "active": s.active,
                        "mode": s.mode.name(),
                        "status": s.status,
                    })
                })
                .collect();
            data.push(json!({ "name": ecosystem.name, "actuators": actuators }));
        }

        let html = ctx
            .services
            .templates
            .render("actuators_state", &json!({ "ecosystems": data }))?;
        Ok(Reply::Html(html))
    }
}
