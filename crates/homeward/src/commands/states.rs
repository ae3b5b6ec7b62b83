//! `homeward states`: list entity states.

use tabled::Tabled;

use homeward_core::{DeviceState, Hub, HubConfig};

use crate::cli::{GlobalOpts, StatesArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Last Changed")]
    last_changed: String,
}

fn to_row(s: &DeviceState, color: bool) -> StateRow {
    let value = match s.unit() {
        Some(unit) => format!("{} {unit}", s.state),
        None => s.state.clone(),
    };
    StateRow {
        entity: s.entity_id.to_string(),
        state: output::paint_state(&value, color),
        name: s.friendly_name().unwrap_or("-").to_owned(),
        last_changed: s
            .last_changed
            .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

/// Keep only `category` (all when `None`), sorted by entity id.
pub(crate) fn select(mut states: Vec<DeviceState>, category: Option<&str>) -> Vec<DeviceState> {
    if let Some(category) = category {
        states.retain(|s| s.category == category);
    }
    states.sort_by(|a, b| a.entity_id.as_str().cmp(b.entity_id.as_str()));
    states
}

pub async fn handle(config: &HubConfig, args: StatesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let states = Hub::oneshot(config, |hub| async move { hub.list_states().await }).await?;
    let states = select(states, args.category.as_deref());

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &states,
        |s| to_row(s, color),
        |s| s.entity_id.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
