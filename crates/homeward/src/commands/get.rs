//! `homeward get`: one entity's state and attributes.

use std::fmt::Write as _;

use homeward_core::{DeviceState, EntityId, Hub, HubConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(s: &DeviceState, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Entity:        {}", s.entity_id);
    let _ = writeln!(out, "Category:      {}", s.category);
    let _ = writeln!(out, "State:         {}", output::paint_state(&s.state, color));
    if let Some(name) = s.friendly_name() {
        let _ = writeln!(out, "Name:          {name}");
    }
    if let Some(t) = s.last_changed {
        let _ = writeln!(out, "Last Changed:  {}", t.to_rfc3339());
    }
    if let Some(t) = s.last_updated {
        let _ = writeln!(out, "Last Updated:  {}", t.to_rfc3339());
    }
    if !s.attributes.is_empty() {
        let _ = writeln!(out, "Attributes:");
        let mut attrs: Vec<_> = s.attributes.iter().collect();
        attrs.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in attrs {
            let _ = writeln!(out, "  {key}: {value}");
        }
    }
    out.trim_end().to_owned()
}

pub async fn handle(config: &HubConfig, entity_id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let wanted: EntityId = entity_id.parse()?;

    let states = Hub::oneshot(config, |hub| async move { hub.list_states().await }).await?;
    let state = states
        .into_iter()
        .find(|s| s.entity_id == wanted)
        .ok_or_else(|| CliError::NotFound {
            entity_id: wanted.to_string(),
        })?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &state,
        |s| detail(s, color),
        |s| s.state.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
