//! `homeward watch`: stream state changes until interrupted.
//!
//! Holds one long-lived hub connection. After each reconnect the
//! `state_changed` subscription is renewed; a permanent failure ends the
//! command with an error.

use std::pin::pin;

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use homeward_core::{FailureReason, Hub, HubConfig, StateChangeEvent, StatusNotice};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// Which changes to print.
#[derive(Debug, Default)]
struct Filter {
    category: Option<String>,
    entity: Option<String>,
}

impl Filter {
    fn matches(&self, change: &StateChangeEvent) -> bool {
        self.category.as_deref().is_none_or(|c| change.category == c)
            && self
                .entity
                .as_deref()
                .is_none_or(|e| change.entity_id.as_str() == e)
    }
}

fn render_line(change: &StateChangeEvent, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            let when = change
                .time_fired
                .map_or_else(|| "-".into(), |t| t.format("%H:%M:%S").to_string());
            let old = change.old_state.as_deref().unwrap_or("(new)");
            let new = change.new_state.as_deref().unwrap_or("(removed)");
            let entity = if color {
                change.entity_id.bold().to_string()
            } else {
                change.entity_id.to_string()
            };
            format!(
                "{when} {entity} {} -> {}",
                output::paint_state(old, color),
                output::paint_state(new, color)
            )
        }
        // One document per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(change, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(change).trim_end()),
    }
}

fn failure_error(reason: FailureReason) -> CliError {
    match reason {
        FailureReason::AuthenticationRejected { message } => CliError::AuthFailed { message },
        FailureReason::ReconnectExhausted { attempts } => CliError::ConnectionLost {
            reason: format!("gave up after {attempts} reconnect attempts"),
        },
    }
}

pub async fn handle(config: &HubConfig, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = Filter {
        category: args.category,
        entity: args.entity,
    };
    let color = output::should_color(&global.color);

    let hub = Hub::new(config)?;
    // Both receivers exist before the first event can arrive.
    let mut status = hub.status();
    let mut changes = pin!(hub.state_changes());

    let result: Result<(), CliError> = async {
        hub.connect().await?;
        hub.subscribe_to_state_changes().await?;
        if !global.quiet {
            eprintln!("watching {} (Ctrl-C to stop)", config.url);
        }
        watch_loop(&hub, &mut status, &mut changes, &filter, args.count, global, color).await
    }
    .await;

    hub.disconnect().await;
    result
}

async fn watch_loop(
    hub: &Hub,
    status: &mut tokio::sync::broadcast::Receiver<StatusNotice>,
    changes: &mut (impl tokio_stream::Stream<Item = std::sync::Arc<StateChangeEvent>> + Unpin),
    filter: &Filter,
    count: Option<usize>,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let mut printed = 0usize;
    if count == Some(0) {
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }

            Some(change) = changes.next() => {
                if !filter.matches(&change) {
                    continue;
                }
                output::print_output(&render_line(&change, &global.output, color), global.quiet);
                printed += 1;
                if count.is_some_and(|n| printed >= n) {
                    return Ok(());
                }
            }

            notice = status.recv() => match notice {
                Ok(StatusNotice::Connected) => {
                    if let Err(e) = hub.subscribe_to_state_changes().await {
                        warn!(error = %e, "could not renew state subscription");
                    }
                }
                Ok(StatusNotice::Disconnected { reason }) => {
                    warn!(%reason, "connection lost, reconnecting");
                }
                Ok(StatusNotice::PermanentlyFailed(reason)) => return Err(failure_error(reason)),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
