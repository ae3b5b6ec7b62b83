//! `homeward call`: invoke an action.

use homeward_core::{ActionRequest, EntityId, Hub, HubConfig};

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;

/// Build the request from CLI arguments. `--data` must be a JSON object.
fn build_request(args: &CallArgs) -> Result<ActionRequest, CliError> {
    let mut request = ActionRequest::new(&args.category, &args.action);
    if let Some(ref target) = args.target {
        let id: EntityId = target.parse()?;
        request = request.target(id);
    }
    if let Some(ref data) = args.data {
        let value: serde_json::Value = serde_json::from_str(data)?;
        request = request.parameters(value);
    }
    Ok(request)
}

pub async fn handle(config: &HubConfig, args: CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let request = build_request(&args)?;

    Hub::oneshot(config, |hub| async move { hub.invoke_action(&request).await }).await?;

    if !global.quiet {
        match args.target {
            Some(target) => eprintln!("{}.{} sent to {target}", args.category, args.action),
            None => eprintln!("{}.{} sent", args.category, args.action),
        }
    }
    Ok(())
}
