use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trellis::cli::{Cli, Command};
use trellis::config::TrellisConfig;
use trellis::engine::StageEngine;
use trellis::error::TrellisError;
use trellis::persist::{JsonDirStore, MemoryStore};
use trellis::store::{self, ChannelPatch, EntityStore};
use trellis::ui::BoardView;
use trellis::workflow::validation::missing_required_fields;
use trellis::workflow::{ActingUser, CustomField, FieldType, FieldValue};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let view = BoardView::new();
    if matches!(cli.command, Command::Demo) {
        return run_demo(&view);
    }

    let config = TrellisConfig::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());
    let mut store = EntityStore::open(Box::new(JsonDirStore::new(&data_dir)));

    match cli.command {
        Command::Status => view.print_status(&store),

        Command::Checklist { task_id } => {
            let task = store
                .task(&task_id)
                .with_context(|| format!("task not found: {task_id}"))?;
            let channel = store
                .channel(&task.channel_id)
                .with_context(|| format!("channel not found: {}", task.channel_id))?;
            let missing: Vec<String> = missing_required_fields(task, channel)
                .iter()
                .map(|f| f.name.clone())
                .collect();
            view.print_checklist(task, &missing);
        }

        Command::Advance { task_id } => {
            let actor = resolve_actor(&store, cli.user, &config)?;
            let outcome = StageEngine::new(&mut store).advance(&task_id, &actor)?;
            view.print_advance_outcome(&outcome);
            view.print_audit_trail(&store.events_for_task(&task_id));
        }

        Command::SetField {
            task_id,
            field_id,
            value,
        } => {
            let actor = resolve_actor(&store, cli.user, &config)?;
            let parsed = parse_field_value(&store, &task_id, &field_id, &value)?;
            let outcome =
                StageEngine::new(&mut store).set_field_value(&task_id, &field_id, parsed, &actor)?;
            view.print_edit_outcome(&outcome);
        }

        Command::Demo => unreachable!("handled above"),
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "trellis=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// The acting user: `--user`, then `trellis.toml`, then the stored default.
fn resolve_actor(
    store: &EntityStore,
    cli_user: Option<String>,
    config: &TrellisConfig,
) -> Result<ActingUser> {
    let user_id = cli_user
        .or_else(|| config.default_actor.clone())
        .or_else(|| store.settings().default_actor.clone());
    let Some(user_id) = user_id else {
        bail!("no acting user: pass --user or set default_actor in trellis.toml");
    };
    let user = store
        .user(&user_id)
        .ok_or_else(|| TrellisError::UserNotFound(user_id.clone()))?;
    Ok(user.acting())
}

/// Interpret a raw CLI string as the value type the field declares.
fn parse_field_value(
    store: &EntityStore,
    task_id: &str,
    field_id: &str,
    raw: &str,
) -> Result<FieldValue> {
    let task = store
        .task(task_id)
        .with_context(|| format!("task not found: {task_id}"))?;
    let channel = store
        .channel(&task.channel_id)
        .with_context(|| format!("channel not found: {}", task.channel_id))?;
    let field = channel
        .field(field_id)
        .with_context(|| format!("custom field not found: {field_id}"))?;

    let value = match field.field_type {
        FieldType::Link => FieldValue::Link(raw.to_string()),
        FieldType::Text => FieldValue::Text(raw.to_string()),
        FieldType::Dropdown => FieldValue::Dropdown(raw.to_string()),
        FieldType::Number => FieldValue::Number(
            raw.parse()
                .with_context(|| format!("not a number: {raw}"))?,
        ),
        FieldType::Date => FieldValue::Date(
            chrono::DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("not an ISO-8601 date-time: {raw}"))?
                .with_timezone(&chrono::Utc),
        ),
        FieldType::Checkbox => match raw {
            "true" => FieldValue::Checkbox(true),
            "false" => FieldValue::Checkbox(false),
            _ => bail!("checkbox value must be \"true\" or \"false\", got: {raw}"),
        },
    };
    Ok(value)
}

/// Walk one task through a two-stage pipeline in an in-memory store,
/// showing the rejection, the advance and the finalization.
fn run_demo(view: &BoardView) -> Result<()> {
    let mut store = EntityStore::open(Box::new(MemoryStore::new()));
    let actor = ActingUser {
        user_id: store::DEFAULT_ADMIN_ID.to_string(),
        role_id: "role-owner".to_string(),
    };

    let columns = vec!["Script".to_string(), "Audio".to_string()];
    let channel_id = StageEngine::new(&mut store).create_channel(
        "Launch Videos",
        Some("Weekly uploads".to_string()),
        &columns,
        &actor,
    )?;

    // Gate the first column on a "Video Link" field.
    let script_column_id = store
        .channel(&channel_id)
        .and_then(|c| c.first_column())
        .map(|c| c.id.clone())
        .context("demo channel has no entry column")?;
    let mut video_link = CustomField::new("Video Link", FieldType::Link, 0);
    video_link.required_in_columns.insert(script_column_id);
    store.update_channel(
        &channel_id,
        ChannelPatch {
            custom_fields: Some(vec![video_link.clone()]),
            ..Default::default()
        },
    )?;

    let task_id = StageEngine::new(&mut store).create_task(&channel_id, "Episode 12", &actor)?;

    println!("Advancing with the mandatory field still empty:");
    let rejected = StageEngine::new(&mut store).advance(&task_id, &actor)?;
    view.print_advance_outcome(&rejected);

    println!("\nFilling the field and advancing again:");
    let edit = StageEngine::new(&mut store).set_field_value(
        &task_id,
        &video_link.id,
        FieldValue::Link("https://x.com/episode-12".to_string()),
        &actor,
    )?;
    view.print_edit_outcome(&edit);
    let advanced = StageEngine::new(&mut store).advance(&task_id, &actor)?;
    view.print_advance_outcome(&advanced);

    println!("\nAdvancing out of the terminal column finalizes the task:");
    let finalized = StageEngine::new(&mut store).advance(&task_id, &actor)?;
    view.print_advance_outcome(&finalized);

    println!();
    view.print_audit_trail(&store.events_for_task(&task_id));
    if let Some(snapshot) = store.completed_tasks().last() {
        view.print_snapshot(snapshot);
    }
    Ok(())
}
