//! Agent catalog command.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tasklink_core::{Agent, AgentStatus};

use crate::config::ConfigLoader;

/// Agent catalog arguments.
#[derive(Args, Debug)]
pub struct AgentsArgs {
    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run agents command.
pub fn run(args: AgentsArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let registry = config.registry();

    if args.json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
    } else {
        println!("{}", agents_table(registry.list()));
    }
    Ok(())
}

pub fn agents_table(agents: &[Agent]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Current task").fg(Color::Cyan),
        Cell::new("Completed").fg(Color::Cyan),
        Cell::new("Success").fg(Color::Cyan),
        Cell::new("Capabilities").fg(Color::Cyan),
    ]);

    for agent in agents {
        let status = match agent.status {
            AgentStatus::Online => Cell::new("online").fg(Color::Green),
            AgentStatus::Offline => Cell::new("offline").fg(Color::DarkGrey),
        };
        let capabilities: Vec<&str> = agent.capabilities.iter().map(String::as_str).collect();

        table.add_row(vec![
            Cell::new(&agent.id),
            Cell::new(&agent.name),
            status,
            Cell::new(agent.current_task.as_deref().unwrap_or("-")),
            Cell::new(agent.performance.completed),
            Cell::new(format!("{}%", agent.performance.success_rate)),
            Cell::new(capabilities.join(", ")),
        ]);
    }

    table
}
