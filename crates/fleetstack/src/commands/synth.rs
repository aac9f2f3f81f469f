use crate::Invocation;
use colored::Colorize;
use fleetstack_config::project_root;
use fleetstack_core::load_stack;
use fleetstack_synth::{ArtifactStore, SynthSummary, synthesize};

pub async fn handle(invocation: &Invocation, stdout: bool) -> anyhow::Result<()> {
    let stack = load_stack(&invocation.stack_file, &invocation.options)?;
    let template = synthesize(&stack)?;

    if stdout {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    let store = ArtifactStore::new(project_root(&invocation.stack_file));
    let previous = store.load(template.stack_name()).await?;
    let summary = SynthSummary::new(&template, previous.as_ref());
    let path = store.save(&template).await?;

    println!("{} {}", "✓".green().bold(), summary);
    for (resource_type, count) in &summary.by_type {
        println!("  {:>3} {}", count, resource_type);
    }
    println!("Template: {}", path.display().to_string().cyan());

    Ok(())
}
