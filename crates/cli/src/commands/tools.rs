//! `stepwise tools`: list the catalog offered to the model.

use stepwise_config::AppConfig;
use stepwise_core::tool::ToolSpec;
use stepwise_security::CommandPolicy;
use stepwise_tools::default_catalog;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let policy = CommandPolicy::new(config.workspace.allowed_commands.clone());
    let restricted = !policy.is_unrestricted();
    let catalog = default_catalog(policy);

    println!();
    println!("  Available tools ({}):", catalog.len());
    for name in catalog.names() {
        if let Some(spec) = catalog.spec(name) {
            println!();
            print!("{}", describe_spec(spec));
        }
    }
    if restricted {
        println!();
        println!(
            "  run_command is limited to: {}",
            config.workspace.allowed_commands.join(", ")
        );
    }
    println!();
    Ok(())
}

fn describe_spec(spec: &ToolSpec) -> String {
    let mut out = format!("  {}\n    {}\n", spec.name, spec.description);
    for field in &spec.fields {
        let marker = if field.required { "" } else { "?" };
        out.push_str(&format!(
            "      {}{marker}: {}  {}\n",
            field.name,
            field.kind.json_name(),
            field.description
        ));
    }
    out
}
