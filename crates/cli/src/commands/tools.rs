//! `parley tools`: show the tools the model can call.

use parley_config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    // Listing definitions needs no credentials.
    let registry = parley_tools::default_registry(&config.tools, "", "")?;
    for def in registry.definitions() {
        println!("{}", def.name);
        println!("    {}", def.description);
        if let Some(props) = def.parameters["properties"].as_object() {
            let params: Vec<&str> = props.keys().map(String::as_str).collect();
            println!("    args: {}", params.join(", "));
        }
    }
    Ok(())
}
