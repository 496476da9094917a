use anyhow::{anyhow, Result};
use apidesk::catalog::Catalog;
use bat::PrettyPrinter;
use console::style;
use std::path::Path;
use std::sync::Arc;

pub fn execute(catalog_path: Option<&Path>, name: Option<&str>) -> Result<()> {
    let catalog = load_catalog(catalog_path)?;

    match name {
        Some(name) => {
            let detail = describe(&catalog, name)?;
            PrettyPrinter::new()
                .input_from_bytes(detail.as_bytes())
                .language("json")
                .print()?;
            println!();
        }
        None => {
            for summary in catalog.summaries() {
                println!("{}  {}", style(&summary.name).bold(), style(&summary.description).dim());
            }
        }
    }
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Arc<Catalog>> {
    match path {
        Some(path) => Ok(Arc::new(Catalog::load(path)?)),
        None => Ok(Catalog::builtin()),
    }
}

/// One endpoint as pretty JSON, looked up by its exact name
pub fn describe(catalog: &Catalog, name: &str) -> Result<String> {
    let endpoint = catalog
        .find(name)
        .ok_or_else(|| anyhow!("API with name \"{}\" not found.", name))?;
    Ok(serde_json::to_string_pretty(endpoint)?)
}
