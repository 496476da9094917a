use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;

/// Instructions given to the model on every turn
pub const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    tools: &'a [Tool],
    context: &'a str,
    instructions: &'a str,
}

/// Render the system prompt with the retrieved documentation and any caller instructions.
///
/// Empty `context` or `instructions` leave their sections out entirely.
pub fn system_prompt(
    tools: &[Tool],
    context: &str,
    instructions: Option<&str>,
) -> Result<String, TeraError> {
    load_prompt(
        SYSTEM_TEMPLATE,
        &SystemPromptContext {
            tools,
            context: context.trim(),
            instructions: instructions.map(str::trim).unwrap_or_default(),
        },
    )
}
