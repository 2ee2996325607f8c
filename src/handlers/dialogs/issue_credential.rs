//! Credential selection dialog

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::dialogs::prompts::parse_choice;
use crate::dialogs::{PromptOptions, StepContext, StepDirective, Waterfall};
use crate::utils::errors::Result;
use super::{unknown_step, CREDENTIAL_TYPE_PROMPT, ISSUE_CREDENTIAL};

pub const CREDENTIAL_TYPES: [&str; 3] = ["Email", "Phone", "Twitter"];

fn credential_types() -> Vec<String> {
    CREDENTIAL_TYPES.iter().map(|t| t.to_string()).collect()
}

/// Asks which credential the user wants, unless they already said.
///
/// Begun with an optional credential type; ends with the chosen type or
/// `false` when none was chosen.
pub struct IssueCredential;

impl IssueCredential {
    async fn select(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let choices = credential_types();
        if let Some((index, value)) = ctx.options().as_str().and_then(|t| parse_choice(t, &choices)) {
            return Ok(StepDirective::Next(json!({ "value": value, "index": index })));
        }
        StepDirective::prompt(
            CREDENTIAL_TYPE_PROMPT,
            PromptOptions::new("What type of credential would you like?").with_choices(CREDENTIAL_TYPES),
        )
    }

    async fn acknowledge(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let Some(kind) = ctx.result().get("value").and_then(Value::as_str).map(str::to_string) else {
            return StepDirective::end(false);
        };
        ctx.turn
            .send_text(format!("Ok, I'll prepare a {} credential for you.", kind))
            .await?;
        StepDirective::end(kind)
    }
}

#[async_trait]
impl Waterfall for IssueCredential {
    fn steps(&self) -> &'static [&'static str] {
        &["select", "acknowledge"]
    }

    async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match step {
            "select" => self.select(ctx).await,
            "acknowledge" => self.acknowledge(ctx).await,
            other => Err(unknown_step(ISSUE_CREDENTIAL, other)),
        }
    }
}
