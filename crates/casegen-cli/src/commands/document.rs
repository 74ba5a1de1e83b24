use super::{Target, Workspace};
use anyhow::{Context, Result, bail};
use casegen_application::ExchangeOutcome;
use casegen_core::config::ClientConfig;
use casegen_core::generation::{FormatKind, FormatOptions, GenerationPrompt};
use std::path::Path;

pub async fn generate(
    config: &ClientConfig,
    target: &Target,
    requirements: String,
    context: String,
    format: FormatKind,
    example: Option<String>,
) -> Result<()> {
    let workspace = Workspace::open(config, target, requirements.clone()).await?;

    let mut options = FormatOptions::new(format);
    if let Some(example) = example {
        options = options.with_example(example);
    }
    let prompt = GenerationPrompt::new(requirements, context);

    let outcome = workspace
        .until_interrupted(workspace.controller.generate(prompt, options))
        .await;
    workspace.finish().await;
    report(outcome?)
}

pub async fn edit(
    config: &ClientConfig,
    target: &Target,
    file: &Path,
    version: Option<&str>,
) -> Result<()> {
    let content = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let workspace = Workspace::open(config, target, String::new()).await?;
    let result = async {
        workspace.select(version).await?;
        workspace.controller.edit_in_place(content).await?;
        Ok::<(), anyhow::Error>(())
    }
    .await;
    workspace.finish().await;
    result
}

pub async fn chat(
    config: &ClientConfig,
    target: &Target,
    requirements: String,
    messages: Vec<String>,
    direct_mode: bool,
    version: Option<&str>,
) -> Result<()> {
    let workspace = Workspace::open(config, target, requirements).await?;
    let result = async {
        workspace.select(version).await?;
        for message in messages {
            eprintln!("> {message}");
            let outcome = workspace
                .until_interrupted(workspace.controller.converse(message, direct_mode))
                .await?;
            if outcome == ExchangeOutcome::Cancelled {
                break;
            }
            report(outcome)?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    workspace.finish().await;
    result
}

fn report(outcome: ExchangeOutcome) -> Result<()> {
    match outcome {
        ExchangeOutcome::Completed(_) | ExchangeOutcome::Cancelled => Ok(()),
        ExchangeOutcome::Failed(err) => bail!(err.user_message()),
    }
}
