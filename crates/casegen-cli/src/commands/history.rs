use super::{Target, Workspace};
use anyhow::Result;
use casegen_core::config::ClientConfig;
use casegen_core::version::VersionId;

pub async fn list(config: &ClientConfig, target: &Target, json: bool) -> Result<()> {
    let workspace = Workspace::open(config, target, String::new()).await?;
    let refreshed = workspace.controller.refresh().await;
    let history = workspace.controller.history().await;
    workspace.finish().await;
    refreshed?;

    if json {
        println!("{}", serde_json::to_string_pretty(history.versions())?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No versions for {}", history.requirement());
        return Ok(());
    }
    for version in history.versions().iter().rev() {
        let marker = if history.is_active(version.id()) { "*" } else { " " };
        let preview = version.content().lines().next().unwrap_or_default();
        println!(
            "{} #{:<3} {}  {:<12} {}  {}",
            marker,
            version.sequence_number(),
            version.id(),
            version.origin().label(),
            version.updated_at().format("%Y-%m-%d %H:%M"),
            preview
        );
    }
    Ok(())
}

pub async fn activate(config: &ClientConfig, target: &Target, version: &str) -> Result<()> {
    let workspace = Workspace::open(config, target, String::new()).await?;
    let result = async {
        workspace.select(Some(version)).await?;
        Ok::<_, anyhow::Error>(workspace.controller.active_document().await)
    }
    .await;
    workspace.finish().await;

    if let Some(document) = result? {
        println!("{}", document.content());
    }
    Ok(())
}

pub async fn delete(config: &ClientConfig, target: &Target, version: &str) -> Result<()> {
    let workspace = Workspace::open(config, target, String::new()).await?;
    let result = workspace
        .controller
        .delete_version(&VersionId::from(version))
        .await;
    workspace.finish().await;
    result?;
    println!("Deleted {version}");
    Ok(())
}
