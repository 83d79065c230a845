mod agent;
mod cli;
mod insert;
mod overlay;
mod page;
mod protocol;
mod replay;
mod resolve;
mod rules;
mod schedule;
mod selector;
mod store;
mod tracker;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            page,
            runtime_delay_ms,
            dump,
        } => {
            let options = replay::ReplayOptions {
                page,
                runtime_delay: runtime_delay_ms.map(Duration::from_millis),
                dump,
            };
            if let Err(e) = replay::run(options).await {
                tracing::error!(error = %e, "replay failed");
                eprintln!("promptdock replay: {e}");
                std::process::exit(1);
            }
        }
        Command::Resolve { host_path } => {
            let resolution = resolve::resolve(&host_path);
            match resolution.platform {
                Some(platform) => println!("platform: {platform}"),
                None => println!("platform: none (generic fallbacks)"),
            }
            for selector in &resolution.selectors {
                println!("  {selector}");
            }
        }
        Command::Platforms => {
            for rule in rules::TABLE {
                match rule.path_prefix {
                    Some(prefix) => {
                        println!("{}: {} under {prefix}", rule.name, rule.hostnames.join(", "))
                    }
                    None => println!("{}: {}", rule.name, rule.hostnames.join(", ")),
                }
                for selector in rule.selectors {
                    println!("  {selector}");
                }
            }
        }
        Command::Library { file, normalize } => {
            let result = if normalize {
                normalize_library(&file).await
            } else {
                print_library(&file).await
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "library command failed");
                eprintln!("promptdock library: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn print_library(file: &Path) -> Result<(), store::StoreError> {
    let library = store::MemoryStore::load(file)?;

    let settings = store::load_settings(&library).await?;
    let projects = store::load_projects(&library).await?;
    let prompts = store::load_prompts(&library).await?;
    let selected = store::load_last_selected_project(&library).await?;

    for line in library_summary(&settings, &projects, &prompts, &selected) {
        println!("{line}");
    }
    Ok(())
}

/// Human-readable library listing. `selected` is the project id kept
/// under `lastSelectedProject`, not a display name.
fn library_summary(
    settings: &store::Settings,
    projects: &[store::Project],
    prompts: &[store::Prompt],
    selected: &str,
) -> Vec<String> {
    let mut lines = vec![format!(
        "settings: notifications {}, context menu {}",
        on_off(settings.enable_notifications),
        on_off(settings.enable_context_menu),
    )];
    lines.push(format!("projects ({}):", projects.len()));
    for project in projects {
        let marker = if project.id == selected { "*" } else { " " };
        lines.push(format!(" {marker} {}", project.name));
    }
    lines.push(format!("prompts ({}):", prompts.len()));
    for prompt in prompts {
        lines.push(format!("   [{}] {}", prompt.project, prompt.title));
    }
    lines
}

/// Re-encodes a snapshot through the typed codecs, applying defaults
/// and dropping unknown keys, and prints the canonical object.
async fn normalize_library(file: &Path) -> Result<(), store::StoreError> {
    let library = store::MemoryStore::load(file)?;
    let prompts = store::load_prompts(&library).await?;
    let projects = store::load_projects(&library).await?;
    let settings = store::load_settings(&library).await?;
    let selected = store::load_last_selected_project(&library).await?;

    let mut canonical = store::MemoryStore::default();
    store::save_prompts(&mut canonical, &prompts).await?;
    store::save_projects(&mut canonical, &projects).await?;
    store::save_settings(&mut canonical, &settings).await?;
    store::save_last_selected_project(&mut canonical, &selected).await?;

    println!("{}", canonical.to_snapshot()?);
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Project, Prompt, Settings};

    fn project(id: &str, name: &str) -> Project {
        Project {
            id: id.to_owned(),
            name: name.to_owned(),
            description: None,
            created_at: String::new(),
        }
    }

    // -- Library summary --

    #[test]
    fn summary_marks_the_selected_project_by_id() {
        // Stored selections are project ids, never display names.
        let projects = vec![
            project("default", "Default"),
            project("1738002400000", "Research"),
        ];
        let lines = library_summary(&Settings::default(), &projects, &[], "1738002400000");

        assert!(lines.contains(&"   Default".to_owned()));
        assert!(lines.contains(&" * Research".to_owned()));
    }

    #[test]
    fn summary_lists_prompts_under_their_projects() {
        let prompts = vec![Prompt {
            id: "p1".to_owned(),
            title: "Greeting".to_owned(),
            content: "hello".to_owned(),
            project: "default".to_owned(),
            created_at: "2025-01-27T18:26:40.000Z".to_owned(),
        }];
        let lines = library_summary(&Settings::default(), &[], &prompts, "default");

        assert!(lines.contains(&"settings: notifications on, context menu on".to_owned()));
        assert!(lines.contains(&"prompts (1):".to_owned()));
        assert!(lines.contains(&"   [default] Greeting".to_owned()));
    }
}
