use console::style;

use frameport_config::{FrameportConfig, PluginSource};
use frameport_core::{DependencyPolicy, Result};
use frameport_loader::{PluginLoader, Resolution};

pub(super) async fn cmd_resolve(
    config: FrameportConfig,
    urls: Vec<String>,
    strict: bool,
    json: bool,
) -> Result<()> {
    let mut loader_config = config.loader;
    if strict {
        loader_config.dependency_policy = DependencyPolicy::Strict;
    }

    let sources = if urls.is_empty() {
        loader_config.plugins.clone()
    } else {
        urls.into_iter().map(PluginSource::new).collect()
    };
    if sources.is_empty() {
        println!("No plugins to resolve. Pass plugin URLs or set [loader].plugins in frameport.toml.");
        return Ok(());
    }

    let loader = PluginLoader::from_config(&loader_config)?;
    let resolution = loader.resolve(&sources).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print!("{}", render(&resolution));
    }
    Ok(())
}

/// Human-readable layer listing.
fn render(resolution: &Resolution) -> String {
    let mut out = String::new();
    for (index, layer) in resolution.layers.iter().enumerate() {
        out.push_str(&format!("{}\n", style(format!("Layer {index}")).bold()));
        for name in layer {
            let Some(item) = resolution.manifests.get(name) else {
                continue;
            };
            let version = item
                .manifest
                .version
                .as_deref()
                .map(|v| format!(" v{v}"))
                .unwrap_or_default();
            out.push_str(&format!("  {name}{version}  {}\n", style(&item.source_url).dim()));

            let deps = resolution
                .graph
                .dependencies(name)
                .map(|deps| deps.iter().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            if !deps.is_empty() {
                out.push_str(&format!("    requires: {}\n", deps.join(", ")));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameport_loader::FsManifestFetcher;

    #[tokio::test]
    async fn render_lists_layers_with_dependencies() {
        console::set_colors_enabled(false);
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("a", r#"{"name":"a","version":"1.0.0"}"#),
            ("b", r#"{"name":"b","dependencies":{"a":"^1"}}"#),
        ] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
            std::fs::write(dir.path().join(name).join("plugin.json"), body).unwrap();
        }

        let loader = PluginLoader::new(FsManifestFetcher::new("plugin.json"), DependencyPolicy::Strict);
        let sources: Vec<_> = ["b", "a"]
            .iter()
            .map(|n| PluginSource::new(dir.path().join(n).display().to_string()))
            .collect();
        let resolution = loader.resolve(&sources).await.unwrap();

        let text = render(&resolution);
        let layer0 = text.find("Layer 0").unwrap();
        let layer1 = text.find("Layer 1").unwrap();
        let a = text.find("  a v1.0.0").unwrap();
        let b = text.find("  b ").unwrap();
        assert!(layer0 < a && a < layer1 && layer1 < b);
        assert!(text.contains("requires: a"));
    }
}
