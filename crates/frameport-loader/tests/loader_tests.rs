#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use frameport_config::{LoaderConfig, PluginSource};
    use frameport_core::{DependencyPolicy, FrameportError, Result};
    use frameport_loader::{
        FrameDescriptor, FrameFactory, FsManifestFetcher, LoadObserver, LoadedPlugin, ManifestFetcher,
        PluginLoader, PluginManifest,
    };

    /// Serves manifests from memory, optionally after a delay.
    #[derive(Default)]
    struct MemoryFetcher {
        manifests: HashMap<String, (String, Duration)>,
    }

    impl MemoryFetcher {
        fn with(mut self, url: &str, manifest: serde_json::Value) -> Self {
            self.manifests
                .insert(url.to_string(), (manifest.to_string(), Duration::ZERO));
            self
        }

        fn slow(mut self, url: &str, manifest: serde_json::Value, delay: Duration) -> Self {
            self.manifests
                .insert(url.to_string(), (manifest.to_string(), delay));
            self
        }
    }

    #[async_trait]
    impl ManifestFetcher for MemoryFetcher {
        async fn fetch(&self, base_url: &str) -> Result<PluginManifest> {
            let Some((body, delay)) = self.manifests.get(base_url) else {
                return Err(FrameportError::Manifest {
                    source_url: base_url.to_string(),
                    reason: "server returned HTTP 404 Not Found".into(),
                });
            };
            tokio::time::sleep(*delay).await;
            PluginManifest::from_json(base_url, body)
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        built: Vec<String>,
        fail_on: Option<String>,
    }

    impl FrameFactory for RecordingFactory {
        type Frame = FrameDescriptor;

        fn create_frame(&mut self, descriptor: &FrameDescriptor) -> Result<FrameDescriptor> {
            if self.fail_on.as_deref() == Some(descriptor.name.as_str()) {
                return Err(FrameportError::Frame {
                    plugin: descriptor.name.clone(),
                    reason: "sandbox refused".into(),
                });
            }
            self.built.push(descriptor.id.clone());
            Ok(descriptor.clone())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Vec<String>,
    }

    impl LoadObserver<FrameDescriptor> for RecordingObserver {
        fn on_manifest_loaded(&mut self, manifest: &PluginManifest) {
            self.events.push(format!("manifest:{}", manifest.name));
        }

        fn on_plugin_loaded(&mut self, plugin: &LoadedPlugin<FrameDescriptor>) {
            self.events.push(format!("plugin:{}", plugin.name));
        }
    }

    fn sources(urls: &[&str]) -> Vec<PluginSource> {
        urls.iter().map(|u| PluginSource::new(*u)).collect()
    }

    fn abc_fetcher() -> MemoryFetcher {
        MemoryFetcher::default()
            .with(
                "https://p.example/c",
                json!({ "name": "C", "dependencies": { "A": "*", "B": "*" } }),
            )
            .with("https://p.example/b", json!({ "name": "B", "dependencies": { "A": "*" } }))
            .with("https://p.example/a", json!({ "name": "A" }))
    }

    #[tokio::test]
    async fn test_dependency_chain_loads_in_layers() {
        let loader = PluginLoader::new(abc_fetcher(), DependencyPolicy::Lenient);
        let mut factory = RecordingFactory::default();
        let mut observer = RecordingObserver::default();

        let report = loader
            .load_plugins(
                &sources(&["https://p.example/c", "https://p.example/b", "https://p.example/a"]),
                &mut factory,
                &mut observer,
            )
            .await
            .unwrap();

        assert_eq!(report.layers, vec![vec!["A"], vec!["B"], vec!["C"]]);
        assert_eq!(
            factory.built,
            vec!["iframe-plugin-A", "iframe-plugin-B", "iframe-plugin-C"]
        );
        assert_eq!(
            observer.events,
            vec![
                "manifest:C",
                "manifest:B",
                "manifest:A",
                "plugin:A",
                "plugin:B",
                "plugin:C",
            ]
        );

        let first = &report.plugins[0];
        assert_eq!(first.source_url, "https://p.example/a");
        assert_eq!(first.frame.src, "https://p.example/a");
        assert_eq!(first.frame.origin, "https://p.example");
        assert_eq!(
            report.graph.dependencies("C").unwrap().iter().collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifests_are_reported_in_configured_order_despite_latency() {
        let fetcher = MemoryFetcher::default()
            .slow("https://p.example/slow", json!({ "name": "slow" }), Duration::from_secs(3))
            .slow("https://p.example/fast", json!({ "name": "fast" }), Duration::from_secs(1));
        let loader = PluginLoader::new(fetcher, DependencyPolicy::Lenient);

        let started = tokio::time::Instant::now();
        let mut seen = Vec::new();
        let fetched = loader
            .fetch_manifests(
                &sources(&["https://p.example/slow", "https://p.example/fast"]),
                |item| seen.push(item.manifest.name.clone()),
            )
            .await
            .unwrap();

        assert_eq!(seen, vec!["slow", "fast"]);
        assert_eq!(fetched.len(), 2);
        // Concurrent: total wait is the slowest fetch, not the sum.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cycle_is_fatal() {
        let fetcher = MemoryFetcher::default()
            .with("https://p.example/x", json!({ "name": "X", "dependencies": { "Y": "*" } }))
            .with("https://p.example/y", json!({ "name": "Y", "dependencies": { "X": "*" } }));
        let loader = PluginLoader::new(fetcher, DependencyPolicy::Lenient);
        let mut factory = RecordingFactory::default();

        let err = loader
            .load_plugins(
                &sources(&["https://p.example/x", "https://p.example/y"]),
                &mut factory,
                &mut (),
            )
            .await
            .unwrap_err();

        match err {
            FrameportError::DependencyCycle(nodes) => {
                assert!(nodes.contains(&"X".to_string()));
                assert!(nodes.contains(&"Y".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(factory.built.is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependency_is_dropped_when_lenient() {
        let fetcher = MemoryFetcher::default().with(
            "https://p.example/b",
            json!({ "name": "B", "dependencies": { "ghost": "^1" } }),
        );
        let loader = PluginLoader::new(fetcher, DependencyPolicy::Lenient);

        let resolution = loader
            .resolve(&sources(&["https://p.example/b"]))
            .await
            .unwrap();
        assert_eq!(resolution.layers, vec![vec!["B"]]);
        assert!(resolution.graph.dependencies("B").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependency_is_fatal_when_strict() {
        let fetcher = MemoryFetcher::default().with(
            "https://p.example/b",
            json!({ "name": "B", "dependencies": { "ghost": "^1" } }),
        );
        let loader = PluginLoader::new(fetcher, DependencyPolicy::Strict);

        let err = loader
            .resolve(&sources(&["https://p.example/b"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FrameportError::MissingDependency { ref plugin, ref requires } if plugin == "B" && requires == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch_depends_on_policy() {
        let fetcher = || {
            MemoryFetcher::default()
                .with("https://p.example/a", json!({ "name": "A", "version": "2.1.0" }))
                .with(
                    "https://p.example/b",
                    json!({ "name": "B", "dependencies": { "A": "^1.0" } }),
                )
        };
        let urls = sources(&["https://p.example/a", "https://p.example/b"]);

        let lenient = PluginLoader::new(fetcher(), DependencyPolicy::Lenient)
            .resolve(&urls)
            .await
            .unwrap();
        assert_eq!(lenient.layers, vec![vec!["A"], vec!["B"]]);

        let err = PluginLoader::new(fetcher(), DependencyPolicy::Strict)
            .resolve(&urls)
            .await
            .unwrap_err();
        match err {
            FrameportError::VersionMismatch { range, actual, .. } => {
                assert_eq!(range, "^1.0");
                assert_eq!(actual, "2.1.0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_range_is_not_checked() {
        let fetcher = MemoryFetcher::default()
            .with("https://p.example/a", json!({ "name": "A", "version": "0.1.0" }))
            .with(
                "https://p.example/b",
                json!({ "name": "B", "dependencies": { "A": "workspace:latest" } }),
            );
        let resolution = PluginLoader::new(fetcher, DependencyPolicy::Strict)
            .resolve(&sources(&["https://p.example/a", "https://p.example/b"]))
            .await
            .unwrap();
        assert_eq!(resolution.layers, vec![vec!["A"], vec!["B"]]);
    }

    #[tokio::test]
    async fn test_failed_fetch_names_the_url() {
        let loader = PluginLoader::new(abc_fetcher(), DependencyPolicy::Lenient);
        let mut seen = Vec::new();
        let err = loader
            .fetch_manifests(
                &sources(&["https://p.example/a", "https://p.example/missing"]),
                |item| seen.push(item.manifest.name.clone()),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("https://p.example/missing"));
        assert!(err.is_load_fatal());
        assert_eq!(seen, vec!["A"]);
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_the_last_manifest() {
        let fetcher = MemoryFetcher::default()
            .with("https://one.example", json!({ "name": "dup", "version": "1.0.0" }))
            .with("https://two.example", json!({ "name": "dup", "version": "2.0.0" }));
        let resolution = PluginLoader::new(fetcher, DependencyPolicy::Lenient)
            .resolve(&sources(&["https://one.example", "https://two.example"]))
            .await
            .unwrap();

        assert_eq!(resolution.layers, vec![vec!["dup"]]);
        assert_eq!(resolution.manifests["dup"].source_url, "https://two.example");
    }

    #[tokio::test]
    async fn test_frame_failure_stops_the_load() {
        let loader = PluginLoader::new(abc_fetcher(), DependencyPolicy::Lenient);
        let mut factory = RecordingFactory {
            fail_on: Some("B".into()),
            ..Default::default()
        };

        let err = loader
            .load_plugins(
                &sources(&["https://p.example/a", "https://p.example/b", "https://p.example/c"]),
                &mut factory,
                &mut (),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FrameportError::Frame { ref plugin, .. } if plugin == "B"));
        assert_eq!(factory.built, vec!["iframe-plugin-A"]);
    }

    #[tokio::test]
    async fn test_filesystem_fetcher_reads_plugin_directories() {
        let dir = tempfile::tempdir().unwrap();
        for (name, manifest) in [
            ("hello-world", json!({ "name": "hello-world", "version": "1.0.0" })),
            (
                "theme-toggle",
                json!({ "name": "theme-toggle", "dependencies": { "hello-world": "^1" } }),
            ),
        ] {
            let plugin_dir = dir.path().join(name);
            std::fs::create_dir(&plugin_dir).unwrap();
            std::fs::write(plugin_dir.join("plugin.json"), manifest.to_string()).unwrap();
        }

        let theme_url = format!("file://{}", dir.path().join("theme-toggle").display());
        let hello_path = dir.path().join("hello-world").display().to_string();
        let loader = PluginLoader::new(FsManifestFetcher::new("plugin.json"), DependencyPolicy::Strict);

        let resolution = loader
            .resolve(&[PluginSource::new(theme_url), PluginSource::new(hello_path)])
            .await
            .unwrap();
        assert_eq!(resolution.layers, vec![vec!["hello-world"], vec!["theme-toggle"]]);
    }

    #[tokio::test]
    async fn test_filesystem_fetcher_reports_missing_and_malformed_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsManifestFetcher::new("plugin.json");

        let err = fetcher
            .fetch(&dir.path().display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameportError::Manifest { .. }));

        std::fs::write(dir.path().join("plugin.json"), "{ not json").unwrap();
        let err = fetcher
            .fetch(&dir.path().display().to_string())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to parse manifest"));
    }

    #[tokio::test]
    async fn test_auto_loader_uses_configured_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.json"), r#"{"name":"custom"}"#).unwrap();

        let config = LoaderConfig {
            manifest_file: "manifest.json".into(),
            plugins: vec![PluginSource::new(dir.path().display().to_string())],
            ..Default::default()
        };
        let loader = PluginLoader::from_config(&config).unwrap();
        assert_eq!(loader.policy(), DependencyPolicy::Lenient);

        let resolution = loader.resolve(&config.plugins).await.unwrap();
        assert_eq!(resolution.layers, vec![vec!["custom"]]);
    }

    #[test]
    fn test_frame_descriptor_uses_plugin_name_and_origin() {
        let descriptor = FrameDescriptor::for_plugin("hello-world", "https://cdn.example:8443/plugins/hello");
        assert_eq!(descriptor.id, "iframe-plugin-hello-world");
        assert_eq!(descriptor.origin, "https://cdn.example:8443");

        let local = FrameDescriptor::for_plugin("local", "/srv/plugins/local");
        assert_eq!(local.origin, "null");
    }
}
