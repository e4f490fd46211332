use std::sync::{Arc, Weak};
use std::time::Duration;

use console::style;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tracing::info;

use frameport_bridge::{Endpoint, EndpointConfig};
use frameport_config::FrameportConfig;
use frameport_core::{Result, Window};

const HELLO_ORIGIN: &str = "https://hello-world.plugins.local";
const THEME_ORIGIN: &str = "https://theme-toggle.plugins.local";

/// One in-process session: a host and two plugins wired through it.
struct DemoSession {
    host: Endpoint,
    hello: Endpoint,
    theme: Arc<Endpoint>,
    theme_changes: mpsc::UnboundedReceiver<String>,
}

impl DemoSession {
    fn start(config: &FrameportConfig) -> Result<Self> {
        let endpoint_config = EndpointConfig {
            request_timeout: config.bridge.request_timeout(),
        };
        let host_origin = config.bridge.host_origin.clone();

        let host = Endpoint::host(
            Window::new(&host_origin),
            vec![HELLO_ORIGIN.into(), THEME_ORIGIN.into()],
            endpoint_config.clone(),
        )?;
        host.handle("host.getInfo", |_| async {
            Ok(json!({ "name": "frameport", "version": env!("CARGO_PKG_VERSION") }))
        });

        let theme = Arc::new(Endpoint::plugin(
            Window::new(THEME_ORIGIN),
            "theme-toggle",
            host.local_window(),
            &host_origin,
            endpoint_config.clone(),
        )?);
        install_theme_toggle(&theme);

        let hello = Endpoint::plugin(
            Window::new(HELLO_ORIGIN),
            "hello-world",
            host.local_window(),
            &host_origin,
            endpoint_config,
        )?;
        hello.handle("greet", |payload: Option<Value>| async move {
            let name = payload
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or("world")
                .to_string();
            Ok(format!("Hello, {name}!"))
        });

        let (tx, theme_changes) = mpsc::unbounded_channel();
        for (who, endpoint) in [("host", &host), ("hello-world", &hello)] {
            let tx = tx.clone();
            endpoint.on("onThemeChange", move |payload: Option<&Value>| {
                let theme = payload.and_then(Value::as_str).unwrap_or("?");
                let _ = tx.send(format!("{who} saw theme {theme}"));
                Ok(())
            });
        }

        host.register_plugin("theme-toggle", theme.local_window(), THEME_ORIGIN)?;
        host.register_plugin("hello-world", hello.local_window(), HELLO_ORIGIN)?;
        info!(plugins = ?host.registered_plugins(), "demo session ready");

        Ok(Self {
            host,
            hello,
            theme,
            theme_changes,
        })
    }

    async fn run(&mut self) -> Result<()> {
        step("host → plugin", "hello-world.greet");
        let greeting = self.host.request("hello-world.greet", Some(json!("frameport"))).await?;
        show_ok(&greeting);

        step("plugin → host", "host.getInfo");
        let info = self.hello.request("host.getInfo", None).await?;
        show_ok(&info);

        step("plugin → plugin (relayed)", "theme-toggle.getTheme");
        let theme = self.hello.request("theme-toggle.getTheme", None).await?;
        show_ok(&theme);

        step("event broadcast", "theme-toggle.setTheme \"dark\"");
        self.host
            .request("theme-toggle.setTheme", Some(json!("dark")))
            .await?;
        for _ in 0..2 {
            match tokio::time::timeout(Duration::from_secs(1), self.theme_changes.recv()).await {
                Ok(Some(line)) => println!("    {}", style(line).green()),
                _ => println!("    {}", style("event not delivered").red()),
            }
        }

        step("unrouted request", "ghost.walk");
        match self.hello.request("ghost.walk", None).await {
            Ok(value) => show_ok(&value),
            Err(e) => println!("    {} {e}", style("✗").red()),
        }
        Ok(())
    }

    fn shutdown(self) {
        self.hello.destroy();
        self.theme.destroy();
        self.host.destroy();
    }
}

/// theme-toggle: `getTheme`, `setTheme`, and an `onThemeChange` event on
/// every change.
fn install_theme_toggle(endpoint: &Arc<Endpoint>) {
    let current = Arc::new(Mutex::new(String::from("light")));

    let state = Arc::clone(&current);
    endpoint.handle("getTheme", move |_| {
        let state = Arc::clone(&state);
        async move { Ok(state.lock().await.clone()) }
    });

    let state = Arc::clone(&current);
    let weak: Weak<Endpoint> = Arc::downgrade(endpoint);
    endpoint.handle_void("setTheme", move |payload: Option<Value>| {
        let state = Arc::clone(&state);
        let weak = weak.clone();
        async move {
            let theme = match payload.as_ref().and_then(Value::as_str) {
                Some(t @ ("light" | "dark")) => t.to_string(),
                _ => anyhow::bail!("theme must be \"light\" or \"dark\""),
            };
            *state.lock().await = theme.clone();
            if let Some(endpoint) = weak.upgrade() {
                endpoint.emit("onThemeChange", Some(json!(theme)));
            }
            Ok(())
        }
    });
}

fn step(label: &str, what: &str) {
    println!("{} {}", style(format!("▸ {label}:")).bold(), style(what).cyan());
}

fn show_ok(value: &Option<Value>) {
    let text = value
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_else(|| "(no payload)".into());
    println!("    {} {text}", style("✓").green());
}

pub(super) async fn cmd_demo(config: FrameportConfig) -> Result<()> {
    let mut session = DemoSession::start(&config)?;
    let outcome = session.run().await;
    session.shutdown();
    outcome
}
