#![deny(warnings)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use spectra_client::{Backend, DeviceRegistry, GenericCatalog, RestBackend, RestConfig, SessionHealth};
use spectra_protocol::{AppInfo, Color};

#[derive(Parser)]
#[command(name = "spectra", about = "Drive Spectra lighting by hand")]
enum Cmd {
    /// Set a static color on one device category.
    Set {
        #[arg(value_enum)]
        category: Category,
        /// RRGGBB hex color, e.g. ff8800.
        color: String,
    },
    /// Clear the active effect on one device category.
    Clear {
        #[arg(value_enum)]
        category: Category,
    },
    /// Establish a session and watch the first heartbeat.
    Ping,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Category {
    Keyboard,
    Mouse,
    Mousepad,
    Headset,
    Keypad,
    Link,
}

fn parse_color(s: &str) -> Result<Color> {
    let s = s.trim_start_matches('#');
    if s.len() != 6 {
        bail!("expected an RRGGBB hex color, got {s:?}");
    }
    let word = u32::from_str_radix(s, 16).with_context(|| format!("invalid hex color {s:?}"))?;
    Ok(Color::from_rgb(word))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .compact()
        .init();

    let cmd = Cmd::parse();

    let backend = Arc::new(RestBackend::new(RestConfig::default()));
    let app = AppInfo::new("spectra", "Spectra command line").with_author("spectra", "spectra@example.com");
    backend.initialize(&app).await?;
    let devices = DeviceRegistry::new(backend.clone(), GenericCatalog::builtin());

    let outcome = run(cmd, &backend, &devices).await;
    backend.uninitialize().await?;
    outcome
}

async fn run(cmd: Cmd, backend: &Arc<RestBackend>, devices: &DeviceRegistry) -> Result<()> {
    match cmd {
        Cmd::Set { category, color } => {
            let color = parse_color(&color)?;
            let id = match category {
                Category::Keyboard => devices.keyboard().set_static(color).await?,
                Category::Mouse => devices.mouse().set_static(color).await?,
                Category::Mousepad => devices.mousepad().set_static(color).await?,
                Category::Headset => devices.headset().set_static(color).await?,
                Category::Keypad => devices.keypad().set_static(color).await?,
                Category::Link => devices.link_strip().set_static(color).await?,
            };
            info!(effect = %id, "static color applied");
        }
        Cmd::Clear { category } => {
            match category {
                Category::Keyboard => devices.keyboard().clear().await?,
                Category::Mouse => devices.mouse().clear().await?,
                Category::Mousepad => devices.mousepad().clear().await?,
                Category::Headset => devices.headset().clear().await?,
                Category::Keypad => devices.keypad().clear().await?,
                Category::Link => devices.link_strip().clear().await?,
            };
            info!("effect cleared");
        }
        Cmd::Ping => {
            let session = backend.session().context("no session after initialize")?;
            println!("session {} at {}", session.id, session.base);
            let mut health = backend.health();
            let outcome =
                tokio::time::timeout(Duration::from_secs(3), health.changed()).await;
            match outcome {
                Ok(Ok(())) => match health.borrow().clone() {
                    SessionHealth::Alive { tick } => println!("heartbeat ok (tick {tick})"),
                    SessionHealth::Unhealthy { reason } => bail!("session unhealthy: {reason}"),
                    SessionHealth::Idle => println!("session idle"),
                },
                Ok(Err(_)) => bail!("health channel closed"),
                Err(_) => bail!("no heartbeat within 3s"),
            }
        }
    }
    Ok(())
}
