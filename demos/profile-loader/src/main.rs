//! Profile loader example binary
//!
//! Runs a few requests through one lifecycle and prints what the view renders.

use observable_rust_runtime::RequestLifecycle;
use observable_rust_runtime::metrics::MetricsExporter;
use profile_loader::{FakeProfileApi, ProfileView};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_loader=info,observable_rust_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut exporter = MetricsExporter::new();
    if let Err(e) = exporter.install() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    println!("=== Profile Loader: Observable Rust ===\n");

    // Built once, shared by clone
    let lifecycle = RequestLifecycle::new(FakeProfileApi::seeded());
    let view = ProfileView::attach(&lifecycle);

    for (label, id) in [
        ("known user", Some(1)),
        ("unknown user", Some(42)),
        ("missing id", None),
        ("unreachable server", Some(0)),
        ("another known user", Some(2)),
    ] {
        println!(">>> Loading {label} ({id:?})");
        let handle = lifecycle.start(id);
        println!("    immediately: {}", view.render());

        match handle.await {
            Ok(_) => println!("    handle resolved"),
            Err(e) => println!("    handle rejected: {e}"),
        }
        println!("    settled:     {}\n", view.render());
    }

    view.detach();

    println!("Frames rendered: {}", view.frames().len());
    if let Some(metrics) = exporter.render() {
        println!("\n=== Metrics ===\n{metrics}");
    }
}
