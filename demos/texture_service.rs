//! Texture service with progress reporting
//!
//! Usage: `cargo run --example texture_service -- <asset dir> <texture>...`
//!
//! Every texture is requested twice, from two clients, to show that each file
//! is decoded once.

use archetype_loader::{
    LoaderConfig, LoaderService, ProgressService, ResourceKind, TextureFetcher, TokioSpawner,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let base_dir = args.next().unwrap_or_else(|| "assets".to_string());
    let textures: Vec<String> = args.collect();

    let mut progress = ProgressService::new();
    progress.notifier().expect_at_least(textures.len() as u32 * 2);

    let mut service = LoaderService::new(
        TextureFetcher::new(&base_dir),
        TokioSpawner::new(),
        LoaderConfig::new("textures"),
    )
    .with_progress(progress.notifier());

    let mut scene = service.client();
    let mut menu = service.client();
    for texture in &textures {
        scene.request(ResourceKind::Texture, texture.as_str())?;
        menu.request(ResourceKind::Texture, texture.as_str())?;
    }
    service.update();

    for client in [&mut scene, &mut menu] {
        for _ in 0..textures.len() {
            let Some(reply) = client.recv().await else {
                break;
            };
            match reply.result {
                Ok(response) => println!(
                    "{}: {}x{} ({:?})",
                    reply.rpc, response.data.width, response.data.height, response.delivery
                ),
                Err(err) => println!("{}: {err}", reply.rpc),
            }

            progress.update()?;
            let state = progress.state();
            println!("  {:>5.1}% {}", state.progress * 100.0, state.comment);
        }
    }

    let metrics = service.cache().metrics();
    println!(
        "fetches: {}, reused: {:.0}%",
        metrics.misses(),
        metrics.cache_hit_rate()
    );

    Ok(())
}
