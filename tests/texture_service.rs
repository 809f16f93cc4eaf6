//! Integration tests for a texture service backed by files on disk
#![cfg(feature = "runtime-tokio")]

use archetype_loader::{
    Delivery, LoaderConfig, LoaderError, LoaderService, ResourceKind, Texture, TextureFetcher,
    TokioSpawner, Variant,
};
use std::path::Path;
use std::sync::Arc;

fn write_png(dir: &Path, name: &str, rows: &[[u8; 4]]) {
    let mut img = image::RgbaImage::new(1, rows.len() as u32);
    for (y, pixel) in rows.iter().enumerate() {
        img.put_pixel(0, y as u32, image::Rgba(*pixel));
    }
    img.save(dir.join(name)).expect("Failed to write test image");
}

#[tokio::test]
async fn test_two_requesters_share_a_decoded_texture() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "wall.png", &[[10, 20, 30, 255], [40, 50, 60, 255]]);

    let mut service = LoaderService::new(
        TextureFetcher::new(dir.path()),
        TokioSpawner::new(),
        LoaderConfig::new("textures"),
    );
    let mut scene = service.client();
    let mut menu = service.client();

    scene.request(ResourceKind::Texture, "/wall.png").unwrap();
    menu.request(ResourceKind::Texture, "/wall.png").unwrap();
    menu.request_with(
        ResourceKind::Texture,
        "/wall.png",
        Variant::new().with("flip_y", true),
    )
    .unwrap();
    service.update();

    let from_scene = scene.recv().await.unwrap().result.unwrap();
    let mut from_menu = Vec::new();
    for _ in 0..2 {
        from_menu.push(menu.recv().await.unwrap().result.unwrap());
    }

    let same: Vec<_> = from_menu
        .iter()
        .filter(|response| Arc::ptr_eq(&response.data, &from_scene.data))
        .collect();
    assert_eq!(same.len(), 1);
    assert_eq!(from_scene.data.data[..4], [10, 20, 30, 255]);

    let flipped = from_menu
        .iter()
        .find(|response| !Arc::ptr_eq(&response.data, &from_scene.data))
        .unwrap();
    assert_eq!(flipped.data.data[..4], [40, 50, 60, 255]);
    assert_eq!(flipped.delivery, Delivery::Transferred);

    let deliveries = [from_scene.delivery, same[0].delivery];
    assert_eq!(
        deliveries
            .iter()
            .filter(|delivery| **delivery == Delivery::Transferred)
            .count(),
        1
    );
    assert_eq!(service.cache().metrics().misses(), 2);
}

#[tokio::test]
async fn test_missing_texture_is_reported_to_requester() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = LoaderService::new(
        TextureFetcher::new(dir.path()),
        TokioSpawner::new(),
        LoaderConfig::new("textures"),
    );
    let mut client = service.client();

    let rpc = client.request(ResourceKind::Texture, "nope.png").unwrap();
    service.update();

    let reply = client.recv().await.unwrap();
    assert_eq!(reply.rpc, rpc);
    assert!(matches!(reply.result, Err(LoaderError::Fetch(_))));
}

#[tokio::test]
async fn test_owned_texture_from_last_consumer() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "sky.png", &[[1, 2, 3, 255]]);

    let mut service = LoaderService::new(
        TextureFetcher::new(dir.path()),
        TokioSpawner::new(),
        LoaderConfig::new("textures"),
    );
    let mut client = service.client();
    client.request(ResourceKind::Texture, "sky.png").unwrap();
    service.update();

    let response = client.recv().await.unwrap().result.unwrap();
    assert!(response.is_transferred());
    let texture: Texture = response.into_owned();
    assert_eq!((texture.width, texture.height), (1, 1));
}
