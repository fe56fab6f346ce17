//! Post-Process Volume Tests
//!
//! Tests for:
//! - Partial JSON documents keep defaults for missing fields
//! - Posterization levels written as floats or integers
//! - Colour grading vectors load into their own fields
//! - Save/load round trip through the file system
//! - Loading through the asset server (shared, reference counted)

use std::sync::Arc;

use ember::assets::{AssetServer, MemoryAssetReader};
use ember::errors::EmberError;
use ember::renderer::PostProcessVolume;

#[test]
fn empty_document_is_all_defaults() {
    let volume = PostProcessVolume::from_json("{}").unwrap();
    assert_eq!(volume, PostProcessVolume::default());
}

#[test]
fn partial_document_overrides_only_given_fields() {
    let volume = PostProcessVolume::from_json(
        r#"{
            "shadows": { "lambda": 0.5 },
            "ssao": { "enable": false },
            "depthOfField": { "enable": true, "focusPoint": 12.0 }
        }"#,
    )
    .unwrap();

    let defaults = PostProcessVolume::default();
    assert!((volume.shadows.lambda - 0.5).abs() < f32::EPSILON);
    assert_eq!(volume.shadows.freeze, defaults.shadows.freeze);
    assert!(!volume.ssao.enable);
    assert!((volume.ssao.radius - defaults.ssao.radius).abs() < f32::EPSILON);
    assert!(volume.depth_of_field.enable);
    assert!((volume.depth_of_field.focus_point - 12.0).abs() < f32::EPSILON);
    assert_eq!(volume.depth_of_field.focus_range, defaults.depth_of_field.focus_range);
    assert_eq!(volume.color_grading, defaults.color_grading);
}

#[test]
fn posterization_levels_accept_float_and_integer_forms() {
    let float = PostProcessVolume::from_json(r#"{"posterization":{"enable":true,"levels":10.0}}"#).unwrap();
    assert!(float.posterization.enable);
    assert!((float.posterization.levels - 10.0).abs() < f32::EPSILON);

    let integer = PostProcessVolume::from_json(r#"{"posterization":{"levels":6}}"#).unwrap();
    assert!((integer.posterization.levels - 6.0).abs() < f32::EPSILON);

    let fractional = PostProcessVolume::from_json(r#"{"posterization":{"levels":4.5}}"#).unwrap();
    assert!((fractional.posterization.levels - 4.5).abs() < f32::EPSILON);

    let json = float.to_json().unwrap();
    assert!(json.contains("\"levels\": 10.0") || json.contains("\"levels\":10.0"), "{json}");
}

#[test]
fn highlights_and_color_filter_are_independent() {
    let volume = PostProcessVolume::from_json(
        r#"{
            "colorGrading": {
                "highlights": [1.0, 0.5, 0.25, 1.0],
                "colorFilter": [0.1, 0.2, 0.3, 1.0]
            }
        }"#,
    )
    .unwrap();

    assert_eq!(volume.color_grading.highlights, [1.0, 0.5, 0.25, 1.0]);
    assert_eq!(volume.color_grading.color_filter, [0.1, 0.2, 0.3, 1.0]);
}

#[test]
fn malformed_document_is_a_json_error() {
    let result = PostProcessVolume::from_json(r#"{ "shadows": { "lambda": "high" } }"#);
    assert!(matches!(result, Err(EmberError::JsonError(_))));
}

#[test]
fn save_and_load_round_trip() -> anyhow::Result<()> {
    let mut volume = PostProcessVolume::default();
    volume.fxaa.enable = false;
    volume.film_grain.enable = true;
    volume.film_grain.amount = 0.35;
    volume.pixelization.size = 8;
    volume.color_grading.temperature = -0.2;

    let path = std::env::temp_dir().join(format!(
        "ember_volume_round_trip_{}.json",
        std::process::id()
    ));
    volume.save(&path)?;
    let loaded = PostProcessVolume::load(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded, volume);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("ember_volume_that_does_not_exist.json");
    assert!(matches!(
        PostProcessVolume::load(&path),
        Err(EmberError::IoError(_))
    ));
}

#[test]
fn asset_server_shares_loaded_volumes() -> anyhow::Result<()> {
    let reader = MemoryAssetReader::new().with(
        "volumes/night.json",
        br#"{ "colorGrading": { "enable": true, "exposure": 0.6 } }"#.to_vec(),
    );
    let mut assets = AssetServer::new(reader);

    let a = assets.load_volume("volumes/night.json")?;
    let b = assets.load_volume("volumes/night.json")?;

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(assets.ref_count("volumes/night.json"), 2);
    assert!(a.color_grading.enable);
    assert!((a.color_grading.exposure - 0.6).abs() < f32::EPSILON);

    assert!(assets.give_back("volumes/night.json").is_none());
    assert!(assets.give_back("volumes/night.json").is_some());
    assert_eq!(assets.ref_count("volumes/night.json"), 0);
    Ok(())
}
