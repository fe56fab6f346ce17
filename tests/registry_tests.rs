//! Shared Resource Registry Tests
//!
//! Tests for:
//! - Texture round trip: views added are exactly the views returned
//! - Duplicate view types are not added twice
//! - Descriptor sentinel for unsupported or missing views
//! - Ring buffer slot selection by frame index
//! - Re-registration retires the previous entry
//! - Teardown releases every GPU object

use ember::renderer::ResourceRegistry;
use ember::rhi::{
    FRAMES_IN_FLIGHT, HeadlessRhi, INVALID_DESCRIPTOR, Rhi, SamplerDesc, TextureDesc, ViewType,
};

fn color_desc(name: &str) -> TextureDesc {
    TextureDesc::new_2d(
        name,
        64,
        64,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
    )
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn texture_round_trip_preserves_view_types() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();

    let texture = registry.create_shared_texture(&mut rhi, "HDRColorBuffer", &color_desc("HDR"));
    let srv = texture.add_view(&mut rhi, ViewType::ShaderResource);
    let uav = texture.add_view(&mut rhi, ViewType::Storage);

    let fetched = registry.texture("HDRColorBuffer").unwrap();
    let types: Vec<ViewType> = fetched.views().iter().map(|v| v.ty).collect();
    assert_eq!(types, vec![ViewType::ShaderResource, ViewType::Storage]);
    assert_eq!(fetched.descriptor(ViewType::ShaderResource), srv.descriptor);
    assert_eq!(fetched.descriptor(ViewType::Storage), uav.descriptor);
    assert_eq!(fetched.view(ViewType::RenderTarget), None);
}

#[test]
fn duplicate_view_type_is_not_added_twice() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();

    let texture = registry.create_shared_texture(&mut rhi, "Target", &color_desc("Target"));
    let first = texture.add_view(&mut rhi, ViewType::RenderTarget);
    let second = texture.add_view(&mut rhi, ViewType::RenderTarget);

    assert_eq!(first, second);
    let texture = registry.texture("Target").unwrap();
    assert_eq!(texture.views().len(), 1);
    assert_eq!(rhi.texture_views(texture.texture).unwrap().len(), 1);
}

#[test]
fn missing_view_yields_sentinel() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    registry
        .create_shared_texture(&mut rhi, "Depth", &color_desc("Depth"))
        .add_view(&mut rhi, ViewType::ShaderResource);

    assert_eq!(
        registry.descriptor("Depth", ViewType::DepthTarget, 0),
        INVALID_DESCRIPTOR
    );
    assert_eq!(
        registry.descriptor("Unknown", ViewType::ShaderResource, 0),
        INVALID_DESCRIPTOR
    );
}

#[test]
fn lookup_by_wrong_kind_is_none() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    registry.create_shared_rw_buffer(&mut rhi, "Kernel", 256, 16);

    assert!(registry.contains("Kernel"));
    assert!(registry.texture("Kernel").is_none());
    assert!(registry.ring_buffer("Kernel").is_none());
    assert!(registry.buffer("Kernel").is_some());
}

// ============================================================================
// Buffers & Samplers
// ============================================================================

#[test]
fn rw_buffer_exposes_srv_and_uav_only() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    let buffer = registry.create_shared_rw_buffer(&mut rhi, "Kernel", 1024, 16);

    assert_eq!(registry.descriptor("Kernel", ViewType::ShaderResource, 0), buffer.srv);
    assert_eq!(registry.descriptor("Kernel", ViewType::Storage, 0), buffer.uav);
    assert_eq!(
        registry.descriptor("Kernel", ViewType::Constant, 0),
        INVALID_DESCRIPTOR
    );
    assert_eq!(
        registry.descriptor("Kernel", ViewType::RenderTarget, 0),
        INVALID_DESCRIPTOR
    );
}

#[test]
fn ring_buffer_slot_follows_frame_index() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    let ring = registry.create_shared_ring_buffer(&mut rhi, "Camera", 256, 256);

    for frame in 0..FRAMES_IN_FLIGHT * 2 {
        let slot = ring.slot(frame);
        assert_eq!(
            registry.descriptor("Camera", ViewType::Constant, frame),
            slot.cbv
        );
        assert_eq!(
            registry.descriptor("Camera", ViewType::ShaderResource, frame),
            slot.srv
        );
    }
    assert_eq!(
        registry.descriptor("Camera", ViewType::Storage, 0),
        INVALID_DESCRIPTOR
    );
}

#[test]
fn ring_buffer_writes_land_in_their_slot() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    let ring = registry.create_shared_ring_buffer(&mut rhi, "Lights", 8, 8);

    ring.write(&mut rhi, 1, 0, &[7; 8]);

    assert_eq!(rhi.buffer_data(ring.slot(1).buffer), Some(&[7u8; 8][..]));
    assert_eq!(rhi.buffer_data(ring.slot(0).buffer), Some(&[0u8; 8][..]));
}

#[test]
fn oversized_ring_write_is_rejected() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    let ring = registry.create_shared_ring_buffer(&mut rhi, "Small", 4, 4);

    ring.write(&mut rhi, 0, 2, &[1; 4]);
    assert_eq!(rhi.buffer_data(ring.slot(0).buffer), Some(&[0u8; 4][..]));
}

#[test]
fn sampler_answers_any_view_type() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();
    let sampler = registry.create_shared_sampler(
        &mut rhi,
        "ShadowSampler",
        &SamplerDesc::comparison("ShadowSampler", wgpu::CompareFunction::LessEqual),
    );

    assert_eq!(
        registry.descriptor("ShadowSampler", ViewType::ShaderResource, 0),
        sampler.descriptor
    );
    assert_eq!(
        registry.descriptor("ShadowSampler", ViewType::Storage, 2),
        sampler.descriptor
    );
}

// ============================================================================
// Lifetime
// ============================================================================

#[test]
fn re_registration_retires_previous_entry() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();

    let old = registry
        .create_shared_texture(&mut rhi, "LDRColorBuffer", &color_desc("LDR"))
        .texture;
    let new = registry
        .create_shared_texture(&mut rhi, "LDRColorBuffer", &color_desc("LDR"))
        .texture;

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.texture("LDRColorBuffer").unwrap().texture, new);
    assert!(registry.has_retired());
    assert!(rhi.contains_texture(old));

    rhi.wait();
    registry.destroy_retired(&mut rhi);
    assert!(!registry.has_retired());
    assert!(!rhi.contains_texture(old));
    assert!(rhi.contains_texture(new));
}

#[test]
fn destroy_all_releases_every_object() {
    let mut rhi = HeadlessRhi::new();
    let mut registry = ResourceRegistry::new();

    registry
        .create_shared_texture(&mut rhi, "A", &color_desc("A"))
        .add_view(&mut rhi, ViewType::ShaderResource);
    registry.create_shared_rw_buffer(&mut rhi, "B", 64, 16);
    registry.create_shared_ring_buffer(&mut rhi, "C", 64, 64);
    registry.create_shared_sampler(
        &mut rhi,
        "D",
        &SamplerDesc::linear("D", wgpu::AddressMode::Repeat),
    );

    registry.destroy_all(&mut rhi);

    assert!(registry.is_empty());
    assert_eq!(rhi.live_textures(), 0);
    assert_eq!(rhi.live_buffers(), 0);
    assert_eq!(rhi.live_samplers(), 0);
}

#[test]
#[should_panic(expected = "not registered")]
fn require_texture_panics_on_missing_name() {
    let registry = ResourceRegistry::new();
    let _ = registry.require_texture("GBufferNormal");
}
