//! Buffers that do not match the shader layouts are rejected before a frame runs

mod common;

use common::context;
use helio_clustered::layout::{pod_size, ShadingParams, LIGHT_SET_MIN_BINDING};
use helio_clustered::resources::{buffer_bind_group, BindGroupLayouts, BufferSlot, FrameResources, SharedBuffers};
use helio_clustered::{CameraUniform, ClusterConfig, ClusterGrid, Error};

fn buffer(device: &wgpu::Device, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[test]
fn undersized_camera_buffer_fails_frame_setup() {
    let Some(ctx) = context() else {
        eprintln!("Skipping undersized_camera_buffer_fails_frame_setup (no GPU)");
        return;
    };

    let device = &ctx.device;
    let layouts = BindGroupLayouts::new(device);
    let grid = ClusterGrid::new(640, 480, &ClusterConfig::default()).expect("grid");
    let camera = buffer(device, "Short Camera", 64, wgpu::BufferUsages::UNIFORM);
    let lights = buffer(device, "Lights", LIGHT_SET_MIN_BINDING, wgpu::BufferUsages::STORAGE);
    let params = buffer(device, "Params", pod_size::<ShadingParams>(), wgpu::BufferUsages::UNIFORM);

    let shared = SharedBuffers { camera: &camera, lights: &lights, shading_params: &params };
    let err = FrameResources::new(&ctx, &layouts, grid, 2.0, &shared, 0)
        .err()
        .expect("short camera buffer accepted");
    match err {
        Error::Layout { buffer, required, actual } => {
            assert_eq!(buffer, "camera uniform");
            assert_eq!(required, pod_size::<CameraUniform>());
            assert_eq!(actual, 64);
        }
        other => panic!("expected a layout error, got {other:?}"),
    }
}

#[test]
fn light_buffer_without_a_record_is_rejected() {
    let Some(ctx) = context() else {
        eprintln!("Skipping light_buffer_without_a_record_is_rejected (no GPU)");
        return;
    };

    let device = &ctx.device;
    let layouts = BindGroupLayouts::new(device);
    let camera = buffer(device, "Camera", pod_size::<CameraUniform>(), wgpu::BufferUsages::UNIFORM);
    let lights = buffer(device, "Header Only", 16, wgpu::BufferUsages::STORAGE);
    let params = buffer(device, "Params", pod_size::<ShadingParams>(), wgpu::BufferUsages::UNIFORM);
    let grid = ClusterGrid::new(640, 480, &ClusterConfig::default()).expect("grid");

    let shared = SharedBuffers { camera: &camera, lights: &lights, shading_params: &params };
    let result = FrameResources::new(&ctx, &layouts, grid, 2.0, &shared, 0);
    assert!(matches!(result, Err(Error::Layout { buffer: "light set", actual: 16, .. })));
}

#[test]
fn matching_buffers_bind() {
    let Some(ctx) = context() else {
        eprintln!("Skipping matching_buffers_bind (no GPU)");
        return;
    };

    let device = &ctx.device;
    let layouts = BindGroupLayouts::new(device);
    let camera = buffer(device, "Camera", pod_size::<CameraUniform>(), wgpu::BufferUsages::UNIFORM);
    let group = buffer_bind_group(
        device,
        "Camera Bind Group",
        &layouts.camera,
        &[BufferSlot::new("camera uniform", &camera, pod_size::<CameraUniform>())],
    );
    assert!(group.is_ok());

    // Wrong usage passes the size check but not the device
    let storage = buffer(device, "Storage Camera", pod_size::<CameraUniform>(), wgpu::BufferUsages::STORAGE);
    let group = buffer_bind_group(
        device,
        "Camera Bind Group",
        &layouts.camera,
        &[BufferSlot::new("camera uniform", &storage, pod_size::<CameraUniform>())],
    );
    assert!(matches!(group, Err(Error::Resource(_))));
}
