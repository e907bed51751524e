//! Draws the active scene and the host HUD into the window.
//!
//! Both layers are fullscreen triangles with a fragment shader, one
//! world-space and one screen-space:
//!
//! - the scene pass raymarches the frame's markers, the optional ground grid
//!   and the background scaled by the environment intensity;
//! - the HUD pass blends eyelids, the glitch, the loader and the overlay
//!   panels on top.

use crate::gpu::GpuContext;
use crate::scene::SceneFrame;

/// Markers beyond this are not drawn.
pub const MAX_MARKERS: usize = 8;
/// Overlay and barrage panels beyond this are not drawn.
pub const MAX_PANELS: usize = 32;

const SCENE_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    time: f32,
    fov: f32,
    camera_pos: vec3f,
    aspect: f32,
    camera_forward: vec3f,
    environment: f32,
    camera_right: vec3f,
    light: f32,
    camera_up: vec3f,
    grid: f32,
    background: vec3f,
    marker_count: u32,
    markers: array<vec4f, 8>,
    marker_colors: array<vec4f, 8>,
    marker_emissive: array<vec4f, 8>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    let x = f32(i32(vi) - 1) * 3.0;
    let y = f32(i32(vi & 1u) * 2 - 1) * 3.0;
    return vec4f(x, y, 0.0, 1.0);
}

fn sphere(ro: vec3f, rd: vec3f, center: vec3f, radius: f32) -> f32 {
    let oc = ro - center;
    let b = dot(oc, rd);
    let c = dot(oc, oc) - radius * radius;
    let h = b * b - c;
    if (h < 0.0) {
        return -1.0;
    }
    return -b - sqrt(h);
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    let uv = (pos.xy / u.resolution) * 2.0 - 1.0;
    let half_fov = tan(u.fov * 0.5);
    let rd = normalize(
        u.camera_forward
        + uv.x * u.aspect * half_fov * u.camera_right
        - uv.y * half_fov * u.camera_up
    );
    let ro = u.camera_pos;

    let horizon = 0.5 + 0.5 * rd.y;
    var color = u.background * u.environment * mix(0.6, 1.0, horizon);
    var nearest = 1e9;

    if (u.grid > 0.5 && rd.y < -1e-4) {
        let t = -ro.y / rd.y;
        let p = ro + rd * t;
        let cell = abs(fract(p.xz * 0.5) - 0.5);
        let line = 1.0 - smoothstep(0.0, 0.03, min(cell.x, cell.y));
        let fade = exp(-t * 0.01);
        let ground = mix(vec3f(0.05), vec3f(0.35), line) * (0.3 + 0.7 * u.light);
        color = mix(color, ground, fade);
        nearest = t;
    }

    for (var i = 0u; i < u.marker_count; i = i + 1u) {
        let m = u.markers[i];
        let t = sphere(ro, rd, m.xyz, m.w);
        if (t > 0.0 && t < nearest) {
            nearest = t;
            let n = normalize(ro + rd * t - m.xyz);
            let diffuse = max(dot(n, normalize(vec3f(0.3, 1.0, 0.5))), 0.0);
            color = u.marker_colors[i].rgb * (0.15 + diffuse * u.light)
                + u.marker_emissive[i].rgb;
        }
    }

    return vec4f(color, 1.0);
}
"#;

const HUD_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    time: f32,
    eyelids: f32,
    glitch: f32,
    loader: f32,
    panel_count: u32,
    _pad: f32,
    panels: array<vec4f, 32>,
    panel_colors: array<vec4f, 32>,
}
@group(0) @binding(0) var<uniform> u: Uniforms;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    let x = f32(i32(vi) - 1) * 3.0;
    let y = f32(i32(vi & 1u) * 2 - 1) * 3.0;
    return vec4f(x, y, 0.0, 1.0);
}

fn hash(n: f32) -> f32 {
    return fract(sin(n) * 43758.5453);
}

fn over(dst: vec4f, src: vec4f) -> vec4f {
    let a = src.a + dst.a * (1.0 - src.a);
    if (a <= 0.0) {
        return vec4f(0.0);
    }
    let rgb = (src.rgb * src.a + dst.rgb * dst.a * (1.0 - src.a)) / a;
    return vec4f(rgb, a);
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    var out = vec4f(0.0);

    for (var i = 0u; i < u.panel_count; i = i + 1u) {
        let r = u.panels[i];
        if (pos.x >= r.x && pos.x <= r.x + r.z && pos.y >= r.y && pos.y <= r.y + r.w) {
            out = over(out, u.panel_colors[i]);
        }
    }

    if (u.glitch > 0.5) {
        let band = floor(pos.y / 12.0);
        let n = hash(band + floor(u.time * 30.0));
        if (n > 0.7) {
            out = over(out, vec4f(n, 0.1, 1.0 - n, 0.45));
        }
    }

    if (u.loader > 0.5) {
        out = over(out, vec4f(0.0, 0.0, 0.0, 0.85));
        let c = u.resolution * 0.5;
        let d = distance(pos.xy, c);
        let angle = atan2(pos.y - c.y, pos.x - c.x);
        let sweep = fract(angle / 6.2831853 - u.time * 0.8);
        if (abs(d - 40.0) < 4.0) {
            out = over(out, vec4f(0.9, 0.9, 0.9, sweep));
        }
    }

    let lid = u.eyelids * 0.5 * u.resolution.y;
    if (pos.y < lid || pos.y > u.resolution.y - lid) {
        out = vec4f(0.0, 0.0, 0.0, 1.0);
    }

    return out;
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub fov: f32,
    pub camera_pos: [f32; 3],
    pub aspect: f32,
    pub camera_forward: [f32; 3],
    pub environment: f32,
    pub camera_right: [f32; 3],
    pub light: f32,
    pub camera_up: [f32; 3],
    pub grid: f32,
    pub background: [f32; 3],
    pub marker_count: u32,
    pub markers: [[f32; 4]; MAX_MARKERS],
    pub marker_colors: [[f32; 4]; MAX_MARKERS],
    pub marker_emissive: [[f32; 4]; MAX_MARKERS],
}

impl SceneUniforms {
    pub fn from_frame(frame: &SceneFrame, resolution: [f32; 2]) -> Self {
        let camera = &frame.camera;
        let mut uniforms = Self {
            resolution,
            time: frame.time,
            fov: camera.fov,
            camera_pos: camera.position.to_array(),
            aspect: camera.aspect,
            camera_forward: camera.forward.to_array(),
            environment: frame.environment,
            camera_right: camera.right().to_array(),
            light: frame.light,
            camera_up: camera.orthogonal_up().to_array(),
            grid: if frame.ground_grid { 1.0 } else { 0.0 },
            background: frame.background.to_array(),
            marker_count: 0,
            markers: [[0.0; 4]; MAX_MARKERS],
            marker_colors: [[0.0; 4]; MAX_MARKERS],
            marker_emissive: [[0.0; 4]; MAX_MARKERS],
        };
        for (i, marker) in frame.markers.iter().take(MAX_MARKERS).enumerate() {
            uniforms.markers[i] = marker.position.extend(marker.radius).to_array();
            uniforms.marker_colors[i] = marker.color.extend(1.0).to_array();
            uniforms.marker_emissive[i] = marker.emissive.extend(0.0).to_array();
            uniforms.marker_count += 1;
        }
        uniforms
    }
}

/// One screen rectangle in pixels with a straight-alpha colour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HudPanel {
    pub rect: [f32; 4],
    pub color: [f32; 4],
}

/// Everything the HUD pass draws for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HudLayer {
    /// 0 is fully open, 1 fully closed.
    pub eyelids: f32,
    pub glitch: bool,
    pub loader: bool,
    pub panels: Vec<HudPanel>,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HudUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub eyelids: f32,
    pub glitch: f32,
    pub loader: f32,
    pub panel_count: u32,
    pub _pad: f32,
    pub panels: [[f32; 4]; MAX_PANELS],
    pub panel_colors: [[f32; 4]; MAX_PANELS],
}

impl HudUniforms {
    pub fn from_layer(layer: &HudLayer, resolution: [f32; 2], time: f32) -> Self {
        let mut uniforms = Self {
            resolution,
            time,
            eyelids: layer.eyelids.clamp(0.0, 1.0),
            glitch: if layer.glitch { 1.0 } else { 0.0 },
            loader: if layer.loader { 1.0 } else { 0.0 },
            panel_count: 0,
            _pad: 0.0,
            panels: [[0.0; 4]; MAX_PANELS],
            panel_colors: [[0.0; 4]; MAX_PANELS],
        };
        for (i, panel) in layer.panels.iter().take(MAX_PANELS).enumerate() {
            uniforms.panels[i] = panel.rect;
            uniforms.panel_colors[i] = panel.color;
            uniforms.panel_count += 1;
        }
        uniforms
    }
}

/// A fullscreen triangle with one uniform buffer at `@group(0) @binding(0)`.
struct FullscreenPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl FullscreenPass {
    fn new(
        gpu: &GpuContext,
        label: &str,
        source: &str,
        uniform_size: usize,
        blend: wgpu::BlendState,
    ) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: uniform_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    fn draw<U: bytemuck::Pod>(&self, gpu: &GpuContext, pass: &mut wgpu::RenderPass, uniforms: &U) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

pub struct Presenter {
    scene: FullscreenPass,
    hud: FullscreenPass,
}

impl Presenter {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            scene: FullscreenPass::new(
                gpu,
                "Scene Pass",
                SCENE_SHADER,
                std::mem::size_of::<SceneUniforms>(),
                wgpu::BlendState::REPLACE,
            ),
            hud: FullscreenPass::new(
                gpu,
                "HUD Pass",
                HUD_SHADER,
                std::mem::size_of::<HudUniforms>(),
                wgpu::BlendState::ALPHA_BLENDING,
            ),
        }
    }

    /// Draw one frame. With no scene frame the window is cleared to black
    /// and only the HUD is drawn.
    pub fn present(
        &self,
        gpu: &GpuContext,
        frame: Option<&SceneFrame>,
        hud: &HudLayer,
        time: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        let output = gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let resolution = [gpu.width() as f32, gpu.height() as f32];

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame) = frame {
                let uniforms = SceneUniforms::from_frame(frame, resolution);
                self.scene.draw(gpu, &mut pass, &uniforms);
            }
            let uniforms = HudUniforms::from_layer(hud, resolution, time);
            self.hud.draw(gpu, &mut pass, &uniforms);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::scene::{Marker, SceneId};
    use glam::Vec3;

    fn frame(markers: usize) -> SceneFrame {
        SceneFrame {
            scene: SceneId::World,
            time: 1.0,
            camera: Camera::new(),
            background: Vec3::new(0.1, 0.2, 0.3),
            environment: 0.5,
            light: 1.0,
            markers: (0..markers)
                .map(|i| Marker {
                    position: Vec3::new(i as f32, 0.0, 0.0),
                    radius: 0.5,
                    color: Vec3::ONE,
                    emissive: Vec3::ZERO,
                })
                .collect(),
            ground_grid: true,
            embed: false,
        }
    }

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 480);
        assert_eq!(std::mem::size_of::<HudUniforms>(), 1056);
    }

    #[test]
    fn markers_are_capped() {
        let uniforms = SceneUniforms::from_frame(&frame(12), [800.0, 600.0]);
        assert_eq!(uniforms.marker_count, MAX_MARKERS as u32);
        assert_eq!(uniforms.markers[7], [7.0, 0.0, 0.0, 0.5]);
        assert_eq!(uniforms.grid, 1.0);
        assert_eq!(uniforms.environment, 0.5);
    }

    #[test]
    fn hud_clamps_eyelids_and_caps_panels() {
        let layer = HudLayer {
            eyelids: 1.4,
            glitch: true,
            loader: false,
            panels: vec![
                HudPanel {
                    rect: [0.0, 0.0, 10.0, 10.0],
                    color: [1.0; 4],
                };
                40
            ],
        };
        let uniforms = HudUniforms::from_layer(&layer, [800.0, 600.0], 2.0);
        assert_eq!(uniforms.eyelids, 1.0);
        assert_eq!(uniforms.glitch, 1.0);
        assert_eq!(uniforms.loader, 0.0);
        assert_eq!(uniforms.panel_count, MAX_PANELS as u32);
    }
}
