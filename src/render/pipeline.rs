// SPDX-License-Identifier: GPL-3.0-only

//! GPU NV21 to RGB conversion and quad drawing
//!
//! The pipeline starts `Uninitialized`, becomes `Ready` once the shader has
//! compiled and the render pipeline has been created, and passes through
//! `Drawing` for every frame. A compile or link failure moves it to `Failed`
//! for good. A failure in an individual draw (texture size mismatch, upload
//! or submit validation error) aborts that draw only; the pipeline stays
//! `Ready` and the surface keeps whatever it showed before.
//!
//! Per draw:
//! 1. split the frame into luma and chroma planes
//! 2. ensure both plane textures exist, then upload both
//! 3. write the MVP and texture matrices, refresh texture coordinates if the
//!    crop changed
//! 4. bind luma at binding 0, chroma at binding 1
//! 5. draw the 4-vertex triangle strip

use crate::constants::timing;
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::checked;
use crate::media::Frame;
use crate::render::crop::{CropState, QUAD_POSITIONS};
use crate::render::textures::{GpuPlane, Plane, PlaneTextureSet, create_plane_sampler};
use crate::render::transform::TransformMatrix;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;

/// WGSL source of the conversion shader
pub const PREVIEW_SHADER: &str = include_str!("nv21_preview.wgsl");

/// Lifecycle of a [`ColorConvertPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Drawing,
    /// Shader compile or link failed; no further draws
    Failed,
}

/// Vertex-stage uniforms (must match the shader's `Transforms`)
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct TransformUniform {
    mvp: [[f32; 4]; 4],
    tex_matrix: [[f32; 4]; 4],
}

/// Objects created once at initialization
struct Program {
    render_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    position_buffer: wgpu::Buffer,
    tex_coord_buffer: wgpu::Buffer,
}

/// Where a draw lands and what it is preceded by
#[derive(Debug, Clone, Copy)]
pub struct DrawTarget<'a> {
    pub view: &'a wgpu::TextureView,
    /// Output size in pixels
    pub width: u32,
    pub height: u32,
    /// Clear color, or `None` to draw over existing contents
    pub clear: Option<wgpu::Color>,
}

/// Converts NV21 frames to RGB on the GPU and draws them as a full-viewport quad
pub struct ColorConvertPipeline {
    state: PipelineState,
    target_format: wgpu::TextureFormat,
    shader_source: &'static str,
    program: Option<Program>,
    textures: PlaneTextureSet<GpuPlane>,
    bind_group: Option<wgpu::BindGroup>,
    crop: CropState,
    uploaded_crop: Option<CropState>,
    draw_count: u64,
}

impl ColorConvertPipeline {
    /// Pipeline rendering into targets of `target_format`
    pub fn new(target_format: wgpu::TextureFormat) -> Self {
        Self::with_shader_source(target_format, PREVIEW_SHADER)
    }

    pub(crate) fn with_shader_source(
        target_format: wgpu::TextureFormat,
        shader_source: &'static str,
    ) -> Self {
        Self {
            state: PipelineState::Uninitialized,
            target_format,
            shader_source,
            program: None,
            textures: PlaneTextureSet::new(),
            bind_group: None,
            crop: CropState::NONE,
            uploaded_crop: None,
            draw_count: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    pub fn textures(&self) -> &PlaneTextureSet<GpuPlane> {
        &self.textures
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// Crop applied to texture coordinates from the next draw on
    pub fn set_crop(&mut self, crop: CropState) {
        self.crop = crop;
    }

    pub fn crop(&self) -> CropState {
        self.crop
    }

    /// Compile the shader and build the render pipeline.
    ///
    /// No-op when already initialized. Any failure is terminal.
    pub fn initialize(&mut self, device: &wgpu::Device) -> PipelineResult<()> {
        match self.state {
            PipelineState::Ready | PipelineState::Drawing => return Ok(()),
            PipelineState::Failed => return Err(PipelineError::Failed),
            PipelineState::Uninitialized => {}
        }

        match self.build_program(device) {
            Ok(program) => {
                self.program = Some(program);
                self.state = PipelineState::Ready;
                info!(format = ?self.target_format, "Preview pipeline ready");
                Ok(())
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                error!(error = %e, "Preview pipeline failed to initialize");
                Err(e)
            }
        }
    }

    fn build_program(&self, device: &wgpu::Device) -> PipelineResult<Program> {
        let shader = checked(device, "shader compile", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("camera-preview NV21 shader"),
                source: wgpu::ShaderSource::Wgsl(self.shader_source.into()),
            })
        })
        .map_err(|e| PipelineError::ShaderCompilation(e.to_string()))?;

        let link = || {
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("camera-preview NV21 bind group layout"),
                    entries: &[
                        // Luma texture
                        plane_layout_entry(Plane::Luma),
                        // Chroma texture
                        plane_layout_entry(Plane::Chroma),
                        // Sampler
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                        // Transform uniform
                        wgpu::BindGroupLayoutEntry {
                            binding: 3,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("camera-preview NV21 pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let vertex_buffers = [
                wgpu::VertexBufferLayout {
                    array_stride: (2 * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                },
                wgpu::VertexBufferLayout {
                    array_stride: (2 * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![1 => Float32x2],
                },
            ];

            let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("camera-preview NV21 pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.target_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
                cache: None,
            });

            (bind_group_layout, render_pipeline)
        };

        let (bind_group_layout, render_pipeline) = checked(device, "pipeline link", link)
            .map_err(|e| PipelineError::ProgramLink(e.to_string()))?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera-preview transform uniform"),
            size: std::mem::size_of::<TransformUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera-preview quad positions"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let tex_coord_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera-preview quad tex coords"),
            contents: bytemuck::cast_slice(&CropState::NONE.tex_coords()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Ok(Program {
            render_pipeline,
            bind_group_layout,
            sampler: create_plane_sampler(device),
            uniform_buffer,
            position_buffer,
            tex_coord_buffer,
        })
    }

    /// Upload `frame` and draw it into `target` with `matrix` as MVP.
    ///
    /// Initializes the pipeline on first use.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: DrawTarget<'_>,
        matrix: &TransformMatrix,
        frame: &Frame,
    ) -> PipelineResult<()> {
        self.initialize(device)?;

        self.state = PipelineState::Drawing;
        let result = self.draw_frame(device, queue, target, matrix, frame);
        self.state = PipelineState::Ready;

        match &result {
            Ok(()) => self.draw_count += 1,
            Err(e) => warn!(error = %e, sequence = frame.sequence(), "Draw aborted"),
        }
        result
    }

    fn draw_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: DrawTarget<'_>,
        matrix: &TransformMatrix,
        frame: &Frame,
    ) -> PipelineResult<()> {
        let Self {
            program,
            textures,
            bind_group,
            crop,
            uploaded_crop,
            ..
        } = self;
        let program = program.as_ref().ok_or(PipelineError::Failed)?;

        let (luma, chroma) = frame.planes();
        let (width, height) = frame.dimensions();

        // Both planes are validated before anything is uploaded
        for plane in Plane::ALL {
            if textures.ensure_on(device, plane, width, height)? {
                *bind_group = None;
            }
        }

        let upload_start = Instant::now();
        checked(device, "luma upload", || textures.upload(queue, Plane::Luma, luma))??;
        checked(device, "chroma upload", || textures.upload(queue, Plane::Chroma, chroma))??;
        let upload_time = upload_start.elapsed();
        if upload_time > timing::SLOW_UPLOAD {
            warn!(
                upload_ms = upload_time.as_millis(),
                "GPU upload took longer than frame period - causing stutter"
            );
        }

        let uniform = TransformUniform {
            mvp: matrix.to_cols_array_2d(),
            tex_matrix: TransformMatrix::IDENTITY.to_cols_array_2d(),
        };
        queue.write_buffer(&program.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        if *uploaded_crop != Some(*crop) {
            queue.write_buffer(
                &program.tex_coord_buffer,
                0,
                bytemuck::cast_slice(&crop.tex_coords()),
            );
            *uploaded_crop = Some(*crop);
            debug!(clip_width = crop.is_clip_width, clip_ratio = crop.clip_ratio, "Texture coordinates updated");
        }

        if bind_group.is_none() {
            let (Some(luma_tex), Some(chroma_tex)) =
                (textures.handle(Plane::Luma), textures.handle(Plane::Chroma))
            else {
                return Err(PipelineError::Gpu {
                    label: "bind group".to_string(),
                    message: "plane textures missing".to_string(),
                });
            };
            let created = checked(device, "bind group", || {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("camera-preview NV21 bind group"),
                    layout: &program.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&luma_tex.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&chroma_tex.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&program.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: program.uniform_buffer.as_entire_binding(),
                        },
                    ],
                })
            })?;
            *bind_group = Some(created);
        }
        let Some(bind_group) = bind_group.as_ref() else {
            return Err(PipelineError::Failed);
        };

        checked(device, "draw", || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("camera-preview draw encoder"),
            });

            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("camera-preview render pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: match target.clear {
                                Some(color) => wgpu::LoadOp::Clear(color),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                render_pass.set_viewport(
                    0.0,
                    0.0,
                    target.width as f32,
                    target.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_pipeline(&program.render_pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.set_vertex_buffer(0, program.position_buffer.slice(..));
                render_pass.set_vertex_buffer(1, program.tex_coord_buffer.slice(..));
                render_pass.draw(0..4, 0..1);
            }

            queue.submit(std::iter::once(encoder.finish()));
        })
    }
}

fn plane_layout_entry(plane: Plane) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: plane.index() as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Clear the target without drawing a frame
pub fn clear_target(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    view: &wgpu::TextureView,
    color: wgpu::Color,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("camera-preview clear encoder"),
    });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("camera-preview clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    queue.submit(std::iter::once(encoder.finish()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::create_headless_device;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    #[test]
    fn test_preview_shader_validates() {
        validate_shader("nv21_preview", PREVIEW_SHADER);
    }

    #[test]
    fn test_shader_coefficients() {
        for coefficient in ["1.13983", "0.39465", "0.58060", "2.03211"] {
            assert!(PREVIEW_SHADER.contains(coefficient), "missing {}", coefficient);
        }
        // V is the first chroma channel, U the second
        assert!(PREVIEW_SHADER.contains("let u = chroma.g - 0.5;"));
        assert!(PREVIEW_SHADER.contains("let v = chroma.r - 0.5;"));
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<TransformUniform>(), 128);
    }

    #[test]
    fn test_new_pipeline_is_uninitialized() {
        let pipeline = ColorConvertPipeline::new(wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(pipeline.state(), PipelineState::Uninitialized);
        assert_eq!(pipeline.textures().creation_count(), 0);
    }

    #[tokio::test]
    async fn test_broken_shader_fails_permanently() {
        let Ok(gpu) = create_headless_device("test_broken_shader").await else {
            println!("Skipping test (no GPU)");
            return;
        };

        let mut pipeline = ColorConvertPipeline::with_shader_source(
            wgpu::TextureFormat::Rgba8Unorm,
            "@fragment fn fs_main( -> {",
        );
        let err = pipeline.initialize(&gpu.device).unwrap_err();
        assert!(matches!(err, PipelineError::ShaderCompilation(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed);

        // No recovery
        assert!(matches!(
            pipeline.initialize(&gpu.device),
            Err(PipelineError::Failed)
        ));
    }

    #[tokio::test]
    async fn test_initialize_reaches_ready() {
        let Ok(gpu) = create_headless_device("test_pipeline_ready").await else {
            println!("Skipping test (no GPU)");
            return;
        };

        let mut pipeline = ColorConvertPipeline::new(wgpu::TextureFormat::Rgba8Unorm);
        pipeline.initialize(&gpu.device).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }
}
