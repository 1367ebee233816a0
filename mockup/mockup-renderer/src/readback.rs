//! Render surface readback: copy an RGBA8 texture into a tight CPU buffer (row padding stripped).

/// Round a row up to wgpu's copy alignment (256 bytes).
pub fn align_bytes_per_row(tight: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    tight.div_ceil(align) * align
}

/// Copy `tight_bpr` bytes out of every `padded_bpr`-sized row.
pub fn strip_row_padding(padded: &[u8], tight_bpr: usize, padded_bpr: usize, rows: usize) -> Result<Vec<u8>, String> {
    if padded_bpr < tight_bpr {
        return Err(format!("padded row {} shorter than tight row {}", padded_bpr, tight_bpr));
    }
    if padded.len() < padded_bpr * rows {
        return Err(format!("readback buffer is {} bytes, need {}", padded.len(), padded_bpr * rows));
    }
    let mut tight = Vec::with_capacity(tight_bpr * rows);
    for row in padded.chunks(padded_bpr).take(rows) {
        tight.extend_from_slice(&row[..tight_bpr]);
    }
    Ok(tight)
}

/// Blocking read of a single-sample RGBA8 texture.
pub fn read_texture_tight(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Texture,
) -> Result<Vec<u8>, String> {
    let width = src.width();
    let height = src.height();
    if width == 0 || height == 0 {
        return Err("readback size must be positive".to_string());
    }
    if src.sample_count() != 1 {
        return Err(format!("readback requires a single-sample texture, got {}", src.sample_count()));
    }
    match src.format() {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {}
        other => return Err(format!("readback only supports RGBA8 formats, got {:?}", other)),
    }

    let tight_bpr = 4 * width as usize;
    let padded_bpr = align_bytes_per_row(tight_bpr);
    let bytes_per_row = u32::try_from(padded_bpr).map_err(|_| "padded bytes per row exceeds u32::MAX".to_string())?;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("surface_readback_staging"),
        size: (padded_bpr * height as usize) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("surface_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: src,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|_| "map_async callback dropped".to_string())?
        .map_err(|e| format!("map_async failed: {}", e))?;

    let data = slice.get_mapped_range();
    let tight = strip_row_padding(&data, tight_bpr, padded_bpr, height as usize);
    drop(data);
    staging.unmap();
    tight
}
