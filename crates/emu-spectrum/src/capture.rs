//! Headless capture: PNG screenshots and WAV audio dumps.

use std::error::Error;
use std::fs;
use std::path::Path;

use emu_core::Z80Cpu;

use crate::{FrameStatus, Spectrum};

/// Save the current framebuffer as a PNG file.
///
/// Pixels are packed `0xAABBGGRR`, so their little-endian bytes are already
/// RGBA.
pub fn save_screenshot<C: Z80Cpu>(spectrum: &Spectrum<C>, path: &Path) -> Result<(), Box<dyn Error>> {
    let width = spectrum.framebuffer_width();
    let height = spectrum.framebuffer_height();

    let file = fs::File::create(path)?;
    let w = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let rgba: Vec<u8> = spectrum
        .framebuffer()
        .iter()
        .flat_map(|pixel| pixel.to_le_bytes())
        .collect();
    writer.write_image_data(&rgba)?;
    Ok(())
}

/// Save interleaved stereo samples as a 16-bit PCM WAV file.
pub fn save_audio(samples: &[i16], sample_rate: u32, path: &Path) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Run `num_frames` frames, dumping each as a numbered PNG and the sound
/// as one WAV.
///
/// Creates `dir/frames/000001.png`, `dir/frames/000002.png`, ... and
/// `dir/audio.wav`. Stops early at a breakpoint or when paused.
pub fn record<C: Z80Cpu>(
    spectrum: &mut Spectrum<C>,
    dir: &Path,
    num_frames: u32,
) -> Result<u32, Box<dyn Error>> {
    let frames_dir = dir.join("frames");
    fs::create_dir_all(&frames_dir)?;

    let mut all_audio = Vec::new();
    let mut captured = 0;

    for i in 1..=num_frames {
        if spectrum.generate_frame() != FrameStatus::Complete {
            break;
        }
        save_screenshot(spectrum, &frames_dir.join(format!("{i:06}.png")))?;
        if let Some(audio) = spectrum.audio_frame() {
            all_audio.extend_from_slice(audio);
        }
        captured = i;
    }

    let sample_rate = spectrum.bus().audio.sample_rate();
    save_audio(&all_audio, sample_rate, &dir.join("audio.wav"))?;
    tracing::info!("captured {captured} frames to {}", dir.display());
    Ok(captured)
}
