//! # Payload Module / 载荷模块
//!
//! Synthetic upload bodies (audio, image, PDF, text, CSV) generated in memory,
//! and magic-byte detection for the formats the export endpoints return.
//!
//! 在内存中生成的合成上传内容（音频、图像、PDF、文本、CSV），
//! 以及导出接口返回格式的魔数检测。

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;

/// The kind of file attached to an upload step.
/// 上传步骤附加的文件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// 16 kHz mono PCM WAV with a 440 Hz tone.
    Wav,
    /// A 1×1 PNG.
    Png,
    /// A one-page PDF with a line of text.
    Pdf,
    Text,
    /// A network device inventory, as accepted by the diagram generator.
    Csv,
    /// Bytes read from `path`.
    File,
}

impl PayloadKind {
    pub fn default_mime(&self) -> &'static str {
        match self {
            PayloadKind::Wav => "audio/wav",
            PayloadKind::Png => "image/png",
            PayloadKind::Pdf => "application/pdf",
            PayloadKind::Text => "text/plain",
            PayloadKind::Csv => "text/csv",
            PayloadKind::File => "application/octet-stream",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            PayloadKind::Wav => "test_audio.wav",
            PayloadKind::Png => "test_image.png",
            PayloadKind::Pdf => "test_document.pdf",
            PayloadKind::Text => "test_note.txt",
            PayloadKind::Csv => "network_devices.csv",
            PayloadKind::File => "upload.bin",
        }
    }
}

const WAV_SAMPLE_RATE: u32 = 16_000;

/// Samples that still fit a RIFF header's 32-bit chunk sizes.
const WAV_MAX_SAMPLES: u64 = (u32::MAX as u64 - 36) / 2;

/// A 16-bit mono PCM WAV of `duration_ms` milliseconds. Durations longer
/// than a RIFF file can describe are truncated to the largest valid one.
pub fn synth_wav(duration_ms: u32) -> Vec<u8> {
    let samples = (u64::from(WAV_SAMPLE_RATE) * u64::from(duration_ms) / 1000).min(WAV_MAX_SAMPLES) as u32;
    let data_len = samples * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&WAV_SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&(WAV_SAMPLE_RATE * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for n in 0..samples {
        let t = n as f32 / WAV_SAMPLE_RATE as f32;
        let sample = ((2.0 * PI * 440.0 * t).sin() * i16::MAX as f32 * 0.3) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// A valid 1×1 transparent PNG.
pub fn synth_png() -> Vec<u8> {
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
        0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
        0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
        0x42, 0x60, 0x82,
    ];
    PNG_1X1.to_vec()
}

/// A minimal single-page PDF showing `text`, with a correct xref table.
pub fn synth_pdf(text: &str) -> Vec<u8> {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)");
    let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escaped);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.into_bytes()
}

/// A small device inventory for network-diagram generation.
pub fn synth_csv() -> Vec<u8> {
    concat!(
        "device_name,device_type,ip_address,connected_to\n",
        "core-router,router,10.0.0.1,\n",
        "dist-switch-1,switch,10.0.1.1,core-router\n",
        "dist-switch-2,switch,10.0.2.1,core-router\n",
        "fw-edge,firewall,10.0.0.254,core-router\n",
        "ap-floor1,access_point,10.0.1.20,dist-switch-1\n",
    )
    .as_bytes()
    .to_vec()
}

/// Generates the bytes for a synthetic payload. `size` is a duration in
/// milliseconds for audio and a byte length for text; `text` overrides the
/// text content. `File` payloads are read elsewhere and yield `None`.
///
/// 生成合成载荷的字节。对于音频，`size` 为毫秒时长；对于文本，为字节长度；
/// `text` 覆盖文本内容。`File` 载荷在别处读取，返回 `None`。
pub fn synthesize(kind: PayloadKind, size: Option<usize>, text: Option<&str>) -> Option<Vec<u8>> {
    Some(match kind {
        PayloadKind::Wav => synth_wav(size.map_or(1_000, |ms| u32::try_from(ms).unwrap_or(u32::MAX))),
        PayloadKind::Png => synth_png(),
        PayloadKind::Pdf => synth_pdf(text.unwrap_or("API harness test document")),
        PayloadKind::Csv => match text {
            Some(text) => text.as_bytes().to_vec(),
            None => synth_csv(),
        },
        PayloadKind::Text => {
            let base = text.unwrap_or("Meeting notes: discussed the quarterly roadmap and action items.\n");
            match size {
                Some(len) => base.bytes().cycle().take(len).collect(),
                None => base.as_bytes().to_vec(),
            }
        }
        PayloadKind::File => return None,
    })
}

/// A file format an export endpoint may return, identified by magic bytes.
/// 导出接口可能返回的文件格式，通过魔数识别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Rtf,
    Txt,
    Json,
    Png,
    Wav,
    Zip,
}

impl ExportFormat {
    /// Whether `bytes` look like this format.
    ///
    /// `Docx` requires a zip container with a `word/` entry; `Txt` requires
    /// non-empty UTF-8 without NUL bytes.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        match self {
            ExportFormat::Pdf => bytes.starts_with(b"%PDF"),
            ExportFormat::Zip => bytes.starts_with(b"PK\x03\x04"),
            ExportFormat::Docx => {
                bytes.starts_with(b"PK\x03\x04") && bytes.windows(5).any(|w| w == b"word/")
            }
            ExportFormat::Rtf => bytes.starts_with(b"{\\rtf"),
            ExportFormat::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            ExportFormat::Wav => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE",
            ExportFormat::Json => serde_json::from_slice::<serde_json::Value>(bytes).is_ok(),
            ExportFormat::Txt => {
                !bytes.is_empty() && !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok()
            }
        }
    }

    /// The most specific format `bytes` match, checking binary formats first.
    pub fn detect(bytes: &[u8]) -> Option<ExportFormat> {
        [
            ExportFormat::Pdf,
            ExportFormat::Docx,
            ExportFormat::Zip,
            ExportFormat::Rtf,
            ExportFormat::Png,
            ExportFormat::Wav,
            ExportFormat::Json,
            ExportFormat::Txt,
        ]
        .into_iter()
        .find(|format| format.matches(bytes))
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Rtf => "rtf",
            ExportFormat::Txt => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Png => "png",
            ExportFormat::Wav => "wav",
            ExportFormat::Zip => "zip",
        };
        f.write_str(name)
    }
}
