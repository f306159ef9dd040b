//! Elementary-stream format descriptors.
//!
//! Every port owns one format descriptor for its whole lifetime. Clients
//! mutate the descriptor through the shared [`FormatRef`] handle and then
//! commit it with `Port::format_commit`. The handle the port was created
//! with is canonical: committing a swapped handle is rejected and the
//! canonical one restored.

use crate::fourcc::FourCc;
use parking_lot::Mutex;
use std::sync::Arc;

/// A rational number, used for frame rates and pixel aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rational {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Rational {
    /// Create a new rational.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }
}

/// The kind of elementary stream carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum EsType {
    /// Not yet determined.
    #[default]
    Unknown,
    /// Control data.
    Control,
    /// Audio samples.
    Audio,
    /// Video frames.
    Video,
    /// Subpicture overlays (subtitles).
    Subpicture,
}

/// Video-specific format fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate.
    pub frame_rate: Rational,
    /// Pixel aspect ratio.
    pub par: Rational,
}

/// Audio-specific format fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u32,
}

/// Subpicture-specific format fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubpictureFormat {
    /// Horizontal offset of the overlay.
    pub x_offset: u32,
    /// Vertical offset of the overlay.
    pub y_offset: u32,
}

/// Type-specific portion of a format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum EsSpecific {
    /// No type-specific fields.
    #[default]
    None,
    /// Video fields.
    Video(VideoFormat),
    /// Audio fields.
    Audio(AudioFormat),
    /// Subpicture fields.
    Subpicture(SubpictureFormat),
}

/// An elementary-stream format descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsFormat {
    /// Kind of stream.
    pub es_type: EsType,
    /// Encoding of the stream.
    pub encoding: FourCc,
    /// Encoding variant (e.g. bitstream flavour), if any.
    pub encoding_variant: FourCc,
    /// Average bitrate in bits per second, 0 if unknown.
    pub bitrate: u32,
    /// Type-specific fields.
    pub es: EsSpecific,
    /// Codec-specific configuration data.
    pub extradata: Vec<u8>,
}

impl EsFormat {
    /// Create an empty format descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every field of this descriptor, extradata included, with a
    /// copy of `other`.
    pub fn full_copy(&mut self, other: &EsFormat) {
        *self = other.clone();
    }

    /// Wrap this descriptor in a shared handle.
    pub fn into_ref(self) -> FormatRef {
        Arc::new(Mutex::new(self))
    }
}

/// Shared handle to a format descriptor.
///
/// The handle's identity matters: a port recognises the descriptor it was
/// created with and rejects a swapped-in replacement at commit time.
pub type FormatRef = Arc<Mutex<EsFormat>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::encoding;

    #[test]
    fn test_full_copy() {
        let mut dst = EsFormat::new();
        let src = EsFormat {
            es_type: EsType::Video,
            encoding: encoding::H264,
            encoding_variant: FourCc::NONE,
            bitrate: 2_000_000,
            es: EsSpecific::Video(VideoFormat {
                width: 1920,
                height: 1080,
                frame_rate: Rational::new(30, 1),
                par: Rational::new(1, 1),
            }),
            extradata: vec![1, 2, 3],
        };

        dst.full_copy(&src);
        assert_eq!(dst, src);
        assert_eq!(dst.extradata, vec![1, 2, 3]);
    }

    #[test]
    fn test_handle_identity() {
        let a = EsFormat::new().into_ref();
        let b = EsFormat::new().into_ref();
        assert!(Arc::ptr_eq(&a, &Arc::clone(&a)));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
