//! One zstd frame holds a contiguous run of framed records. Frames are
//! self-delimiting, so both sequential scanning and indexed seeks decode one
//! frame at a time from its starting byte.

use zstd::stream::raw::{Decoder as RawDecoder, InBuffer, Operation, OutBuffer};

use crate::error::SavError;

const OUTPUT_CHUNK: usize = 64 * 1024;

/// Decodes the single zstd frame starting at `bytes[0]`. Returns the
/// decompressed payload and the number of input bytes the frame occupied,
/// so a sequential reader can advance straight to the next frame.
pub fn decode_one_frame(bytes: &[u8]) -> Result<(Vec<u8>, usize), SavError> {
    let mut decoder = RawDecoder::new().map_err(|e| SavError::CorruptHeader(format!("zstd init failed: {e}")))?;
    let mut input = InBuffer::around(bytes);
    let mut decompressed = Vec::new();
    let mut scratch = vec![0u8; OUTPUT_CHUNK];

    loop {
        let mut output = OutBuffer::around(&mut scratch);
        let hint = decoder.run(&mut input, &mut output).map_err(|e| SavError::CorruptHeader(format!("zstd decode failed: {e}")))?;
        decompressed.extend_from_slice(output.as_slice());
        if hint == 0 {
            break;
        }
        if input.pos() == bytes.len() {
            return Err(SavError::TruncatedRecord);
        }
    }
    Ok((decompressed, input.pos()))
}

/// Compresses one frame's worth of framed record bytes into a standalone
/// zstd frame.
pub fn encode_frame(bytes: &[u8], level: i32) -> Result<Vec<u8>, SavError> {
    zstd::stream::encode_all(bytes, level).map_err(SavError::Io)
}
