//! Plantower PMS7003 frame decoding.
//!
//! The sensor streams fixed 32-byte frames at 9600 baud in active mode:
//!
//! ```text
//! 0    1    2..3   4..27              28..29    30..31
//! 0x42 0x4D len=28 12 × u16 (BE data) reserved  checksum (BE, Σ bytes 0..=29)
//! ```
//!
//! [`decode_frame`] validates a single frame. [`FrameAssembler`] turns an
//! arbitrary byte stream into frames, resynchronizing on the preamble.

use thiserror::Error;

pub const FRAME_LEN: usize = 32;
pub const PREAMBLE: [u8; 2] = [0x42, 0x4D];
/// Value of the embedded length field: 13 data words + checksum.
pub const FRAME_DATA_LEN: u16 = 28;

const CHECKSUM_OFFSET: usize = 30;

/// One validated PMS7003 measurement.
///
/// `sp` = standard particle (CF=1), `ae` = atmospheric environment, both in
/// µg/m³. `np_*` are particle counts per 0.1 L of air above the given size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticulateReading {
    pub pm1_0_sp: u16,
    pub pm2_5_sp: u16,
    pub pm10_sp: u16,
    pub pm1_0_ae: u16,
    pub pm2_5_ae: u16,
    pub pm10_ae: u16,
    pub np_0_3: u16,
    pub np_0_5: u16,
    pub np_1_0: u16,
    pub np_2_5: u16,
    pub np_5_0: u16,
    pub np_10: u16,
}

impl ParticulateReading {
    /// Data words in wire order.
    pub fn to_words(&self) -> [u16; 12] {
        [
            self.pm1_0_sp,
            self.pm2_5_sp,
            self.pm10_sp,
            self.pm1_0_ae,
            self.pm2_5_ae,
            self.pm10_ae,
            self.np_0_3,
            self.np_0_5,
            self.np_1_0,
            self.np_2_5,
            self.np_5_0,
            self.np_10,
        ]
    }

    fn from_words(w: [u16; 12]) -> Self {
        Self {
            pm1_0_sp: w[0],
            pm2_5_sp: w[1],
            pm10_sp: w[2],
            pm1_0_ae: w[3],
            pm2_5_ae: w[4],
            pm10_ae: w[5],
            np_0_3: w[6],
            np_0_5: w[7],
            np_1_0: w[8],
            np_2_5: w[9],
            np_5_0: w[10],
            np_10: w[11],
        }
    }

    /// Encode as the sensor would send it (reserved word zero).
    pub fn to_frame(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[..2].copy_from_slice(&PREAMBLE);
        frame[2..4].copy_from_slice(&FRAME_DATA_LEN.to_be_bytes());
        for (i, word) in self.to_words().iter().enumerate() {
            let at = 4 + i * 2;
            frame[at..at + 2].copy_from_slice(&word.to_be_bytes());
        }
        let checksum = checksum(&frame[..CHECKSUM_OFFSET]);
        frame[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_be_bytes());
        frame
    }
}

/// Why a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected {FRAME_LEN} bytes, got {len}")]
    WrongLength { len: usize },
    #[error("bad start characters {0:#04x} {1:#04x}")]
    BadMagic(u8, u8),
    #[error("frame length field is {declared}, expected {FRAME_DATA_LEN}")]
    BadFrameLength { declared: u16 },
    #[error("checksum mismatch: calculated {computed}, frame carries {received}")]
    ChecksumMismatch { computed: u16, received: u16 },
}

fn be_word(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Validate one frame and extract its measurement.
///
/// Decoding is all-or-nothing: a frame that fails any check yields no
/// reading at all.
pub fn decode_frame(data: &[u8]) -> Result<ParticulateReading, FrameError> {
    if data.len() != FRAME_LEN {
        return Err(FrameError::WrongLength { len: data.len() });
    }
    if data[..2] != PREAMBLE {
        return Err(FrameError::BadMagic(data[0], data[1]));
    }

    let declared = be_word(data, 2);
    if declared != FRAME_DATA_LEN {
        return Err(FrameError::BadFrameLength { declared });
    }

    let computed = checksum(&data[..CHECKSUM_OFFSET]);
    let received = be_word(data, CHECKSUM_OFFSET);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    let mut words = [0u16; 12];
    for (i, word) in words.iter_mut().enumerate() {
        *word = be_word(data, 4 + i * 2);
    }
    // Bytes 28..30 are the reserved word; nothing downstream uses it.
    let reserved = be_word(data, 28);
    if reserved != 0 {
        log::trace!("PMS7003 reserved word = {:#06x}", reserved);
    }

    Ok(ParticulateReading::from_words(words))
}

// ---------------------------------------------------------------------------
// Stream reassembly
// ---------------------------------------------------------------------------

/// Assembler phase, reported for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Nothing buffered.
    Idle,
    /// A partial frame (or a lone preamble byte) is buffered.
    Accumulating,
}

/// Reassembles PMS7003 frames from a byte stream.
///
/// The UART delivers whatever happens to be in its ring buffer, so a poll
/// may hold half a frame, several frames, or line noise. Bytes before a
/// preamble are dropped; a complete 32-byte candidate is decoded and, if
/// rejected, scanning resumes one byte after its preamble so a valid frame
/// hiding inside it is still found.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: [u8; FRAME_LEN],
    len: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_LEN],
            len: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        if self.len == 0 {
            AssemblerState::Idle
        } else {
            AssemblerState::Accumulating
        }
    }

    /// Feed received bytes; `on_frame` is called once per complete frame
    /// candidate with its decode result.
    pub fn push<F>(&mut self, bytes: &[u8], mut on_frame: F)
    where
        F: FnMut(Result<ParticulateReading, FrameError>),
    {
        for &byte in bytes {
            self.push_byte(byte, &mut on_frame);
        }
    }

    fn push_byte<F>(&mut self, byte: u8, on_frame: &mut F)
    where
        F: FnMut(Result<ParticulateReading, FrameError>),
    {
        match self.len {
            0 if byte != PREAMBLE[0] => return,
            1 if byte != PREAMBLE[1] => {
                // `0x42 0x42 0x4D` must still sync on the second 0x42.
                self.len = usize::from(byte == PREAMBLE[0]);
                return;
            }
            _ => {}
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < FRAME_LEN {
            return;
        }

        let frame = self.buf;
        self.len = 0;
        match decode_frame(&frame) {
            Ok(reading) => on_frame(Ok(reading)),
            Err(e) => {
                on_frame(Err(e));
                // Rescan everything after the rejected preamble.
                for &b in &frame[1..] {
                    self.push_byte(b, on_frame);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> ParticulateReading {
        ParticulateReading {
            pm1_0_sp: 5,
            pm2_5_sp: 8,
            pm10_sp: 9,
            pm1_0_ae: 5,
            pm2_5_ae: 8,
            pm10_ae: 9,
            np_0_3: 1032,
            np_0_5: 298,
            np_1_0: 52,
            np_2_5: 4,
            np_5_0: 1,
            np_10: 0,
        }
    }

    #[test]
    fn decodes_captured_frame() {
        #[rustfmt::skip]
        let frame = [
            0x42, 0x4d, 0x00, 0x1c,
            0x00, 0x05, 0x00, 0x08, 0x00, 0x09,
            0x00, 0x05, 0x00, 0x08, 0x00, 0x09,
            0x04, 0x08, 0x01, 0x2a, 0x00, 0x34,
            0x00, 0x04, 0x00, 0x01, 0x00, 0x00,
            0x97, 0x00,
            0x01, 0xde,
        ];
        let reading = decode_frame(&frame).unwrap();
        assert_eq!(reading, sample());
    }

    #[test]
    fn rejects_wrong_length() {
        let frame = sample().to_frame();
        assert_eq!(
            decode_frame(&frame[..31]),
            Err(FrameError::WrongLength { len: 31 })
        );
        assert_eq!(decode_frame(&[]), Err(FrameError::WrongLength { len: 0 }));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut frame = sample().to_frame();
        frame[1] = 0x4e;
        assert_eq!(decode_frame(&frame), Err(FrameError::BadMagic(0x42, 0x4e)));
    }

    #[test]
    fn rejects_bad_frame_length() {
        let mut frame = sample().to_frame();
        frame[3] = 0x1d;
        assert_eq!(
            decode_frame(&frame),
            Err(FrameError::BadFrameLength { declared: 29 })
        );
    }

    #[test]
    fn rejects_checksum_off_by_one() {
        let mut frame = sample().to_frame();
        let recorded = u16::from_be_bytes([frame[30], frame[31]]);
        frame[30..].copy_from_slice(&(recorded + 1).to_be_bytes());
        assert_eq!(
            decode_frame(&frame),
            Err(FrameError::ChecksumMismatch {
                computed: recorded,
                received: recorded + 1,
            })
        );
    }

    #[test]
    fn assembler_skips_garbage_and_splits() {
        let frame = sample().to_frame();
        let mut stream = vec![0x00, 0x4d, 0x42, 0x13];
        stream.extend_from_slice(&frame);
        stream.extend_from_slice(&frame);

        let mut asm = FrameAssembler::new();
        let mut got = Vec::new();
        for chunk in stream.chunks(7) {
            asm.push(chunk, |r| got.push(r));
        }
        assert_eq!(got, vec![Ok(sample()), Ok(sample())]);
        assert_eq!(asm.state(), AssemblerState::Idle);
    }

    #[test]
    fn assembler_recovers_after_truncated_frame() {
        let frame = sample().to_frame();
        // A frame cut short by a reset, immediately followed by a good one.
        let mut stream = frame[..20].to_vec();
        stream.extend_from_slice(&frame);

        let mut asm = FrameAssembler::new();
        let mut good = 0;
        let mut bad = 0;
        asm.push(&stream, |r| match r {
            Ok(reading) => {
                assert_eq!(reading, sample());
                good += 1;
            }
            Err(_) => bad += 1,
        });
        assert_eq!(good, 1);
        assert_eq!(bad, 1);
    }

    #[test]
    fn assembler_handles_doubled_start_byte() {
        let frame = sample().to_frame();
        let mut stream = vec![0x42];
        stream.extend_from_slice(&frame);

        let mut asm = FrameAssembler::new();
        let mut got = Vec::new();
        asm.push(&stream, |r| got.push(r));
        assert_eq!(got, vec![Ok(sample())]);
    }

    fn any_reading() -> impl Strategy<Value = ParticulateReading> {
        prop::array::uniform12(any::<u16>()).prop_map(ParticulateReading::from_words)
    }

    proptest! {
        #[test]
        fn valid_frames_decode_to_encoded_words(words in prop::array::uniform12(any::<u16>())) {
            let mut frame = [0u8; FRAME_LEN];
            frame[..2].copy_from_slice(&PREAMBLE);
            frame[2..4].copy_from_slice(&28u16.to_be_bytes());
            for (i, w) in words.iter().enumerate() {
                frame[4 + 2 * i..6 + 2 * i].copy_from_slice(&w.to_be_bytes());
            }
            let sum = frame[..30].iter().fold(0u16, |s, &b| s.wrapping_add(b as u16));
            frame[30..].copy_from_slice(&sum.to_be_bytes());

            let reading = decode_frame(&frame).unwrap();
            prop_assert_eq!(reading.to_words(), words);
        }

        #[test]
        fn any_chunking_yields_every_frame(
            readings in prop::collection::vec(any_reading(), 1..5),
            chunk in 1usize..40,
        ) {
            let stream: Vec<u8> = readings.iter().flat_map(|r| r.to_frame()).collect();
            let mut asm = FrameAssembler::new();
            let mut got = Vec::new();
            for part in stream.chunks(chunk) {
                asm.push(part, |r| got.push(r));
            }
            let decoded: Vec<_> = got.into_iter().filter_map(Result::ok).collect();
            prop_assert_eq!(decoded, readings);
        }
    }
}
