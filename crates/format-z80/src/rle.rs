//! The .Z80 run-length scheme.
//!
//! `ED ED n v` expands to `n` copies of `v`; every other byte is literal.
//! The encoder turns runs of five or more identical bytes, and runs of two
//! or more `ED`s, into blocks. A single `ED` is never followed by a block,
//! so the byte after it is always written literally.

use crate::Z80Error;

const MARKER: u8 = 0xED;

/// Shortest run of an ordinary byte worth encoding.
const MIN_RUN: usize = 5;

/// Compress `data`.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let run = data[i..]
            .iter()
            .take(255)
            .take_while(|&&b| b == byte)
            .count();

        if run >= MIN_RUN || (byte == MARKER && run >= 2) {
            out.extend_from_slice(&[MARKER, MARKER, run as u8, byte]);
            i += run;
        } else {
            out.push(byte);
            i += 1;
            if byte == MARKER && i < data.len() {
                out.push(data[i]);
                i += 1;
            }
        }
    }
    out
}

/// Expand `src` until `dst` is full and return how many input bytes were
/// consumed.
///
/// A run that would pass the end of `dst` is cut at the boundary. Running
/// out of input before `dst` is full is an error.
pub fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, Z80Error> {
    let mut si = 0;
    let mut di = 0;
    while di < dst.len() {
        let Some(&byte) = src.get(si) else {
            return Err(Z80Error::TruncatedRun);
        };
        if byte == MARKER && src.get(si + 1) == Some(&MARKER) {
            let (Some(&count), Some(&value)) = (src.get(si + 2), src.get(si + 3)) else {
                return Err(Z80Error::TruncatedRun);
            };
            let end = (di + count as usize).min(dst.len());
            dst[di..end].fill(value);
            di = end;
            si += 4;
        } else {
            dst[di] = byte;
            di += 1;
            si += 1;
        }
    }
    Ok(si)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expand(src: &[u8], len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        decompress(src, &mut out).expect("complete stream");
        out
    }

    #[test]
    fn block_then_literals() {
        let src = [0xED, 0xED, 0x05, 0x7F, 0x01, 0x02];
        assert_eq!(expand(&src, 7), [0x7F, 0x7F, 0x7F, 0x7F, 0x7F, 0x01, 0x02]);
    }

    #[test]
    fn run_is_cut_at_the_page_boundary() {
        let src = [0x01, 0xED, 0xED, 0xFF, 0xAA];
        let mut page = [0u8; 4];
        assert_eq!(decompress(&src, &mut page), Ok(5));
        assert_eq!(page, [0x01, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn short_input_is_an_error() {
        let mut page = [0u8; 4];
        assert_eq!(decompress(&[1, 2], &mut page), Err(Z80Error::TruncatedRun));
        assert_eq!(
            decompress(&[0xED, 0xED, 0x04], &mut page),
            Err(Z80Error::TruncatedRun)
        );
    }

    #[test]
    fn short_runs_stay_literal() {
        assert_eq!(compress(&[7, 7, 7, 7]), [7, 7, 7, 7]);
        assert_eq!(compress(&[7; 5]), [0xED, 0xED, 5, 7]);
    }

    #[test]
    fn two_eds_become_a_block() {
        assert_eq!(compress(&[0xED, 0xED]), [0xED, 0xED, 2, 0xED]);
    }

    #[test]
    fn byte_after_a_lone_ed_is_literal() {
        assert_eq!(
            compress(&[0xED, 0, 0, 0, 0, 0, 0]),
            [0xED, 0, 0xED, 0xED, 5, 0]
        );
    }

    #[test]
    fn long_runs_split_at_255() {
        let packed = compress(&[9; 300]);
        assert_eq!(packed, [0xED, 0xED, 255, 9, 0xED, 0xED, 45, 9]);
    }

    proptest! {
        #[test]
        fn decompress_inverts_compress(
            page in proptest::collection::vec(
                prop_oneof![Just(0u8), Just(0xEDu8), any::<u8>()],
                0..2048,
            )
        ) {
            let packed = compress(&page);
            let mut out = vec![0u8; page.len()];
            let used = decompress(&packed, &mut out).expect("complete stream");
            prop_assert_eq!(used, packed.len());
            prop_assert_eq!(out, page);
        }
    }
}
