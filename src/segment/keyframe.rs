//! Just enough H.264 Annex-B parsing to find where a segment may start.

const NAL_SLICE: u8 = 1;
const NAL_IDR: u8 = 5;
const NAL_SPS: u8 = 7;

/// NAL unit types of an Annex-B byte stream, in stream order
fn nal_types(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos + 3 < data.len() {
            if data[pos] == 0 && data[pos + 1] == 0 && data[pos + 2] == 1 {
                let header = data[pos + 3];
                pos += 4;
                return Some(header & 0x1f);
            }
            pos += 1;
        }
        None
    })
}

/// True when the access unit in `chunk` carries an IDR picture or the
/// parameter sets that precede one, so a decoder can start with it.
pub fn starts_with_keyframe(chunk: &[u8]) -> bool {
    for nal in nal_types(chunk) {
        match nal {
            NAL_IDR | NAL_SPS => return true,
            NAL_SLICE => return false,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idr_access_unit_with_parameter_sets() {
        // AUD, SPS, PPS, IDR slice
        let chunk = [
            0, 0, 0, 1, 0x09, 0xf0, 0, 0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x68, 0xce, 0, 0, 1, 0x65,
            0x88,
        ];
        assert!(starts_with_keyframe(&chunk));
    }

    #[test]
    fn test_bare_idr_slice() {
        assert!(starts_with_keyframe(&[0, 0, 1, 0x65, 0x88, 0x84]));
    }

    #[test]
    fn test_predicted_slice_is_not_a_keyframe() {
        // AUD then a non-IDR slice
        let chunk = [0, 0, 0, 1, 0x09, 0x30, 0, 0, 0, 1, 0x41, 0x9a, 0x21];
        assert!(!starts_with_keyframe(&chunk));

        // An IDR after the first slice does not make the unit decodable from its start
        let mixed = [0, 0, 1, 0x41, 0x9a, 0, 0, 1, 0x65, 0x88];
        assert!(!starts_with_keyframe(&mixed));
    }

    #[test]
    fn test_no_start_code() {
        assert!(!starts_with_keyframe(&[]));
        assert!(!starts_with_keyframe(&[0, 0, 1]));
        assert!(!starts_with_keyframe(&[0x65; 32]));
    }
}
