//! Bit-interleaving helpers shared by the modulator and demodulator.

/// Distribute a bit string round-robin across `num_channels` streams by
/// position `i -> i mod num_channels`, right-padding shorter streams with 0
/// to the length of the longest (spec.md §4.3 step 1).
pub fn interleave(bits: &[u8], num_channels: usize) -> Vec<Vec<u8>> {
    let per_channel = (bits.len() + num_channels - 1) / num_channels.max(1);
    let mut streams = vec![Vec::with_capacity(per_channel); num_channels];
    for (i, &bit) in bits.iter().enumerate() {
        streams[i % num_channels].push(bit);
    }
    for stream in streams.iter_mut() {
        while stream.len() < per_channel {
            stream.push(0);
        }
    }
    streams
}

/// Inverse of [`interleave`]: concatenate channel streams in ascending
/// channel order, one bit per channel per round, for `total_bits` output
/// bits (spec.md §4.4 "Re-interleaving").
pub fn deinterleave(streams: &[Vec<u8>], total_bits: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_bits);
    let rounds = streams.iter().map(|s| s.len()).max().unwrap_or(0);
    'outer: for round in 0..rounds {
        for stream in streams {
            if let Some(&bit) = stream.get(round) {
                out.push(bit);
                if out.len() == total_bits {
                    break 'outer;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_distributes_round_robin() {
        let bits = vec![1, 0, 1, 1, 0, 1, 1, 1];
        let streams = interleave(&bits, 4);
        assert_eq!(streams.len(), 4);
        assert_eq!(streams[0], vec![1, 0]);
        assert_eq!(streams[1], vec![0, 1]);
        assert_eq!(streams[2], vec![1, 1]);
        assert_eq!(streams[3], vec![1, 1]);
    }

    #[test]
    fn interleave_pads_short_streams_with_zero() {
        let bits = vec![1, 0, 1];
        let streams = interleave(&bits, 4);
        assert_eq!(streams[0], vec![1]);
        assert_eq!(streams[3], vec![0]);
    }

    #[test]
    fn interleave_then_deinterleave_recovers_input() {
        let bits = vec![1, 0, 1, 1, 0, 1, 1, 1, 0, 0];
        let streams = interleave(&bits, 4);
        let recovered = deinterleave(&streams, bits.len());
        assert_eq!(recovered, bits);
    }
}
