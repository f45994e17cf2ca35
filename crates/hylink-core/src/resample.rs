//! Integer-ratio rate adaptation
//!
//! Links run at different samples-per-bit. Moving a packet between rates is
//! done with plain sample repetition (stretch) and centre-sample picking
//! (decimate), which are exact inverses for hard-bit streams.
//!
//! ```text
//! stretch  [a b c], ratio 3, len 10  ->  [a a a b b b c c c 0]
//! decimate [a a a b b b c c c], ratio 3, count 3  ->  [a b c]
//! ```

/// Repeat each sample `ratio` times, then truncate or zero-pad to `len`.
pub fn stretch<T: Copy + Default>(src: &[T], ratio: usize, len: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(len);
    if ratio > 0 {
        'fill: for &s in src {
            for _ in 0..ratio {
                if out.len() == len {
                    break 'fill;
                }
                out.push(s);
            }
        }
    }
    out.resize(len, T::default());
    out
}

/// Pick the centre sample of each `ratio`-long run, `count` times.
///
/// Runs that fall outside `src` yield the default (zero) value.
pub fn decimate<T: Copy + Default>(src: &[T], ratio: usize, count: usize) -> Vec<T> {
    if ratio == 0 {
        return vec![T::default(); count];
    }
    (0..count)
        .map(|j| src.get(j * ratio + ratio / 2).copied().unwrap_or_default())
        .collect()
}

/// Re-bit a packet from `spb_in` to `spb_out` samples per bit.
///
/// The result is exactly `len` samples long.
pub fn rebit<T: Copy + Default>(src: &[T], spb_in: usize, spb_out: usize, len: usize) -> Vec<T> {
    if spb_in == spb_out {
        let mut out = src[..len.min(src.len())].to_vec();
        out.resize(len, T::default());
        return out;
    }
    let spb_in = spb_in.max(1);
    let bits = decimate(src, spb_in, src.len() / spb_in);
    stretch(&bits, spb_out.max(1), len)
}
