/// Expand bytes into bits, most significant bit first.
pub fn to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            bits.push((byte >> bit_pos) & 1 == 1);
        }
    }
    bits
}

/// Pack bits (MSB first) back into bytes. A trailing partial byte is dropped.
pub fn from_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|octet| {
            octet
                .iter()
                .fold(0u8, |byte, &bit| (byte << 1) | u8::from(bit))
        })
        .collect()
}
