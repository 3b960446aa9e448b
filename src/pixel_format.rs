/// Packs RGB888 pixels into RGB565 words: 5 bits of red, 6 of green, 5 of
/// blue, red in the high bits. A trailing partial pixel is ignored.
pub fn rgb888_to_rgb565(rgb: &[u8]) -> Vec<u16> {
    rgb.chunks_exact(3)
        .map(|px| {
            let (r, g, b) = (px[0] as u16, px[1] as u16, px[2] as u16);
            ((r & 0xF8) << 8) | ((g & 0xFC) << 3) | (b >> 3)
        })
        .collect()
}
