/// Converts packed YUYV 4:2:2 (BT.601, limited range) into RGB8, writing
/// `width * height * 3` bytes into `rgb`.
///
/// `width` is expected to be even, as YUYV encodes pixels in pairs.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32, rgb: &mut Vec<u8>) {
    let pixel_count = width as usize * height as usize;
    rgb.clear();
    rgb.reserve(pixel_count * 3);
    for chunk in yuyv.chunks_exact(4).take(pixel_count / 2) {
        let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_gray() {
        let mut rgb = Vec::new();
        yuyv_to_rgb(&[16, 128, 235, 128], 2, 1, &mut rgb);
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn pure_red() {
        // BT.601 red: Y=81, U=90, V=240.
        let [r, g, b] = yuv_to_rgb(81, 90, 240);
        assert!(r >= 250 && g <= 5 && b <= 5, "{r} {g} {b}");
    }

    #[test]
    fn output_buffer_is_reused() {
        let mut rgb = vec![1; 100];
        yuyv_to_rgb(&[128; 8], 4, 1, &mut rgb);
        assert_eq!(rgb.len(), 12);
    }
}
