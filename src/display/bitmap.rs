use super::{DisplayBuffer, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use byteorder::{ByteOrder, LittleEndian};

const FILE_HEADER_SIZE: u32 = 14;
const INFO_HEADER_SIZE: u32 = 40;
const PALETTE_SIZE: u32 = 8;
const PIXEL_DATA_OFFSET: u32 = FILE_HEADER_SIZE + INFO_HEADER_SIZE + PALETTE_SIZE;

/// Bytes per stored row: one bit per pixel, padded to a 4 byte boundary.
const ROW_STRIDE: usize = ((DISPLAY_WIDTH as usize + 31) / 32) * 4;

const IMAGE_SIZE: usize = ROW_STRIDE * DISPLAY_HEIGHT as usize;

/// Size of the exported bitmap file in bytes.
pub const BITMAP_FILE_SIZE: usize = PIXEL_DATA_OFFSET as usize + IMAGE_SIZE;

/// Encodes the raster as a two color BMP: palette index 0 black, 1 white,
/// lit pixels stored as 1, rows bottom-up, most significant bit leftmost.
pub(super) fn encode(buffer: &DisplayBuffer) -> Vec<u8> {
    let mut bmp = Vec::with_capacity(BITMAP_FILE_SIZE);
    bmp.extend_from_slice(&headers());

    for y in (0..DISPLAY_HEIGHT).rev() {
        let mut row = [0u8; ROW_STRIDE];
        for x in 0..DISPLAY_WIDTH {
            if buffer.get_pixel(x, y) {
                row[x as usize / 8] |= 0x80 >> (x % 8);
            }
        }
        bmp.extend_from_slice(&row);
    }
    bmp
}

/// File header, info header and palette.
fn headers() -> [u8; PIXEL_DATA_OFFSET as usize] {
    let mut header = [0u8; PIXEL_DATA_OFFSET as usize];
    header[0..2].copy_from_slice(b"BM");
    LittleEndian::write_u32(&mut header[2..6], BITMAP_FILE_SIZE as u32);
    LittleEndian::write_u32(&mut header[10..14], PIXEL_DATA_OFFSET);

    LittleEndian::write_u32(&mut header[14..18], INFO_HEADER_SIZE);
    LittleEndian::write_i32(&mut header[18..22], DISPLAY_WIDTH);
    LittleEndian::write_i32(&mut header[22..26], DISPLAY_HEIGHT);
    LittleEndian::write_u16(&mut header[26..28], 1); // planes
    LittleEndian::write_u16(&mut header[28..30], 1); // bits per pixel
    LittleEndian::write_u32(&mut header[34..38], IMAGE_SIZE as u32);
    LittleEndian::write_u32(&mut header[46..50], 2); // colors used

    // palette: black, then white
    header[58..61].copy_from_slice(&[0xFF, 0xFF, 0xFF]);
    header
}
