//! Drawing, image, font and keyboard requests over the wire

mod common;

use common::*;
use x11core::server::ServerConfig;

const GC_FOREGROUND: u32 = 1 << 2;

struct Canvas {
    client: TestClient,
    pixmap: u32,
    gc: u32,
}

/// A 4x4 depth-24 pixmap and a GC drawing red on it
fn canvas() -> Canvas {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let pixmap = client.id_base() + 1;
    let gc = client.id_base() + 2;

    let mut create = u32s(&[pixmap, ROOT]);
    create.extend_from_slice(&[4, 0, 4, 0]);
    client.send(53, 24, &create);
    client.send(55, 0, &u32s(&[gc, pixmap, GC_FOREGROUND, 0xFF0000]));
    let (reply, _) = client.sync();
    assert_eq!(reply[0], 1, "pixmap and GC created");
    Canvas { client, pixmap, gc }
}

fn shorts(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl Canvas {
    /// ZPixmap of the whole pixmap, one u32 per pixel
    fn pixels(&mut self) -> Vec<u32> {
        let mut body = u32s(&[self.pixmap]);
        body.extend_from_slice(&shorts(&[0, 0, 4, 4]));
        body.extend_from_slice(&u32s(&[u32::MAX]));
        self.client.send(73, 2, &body);
        let (reply, _) = self.client.read_response();
        assert_eq!(reply[0], 1, "GetImage failed: error {}", reply[1]);
        assert_eq!(reply[1], 24, "depth");
        assert_eq!(u32_at(&reply, 4), 16, "reply length in words");
        (0..16).map(|i| u32_at(&reply, 32 + i * 4)).collect()
    }

    fn request(&mut self, opcode: u8, data: u8, geometry: &[u8]) {
        let mut body = u32s(&[self.pixmap, self.gc]);
        body.extend_from_slice(geometry);
        self.client.send(opcode, data, &body);
    }

    /// Error code of the last request, or None if it succeeded
    fn error(&mut self) -> Option<u8> {
        let (reply, _) = self.client.sync();
        if reply[0] == 0 {
            let code = reply[1];
            // Consume the sync reply queued behind the error
            self.client.read_response();
            Some(code)
        } else {
            None
        }
    }
}

fn lit(pixels: &[u32]) -> Vec<usize> {
    (0..pixels.len()).filter(|&i| pixels[i] != 0).collect()
}

#[test]
fn test_fill_rectangle_then_get_image() {
    let mut canvas = canvas();
    canvas.request(70, 0, &shorts(&[1, 1, 2, 2]));
    let pixels = canvas.pixels();
    assert_eq!(lit(&pixels), vec![5, 6, 9, 10]);
    assert_eq!(pixels[5], 0xFF0000);
}

#[test]
fn test_lines_segments_and_outlines() {
    let mut canvas = canvas();
    // Relative PolyLine along the top row
    canvas.request(65, 1, &shorts(&[0, 0, 3, 0]));
    assert_eq!(lit(&canvas.pixels()), vec![0, 1, 2, 3]);

    let mut canvas = self::canvas();
    canvas.request(66, 0, &shorts(&[0, 3, 3, 0]));
    assert_eq!(lit(&canvas.pixels()), vec![3, 6, 9, 12]);

    let mut canvas = self::canvas();
    // A 2x2 outline covers a 3x3 ring
    canvas.request(67, 0, &shorts(&[0, 0, 2, 2]));
    assert_eq!(lit(&canvas.pixels()), vec![0, 1, 2, 4, 6, 8, 9, 10]);

    let mut canvas = self::canvas();
    canvas.request(64, 0, &shorts(&[3, 3]));
    assert_eq!(lit(&canvas.pixels()), vec![15]);
}

#[test]
fn test_fill_poly_and_bad_mode() {
    let mut canvas = canvas();
    let mut geometry = vec![2, 0, 0, 0];
    geometry.extend_from_slice(&shorts(&[0, 0, 4, 0, 4, 2, 0, 2]));
    canvas.request(69, 0, &geometry);
    assert_eq!(lit(&canvas.pixels()), (0..8).collect::<Vec<_>>());

    // Coordinate mode 2 does not exist
    canvas.request(65, 2, &shorts(&[0, 0, 1, 1]));
    assert_eq!(canvas.error(), Some(2), "Value error");
}

#[test]
fn test_put_image_formats() {
    let mut canvas = canvas();
    // ZPixmap, 2x1 at (0, 3)
    let mut geometry = shorts(&[2, 1, 0, 3]);
    geometry.extend_from_slice(&[0, 24, 0, 0]);
    geometry.extend_from_slice(&u32s(&[0x0000FF, 0x00FF00]));
    canvas.request(72, 2, &geometry);
    let pixels = canvas.pixels();
    assert_eq!(pixels[12], 0x0000FF);
    assert_eq!(pixels[13], 0x00FF00);

    // Bitmap: set bits take the foreground, clear bits the background
    let mut geometry = shorts(&[2, 1, 0, 0]);
    geometry.extend_from_slice(&[0, 1, 0, 0]);
    geometry.extend_from_slice(&[0b01, 0, 0, 0]);
    canvas.request(72, 0, &geometry);
    let pixels = canvas.pixels();
    assert_eq!(pixels[0], 0xFF0000);
    assert_eq!(pixels[1], 1, "default background");

    // ZPixmap depth must match the drawable
    let mut geometry = shorts(&[1, 1, 0, 0]);
    geometry.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    canvas.request(72, 2, &geometry);
    assert_eq!(canvas.error(), Some(8), "Match error");
}

#[test]
fn test_copy_area_reports_no_expose() {
    let mut canvas = canvas();
    canvas.request(70, 0, &shorts(&[0, 0, 1, 1]));
    let mut body = u32s(&[canvas.pixmap, canvas.pixmap, canvas.gc]);
    body.extend_from_slice(&shorts(&[0, 0, 3, 3, 1, 1]));
    canvas.client.send(62, 0, &body);
    let (_, events) = canvas.client.sync();
    let no_expose = events.iter().find(|e| e[0] & 0x7F == 14).expect("NoExpose");
    assert_eq!(u32_at(no_expose, 4), canvas.pixmap);
    assert_eq!(no_expose[10], 62);
    assert_eq!(lit(&canvas.pixels()), vec![0, 15]);
}

#[test]
fn test_copy_plane_rejects_multiple_bits() {
    let mut canvas = canvas();
    let mut body = u32s(&[canvas.pixmap, canvas.pixmap, canvas.gc]);
    body.extend_from_slice(&shorts(&[0, 0, 0, 0, 1, 1]));
    body.extend_from_slice(&u32s(&[0b11]));
    canvas.client.send(63, 0, &body);
    assert_eq!(canvas.error(), Some(2), "Value error");
}

#[test]
fn test_clip_rectangles_limit_fill() {
    let mut canvas = canvas();
    let mut body = u32s(&[canvas.gc]);
    body.extend_from_slice(&shorts(&[1, 1, 0, 0, 1, 1]));
    canvas.client.send(59, 0, &body);
    canvas.request(70, 0, &shorts(&[0, 0, 4, 4]));
    assert_eq!(lit(&canvas.pixels()), vec![5]);
}

#[test]
fn test_text_requests_draw() {
    let mut canvas = canvas();
    // PolyText8 "ab" at the baseline, no font in the GC
    let mut items = shorts(&[0, 3]);
    items.extend_from_slice(&[2, 0, b'a', b'b']);
    canvas.request(74, 0, &items);
    assert_eq!(canvas.error(), None);
    assert!(!lit(&canvas.pixels()).is_empty());

    // ImageText8 paints its background box even for a blank
    let mut canvas = self::canvas();
    let mut text = shorts(&[0, 3]);
    text.push(b' ');
    canvas.request(76, 1, &text);
    assert_eq!(canvas.error(), None);
    assert_eq!(canvas.pixels()[0], 1, "background");

    // A font shift to something that is not a font
    let mut canvas = self::canvas();
    let mut items = shorts(&[0, 3]);
    items.extend_from_slice(&[255, 0, 0, 0x0B, 0xAD]);
    canvas.request(74, 0, &items);
    assert_eq!(canvas.error(), Some(7), "Font error");
}

#[test]
fn test_query_best_size() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let mut body = u32s(&[ROOT]);
    body.extend_from_slice(&[33, 0, 17, 0]);
    client.send(97, 1, &body);
    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(u16_at(&reply, 8), 33);
    assert_eq!(u16_at(&reply, 10), 17);

    client.send(97, 3, &body);
    let (error, _) = client.read_response();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 2, "Value error");
}

#[test]
fn test_list_fonts_with_info_series() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let mut body = vec![10, 0, 5, 0];
    body.extend_from_slice(b"fixed");
    client.send(50, 0, &body);

    let info = client.read_packet();
    assert_eq!(info[0], 1);
    assert_eq!(info[1], 5, "name length");
    assert_eq!(u16_at(&info, 2), 1);
    assert_eq!(&info[60..65], b"fixed");
    assert_eq!(u32_at(&info, 56), 0, "no more replies");

    let last = client.read_packet();
    assert_eq!(last[0], 1);
    assert_eq!(last[1], 0, "terminating reply");
    assert_eq!(u16_at(&last, 2), 1);
    assert_eq!(u32_at(&last, 4), 7);
}

#[test]
fn test_get_font_path() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    client.send(52, 0, &[]);
    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(u16_at(&reply, 8), 1);
    assert_eq!(reply[32] as usize, "built-ins".len());
    assert_eq!(&reply[33..42], b"built-ins");
}

#[test]
fn test_keyboard_and_modifier_mapping() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    // Keycode 38 is "a"
    client.send(101, 0, &[38, 1, 0, 0]);
    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(reply[1], 2, "keysyms per keycode");
    assert_eq!(u32_at(&reply, 4), 2);
    assert_eq!(u32_at(&reply, 32), 0x61);
    assert_eq!(u32_at(&reply, 36), 0x41);

    client.send(101, 0, &[7, 1, 0, 0]);
    let (error, _) = client.read_response();
    assert_eq!(error[0], 0);
    assert_eq!(error[1], 2, "Value error");

    client.send(119, 0, &[]);
    let (reply, _) = client.read_response();
    assert_eq!(reply[1], 2, "keycodes per modifier");
    assert_eq!(&reply[32..40], &[50, 62, 66, 0, 37, 105, 64, 108]);
}

#[test]
fn test_query_pointer_relative_to_window() {
    let (addr, _server) = start_server(ServerConfig::default());
    let mut client = TestClient::connect(addr);
    let window = client.id_base() + 1;
    client.create_window(window, ROOT, 20, 20, 0);
    client.send(38, 0, &u32s(&[window]));
    let (reply, _) = client.read_response();
    assert_eq!(reply[0], 1);
    assert_eq!(reply[1], 1, "same screen");
    assert_eq!(u32_at(&reply, 8), ROOT);
    assert_eq!(u32_at(&reply, 12), 0, "no child");
    // The window sits at (10, 10)
    assert_eq!(u16_at(&reply, 20) as i16, -10);
    assert_eq!(u16_at(&reply, 22) as i16, -10);

    client.send(38, 0, &u32s(&[0x0BAD]));
    let (error, _) = client.read_response();
    assert_eq!(error[1], 3, "Window error");
}
