use std::thread;

use anyhow::{Result, bail};
use movie_codec::{
    CodecError, ControlWordTable, EncodedScene, EncoderOptions, FrameBuffer, SceneEncoder,
    TileOp, TileType,
};

const WIDTH: usize = 32;
const HEIGHT: usize = 16;

fn base_frame() -> Vec<u8> {
    let mut pixels = Vec::with_capacity(WIDTH * HEIGHT);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            pixels.push(1 + ((x * 7 + y * 13 + (x / 4) * (y / 4)) % 15) as u8);
        }
    }
    pixels
}

fn fill_tile(
    pixels: &mut [u8],
    width: usize,
    tile_col: usize,
    tile_row: usize,
    f: impl Fn(usize, usize) -> u8,
) {
    for y in 0..4 {
        for x in 0..4 {
            pixels[(tile_row * 4 + y) * width + tile_col * 4 + x] = f(x, y);
        }
    }
}

fn checkerboard(pixels: &mut [u8], tile_col: usize, tile_row: usize, even: u8, odd: u8) {
    fill_tile(pixels, WIDTH, tile_col, tile_row, |x, y| {
        if (x + y) % 2 == 0 { even } else { odd }
    });
}

fn decode_all(scene: &EncodedScene) -> Result<Vec<Vec<u8>>> {
    let decoder = scene.decoder()?;
    let mut frame = FrameBuffer::new(scene.width, scene.height)?;
    let mut decoded = Vec::with_capacity(scene.frames.len());
    for encoded in &scene.frames {
        decoder.decode_into(&encoded.bitstream, &encoded.maskstream, &mut frame)?;
        decoded.push(frame.pixels().to_vec());
    }
    Ok(decoded)
}

#[test]
fn delta_frames_round_trip() -> Result<()> {
    let first = base_frame();

    let mut second = first.clone();
    checkerboard(&mut second, 2, 1, 5, 9);
    fill_tile(&mut second, WIDTH, 5, 3, |_, _| 200);
    fill_tile(&mut second, WIDTH, 6, 3, |_, _| 200);

    let third = second.clone();

    let mut fourth = third.clone();
    checkerboard(&mut fourth, 0, 0, 9, 5);
    fill_tile(&mut fourth, WIDTH, 7, 3, |x, y| 100 + (x + y * 4) as u8);

    let sources = [first, second, third, fourth];
    let mut encoder = SceneEncoder::new(WIDTH, HEIGHT)?;
    let mut frame_ops = Vec::new();
    for source in &sources {
        frame_ops.push(encoder.push_frame(source)?.to_vec());
    }
    assert_eq!(encoder.frame_count(), 4);

    let second_ops = &frame_ops[1];
    assert!(second_ops.iter().any(|op| matches!(op, TileOp::Repeat { .. })));
    assert!(
        second_ops
            .iter()
            .any(|op| op.key().kind == TileType::Color2Static)
    );
    assert!(frame_ops[2].is_empty());

    let scene = encoder.finish()?;
    assert!(scene.frames[2].bitstream.is_empty());
    assert!(scene.frames[2].maskstream.is_empty());

    let decoded = decode_all(&scene)?;
    for (index, (decoded, source)) in decoded.iter().zip(&sources).enumerate() {
        assert_eq!(decoded, source, "frame {index}");
    }
    Ok(())
}

#[test]
fn options_change_the_operations_not_the_pixels() -> Result<()> {
    let mut frame = base_frame();
    checkerboard(&mut frame, 1, 1, 3, 4);
    fill_tile(&mut frame, WIDTH, 4, 2, |_, _| 77);
    fill_tile(&mut frame, WIDTH, 5, 2, |_, _| 77);

    let options = EncoderOptions {
        repeat_previous: false,
        static_checkerboard: false,
    };
    let mut encoder = SceneEncoder::with_options(WIDTH, HEIGHT, options)?;
    let ops = encoder.push_frame(&frame)?.to_vec();
    assert!(ops.iter().all(|op| !matches!(op, TileOp::Repeat { .. })));
    assert!(ops.iter().all(|op| op.key().kind != TileType::Color2Static));

    let scene = encoder.finish()?;
    assert_eq!(decode_all(&scene)?, vec![frame]);
    Ok(())
}

#[test]
fn many_distinct_operations_use_extension_tables() -> Result<()> {
    let (width, height) = (400, 240);
    let pairs = (1u8..=255).flat_map(|a| (a + 1..=255).map(move |b| (a, b)));

    let mut frame = vec![0u8; width * height];
    let tiles_wide = width / 4;
    for (tile, (a, b)) in (0..tiles_wide * (height / 4)).zip(pairs) {
        fill_tile(&mut frame, width, tile % tiles_wide, tile / tiles_wide, |x, _| {
            if x < 2 { a } else { b }
        });
    }

    let mut encoder = SceneEncoder::new(width, height)?;
    encoder.push_frame(&frame)?;
    let scene = encoder.finish()?;

    assert!(scene.table.len() > 4096);
    assert!(scene.table.words()[4095].is_long_offset());
    assert_eq!(decode_all(&scene)?, vec![frame]);
    Ok(())
}

#[test]
fn packed_table_reloads_and_decodes() -> Result<()> {
    let mut encoder = SceneEncoder::new(WIDTH, HEIGHT)?;
    let frame = base_frame();
    encoder.push_frame(&frame)?;
    let scene = encoder.finish()?;

    let packed = scene.packed_table();
    assert!(packed.len() < 4 + scene.table.len() * 4);
    let table = ControlWordTable::unpack(&packed)?;
    assert_eq!(table, scene.table);

    let decoder = movie_codec::FrameDecoder::builder()
        .table(table)
        .dictionary(scene.dictionary.clone())
        .dimensions(WIDTH, HEIGHT)
        .build()?;
    let encoded = &scene.frames[0];
    let mut buffer = FrameBuffer::new(WIDTH, HEIGHT)?;
    let stats = decoder.decode_into(&encoded.bitstream, &encoded.maskstream, &mut buffer)?;
    assert_eq!(stats.tiles_painted, (WIDTH / 4) * (HEIGHT / 4));
    assert_eq!(stats.mask_bytes_consumed, encoded.maskstream.len());
    assert_eq!(buffer.pixels(), frame.as_slice());
    Ok(())
}

#[test]
fn one_decoder_serves_many_threads() -> Result<()> {
    let mut encoder = SceneEncoder::new(WIDTH, HEIGHT)?;
    let frame = base_frame();
    encoder.push_frame(&frame)?;
    let scene = encoder.finish()?;
    let decoder = scene.decoder()?;
    let encoded = &scene.frames[0];

    let results: Vec<Vec<u8>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let decoder = &decoder;
                scope.spawn(move || {
                    let mut buffer = FrameBuffer::new(WIDTH, HEIGHT).expect("valid dimensions");
                    decoder
                        .decode_into(&encoded.bitstream, &encoded.maskstream, &mut buffer)
                        .expect("frame decodes");
                    buffer.pixels().to_vec()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("decode thread panicked"))
            .collect()
    });
    assert!(results.iter().all(|pixels| *pixels == frame));
    Ok(())
}

#[test]
fn transparent_repaint_is_unsupported() -> Result<()> {
    let mut encoder = SceneEncoder::new(WIDTH, HEIGHT)?;
    let mut frame = base_frame();
    encoder.push_frame(&frame)?;
    frame[WIDTH + 3] = 0;
    match encoder.push_frame(&frame) {
        Err(CodecError::Unsupported(message)) => {
            assert!(message.contains("(3, 1)"), "unexpected message: {message}");
        }
        other => bail!("expected Unsupported, got {other:?}"),
    }
    assert_eq!(encoder.frame_count(), 1);
    Ok(())
}
