use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use screen_zones::{
    BlackBarEdges, CaptureConfig, CaptureError, CaptureState, ColorBgra, ColorFormat, ColorRgb,
    Display, FrameFeed, GraphicsCard, MemoryCaptureBackend, Pixel, Rotation, ScreenCapture,
};

fn display(width: usize, height: usize) -> Display {
    Display {
        index: 0,
        name: "Memory".into(),
        width,
        height,
        rotation: Rotation::None,
        graphics_card: GraphicsCard {
            index: 0,
            name: "Memory Adapter".into(),
            vendor_id: 0,
            device_id: 0,
        },
    }
}

/// Pixel at (x, y) encodes its own coordinates.
fn coordinate_frame(width: usize, height: usize) -> Vec<ColorBgra> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ColorBgra::from_rgb(x as u8, y as u8, (x ^ y) as u8)))
        .collect()
}

fn memory_capture<C: Pixel>(
    width: usize,
    height: usize,
    config: CaptureConfig,
) -> (FrameFeed<C>, ScreenCapture<MemoryCaptureBackend<C>>) {
    let feed = FrameFeed::<C>::new();
    let capture = ScreenCapture::new(
        display(width, height),
        MemoryCaptureBackend::new(feed.clone()),
        config,
    );
    (feed, capture)
}

#[test]
fn full_hd_zone_geometry() {
    let (_feed, capture) = memory_capture::<ColorBgra>(1920, 1080, CaptureConfig::default());

    let full = capture.register_capture_zone(0, 0, 1920, 1080, 0).unwrap();
    let geometry = full.geometry();
    assert_eq!((geometry.width, geometry.height), (1920, 1080));
    assert_eq!((geometry.unscaled_width, geometry.unscaled_height), (1920, 1080));

    let half = capture.register_capture_zone(0, 0, 1920, 1080, 1).unwrap();
    let geometry = half.geometry();
    assert_eq!((geometry.width, geometry.height, geometry.downscale_level), (960, 540, 1));

    let tiny = capture.register_capture_zone(0, 0, 2, 2, 99).unwrap();
    let geometry = tiny.geometry();
    assert_eq!((geometry.width, geometry.height, geometry.downscale_level), (1, 1, 1));

    let lock = half.lock().unwrap();
    assert_eq!(lock.raw_bytes().unwrap().len(), 960 * 4 * 540);
}

#[test]
fn level_zero_copy_matches_source() {
    let (feed, capture) = memory_capture::<ColorBgra>(64, 48, CaptureConfig::default());
    let frame = coordinate_frame(64, 48);
    feed.push(64, 48, &frame).unwrap();

    let zone = capture.register_capture_zone(5, 7, 20, 10, 0).unwrap();
    assert_eq!(capture.capture_screen(), Ok(true));

    let lock = zone.lock().unwrap();
    let image = lock.image().unwrap();
    for y in 0..10 {
        for x in 0..20 {
            assert_eq!(image[(x, y)], frame[(y + 7) * 64 + x + 5]);
        }
    }

    let row_major: Vec<_> = image.iter().copied().collect();
    let indexed: Vec<_> = (0..10)
        .flat_map(|y| (0..20).map(move |x| (x, y)))
        .map(|(x, y)| *image.get(x, y).unwrap())
        .collect();
    assert_eq!(row_major, indexed);
}

#[test]
fn downscaled_zone_averages_blocks() {
    let (feed, capture) = memory_capture::<ColorRgb>(8, 8, CaptureConfig::default());
    let mut frame = vec![ColorRgb::from_rgb(10, 20, 30); 64];
    // Lower right block alternates 0 / 255 so its average rounds up.
    for y in 4..8 {
        for x in 4..8 {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            frame[y * 8 + x] = ColorRgb::from_rgb(v, v, v);
        }
    }
    feed.push(8, 8, &frame).unwrap();

    let zone = capture.register_capture_zone(0, 0, 8, 8, 2).unwrap();
    capture.capture_screen().unwrap();

    let lock = zone.lock().unwrap();
    let image = lock.image().unwrap();
    assert_eq!((image.width(), image.height()), (2, 2));
    assert_eq!(image[(0, 0)], ColorRgb::from_rgb(10, 20, 30));
    assert_eq!(image[(1, 1)], ColorRgb::from_rgb(128, 128, 128));
    assert_eq!(ColorRgb::FORMAT, ColorFormat::Rgb);
}

#[test]
fn columns_and_sub_images_address_the_zone_buffer() {
    let (feed, capture) = memory_capture::<ColorBgra>(32, 32, CaptureConfig::default());
    let frame = coordinate_frame(32, 32);
    feed.push(32, 32, &frame).unwrap();

    let zone = capture.register_capture_zone(0, 0, 32, 32, 0).unwrap();
    capture.capture_screen().unwrap();

    zone.with_image(|image| {
        let inner = image.sub_image(4, 4, 16, 16).unwrap();
        let nested = inner.sub_image(2, 3, 4, 4).unwrap();
        assert_eq!(nested, image.sub_image(6, 7, 4, 4).unwrap());
        assert_eq!(nested[(0, 0)], frame[7 * 32 + 6]);

        let column = nested.column(1).unwrap();
        let expected: Vec<_> = (7..11).map(|y| frame[y * 32 + 7]).collect();
        assert_eq!(column.to_vec(), expected);

        let mut too_small = vec![ColorBgra::default(); 15];
        assert!(nested.copy_to(&mut too_small).is_err());
        assert!(nested.get(4, 0).is_err());
    })
    .unwrap();
}

#[test]
fn letterbox_is_detected_and_removed() {
    let (feed, capture) = memory_capture::<ColorBgra>(16, 12, CaptureConfig::default());
    let frame: Vec<_> = (0..12)
        .flat_map(|y| {
            (0..16).map(move |_| {
                if (2..10).contains(&y) {
                    ColorBgra::from_rgb(90, 90, 90)
                } else {
                    // At the threshold still counts as black.
                    ColorBgra::from_rgb(8, 8, 8)
                }
            })
        })
        .collect();
    feed.push(16, 12, &frame).unwrap();

    let zone = capture.register_capture_zone(0, 0, 16, 12, 0).unwrap();
    capture.capture_screen().unwrap();

    let mut lock = zone.lock().unwrap();
    let bars = lock.black_bars().unwrap();
    assert_eq!((bars.top, bars.bottom, bars.left, bars.right), (2, 2, 0, 0));

    let content = lock.remove_black_bars(BlackBarEdges::ALL).unwrap();
    assert_eq!((content.width(), content.height()), (16, 8));
    assert_eq!(content.origin(), (0, 2));
}

#[test]
fn lost_access_recovers_with_zones_intact() {
    let (feed, capture) = memory_capture::<ColorBgra>(16, 16, CaptureConfig::default());
    feed.push(16, 16, &coordinate_frame(16, 16)).unwrap();
    let zone = capture.register_capture_zone(0, 0, 16, 16, 1).unwrap();
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = updates.clone();
    zone.on_updated(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(capture.capture_screen(), Ok(true));
    feed.signal_access_lost();
    assert_eq!(capture.capture_screen(), Ok(false));
    assert_eq!(capture.state(), CaptureState::Active);

    // The stale buffer stays readable.
    assert_eq!(zone.lock().unwrap().image().unwrap().len(), 64);

    assert_eq!(capture.capture_screen(), Ok(true));
    assert_eq!(updates.load(Ordering::SeqCst), 2);
    assert_eq!(capture.zones().len(), 1);
}

#[test]
fn unavailable_feed_degrades_until_it_returns() {
    let (feed, capture) = memory_capture::<ColorBgra>(8, 8, CaptureConfig::default());
    feed.push(8, 8, &coordinate_frame(8, 8)).unwrap();
    capture.register_capture_zone(0, 0, 8, 8, 0).unwrap();

    feed.set_available(false);
    assert_eq!(capture.capture_screen(), Ok(false));
    assert_eq!(capture.state(), CaptureState::Degraded);

    feed.set_available(true);
    assert_eq!(capture.capture_screen(), Ok(true));
    assert_eq!(capture.state(), CaptureState::Active);
}

#[test]
fn parallel_and_sequential_updates_agree() {
    let frame = coordinate_frame(64, 64);
    let mut results = Vec::new();

    for parallel in [true, false] {
        let config = CaptureConfig {
            parallel_zone_updates: parallel,
            ..CaptureConfig::default()
        };
        let (feed, capture) = memory_capture::<ColorBgra>(64, 64, config);
        feed.push(64, 64, &frame).unwrap();
        let zones: Vec<_> = (0..8)
            .map(|i| capture.register_capture_zone(i * 6, i * 4, 16, 16, (i % 3) as u32).unwrap())
            .collect();
        capture.capture_screen().unwrap();

        let buffers: Vec<Vec<ColorBgra>> = zones
            .iter()
            .map(|zone| zone.with_image(|image| image.to_vec()).unwrap())
            .collect();
        results.push(buffers);
    }

    assert_eq!(results[0], results[1]);
}

#[test]
fn dropping_the_capture_disposes_zones() {
    let (_feed, capture) = memory_capture::<ColorBgra>(8, 8, CaptureConfig::default());
    let zone = capture.register_capture_zone(0, 0, 4, 4, 0).unwrap();

    drop(capture);
    assert!(matches!(zone.lock(), Err(CaptureError::ResourceDisposed)));
}
