use super::*;

fn clouds_alpha(g: Geometry, px: [u8; 4]) -> Raster {
    Raster::filled(g.width, g.height, PixelFormat::Rgba8, &px).unwrap()
}

fn statics(day: [u8; 3], night: [u8; 3], specular: [u8; 3]) -> StaticTextures {
    StaticTextures {
        frame: Raster::filled(4, 2, PixelFormat::Rgba8, &[0, 0, 0, 0]).unwrap(),
        day_base: Raster::filled(8, 4, PixelFormat::Rgb8, &day).unwrap(),
        night_base: Raster::filled(8, 4, PixelFormat::Rgb8, &night).unwrap(),
        specular_base: Raster::filled(8, 4, PixelFormat::Rgb8, &specular).unwrap(),
    }
}

#[test]
fn invert_flips_every_channel() {
    let r = Raster::new(1, 1, PixelFormat::Rgba8, vec![0, 100, 255, 30]).unwrap();
    assert_eq!(invert(&r).data(), &[255, 155, 0, 225]);
}

#[test]
fn shadow_factor_endpoints() {
    assert!((shadow_factor(255) - 1.0).abs() < 1e-6);
    assert!((shadow_factor(0) - 0.45).abs() < 1e-6);
}

#[test]
fn clear_sky_keeps_textures() {
    let g = Geometry::from_height(8).unwrap();
    let layers = compose_earth(
        &clouds_alpha(g, [127, 127, 127, 0]),
        &statics([40, 80, 120], [200, 150, 100], [90, 90, 90]),
        g,
    )
    .unwrap();
    assert!(layers.day.data().chunks_exact(3).all(|px| px == [40, 80, 120]));
    assert!(layers.night.data().chunks_exact(3).all(|px| px == [200, 150, 100]));
    assert!(layers.specular.data().chunks_exact(3).all(|px| px == [90, 90, 90]));
    assert_eq!(layers.day.dimensions(), (16, 8));
}

#[test]
fn overcast_blacks_out_night_and_specular() {
    let g = Geometry::from_height(8).unwrap();
    let layers = compose_earth(
        &clouds_alpha(g, [255, 255, 255, 255]),
        &statics([40, 80, 120], [200, 150, 100], [90, 90, 90]),
        g,
    )
    .unwrap();
    assert!(layers.night.data().iter().all(|&v| v == 0));
    assert!(layers.specular.data().iter().all(|&v| v == 0));
    assert!(layers.day.data().iter().all(|&v| v == 255));
}

#[test]
fn partial_cover_scales_night_lights() {
    let g = Geometry::from_height(8).unwrap();
    let layers = compose_earth(
        &clouds_alpha(g, [200, 200, 200, 51]),
        &statics([0, 0, 0], [200, 100, 0], [0, 0, 0]),
        g,
    )
    .unwrap();
    // inverted alpha 204 -> factor 0.8
    assert!(layers.night.data().chunks_exact(3).all(|px| px == [160, 80, 0]));
}

#[test]
fn day_is_shadowed_before_clouds_are_laid_on() {
    let g = Geometry::from_height(8).unwrap();
    let inverted = invert(&clouds_alpha(g, [0, 0, 0, 255]));
    let shadow = shadow_plane(&inverted).unwrap();
    assert!(shadow.data().iter().all(|&v| v == 0));

    let transparent = clouds_alpha(g, [0, 0, 0, 0]);
    let day = compose_day(
        &Raster::filled(8, 4, PixelFormat::Rgb8, &[200, 100, 20]).unwrap(),
        &shadow,
        &transparent,
        g,
    )
    .unwrap();
    // factor 0.45
    for px in day.data().chunks_exact(3) {
        for (&got, want) in px.iter().zip([90i32, 45, 9]) {
            assert!((i32::from(got) - want).abs() <= 1, "{px:?}");
        }
    }
}

#[test]
fn rejects_wrong_geometry() {
    let g = Geometry::from_height(8).unwrap();
    let small = clouds_alpha(Geometry::from_height(16).unwrap(), [0, 0, 0, 0]);
    assert!(compose_earth(&small, &statics([0; 3], [0; 3], [0; 3]), g).is_err());
}
