//! Whole-pipeline tests: document → sampler → rasterizer → compositor.

use kurbo::{Affine, Point};
use maskink_core::forms::{Brush, Circle, Ellipse, EllipseFeather, Group, Path, PathPoint};
use maskink_core::{
    AffineDistortion, CombineOp, Form, FormId, GroupMember, MaskContext, MaskDocument, MaskError, Shape, StrokeSample,
    simplify_brush,
};
use maskink_render::{MaskBuffer, MaskRenderer, Rasterizer, RasterError, Roi};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn circle(x: f64, y: f64, radius: f64) -> Form {
    Form::new("circle", Shape::Circle(Circle::new(Point::new(x, y), radius, 0.05)))
}

fn square(clockwise: bool) -> Form {
    let mut corners = vec![(0.3, 0.3), (0.7, 0.3), (0.7, 0.7), (0.3, 0.7)];
    if !clockwise {
        corners.reverse();
    }
    let points = corners
        .into_iter()
        .map(|(x, y)| PathPoint::sharp(Point::new(x, y), 0.05))
        .collect();
    Form::new("square", Shape::Path(Path::new(points)))
}

fn group_of(doc: &mut MaskDocument, forms: Vec<Form>) -> (FormId, Vec<FormId>) {
    let group = doc.add_form(Form::new("group", Shape::Group(Group::default())));
    let ids: Vec<_> = forms.into_iter().map(|f| doc.add_form(f)).collect();
    for &id in &ids {
        doc.group_add_form(group, id).unwrap();
    }
    (group, ids)
}

fn for_each_pixel(mask: &MaskBuffer, mut f: impl FnMut(i64, i64, f32)) {
    for j in 0..mask.height as i64 {
        for i in 0..mask.width as i64 {
            let (x, y) = (mask.x + i, mask.y + j);
            f(x, y, mask.get(x, y));
        }
    }
}

#[test]
fn test_circle_scenario() {
    init_logger();
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    let mask = raster.render(&circle(0.5, 0.5, 0.2)).unwrap();

    assert_eq!(mask.get(50, 50), 1.0);
    assert_eq!(mask.get(50, 69), 1.0);
    let feather = mask.get(72, 50);
    assert!(feather > 0.0 && feather < 1.0);
    assert_eq!(mask.get(50, 76), 0.0);
    assert!(mask.get(62, 50) >= mask.get(72, 50));
}

#[test]
fn test_roi_at_full_scale_matches_full_frame() {
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    let form = circle(0.4, 0.6, 0.15);
    let mask = raster.render(&form).unwrap();

    let roi = Roi::full(100, 100);
    let mut out = vec![0.0; roi.len()];
    raster.render_roi(&form, &roi, &mut out).unwrap();
    for y in 0..100i64 {
        for x in 0..100i64 {
            let roi_value = out[y as usize * 100 + x as usize];
            assert!((roi_value - mask.get(x, y)).abs() < 1e-6, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_downscaled_ellipse_roi_follows_full_frame() {
    let ctx = MaskContext::new(200.0, 160.0);
    let raster = Rasterizer::new(&ctx);
    let form = Form::new(
        "ellipse",
        Shape::Ellipse(Ellipse {
            center: Point::new(0.5, 0.5),
            radius_a: 0.3,
            radius_b: 0.2,
            rotation: 30.0,
            border: 0.5,
            feather: EllipseFeather::Proportional,
        }),
    );
    let mask = raster.render(&form).unwrap();

    let roi = Roi::new(0, 0, 100, 80, 0.5);
    let mut out = vec![0.0; roi.len()];
    raster.render_roi(&form, &roi, &mut out).unwrap();
    for j in 0..80i64 {
        for i in 0..100i64 {
            let roi_value = out[j as usize * 100 + i as usize];
            let full = mask.get(2 * i, 2 * j);
            assert!((roi_value - full).abs() < 0.25, "pixel ({i}, {j}): {roi_value} vs {full}");
        }
    }
    assert!((out[40 * 100 + 50] - 1.0).abs() < 1e-6);
}

#[test]
fn test_square_path_both_windings() {
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    for clockwise in [true, false] {
        let mask = raster.render(&square(clockwise)).unwrap();
        assert_eq!(mask.get(50, 50), 1.0, "clockwise {clockwise}");
        assert_eq!(mask.get(31, 31), 1.0, "clockwise {clockwise}");
        assert!(mask.get(27, 50) > 0.0, "clockwise {clockwise}");
        assert_eq!(mask.get(10, 50), 0.0, "clockwise {clockwise}");
        assert!(mask.max_value() <= 1.0);
    }
}

#[test]
fn test_path_roi_interior() {
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    let roi = Roi::new(20, 20, 60, 60, 1.0);
    let mut out = vec![0.0; roi.len()];
    raster.render_roi(&square(true), &roi, &mut out).unwrap();
    // Pipeline pixel (50, 50) sits at (30, 30) of the ROI.
    assert_eq!(out[30 * 60 + 30], 1.0);
    assert_eq!(out[0], 0.0);
}

/// L shape with its notch at the top right; the concave corner sits at (0.5, 0.5).
fn l_shape(border: f64) -> Form {
    let corners = [(0.1, 0.1), (0.5, 0.1), (0.5, 0.5), (0.9, 0.5), (0.9, 0.9), (0.1, 0.9)];
    let points = corners
        .into_iter()
        .map(|(x, y)| PathPoint::sharp(Point::new(x, y), border))
        .collect();
    Form::new("l", Shape::Path(Path::new(points)))
}

#[test]
fn test_concave_path_border_crossing_itself() {
    init_logger();
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    let roi = Roi::full(100, 100);
    for border in [0.02, 0.1, 0.3] {
        let form = l_shape(border);
        let mask = raster.render(&form).unwrap();
        assert_eq!(mask.get(30, 70), 1.0, "interior, border {border}");
        assert_eq!(mask.get(70, 70), 1.0, "interior, border {border}");
        assert_eq!(mask.get(90, 10), 0.0, "notch corner, border {border}");
        if border < 0.2 {
            assert_eq!(mask.get(70, 30), 0.0, "notch, border {border}");
        }

        let mut out = vec![0.0; roi.len()];
        raster.render_roi(&form, &roi, &mut out).unwrap();
        for (x, y) in [(30, 70), (70, 70), (90, 10), (70, 30)] {
            let roi_value = out[y as usize * 100 + x as usize];
            assert!((roi_value - mask.get(x, y)).abs() < 1e-6, "pixel ({x}, {y}), border {border}");
        }
    }
}

#[test]
fn test_simplified_brush_stroke() {
    let ctx = MaskContext::new(200.0, 200.0);
    let raster = Rasterizer::new(&ctx);
    let samples: Vec<_> = (0..40)
        .map(|i| StrokeSample::new(Point::new(0.2 + i as f64 * 0.015, 0.5), 0.04, 0.8, 1.0))
        .collect();
    let points = simplify_brush(&samples, 0.001);
    assert_eq!(points.len(), 2);

    let mask = raster.render(&Form::new("stroke", Shape::Brush(Brush::new(points)))).unwrap();
    assert_eq!(mask.get(100, 100), 1.0);
    assert_eq!(mask.get(100, 130), 0.0);
}

#[test]
fn test_group_union_and_intersection_bounds() {
    init_logger();
    let ctx = MaskContext::new(120.0, 120.0);
    let mut doc = MaskDocument::new();
    let (group, ids) = group_of(&mut doc, vec![circle(0.4, 0.5, 0.15), circle(0.6, 0.5, 0.15)]);

    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let a = raster.render(doc.get_form(ids[0]).unwrap()).unwrap();
    let b = raster.render(doc.get_form(ids[1]).unwrap()).unwrap();
    let union = raster.render(doc.get_form(group).unwrap()).unwrap();
    assert_eq!(union.area(), a.area().union(&b.area()));
    for_each_pixel(&union, |x, y, v| {
        assert!(v + 1e-6 >= a.get(x, y).max(b.get(x, y)), "union at ({x}, {y})");
    });

    doc.set_combine(group, ids[1], CombineOp::Intersection).unwrap();
    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let both = raster.render(doc.get_form(group).unwrap()).unwrap();
    for_each_pixel(&both, |x, y, v| {
        assert!(v <= a.get(x, y).min(b.get(x, y)) + 1e-6, "intersection at ({x}, {y})");
    });
    assert_eq!(both.get(60, 60), 1.0);
    assert_eq!(both.get(30, 60), 0.0);
}

#[test]
fn test_copy_member_roi_matches_full_frame() {
    let ctx = MaskContext::new(100.0, 100.0);
    let mut doc = MaskDocument::new();
    let (group, ids) = group_of(&mut doc, vec![circle(0.25, 0.5, 0.15), circle(0.75, 0.5, 0.15)]);
    doc.set_combine(group, ids[0], CombineOp::Union).unwrap();
    doc.set_combine(group, ids[1], CombineOp::Copy).unwrap();

    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let form = doc.get_form(group).unwrap();
    let mask = raster.render(form).unwrap();
    let roi = Roi::full(100, 100);
    let mut out = vec![0.0; roi.len()];
    raster.render_roi(form, &roi, &mut out).unwrap();

    // Copy leaves the first circle alone outside the second one's box.
    assert_eq!(mask.get(25, 50), 1.0);
    assert_eq!(out[50 * 100 + 25], 1.0);
    assert_eq!(out[50 * 100 + 75], 1.0);
    for y in 0..100i64 {
        for x in 0..100i64 {
            let roi_value = out[y as usize * 100 + x as usize];
            assert!((roi_value - mask.get(x, y)).abs() < 1e-6, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_double_inverse_restores_mask() {
    let ctx = MaskContext::new(80.0, 80.0);
    let mut doc = MaskDocument::new();
    let (inner, ids) = group_of(&mut doc, vec![circle(0.5, 0.5, 0.2)]);
    let outer = doc.add_form(Form::new("outer", Shape::Group(Group::default())));
    doc.group_add_form(outer, inner).unwrap();
    assert!(doc.toggle_inverse(inner, ids[0]).unwrap());
    assert!(doc.toggle_inverse(outer, inner).unwrap());

    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let plain = raster.render(doc.get_form(ids[0]).unwrap()).unwrap();
    let inverted = raster.render(doc.get_form(inner).unwrap()).unwrap();
    let restored = raster.render(doc.get_form(outer).unwrap()).unwrap();

    assert_eq!((inverted.width, inverted.height), (80, 80));
    assert_eq!(inverted.get(40, 40), 0.0);
    assert_eq!(inverted.get(2, 2), 1.0);
    for_each_pixel(&restored, |x, y, v| {
        assert!((v - plain.get(x, y)).abs() < 1e-6, "pixel ({x}, {y})");
    });

    let roi = Roi::full(80, 80);
    let mut out = vec![0.0; roi.len()];
    raster.render_roi(doc.get_form(inner).unwrap(), &roi, &mut out).unwrap();
    assert_eq!(out[40 * 80 + 40], 0.0);
    assert_eq!(out[2 * 80 + 2], 1.0);
}

#[test]
fn test_group_area_is_member_union() {
    let ctx = MaskContext::new(100.0, 100.0);
    let mut doc = MaskDocument::new();
    let (group, ids) = group_of(&mut doc, vec![circle(0.3, 0.3, 0.1), circle(0.7, 0.6, 0.1)]);
    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let a = raster.area(doc.get_form(ids[0]).unwrap()).unwrap();
    let b = raster.area(doc.get_form(ids[1]).unwrap()).unwrap();
    assert_eq!(raster.area(doc.get_form(group).unwrap()).unwrap(), a.union(&b));
}

#[test]
fn test_failing_member_is_skipped() {
    let ctx = MaskContext::new(100.0, 100.0);
    let mut doc = MaskDocument::new();
    let (group, ids) = group_of(&mut doc, vec![circle(0.5, 0.5, 0.2)]);
    let ghost = GroupMember::new(FormId::new_v4(), group, 1.0).with_combine(CombineOp::Union);
    if let Some(Form {
        shape: Shape::Group(g), ..
    }) = doc.get_form_mut(group)
    {
        g.members.push(ghost);
    }

    let raster = Rasterizer::new(&ctx).with_document(&doc);
    let plain = raster.render(doc.get_form(ids[0]).unwrap()).unwrap();
    let mask = raster.render(doc.get_form(group).unwrap()).unwrap();
    assert_eq!(mask, plain);
}

#[test]
fn test_group_without_document_fails() {
    let ctx = MaskContext::new(100.0, 100.0);
    let mut doc = MaskDocument::new();
    let (group, _) = group_of(&mut doc, vec![circle(0.5, 0.5, 0.2)]);
    let raster = Rasterizer::new(&ctx);
    assert!(matches!(
        raster.render(doc.get_form(group).unwrap()),
        Err(RasterError::Mask(MaskError::GeometryInvalid(_)))
    ));
}

#[test]
fn test_recursive_groups_fail_instead_of_looping() {
    let ctx = MaskContext::new(50.0, 50.0);
    let mut doc = MaskDocument::new();
    let a = doc.add_form(Form::new("a", Shape::Group(Group::default())));
    let b = doc.add_form(Form::new("b", Shape::Group(Group::new(vec![GroupMember::new(a, a, 1.0)]))));
    if let Some(Form {
        shape: Shape::Group(g), ..
    }) = doc.get_form_mut(a)
    {
        g.members.push(GroupMember::new(b, a, 1.0));
    }

    let raster = Rasterizer::new(&ctx).with_document(&doc);
    assert!(raster.render(doc.get_form(a).unwrap()).is_err());
    let roi = Roi::full(50, 50);
    let mut out = vec![0.0; roi.len()];
    assert!(raster.render_roi(doc.get_form(b).unwrap(), &roi, &mut out).is_err());
    assert!(raster.area(doc.get_form(a).unwrap()).is_err());
}

#[test]
fn test_roi_buffer_size_is_checked() {
    let ctx = MaskContext::new(100.0, 100.0);
    let raster = Rasterizer::new(&ctx);
    let roi = Roi::full(10, 10);
    let mut out = vec![0.0; 99];
    let err = raster.render_roi(&circle(0.5, 0.5, 0.2), &roi, &mut out).unwrap_err();
    assert!(matches!(
        err,
        RasterError::BufferSize {
            expected: 100,
            actual: 99
        }
    ));
}

#[test]
fn test_distortion_moves_mask() {
    let ctx = MaskContext::new(100.0, 100.0);
    let shift = AffineDistortion::new(Affine::translate((10.0, 5.0)));
    let moved_ctx = MaskContext::new(100.0, 100.0).with_distortion(&shift);
    let form = circle(0.4, 0.4, 0.15);

    let plain = Rasterizer::new(&ctx).render(&form).unwrap();
    let moved = Rasterizer::new(&moved_ctx).render(&form).unwrap();
    assert_eq!((moved.x - plain.x, moved.y - plain.y), (10, 5));
    for_each_pixel(&plain, |x, y, v| {
        assert!((moved.get(x + 10, y + 5) - v).abs() < 1e-5, "pixel ({x}, {y})");
    });
}

#[test]
fn test_png_export() {
    let ctx = MaskContext::new(64.0, 64.0);
    let mask = Rasterizer::new(&ctx).render(&circle(0.5, 0.5, 0.25)).unwrap();
    let bytes = mask.encode_png().unwrap();

    let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    let mut reader = decoder.read_info().unwrap();
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels).unwrap();
    assert_eq!((info.width as usize, info.height as usize), (mask.width, mask.height));
    assert_eq!(info.color_type, png::ColorType::Grayscale);
    let center = (32 - mask.y) as usize * mask.width + (32 - mask.x) as usize;
    assert_eq!(pixels[center], 255);
    assert_eq!(pixels[0], 0);
}

#[test]
fn test_document_round_trips_render() {
    let ctx = MaskContext::new(100.0, 100.0);
    let mut doc = MaskDocument::new();
    let (group, _) = group_of(&mut doc, vec![circle(0.35, 0.5, 0.15), circle(0.6, 0.4, 0.1)]);
    let original = Rasterizer::new(&ctx)
        .with_document(&doc)
        .render(doc.get_form(group).unwrap())
        .unwrap();

    let json = MaskDocument::from_json(&doc.to_json().unwrap()).unwrap();
    let from_json = Rasterizer::new(&ctx)
        .with_document(&json)
        .render(json.get_form(group).unwrap())
        .unwrap();
    assert_eq!(from_json, original);

    // Records hold f32 values, so boxes may grow by a pixel.
    let records = MaskDocument::from_records(&doc.to_records(7)).unwrap();
    let reloaded = Rasterizer::new(&ctx)
        .with_document(&records)
        .render(records.get_form(group).unwrap())
        .unwrap();
    for_each_pixel(&reloaded, |x, y, v| {
        assert!((original.get(x, y) - v).abs() < 1e-3, "pixel ({x}, {y})");
    });
}
