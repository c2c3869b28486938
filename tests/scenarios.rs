use glam::{DQuat, DVec3};
use mpr_scene::reslice_math::SliceLine;
use mpr_scene::{
    AssetItem, DataId, FlushKey, FlushRequest, Gesture, LoadedData, Mesh, Orientation,
    PresetCatalog, QuadView, RenderableKind, SceneNotification, SceneSettings, View, ViewId,
    Volume,
};
use ndarray::Array3;
use std::sync::Arc;

fn scene() -> QuadView {
    let presets = PresetCatalog::builtin().expect("built-in presets parse");
    QuadView::new(Arc::new(presets), SceneSettings::default())
}

/// 10 x 8 x 6 voxels (x, y, z) with anisotropic spacing
fn volume(origin: DVec3) -> Arc<Volume> {
    let data = Array3::from_shape_fn((6, 8, 10), |(z, y, x)| (x + 2 * y + 3 * z) as f32);
    Arc::new(Volume::new(data, DVec3::new(0.5, 1.0, 2.0), origin))
}

fn load(scene: &mut QuadView, id: &str, data: LoadedData) -> DataId {
    let item = AssetItem::new(id, id);
    assert!(scene.select(&item));
    assert!(scene.complete_load(&item.id, Ok(data)));
    item.id
}

fn kinds(scene: &QuadView, view: ViewId) -> Vec<RenderableKind> {
    scene
        .view(view)
        .base()
        .entries()
        .map(|(_, entry)| entry.renderable.kind())
        .collect()
}

#[test]
fn test_single_volume_fills_every_view() {
    let mut scene = scene();
    let ct = volume(DVec3::new(-3.0, 4.0, 10.0));
    load(&mut scene, "ct", LoadedData::Volume(ct.clone()));

    for orientation in Orientation::ALL {
        assert_eq!(
            kinds(&scene, ViewId::Slice(orientation)),
            vec![RenderableKind::ResliceSurface]
        );
    }
    assert_eq!(kinds(&scene, ViewId::ThreeD), vec![RenderableKind::Volume]);
    assert_eq!(scene.cursor().borrow().center(), ct.center());

    // extent / spacing: x 4.5 / 0.5, y 7 / 1, z 10 / 2
    assert_eq!(scene.slice_range(Orientation::Sagittal), Some((0, 9)));
    assert_eq!(scene.slice_range(Orientation::Coronal), Some((0, 7)));
    assert_eq!(scene.slice_range(Orientation::Axial), Some((0, 5)));
}

#[test]
fn test_removing_primary_promotes_secondary_in_place() {
    let mut scene = scene();
    let a = load(&mut scene, "a", LoadedData::Volume(volume(DVec3::ZERO)));
    let b = load(
        &mut scene,
        "b",
        LoadedData::Volume(volume(DVec3::new(0.5, 0.0, 0.0))),
    );
    assert!(scene.set_slice(Orientation::Axial, 1));
    let center = scene.cursor().borrow().center();

    for orientation in Orientation::ALL {
        let view = scene.slice_view(orientation);
        assert!(view.is_primary_volume(&a));
        assert!(view.is_secondary_volume(&b));
    }

    assert!(scene.remove(&a));

    for orientation in Orientation::ALL {
        let view = scene.slice_view(orientation);
        assert!(view.is_primary_volume(&b));
        assert!(!view.is_secondary_volume(&b));
        assert_eq!(view.primary_count(), 1);
        assert_eq!(
            kinds(&scene, ViewId::Slice(orientation)),
            vec![RenderableKind::ResliceSurface]
        );
    }
    assert_eq!(scene.cursor().borrow().center(), center);
    assert!(scene.is_primary(&b));
}

#[test]
fn test_primary_invariant_through_add_remove_sequence() {
    let mut scene = scene();
    let ids: Vec<DataId> = (0..4)
        .map(|i| {
            load(
                &mut scene,
                &format!("v{i}"),
                LoadedData::Volume(volume(DVec3::splat(i as f64))),
            )
        })
        .collect();

    for id in [&ids[2], &ids[0], &ids[3], &ids[1]] {
        scene.remove(id);
        for orientation in Orientation::ALL {
            let view = scene.slice_view(orientation);
            let volumes = view.base().data_ids().count();
            if volumes == 0 {
                assert_eq!(view.primary_count(), 0);
            } else {
                assert_eq!(view.primary_count(), 1);
            }
        }
    }
    assert!(!scene.cursor().borrow().is_initialized());
}

#[test]
fn test_sagittal_drag_updates_other_views() {
    let mut scene = scene();
    let ct = volume(DVec3::ZERO);
    load(&mut scene, "ct", LoadedData::Volume(ct.clone()));
    scene.drain_notifications();

    let angle = 0.3;
    let request = scene.gesture(Orientation::Sagittal, Gesture::CursorRotate { angle });
    assert_eq!(request, FlushRequest::Debounce(FlushKey::Cursor));
    assert!(
        scene
            .slice_view(Orientation::Coronal)
            .base()
            .renderer()
            .is_animating()
    );
    assert!(
        !scene
            .slice_view(Orientation::Sagittal)
            .base()
            .renderer()
            .is_animating()
    );

    let rotation = DQuat::from_axis_angle(Orientation::Sagittal.default_normal(), angle);
    {
        let cursor = scene.cursor().borrow();
        assert_eq!(
            cursor.normal(Orientation::Sagittal),
            Orientation::Sagittal.default_normal()
        );
        for orientation in [Orientation::Coronal, Orientation::Axial] {
            let expected = rotation * orientation.default_normal();
            assert!((cursor.normal(orientation) - expected).length() < 1e-9);
        }
    }

    for orientation in [Orientation::Coronal, Orientation::Axial] {
        let cursor = scene.cursor().borrow().clone();
        let line = SliceLine::new(&cursor, orientation, &ct.bounds(), ct.spacing, None)
            .expect("plane crosses the volume");
        assert_eq!(scene.slice_range(orientation), Some((0, line.count)));
        assert_eq!(scene.slice(orientation), line.index_of(cursor.center()));
    }

    assert_eq!(
        scene.gesture(Orientation::Sagittal, Gesture::CursorDragEnd),
        FlushRequest::Flushed(FlushKey::Cursor)
    );
    assert!(
        !scene
            .slice_view(Orientation::Coronal)
            .base()
            .renderer()
            .is_animating()
    );
    let notifications = scene.drain_notifications();
    assert!(matches!(
        notifications.as_slice(),
        [SceneNotification::CursorChanged(_)]
    ));
}

#[test]
fn test_scroll_moves_only_the_center() {
    let mut scene = scene();
    load(&mut scene, "ct", LoadedData::Volume(volume(DVec3::ZERO)));
    let normals = scene.cursor().borrow().normals();
    let before = scene.slice(Orientation::Axial).expect("volume loaded");

    let request = scene.gesture(Orientation::Axial, Gesture::Scroll { slices: 1 });
    assert_eq!(request, FlushRequest::Flushed(FlushKey::Cursor));
    assert_eq!(scene.slice(Orientation::Axial), Some(before + 1));
    assert_eq!(scene.cursor().borrow().normals(), normals);
    assert!(
        !scene
            .slice_view(Orientation::Coronal)
            .base()
            .renderer()
            .is_animating()
    );
}

#[test]
fn test_mesh_is_cut_in_slice_views() {
    let mut scene = scene();
    load(&mut scene, "ct", LoadedData::Volume(volume(DVec3::ZERO)));
    let mesh = Mesh::new(
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(4.0, 0.0, 10.0),
            DVec3::new(0.0, 7.0, 10.0),
        ],
        vec![[0, 1, 2]],
    )
    .expect("valid triangle");
    let id = load(&mut scene, "surface", LoadedData::Mesh(Arc::new(mesh)));

    assert_eq!(
        kinds(&scene, ViewId::Slice(Orientation::Axial)),
        vec![RenderableKind::ResliceSurface, RenderableKind::MeshSlice]
    );
    assert_eq!(
        kinds(&scene, ViewId::ThreeD),
        vec![RenderableKind::Volume, RenderableKind::Mesh]
    );
    assert!(scene.set_opacity(&id, 0.4));
    assert!(!scene.set_opacity(&id, 0.4));
    assert!(scene.set_color(&id, [0.0, 1.0, 0.0]));
    assert!(!scene.set_color(&id, [0.0, 1.0, 0.0]));
}

#[test]
fn test_reset_restores_axis_aligned_cursor() {
    let mut scene = scene();
    let ct = volume(DVec3::new(-3.0, 4.0, 10.0));
    load(&mut scene, "ct", LoadedData::Volume(ct.clone()));
    scene.gesture(Orientation::Axial, Gesture::CursorRotate { angle: 0.4 });
    assert!(scene.set_cursor_position(ct.bounds().min));
    assert_ne!(
        scene.cursor().borrow().normal(Orientation::Sagittal),
        Orientation::Sagittal.default_normal()
    );

    scene.reset();

    let snapshot = scene.cursor_snapshot().expect("cursor bound to the volume");
    assert_eq!(snapshot.normals, Orientation::ALL.map(Orientation::default_normal));
    assert_eq!(snapshot.center, ct.center());
    for orientation in Orientation::ALL {
        let slider = snapshot.sliders[orientation.index()];
        assert_eq!(slider.range, scene.slice_range(orientation));
        assert_eq!(slider.value, scene.slice(orientation));
    }
}

#[test]
fn test_detaching_every_slice_view_releases_cursor() {
    let mut scene = scene();
    let ct = load(&mut scene, "ct", LoadedData::Volume(volume(DVec3::ZERO)));

    assert!(scene.detach_view(ViewId::Slice(Orientation::Sagittal)));
    assert!(!scene.slice_view(Orientation::Sagittal).base().contains(&ct));
    assert_eq!(scene.slice_range(Orientation::Sagittal), None);
    assert!(scene.cursor().borrow().is_initialized());
    assert!(scene.is_primary(&ct));

    assert!(scene.detach_view(ViewId::Slice(Orientation::Coronal)));
    assert!(scene.detach_view(ViewId::Slice(Orientation::Axial)));
    assert!(!scene.cursor().borrow().is_initialized());
    assert_eq!(scene.cursor_snapshot(), None);
    for orientation in Orientation::ALL {
        assert_eq!(scene.slice_range(orientation), None);
    }
    assert!(!scene.is_primary(&ct));
    assert_eq!(kinds(&scene, ViewId::ThreeD), vec![RenderableKind::Volume]);

    for orientation in Orientation::ALL {
        assert!(scene.attach_view(ViewId::Slice(orientation)));
    }
    assert!(scene.cursor().borrow().is_initialized());
    assert!(scene.is_primary(&ct));
    assert_eq!(scene.slice_range(Orientation::Sagittal), Some((0, 9)));
    assert_eq!(scene.slice_range(Orientation::Coronal), Some((0, 7)));
    assert_eq!(scene.slice_range(Orientation::Axial), Some((0, 5)));
}

#[test]
fn test_reattached_view_keeps_the_shared_primary() {
    let mut scene = scene();
    let a = AssetItem::new("a", "a");
    let b = AssetItem::new("b", "b");
    assert!(scene.select(&a));
    assert!(scene.select(&b));
    // b finishes first and becomes primary everywhere
    assert!(scene.complete_load(&b.id, Ok(LoadedData::Volume(volume(DVec3::ZERO)))));
    assert!(scene.complete_load(
        &a.id,
        Ok(LoadedData::Volume(volume(DVec3::new(0.5, 0.0, 0.0))))
    ));

    assert!(scene.detach_view(ViewId::Slice(Orientation::Sagittal)));
    assert!(scene.attach_view(ViewId::Slice(Orientation::Sagittal)));

    for orientation in Orientation::ALL {
        let view = scene.slice_view(orientation);
        assert!(view.is_primary_volume(&b.id));
        assert!(view.is_secondary_volume(&a.id));
        assert_eq!(view.primary_count(), 1);
    }
    assert_eq!(scene.object(&b.id).expect("loaded").opacity(), 1.0);
    assert_eq!(scene.object(&a.id).expect("loaded").opacity(), 0.8);
}
