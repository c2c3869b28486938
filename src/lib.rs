//! # MPR scene library
//!
//! This crate is the scene core of a quad-view medical image viewer: three
//! slice views (sagittal, coronal, axial) and one 3D view kept consistent
//! around a single shared reslice cursor.
//!
//! The reslice cursor is three mutually orthogonal cutting planes meeting
//! at one center point. It is shared by reference between the three slice
//! views, so a scroll, a cursor drag or a slider move in one of them is
//! immediately visible in the other two; those only have to re-derive
//! their display and redraw.
//!
//! Per slice view, the first volume loaded is the primary volume. It
//! defines the cutting plane and drives the cursor. Further volumes are
//! drawn as overlays on the same plane. When the primary is removed the
//! first overlay is promoted in its place.
//!
//! Items are selected from an asset store, loaded off the event loop and
//! decoded by extension. DICOM files and series are decoded with the
//! dicom-rs ecosystem; other formats plug in through [`VolumeDecoder`] and
//! [`MeshDecoder`].
//!
//!  - [`QuadView`] is the synchronous scene orchestrator.
//!  - [`Session`] drives it from a tokio event loop: asynchronous loads and
//!    debounced flushes of interactive gestures.
//!  - [`reslice_math`] holds the slider/plane math.
//!
//! # Examples
//!
//! ## Loading an item and scrolling through it
//!
//! ```no_run
//! # use mpr_scene::{
//! #     AssetItem, DecoderRegistry, Gesture, LocalAssetStore, Orientation, PresetCatalog,
//! #     Session, SortBy, ViewerConfig,
//! # };
//! # use std::sync::Arc;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let presets = Arc::new(PresetCatalog::builtin()?);
//! let store = Arc::new(LocalAssetStore::new("assetstore"));
//! let decoders = Arc::new(DecoderRegistry::with_defaults(SortBy::InstanceNumber));
//! let mut session = Session::new(presets, store, decoders, ViewerConfig::default());
//!
//! session.toggle_item(&AssetItem::new("head-ct", "Head CT"));
//! session.run_until_idle().await;
//!
//! session.gesture(Orientation::Axial, Gesture::Scroll { slices: 5 });
//! let image = session
//!     .scene()
//!     .slice_view(Orientation::Axial)
//!     .capture_native()
//!     .expect("should have a primary volume");
//! image.save("axial.png")?;
//! # Ok(())
//! # }
//! ```

pub mod asset_store;
pub mod capture;
pub mod config;
pub mod cursor;
pub mod debounce;
pub mod enums;
pub mod geometry;
mod interpolator;
pub mod loader;
pub mod mesh;
pub mod presets;
pub mod quad_view;
pub mod renderable;
pub mod renderer;
pub mod reslice_math;
pub mod scene_object;
pub mod session;
pub mod slice_viewport;
pub mod threed_viewport;
pub mod viewport;
pub mod volume;
pub mod volume_loader;

pub use asset_store::{AssetItem, AssetStore, AssetStoreError, DataId, FileDescriptor, LocalAssetStore};
pub use config::{ConfigError, ViewerConfig};
pub use cursor::{ResliceCursor, SharedCursor};
pub use enums::{Interpolation, Orientation, SortBy};
pub use geometry::Bounds;
pub use loader::{
    DataKind, DecodeError, DecoderRegistry, LoadError, LoadedData, MeshDecoder, VolumeDecoder,
};
pub use mesh::{Mesh, MeshError};
pub use presets::{Preset, PresetCatalog, PresetError, VolumeProperty};
pub use quad_view::{
    CursorSnapshot, FlushKey, FlushRequest, Gesture, QuadView, SceneNotification, SceneSettings,
    SliderState,
};
pub use renderable::{Renderable, RenderableKind, WindowLevel};
pub use scene_object::{ObjectKind, SceneObject};
pub use session::{Session, SessionEvent};
pub use slice_viewport::SliceViewport;
pub use threed_viewport::ThreeDViewport;
pub use viewport::{View, ViewId, ViewportBase};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
