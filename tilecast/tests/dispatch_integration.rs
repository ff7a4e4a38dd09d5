//! End-to-end dispatch tests.
//!
//! Drive the factory the way an HTTP tile endpoint would: a JSON map
//! configuration in, request parameters in, an adapted renderer out,
//! tiles rendered through mock engines.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use tilecast::config::RendererSettings;
use tilecast::mapconfig::MapConfig;
use tilecast::renderer::{
    ConstructionError, FeatureEngine, FeatureTileSpec, RenderContext, RenderEngines, Renderer,
    RendererError, RendererFactory, RendererRegistry, TileErrorStrategy, TimeSeriesEngine,
    TimeSeriesSpec, TileParams, VectorEngine,
};
use tilecast::tile::{TileCoord, TileError, TileFormat, TILE_SIZE};

/// Feature engine producing a fixed payload, or a fixed failure.
struct StaticFeatureEngine(Result<Bytes, String>);

#[async_trait]
impl FeatureEngine for StaticFeatureEngine {
    async fn render(&self, _spec: &FeatureTileSpec, _coord: TileCoord) -> Result<Bytes, TileError> {
        self.0.clone().map_err(TileError::Render)
    }
}

struct StaticVectorEngine(Bytes);

#[async_trait]
impl VectorEngine for StaticVectorEngine {
    async fn encode(&self, _spec: &FeatureTileSpec, _coord: TileCoord) -> Result<Bytes, TileError> {
        Ok(self.0.clone())
    }
}

struct StaticTimeSeriesEngine(Bytes);

#[async_trait]
impl TimeSeriesEngine for StaticTimeSeriesEngine {
    async fn render(&self, _spec: &TimeSeriesSpec, _coord: TileCoord) -> Result<Bytes, TileError> {
        Ok(self.0.clone())
    }
}

/// Solid-color PNG payload, for engines whose output must composite.
fn solid_png(rgba: [u8; 4]) -> Bytes {
    let canvas = image::RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, image::Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    Bytes::from(buf.into_inner())
}

fn factory_with(settings: RendererSettings, feature: StaticFeatureEngine) -> RendererFactory {
    let engines = RenderEngines {
        feature: Arc::new(feature),
        vector: Arc::new(StaticVectorEngine(Bytes::from_static(b"storage-mvt"))),
        timeseries: Arc::new(StaticTimeSeriesEngine(Bytes::from_static(b"frames"))),
    };
    RendererFactory::new(RendererRegistry::new(settings, engines).unwrap())
}

fn factory(settings: RendererSettings) -> RendererFactory {
    factory_with(
        settings,
        StaticFeatureEngine(Ok(Bytes::from_static(b"generic-mvt"))),
    )
}

fn projection_on() -> RendererSettings {
    let mut settings = RendererSettings::default();
    settings.vector.use_storage_projection = true;
    settings
}

/// Three layers: a plain background and two feature layers.
fn mixed_document() -> MapConfig {
    MapConfig::from_json(
        r##"{
            "layers": [
                {"type": "plain", "options": {"color": "#ff0000"}},
                {"type": "feature", "options": {
                    "sql": "select * from pois",
                    "interactivity": ["name"]
                }},
                {"type": "feature", "options": {"sql": "select * from roads"}}
            ]
        }"##,
    )
    .unwrap()
}

fn coord() -> TileCoord {
    TileCoord::new(13, 4011, 3088)
}

#[tokio::test]
async fn two_feature_layers_by_list_render_named_sub_layers_in_order() {
    let factory = factory(RendererSettings::default());
    let params = TileParams::new("mvt").with_layer("1,2");

    let renderer = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .unwrap();

    // all-feature selection stays on the feature backend
    let tile = renderer.render_tile(coord()).await.unwrap();
    assert_eq!(&tile.data[..], b"generic-mvt");
    assert_eq!(tile.format, TileFormat::Mvt);

    // two sub-layers, matching configuration order
    assert_eq!(renderer.metadata(), json!({"layers": ["layer1", "layer2"]}));
}

#[tokio::test]
async fn storage_projection_routes_mvt_to_the_vector_backend() {
    let factory = factory(projection_on());
    let params = TileParams::new("mvt").with_layer("1,2");

    let renderer = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .unwrap();

    let tile = renderer.render_tile(coord()).await.unwrap();
    assert_eq!(&tile.data[..], b"storage-mvt");
}

#[tokio::test]
async fn unset_selector_over_all_feature_layers_uses_the_toggle() {
    let document = MapConfig::from_json(
        r#"{
            "layers": [
                {"type": "feature", "options": {"sql": "select 1"}},
                {"type": "feature", "options": {"sql": "select 2"}}
            ]
        }"#,
    )
    .unwrap();
    let params = TileParams::new("mvt");

    let off = factory(RendererSettings::default())
        .renderer_for(&document, &params, &RenderContext::default())
        .await
        .unwrap();
    assert_eq!(&off.render_tile(coord()).await.unwrap().data[..], b"generic-mvt");

    let on = factory(projection_on())
        .renderer_for(&document, &params, &RenderContext::default())
        .await
        .unwrap();
    assert_eq!(&on.render_tile(coord()).await.unwrap().data[..], b"storage-mvt");
}

#[tokio::test]
async fn out_of_range_selector_fails_before_any_backend_work() {
    let factory = factory(RendererSettings::default());
    let params = TileParams::new("png").with_layer("5");

    let err = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .err().unwrap();

    assert!(matches!(
        err,
        RendererError::LayerNotFound {
            index: 5,
            layer_count: 3
        }
    ));
}

#[tokio::test]
async fn single_non_feature_layer_skips_the_composite() {
    let factory = factory(RendererSettings::default());

    // by index
    let params = TileParams::new("png").with_layer("0");
    let renderer = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .unwrap();
    let tile = renderer.render_tile(coord()).await.unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(10, 10).0, [255, 0, 0, 255]);
    // a plain renderer has no sub-layers to report
    assert_eq!(renderer.metadata(), serde_json::Value::Null);

    // by type name
    let params = TileParams::new("png").with_layer("plain");
    let renderer = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .unwrap();
    let tile = renderer.render_tile(coord()).await.unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(10, 10).0, [255, 0, 0, 255]);
}

#[tokio::test]
async fn heterogeneous_selection_blends_in_configuration_order() {
    // opaque green feature tiles over an opaque red plain background
    let factory = factory_with(
        RendererSettings::default(),
        StaticFeatureEngine(Ok(solid_png([0, 255, 0, 255]))),
    );
    let document = MapConfig::from_json(
        r##"{
            "layers": [
                {"id": "background", "type": "plain", "options": {"color": "#ff0000"}},
                {"id": "overlay", "type": "feature", "options": {
                    "sql": "select * from pois",
                    "style": "poi { fill: green; }"
                }}
            ]
        }"##,
    )
    .unwrap();

    let params = TileParams::new("png");
    let renderer = factory
        .renderer_for(&document, &params, &RenderContext::default())
        .await
        .unwrap();

    assert_eq!(
        renderer.metadata(),
        json!({"layers": ["background", "overlay"]})
    );

    let tile = renderer.render_tile(coord()).await.unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    // the overlay is layer 1, so it lands on top of the background
    assert_eq!(decoded.get_pixel(64, 64).0, [0, 255, 0, 255]);
}

#[tokio::test]
async fn type_selector_matching_no_layers_serves_an_empty_composite() {
    let factory = factory(RendererSettings::default());
    let params = TileParams::new("png").with_layer("http");

    let renderer = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .unwrap();

    assert_eq!(renderer.metadata(), json!({"layers": []}));
    let tile = renderer.render_tile(coord()).await.unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
}

#[tokio::test]
async fn backend_refusing_the_format_is_an_unsupported_format() {
    let factory = factory(RendererSettings::default());
    // plain layers cannot produce vector tiles
    let params = TileParams::new("mvt").with_layer("0");

    let err = factory
        .renderer_for(&mixed_document(), &params, &RenderContext::default())
        .await
        .err().unwrap();
    assert!(matches!(
        err,
        RendererError::UnsupportedFormat { format } if format == "mvt"
    ));
}

#[tokio::test]
async fn construction_failures_are_forwarded_verbatim() {
    let factory = factory(RendererSettings::default());
    let document = MapConfig::from_json(
        r#"{"layers": [{"type": "feature", "options": {}}]}"#,
    )
    .unwrap();

    let err = factory
        .renderer_for(&document, &TileParams::new("mvt"), &RenderContext::default())
        .await
        .err().unwrap();
    assert!(matches!(
        err,
        RendererError::Construction(ConstructionError::MissingOption {
            layer: 0,
            option: "sql"
        })
    ));
}

#[tokio::test]
async fn request_context_can_switch_to_placeholder_tiles() {
    let factory = factory_with(
        RendererSettings::default(),
        StaticFeatureEngine(Err("datasource went away".to_string())),
    );
    let document = MapConfig::from_json(
        r#"{
            "layers": [{"type": "feature", "options": {
                "sql": "select 1",
                "style": "layer { fill: black; }"
            }}]
        }"#,
    )
    .unwrap();
    let params = TileParams::new("png");

    // default policy propagates
    let renderer = factory
        .renderer_for(&document, &params, &RenderContext::default())
        .await
        .unwrap();
    assert!(renderer.render_tile(coord()).await.is_err());

    // per-request override substitutes a blank tile
    let context = RenderContext {
        on_tile_error: Some(TileErrorStrategy::Placeholder),
        ..RenderContext::default()
    };
    let renderer = factory
        .renderer_for(&document, &params, &context)
        .await
        .unwrap();
    let tile = renderer.render_tile(coord()).await.unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
}

#[tokio::test]
async fn timeseries_layer_renders_through_its_own_backend() {
    let factory = factory(RendererSettings::default());
    let document = MapConfig::from_json(
        r#"{
            "layers": [
                {"type": "feature", "options": {"sql": "select 1"}},
                {"type": "timeseries", "options": {
                    "sql": "select * from trips",
                    "time_column": "pickup_at",
                    "steps": 256
                }}
            ]
        }"#,
    )
    .unwrap();

    let params = TileParams::new("series.json").with_layer("1");
    let renderer = factory
        .renderer_for(&document, &params, &RenderContext::default())
        .await
        .unwrap();

    let tile = renderer.render_tile(coord()).await.unwrap();
    assert_eq!(&tile.data[..], b"frames");
    assert_eq!(tile.format, TileFormat::SeriesJson);
    assert_eq!(tile.content_type(), "application/json");
}
