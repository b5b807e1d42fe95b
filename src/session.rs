// session.rs - Live preview and its enhancement pipeline
//
// The preview owns the mesh and the map set. Enhancement runs elsewhere and
// reports back through `MapUpdate` values, one per finished map. Each
// update carries the ticket it was started with; anything that arrives for
// an older image or generation is dropped.

use std::sync::{Arc, Weak};

use image::{DynamicImage, RgbImage, RgbaImage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ai::{ModelHint, NormalMapProvider, NormalRequest};
use crate::config::{ReliefConfig, SynthParams};
use crate::dimensions::PhysicalDimensions;
use crate::maps::{
    MapData, MapLayer, MapSource, SurfaceMapSet, fit_normal_map, synthesize_displacement_map,
    synthesize_normal_map, synthesize_roughness_map, working_image,
};
use crate::mesh::{BuildOptions, ReliefMesh, build};
use crate::source::{ImageId, ImageRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnhancementTicket {
    pub image: ImageId,
    pub generation: u64,
}

#[derive(Clone, Debug)]
pub struct MapUpdate {
    pub ticket: EnhancementTicket,
    pub layer: MapLayer,
    /// Keeps the run counted as in flight until the update is applied or dropped.
    claim: Arc<()>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnhancementState {
    /// Not started for the current image
    #[default]
    Idle,
    Running,
    /// All three maps bound; never re-runs for this image
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The last missing map arrived
    Completed,
    /// Ticket did not match the current image
    Stale,
}

struct Current {
    image: ImageRef,
    ticket: EnhancementTicket,
    /// `None` when the pixels could not be loaded
    working: Option<Arc<RgbImage>>,
    base_color: Option<Arc<RgbaImage>>,
}

pub struct ReliefPreview {
    options: BuildOptions,
    synth: SynthParams,
    hint: ModelHint,
    generation: u64,
    current: Option<Current>,
    dims: PhysicalDimensions,
    maps: SurfaceMapSet,
    mesh: ReliefMesh,
    done: bool,
    /// Alive while a job or any of its undelivered updates exists.
    claim: Weak<()>,
}

impl ReliefPreview {
    /// An untextured preview at the default size, waiting for a painting.
    pub fn new(config: &ReliefConfig) -> Self {
        let options = BuildOptions::from(config);
        let dims = PhysicalDimensions::fallback("");
        let maps = SurfaceMapSet::empty();
        let mesh = build(None, &dims, &maps, &options);
        Self {
            options,
            synth: config.synth.clone(),
            hint: ModelHint::from(&config.ai),
            generation: 0,
            current: None,
            dims,
            maps,
            mesh,
            done: false,
            claim: Weak::new(),
        }
    }

    /// Show `image` at `dims`. `pixels` is `None` when loading failed.
    ///
    /// A different image resets the maps and the enhancement guard and
    /// starts a new generation. The same image again only rebuilds the
    /// geometry, keeping whatever maps it already has, unless its pixels
    /// failed to load before and have arrived now.
    pub fn set_source(&mut self, image: ImageRef, pixels: Option<&DynamicImage>, dims: PhysicalDimensions) -> EnhancementTicket {
        let id = image.id();
        let max_edge = self.synth.max_resolution;
        if let Some(current) = self.current.as_mut().filter(|c| c.ticket.image == id) {
            let ticket = current.ticket;
            match pixels {
                Some(p) if current.working.is_none() => {
                    info!(image = %id, "pixels loaded on retry");
                    current.working = Some(Arc::new(working_image(p, max_edge)));
                    current.base_color = Some(Arc::new(p.to_rgba8()));
                    self.maps = SurfaceMapSet::empty();
                    self.done = false;
                    self.claim = Weak::new();
                }
                _ => debug!(image = %id, "same image; rebuilding geometry only"),
            }
            self.set_dimensions(dims);
            return ticket;
        }

        self.generation += 1;
        let ticket = EnhancementTicket { image: id, generation: self.generation };
        let working = pixels.map(|p| Arc::new(working_image(p, max_edge)));
        let base_color = pixels.map(|p| Arc::new(p.to_rgba8()));
        if base_color.is_none() {
            warn!(source = image.describe(), "no pixels for painting; building untextured canvas");
        }

        self.current = Some(Current { image, ticket, working, base_color });
        self.maps = SurfaceMapSet::empty();
        self.done = false;
        self.claim = Weak::new();
        self.set_dimensions(dims);

        info!(image = %id, generation = self.generation, "preview source changed");
        ticket
    }

    /// Rebuild the geometry at new physical dimensions, keeping the maps.
    pub fn set_dimensions(&mut self, dims: PhysicalDimensions) {
        let base_color = self.current.as_ref().and_then(|c| c.base_color.clone());
        self.mesh = build(base_color, &dims, &self.maps, &self.options);
        self.dims = dims;
    }

    /// Claim the enhancement run for the current image.
    ///
    /// Returns `None` if it completed or is running, or if there are no
    /// pixels to work from. A job that is dropped, or ends without
    /// delivering all three maps, gives the claim back.
    pub fn begin_enhancement(&mut self, provider: Option<Arc<dyn NormalMapProvider>>) -> Option<EnhancementJob> {
        if self.state() != EnhancementState::Idle {
            return None;
        }
        let current = self.current.as_ref()?;
        let working = current.working.clone()?;

        let claim = Arc::new(());
        self.claim = Arc::downgrade(&claim);
        Some(EnhancementJob {
            claim,
            ticket: current.ticket,
            image: current.image.clone(),
            working,
            synth: self.synth.clone(),
            hint: self.hint,
            provider,
        })
    }

    /// Bind one finished map to the live material.
    pub fn apply(&mut self, update: MapUpdate) -> ApplyOutcome {
        if self.ticket() != Some(update.ticket) {
            debug!(
                generation = update.ticket.generation,
                channel = ?update.layer.data.channel(),
                "discarding stale map"
            );
            return ApplyOutcome::Stale;
        }

        let channel = update.layer.data.channel();
        self.maps.insert(update.layer);
        self.mesh.material.apply_maps(&self.maps);
        debug!(?channel, source = ?self.maps.source, "applied map");

        if self.maps.is_complete() {
            self.done = true;
            info!(source = ?self.maps.source, "enhancement complete");
            ApplyOutcome::Completed
        } else {
            ApplyOutcome::Applied
        }
    }

    /// Run enhancement for the current image to completion, applying maps as
    /// they land. Returns the provenance of the bound maps.
    pub async fn enhance(&mut self, provider: Option<Arc<dyn NormalMapProvider>>) -> MapSource {
        let Some(job) = self.begin_enhancement(provider) else {
            return self.maps.source;
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::join!(job.run(tx), async {
            while let Some(update) = rx.recv().await {
                self.apply(update);
            }
        });
        if !self.done {
            warn!(source = ?self.maps.source, "enhancement ended with maps missing; it can be retried");
        }
        self.maps.source
    }

    pub fn ticket(&self) -> Option<EnhancementTicket> {
        self.current.as_ref().map(|c| c.ticket)
    }

    pub fn mesh(&self) -> &ReliefMesh {
        &self.mesh
    }

    pub fn maps(&self) -> &SurfaceMapSet {
        &self.maps
    }

    pub fn dimensions(&self) -> &PhysicalDimensions {
        &self.dims
    }

    pub fn state(&self) -> EnhancementState {
        if self.done {
            EnhancementState::Done
        } else if self.claim.strong_count() > 0 {
            EnhancementState::Running
        } else {
            EnhancementState::Idle
        }
    }
}

/// Everything needed to produce the three maps for one image, detached from the preview.
pub struct EnhancementJob {
    claim: Arc<()>,
    ticket: EnhancementTicket,
    image: ImageRef,
    working: Arc<RgbImage>,
    synth: SynthParams,
    hint: ModelHint,
    provider: Option<Arc<dyn NormalMapProvider>>,
}

impl EnhancementJob {
    pub fn ticket(&self) -> EnhancementTicket {
        self.ticket
    }

    /// Produce all three maps, sending each on `tx` as soon as it is ready.
    ///
    /// Roughness and displacement run alongside the normal slot. Within the
    /// normal slot the provider is tried to the end before the procedural
    /// fallback starts.
    pub async fn run(self, tx: mpsc::UnboundedSender<MapUpdate>) {
        let ticket = self.ticket;
        let send = |layer: Option<MapLayer>| {
            let Some(layer) = layer else { return };
            let claim = Arc::clone(&self.claim);
            if tx.send(MapUpdate { ticket, layer, claim }).is_err() {
                debug!("preview gone; dropping map");
            }
        };

        tokio::join!(
            async { send(self.normal_layer().await) },
            async {
                let src = Arc::clone(&self.working);
                let map = blocking("roughness", move || synthesize_roughness_map(&src)).await;
                send(map.map(|m| procedural(MapData::Roughness(Arc::new(m)))))
            },
            async {
                let (src, params) = (Arc::clone(&self.working), self.synth.clone());
                let map = blocking("displacement", move || synthesize_displacement_map(&src, &params)).await;
                send(map.map(|m| procedural(MapData::Displacement(Arc::new(m)))))
            },
        );
    }

    async fn normal_layer(&self) -> Option<MapLayer> {
        let (w, h) = self.working.dimensions();

        if let Some(provider) = &self.provider {
            let request = NormalRequest { image: &self.image, pixels: &self.working, hint: self.hint };
            match provider.request_normal_map(request).await {
                Ok(map) => {
                    info!(provider = provider.name(), width = map.width(), height = map.height(), "AI normal map received");
                    if let Some(fitted) = blocking("normal fit", move || fit_normal_map(map, w, h)).await {
                        return Some(MapLayer { data: MapData::Normal(Arc::new(fitted)), source: MapSource::Ai });
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), reason = %e.reason, "AI normal map unavailable; using procedural");
                }
            }
        }

        let (src, params) = (Arc::clone(&self.working), self.synth.clone());
        let map = blocking("normal", move || synthesize_normal_map(&src, &params)).await?;
        Some(procedural(MapData::Normal(Arc::new(map))))
    }
}

fn procedural(data: MapData) -> MapLayer {
    MapLayer { data, source: MapSource::Procedural }
}

async fn blocking<T, F>(what: &'static str, f: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(map = what, error = %e, "map task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::MapChannel;
    use image::{GrayImage, Rgb};

    fn config() -> ReliefConfig {
        let mut config = ReliefConfig::default();
        config.mesh.segments = 4;
        config
    }

    fn painting(shade: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([shade, shade, shade])))
    }

    fn roughness_update(ticket: EnhancementTicket) -> MapUpdate {
        MapUpdate {
            ticket,
            layer: procedural(MapData::Roughness(Arc::new(GrayImage::new(12, 8)))),
            claim: Arc::new(()),
        }
    }

    #[test]
    fn new_image_starts_new_generation() {
        let mut preview = ReliefPreview::new(&config());
        let a = preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));
        let b = preview.set_source(ImageRef::remote("https://a/2.jpg"), Some(&painting(20)), PhysicalDimensions::fallback(""));
        assert_eq!((a.generation, b.generation), (1, 2));
        assert_ne!(a.image, b.image);
        assert_eq!(preview.ticket(), Some(b));
    }

    #[test]
    fn stale_updates_are_discarded() {
        let mut preview = ReliefPreview::new(&config());
        let old = preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));
        preview.set_source(ImageRef::remote("https://a/2.jpg"), Some(&painting(20)), PhysicalDimensions::fallback(""));

        assert_eq!(preview.apply(roughness_update(old)), ApplyOutcome::Stale);
        assert!(preview.mesh().material.roughness_map.is_none());
        assert!(!preview.maps().has(MapChannel::Roughness));
    }

    #[test]
    fn partial_maps_bind_immediately() {
        let mut preview = ReliefPreview::new(&config());
        let ticket = preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));

        assert_eq!(preview.apply(roughness_update(ticket)), ApplyOutcome::Applied);
        assert!(preview.mesh().material.roughness_map.is_some());
        assert!(preview.mesh().material.normal_map.is_none());
        assert_eq!(preview.mesh().material.source, MapSource::Procedural);
    }

    #[test]
    fn enhancement_is_claimed_once_per_image() {
        let mut preview = ReliefPreview::new(&config());
        assert!(preview.begin_enhancement(None).is_none());

        preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));
        let _job = preview.begin_enhancement(None).unwrap();
        assert!(preview.begin_enhancement(None).is_none());
        assert_eq!(preview.state(), EnhancementState::Running);

        preview.set_source(ImageRef::remote("https://a/2.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));
        assert_eq!(preview.state(), EnhancementState::Idle);
        assert!(preview.begin_enhancement(None).is_some());
    }

    #[test]
    fn dropped_job_releases_the_claim() {
        let mut preview = ReliefPreview::new(&config());
        preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(10)), PhysicalDimensions::fallback(""));

        let job = preview.begin_enhancement(None).unwrap();
        assert_eq!(preview.state(), EnhancementState::Running);
        drop(job);

        assert_eq!(preview.state(), EnhancementState::Idle);
        assert!(!preview.maps().is_complete());
        assert!(preview.begin_enhancement(None).is_some());
    }

    #[tokio::test]
    async fn undelivered_maps_keep_the_run_in_flight() {
        let mut preview = ReliefPreview::new(&config());
        preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(60)), PhysicalDimensions::fallback(""));
        let job = preview.begin_enhancement(None).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        job.run(tx).await;
        // job finished but its maps are still queued
        assert_eq!(preview.state(), EnhancementState::Running);
        assert!(preview.begin_enhancement(None).is_none());

        let first = rx.recv().await.unwrap();
        assert_eq!(preview.apply(first), ApplyOutcome::Applied);
        drop(rx);
        // the rest never arrive
        assert_eq!(preview.state(), EnhancementState::Idle);
        assert_eq!(preview.enhance(None).await, MapSource::Procedural);
        assert_eq!(preview.state(), EnhancementState::Done);
    }

    #[tokio::test]
    async fn pixels_arriving_on_retry_enable_texture_and_enhancement() {
        let mut preview = ReliefPreview::new(&config());
        let image = ImageRef::remote("https://a/flaky.jpg");
        let first = preview.set_source(image.clone(), None, PhysicalDimensions::fallback(""));
        assert!(preview.begin_enhancement(None).is_none());

        let again = preview.set_source(image, Some(&painting(70)), PhysicalDimensions::fallback(""));
        assert_eq!(first, again);
        assert!(preview.mesh().material.base_color.is_some());
        assert_eq!(preview.state(), EnhancementState::Idle);
        assert_eq!(preview.enhance(None).await, MapSource::Procedural);
        assert!(preview.maps().is_complete());
    }

    #[test]
    fn unloaded_image_builds_untextured_without_enhancement() {
        let mut preview = ReliefPreview::new(&config());
        let dims = PhysicalDimensions::from_centimeters(100.0, 50.0, None).unwrap();
        preview.set_source(ImageRef::remote("https://a/missing.jpg"), None, dims);
        assert!(preview.mesh().material.base_color.is_none());
        assert_eq!(preview.mesh().canvas_size, (0.5, 1.0));
        assert!(preview.begin_enhancement(None).is_none());
    }

    #[tokio::test]
    async fn procedural_enhancement_completes() {
        let mut preview = ReliefPreview::new(&config());
        preview.set_source(ImageRef::remote("https://a/1.jpg"), Some(&painting(128)), PhysicalDimensions::fallback(""));

        assert_eq!(preview.enhance(None).await, MapSource::Procedural);
        assert_eq!(preview.state(), EnhancementState::Done);
        assert!(preview.maps().is_complete());
        let material = &preview.mesh().material;
        assert!(material.normal_map.is_some() && material.roughness_map.is_some() && material.displacement_map.is_some());

        // completed images never re-run
        assert!(preview.begin_enhancement(None).is_none());
    }

    #[tokio::test]
    async fn same_image_keeps_maps_across_resize() {
        let mut preview = ReliefPreview::new(&config());
        let image = ImageRef::remote("https://a/1.jpg");
        let first = preview.set_source(image.clone(), Some(&painting(90)), PhysicalDimensions::fallback(""));
        preview.enhance(None).await;

        let dims = PhysicalDimensions::from_centimeters(120.0, 90.0, None).unwrap();
        let again = preview.set_source(image, Some(&painting(90)), dims);
        assert_eq!(first, again);
        assert_eq!(preview.state(), EnhancementState::Done);
        assert!(preview.mesh().material.displacement_map.is_some());
        assert_eq!(preview.mesh().canvas_size, (0.9, 1.2));
    }
}
