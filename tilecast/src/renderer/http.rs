//! Remote-fetch backend for externally hosted tiles.
//!
//! An http layer points at an upstream tile service via a URL template.
//! The upstream host must sit on the configured allowlist; refusing a
//! host is a construction failure, not a render failure, so misconfigured
//! maps never produce traffic.

use super::backend::{layer_options, Renderer, RendererBackend, RendererOptions};
use super::error::{ConstructionError, RegistryError};
use super::registry::BackendKind;
use crate::config::HttpSettings;
use crate::mapconfig::{LayerType, MapConfig};
use crate::tile::{Tile, TileCoord, TileError, TileFormat};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, trace};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpLayerOptions {
    url_template: Option<String>,
    subdomains: Vec<String>,
}

/// The remote-fetch backend.
///
/// Holds one shared HTTP client for the process; per-request state lives
/// in the renderers it produces.
pub struct HttpBackend {
    client: Client,
    allowed_hosts: Vec<String>,
}

impl HttpBackend {
    /// Build the backend and its shared HTTP client.
    ///
    /// # Errors
    ///
    /// Fails when the client cannot be constructed, e.g. a malformed
    /// proxy URL in `settings`.
    pub fn new(settings: &HttpSettings) -> Result<Self, RegistryError> {
        let mut builder = Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("tilecast/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|err| RegistryError::HttpClient(err.to_string()))?,
            );
        }

        let client = builder
            .build()
            .map_err(|err| RegistryError::HttpClient(err.to_string()))?;

        Ok(Self {
            client,
            allowed_hosts: settings.allowed_hosts.clone(),
        })
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[async_trait]
impl RendererBackend for HttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    fn supports_format(&self, format: TileFormat) -> bool {
        format == TileFormat::Png
    }

    async fn create_renderer(
        &self,
        config: &MapConfig,
        format: TileFormat,
        options: &RendererOptions,
    ) -> Result<Box<dyn Renderer>, ConstructionError> {
        let index = match options.layers[..] {
            [index] => index,
            _ => {
                return Err(ConstructionError::Backend(format!(
                    "http renderer expects exactly one layer, got {}",
                    options.layers.len()
                )))
            }
        };

        let layer = config
            .layer(index)
            .ok_or_else(|| ConstructionError::Backend(format!("layer {index} out of range")))?;

        if layer.kind != LayerType::Http {
            return Err(ConstructionError::InvalidOption {
                layer: index,
                option: "type",
                message: format!("expected an http layer, got '{}'", layer.kind),
            });
        }

        let opts: HttpLayerOptions = layer_options(layer, index)?;
        let template = opts
            .url_template
            .filter(|template| !template.trim().is_empty())
            .ok_or(ConstructionError::MissingOption {
                layer: index,
                option: "url_template",
            })?;

        validate_template(&template, &opts.subdomains, index)?;

        let host = template_host(&template, &opts.subdomains, index)?;
        if !self.host_allowed(&host) {
            return Err(ConstructionError::HostNotAllowed { host });
        }

        debug!(%host, "http renderer bound");
        Ok(Box::new(HttpRenderer {
            client: self.client.clone(),
            template,
            subdomains: opts.subdomains,
            format,
        }))
    }
}

fn validate_template(
    template: &str,
    subdomains: &[String],
    index: usize,
) -> Result<(), ConstructionError> {
    for placeholder in ["{z}", "{x}", "{y}"] {
        if !template.contains(placeholder) {
            return Err(ConstructionError::InvalidOption {
                layer: index,
                option: "url_template",
                message: format!("missing '{placeholder}' placeholder"),
            });
        }
    }
    if template.contains("{s}") && subdomains.is_empty() {
        return Err(ConstructionError::InvalidOption {
            layer: index,
            option: "subdomains",
            message: "template uses '{s}' but no subdomains are configured".to_string(),
        });
    }
    Ok(())
}

/// Host the template points at, with placeholders substituted away so the
/// URL parses.
fn template_host(
    template: &str,
    subdomains: &[String],
    index: usize,
) -> Result<String, ConstructionError> {
    let probe = expand(template, subdomains, TileCoord::new(0, 0, 0));
    let url = reqwest::Url::parse(&probe).map_err(|err| ConstructionError::InvalidOption {
        layer: index,
        option: "url_template",
        message: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConstructionError::InvalidOption {
                layer: index,
                option: "url_template",
                message: format!("unsupported scheme '{other}'"),
            })
        }
    }

    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| ConstructionError::InvalidOption {
            layer: index,
            option: "url_template",
            message: "template has no host".to_string(),
        })
}

/// Substitute coordinate placeholders, rotating subdomains by coordinate
/// so distribution stays deterministic per tile.
fn expand(template: &str, subdomains: &[String], coord: TileCoord) -> String {
    let mut url = template
        .replace("{z}", &coord.zoom.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string());

    if !subdomains.is_empty() {
        let pick = (coord.x + coord.y) as usize % subdomains.len();
        url = url.replace("{s}", &subdomains[pick]);
    }
    url
}

struct HttpRenderer {
    client: Client,
    template: String,
    subdomains: Vec<String>,
    format: TileFormat,
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        let url = expand(&self.template, &self.subdomains, coord);
        trace!(%url, "fetching upstream tile");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| TileError::Fetch(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TileError::Fetch(format!("'{url}' returned {status}")));
        }

        let data = response
            .bytes()
            .await
            .map_err(|err| TileError::Fetch(err.to_string()))?;

        Ok(Tile::new(data, self.format))
    }
}
